//! Top-level dashboard render function.
//!
//! [`render_ui`] is called each frame by the main loop. It composes the tab
//! bar, the active tab (trace list or terminal pane), and the status bar.

use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Tabs, Widget};

use crate::tui::app_state::AppState;
use crate::tui::widgets::{status_bar, terminal_pane, trace_list};

const TAB_TITLES: &[&str] = &["Trace", "Terminal"];

/// Render the whole dashboard.
///
/// Layout, top to bottom: tab bar (1 line), content, status bar (2 lines).
/// A quit confirmation dialog overlays the content while `quit_pending`.
pub fn render_ui(state: &AppState, frame: &mut Frame) {
    let area = frame.area();

    let [tab_bar_area, content_area, status_bar_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(2),
    ])
    .areas(area);

    render_tab_bar(state.active_tab, tab_bar_area, frame.buffer_mut());

    match state.active_tab {
        0 => trace_list::render_trace_list(
            &state.log_entries,
            state.log_scroll_offset,
            content_area,
            frame.buffer_mut(),
        ),
        1 => terminal_pane::render_terminal_pane(
            &state.terminal,
            state.terminal_input,
            content_area,
            frame.buffer_mut(),
        ),
        _ => {}
    }

    status_bar::render_status_bar(state, status_bar_area, frame.buffer_mut());

    if state.quit_pending {
        render_quit_dialog(area, frame.buffer_mut());
    }
}

fn render_tab_bar(active_tab: usize, area: Rect, buf: &mut Buffer) {
    let titles: Vec<Line<'_>> = TAB_TITLES.iter().map(|t| Line::from(*t)).collect();

    let tabs = Tabs::new(titles)
        .select(active_tab)
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )
        .divider(Span::styled("|", Style::default().fg(Color::DarkGray)));

    Widget::render(tabs, area, buf);
}

/// Centered confirmation dialog. Quitting cancels the run.
fn render_quit_dialog(area: Rect, buf: &mut Buffer) {
    let width: u16 = 34;
    let height: u16 = 3;
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    let dialog_area = Rect::new(x, y, width.min(area.width), height.min(area.height));

    Clear.render(dialog_area, buf);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Confirm ")
        .style(Style::default().fg(Color::Red));
    let inner = block.inner(dialog_area);
    block.render(dialog_area, buf);

    if inner.width > 0 && inner.height > 0 {
        Paragraph::new(Line::from(vec![
            Span::raw(" Cancel run and quit? ("),
            Span::styled("y", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            Span::raw("/"),
            Span::styled("n", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
            Span::raw(")"),
        ]))
        .render(inner, buf);
    }
}
