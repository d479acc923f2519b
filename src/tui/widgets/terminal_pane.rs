//! Agent terminal pane: the tail of the terminal scrollback.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph, Widget};

use crate::tui::app_state::TerminalBuffer;

/// Render the last lines of `terminal` that fit in `area`.
pub fn render_terminal_pane(terminal: &TerminalBuffer, input_mode: bool, area: Rect, buf: &mut Buffer) {
    let (title, border) = if input_mode {
        (" Terminal [input: Esc to leave] ", Style::default().fg(Color::Yellow))
    } else {
        (" Terminal ", Style::default())
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(title);
    let inner = block.inner(area);
    block.render(area, buf);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let all = terminal.lines();
    let start = all.len().saturating_sub(usize::from(inner.height));
    let lines: Vec<Line<'_>> = all[start..].iter().map(|l| Line::raw(l.as_str())).collect();

    Paragraph::new(lines).render(inner, buf);
}
