//! Two-line status bar widget.
//!
//! - Line 1: run status (colored), run id, tool and decision counters, and
//!   the pause guidance or failure message when there is one
//! - Line 2: keybind hints for the current mode

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Widget};

use crate::run::RunStatus;
use crate::tui::app_state::AppState;

fn run_status_style(status: RunStatus) -> Style {
    let color = match status {
        RunStatus::Idle => Color::DarkGray,
        RunStatus::Running => Color::Yellow,
        RunStatus::Paused => Color::Magenta,
        RunStatus::Finished => Color::Green,
        RunStatus::Failed => Color::Red,
        RunStatus::Cancelled => Color::LightRed,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

pub fn render_status_bar(state: &AppState, area: Rect, buf: &mut Buffer) {
    if area.height == 0 || area.width == 0 {
        return;
    }

    let sep = Span::styled(" | ", Style::default().fg(Color::DarkGray));

    let mut line1 = vec![
        Span::styled(format!(" {}", state.run_status), run_status_style(state.run_status)),
        sep.clone(),
        Span::raw(format!("Run {}", state.run_id.as_deref().unwrap_or("-"))),
        sep.clone(),
        Span::raw(format!("Tools: {}", state.tool_count)),
    ];
    if state.failed_tool_count > 0 {
        line1.push(Span::styled(
            format!(" ({} failed)", state.failed_tool_count),
            Style::default().fg(Color::Red),
        ));
    }
    line1.push(sep.clone());
    line1.push(Span::raw(format!("Decisions: {}", state.decision_count)));

    if let Some(guidance) = &state.guidance {
        line1.push(sep.clone());
        line1.push(Span::styled(guidance.clone(), Style::default().fg(Color::Magenta)));
    } else if let Some(error) = &state.run_error {
        line1.push(sep.clone());
        line1.push(Span::styled(error.clone(), Style::default().fg(Color::Red)));
    }

    let hint_style = Style::default().fg(Color::DarkGray);
    let key_style = Style::default().fg(Color::White);
    let hints: &[(&str, &str)] = if state.terminal_input {
        &[("Esc", "leave terminal input")]
    } else {
        &[
            ("Tab", "switch"),
            ("\u{2191}\u{2193}", "scroll"),
            ("p", "pause/resume"),
            ("c", "cancel"),
            ("e", "expand"),
            ("i", "terminal input"),
            ("q", "quit"),
        ]
    };

    let mut line2 = vec![Span::raw(" ")];
    for (i, (key, hint)) in hints.iter().enumerate() {
        if i > 0 {
            line2.push(Span::styled(" | ", hint_style));
        }
        line2.push(Span::styled(*key, key_style));
        line2.push(Span::styled(format!(": {hint}"), hint_style));
    }

    Paragraph::new(vec![Line::from(line1), Line::from(line2)]).render(area, buf);
}
