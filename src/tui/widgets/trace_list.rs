//! Trace list widget.
//!
//! Renders the run's [`LogEntry`] items as blocks: a color-coded header (icon,
//! timestamp, label, summary) followed by indented detail when expanded.

use ratatui::buffer::Buffer;
use ratatui::layout::{Margin, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget,
    Widget,
};

use crate::tui::app_state::{LogEntry, LogEntryKind};

const INDENT: &str = "    ";

fn kind_prefix(kind: LogEntryKind) -> &'static str {
    match kind {
        LogEntryKind::Thinking => "\u{25CB}",               // ○
        LogEntryKind::ToolStart => "\u{25B6}",              // ▶
        LogEntryKind::ToolEnd { success: true } => "\u{2714}", // ✔
        LogEntryKind::ToolEnd { success: false } => "\u{2718}", // ✘
        LogEntryKind::Decision => "\u{25C6}",               // ◆
        LogEntryKind::Pause => "\u{23F8}",                  // ⏸
        LogEntryKind::Finish => "\u{2605}",                 // ★
        LogEntryKind::Error => "\u{2716}",                  // ✖
        LogEntryKind::System => "\u{2022}",                 // •
    }
}

fn kind_style(kind: LogEntryKind) -> Style {
    match kind {
        LogEntryKind::Thinking => Style::default().fg(Color::Cyan),
        LogEntryKind::ToolStart => Style::default().fg(Color::Yellow),
        LogEntryKind::ToolEnd { success: true } => Style::default().fg(Color::Green),
        LogEntryKind::ToolEnd { success: false } => Style::default().fg(Color::LightRed),
        LogEntryKind::Decision => Style::default().fg(Color::Blue),
        LogEntryKind::Pause => Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        LogEntryKind::Finish => Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        LogEntryKind::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        LogEntryKind::System => Style::default().fg(Color::DarkGray),
    }
}

fn kind_label(kind: LogEntryKind) -> &'static str {
    match kind {
        LogEntryKind::Thinking => "thinking",
        LogEntryKind::ToolStart => "tool-start",
        LogEntryKind::ToolEnd { .. } => "tool-end",
        LogEntryKind::Decision => "decision",
        LogEntryKind::Pause => "paused",
        LogEntryKind::Finish => "finished",
        LogEntryKind::Error => "error",
        LogEntryKind::System => "system",
    }
}

/// Lines one entry renders to.
fn entry_lines(entry: &LogEntry, content_width: usize) -> Vec<Line<'_>> {
    let style = kind_style(entry.kind);
    let mut lines = vec![Line::from(vec![
        Span::styled(format!("{} ", kind_prefix(entry.kind)), style),
        Span::styled(
            format!("{} ", entry.timestamp),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(format!("{} ", kind_label(entry.kind)), style),
        Span::raw(entry.summary.as_str()),
    ])];

    if entry.expanded {
        for content_line in entry.full_content.lines() {
            for wrapped in wrap_text(content_line, content_width) {
                lines.push(Line::from(vec![Span::raw(INDENT), Span::raw(wrapped)]));
            }
        }
    }
    lines
}

/// Build the lines for every entry.
fn build_trace_lines(entries: &[LogEntry], area_width: u16) -> Vec<Line<'_>> {
    let content_width = usize::from(area_width).saturating_sub(INDENT.len());
    entries
        .iter()
        .flat_map(|entry| entry_lines(entry, content_width))
        .collect()
}

/// Character-based hard wrap.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if max_width == 0 || chars.len() <= max_width {
        return vec![text.to_string()];
    }
    chars
        .chunks(max_width)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Line offset of the entry at `scroll_offset`.
fn entry_to_line_offset(entries: &[LogEntry], scroll_offset: usize, area_width: u16) -> usize {
    let content_width = usize::from(area_width).saturating_sub(INDENT.len());
    entries
        .iter()
        .take(scroll_offset)
        .map(|entry| entry_lines(entry, content_width).len())
        .sum()
}

/// Render the trace list into `area` with a border and scrollbar.
pub fn render_trace_list(entries: &[LogEntry], scroll_offset: usize, area: Rect, buf: &mut Buffer) {
    let block = Block::default().borders(Borders::ALL).title(" Trace ");
    let inner = block.inner(area);
    block.render(area, buf);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    if entries.is_empty() {
        Paragraph::new(Line::styled(
            "Waiting for the agent...",
            Style::default().fg(Color::DarkGray),
        ))
        .render(inner, buf);
        return;
    }

    let lines = build_trace_lines(entries, inner.width);
    let total_lines = lines.len();
    let visible = usize::from(inner.height);

    // Keep the selected entry in view, anchored at the bottom when possible.
    let selected_end = entry_to_line_offset(entries, scroll_offset + 1, inner.width);
    let line_offset = selected_end.saturating_sub(visible);

    Paragraph::new(lines)
        .scroll((u16::try_from(line_offset).unwrap_or(u16::MAX), 0))
        .render(inner, buf);

    if total_lines > visible {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("\u{2191}"))
            .end_symbol(Some("\u{2193}"));
        let mut scrollbar_state =
            ScrollbarState::new(total_lines.saturating_sub(visible)).position(line_offset);
        StatefulWidget::render(
            scrollbar,
            inner.inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            buf,
            &mut scrollbar_state,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(kind: LogEntryKind, summary: &str, full: &str, expanded: bool) -> LogEntry {
        LogEntry {
            timestamp: "14:00:00".to_string(),
            kind,
            summary: summary.to_string(),
            full_content: full.to_string(),
            expanded,
        }
    }

    fn buffer_text(buf: &Buffer) -> String {
        buf.content().iter().map(|c| c.symbol().to_string()).collect()
    }

    #[test]
    fn collapsed_entry_is_one_line() {
        let entries = [make_entry(
            LogEntryKind::ToolEnd { success: true },
            "convert: exit 0 in 120 ms",
            "{\n  \"file\": \"a.sql\"\n}",
            false,
        )];
        assert_eq!(build_trace_lines(&entries, 80).len(), 1);
    }

    #[test]
    fn expanded_entry_adds_detail_lines() {
        let entries = [make_entry(LogEntryKind::Pause, "upload DDL", "upload DDL\nthen resume", true)];
        assert_eq!(build_trace_lines(&entries, 80).len(), 3);
    }

    #[test]
    fn line_offset_counts_prior_entries() {
        let entries = vec![
            make_entry(LogEntryKind::Pause, "p", "one\ntwo", true),
            make_entry(LogEntryKind::System, "s", "", false),
        ];
        assert_eq!(entry_to_line_offset(&entries, 0, 80), 0);
        assert_eq!(entry_to_line_offset(&entries, 1, 80), 3);
    }

    #[test]
    fn wrap_text_is_char_safe() {
        assert_eq!(wrap_text("hello", 80), vec!["hello"]);
        assert_eq!(wrap_text("ééé", 2), vec!["éé", "é"]);
    }

    #[test]
    fn tool_end_styles_differ_by_outcome() {
        let ok = kind_style(LogEntryKind::ToolEnd { success: true });
        let failed = kind_style(LogEntryKind::ToolEnd { success: false });
        assert_ne!(ok.fg, failed.fg);
    }

    #[test]
    fn empty_list_shows_placeholder() {
        let area = Rect::new(0, 0, 40, 5);
        let mut buf = Buffer::empty(area);
        render_trace_list(&[], 0, area, &mut buf);
        let text = buffer_text(&buf);
        assert!(text.contains("Trace"));
        assert!(text.contains("Waiting for the agent"));
    }

    #[test]
    fn renders_summary_text() {
        let area = Rect::new(0, 0, 60, 6);
        let mut buf = Buffer::empty(area);
        let entries = [make_entry(LogEntryKind::Decision, "run_command: ls", "", false)];
        render_trace_list(&entries, 0, area, &mut buf);
        assert!(buffer_text(&buf).contains("run_command: ls"));
    }
}
