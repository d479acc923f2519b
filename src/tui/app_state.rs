//! Application state accumulator for the dashboard.
//!
//! [`AppState`] holds everything the dashboard renders. Run and terminal
//! events are applied via [`AppState::apply_event`]; run status is copied from
//! the runner's snapshot each tick via [`AppState::sync_run`]. Rendering reads
//! from `AppState` every frame (immediate-mode).

use chrono::Local;
use serde_json::Value;

use super::event::DashboardEvent;
use crate::run::{RunEvent, RunState, RunStatus};
use crate::terminal::SurfaceUpdate;

/// Lines kept in the terminal pane's scrollback.
const TERMINAL_SCROLLBACK: usize = 1000;

/// Categorizes trace entries for color-coding and icon selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEntryKind {
    Thinking,
    ToolStart,
    ToolEnd { success: bool },
    Decision,
    Pause,
    Finish,
    Error,
    System,
}

/// A single entry in the trace list.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Wall-clock time the entry arrived, e.g. "14:32:07".
    pub timestamp: String,
    pub kind: LogEntryKind,
    /// One-line summary, always visible.
    pub summary: String,
    /// Shown when expanded.
    pub full_content: String,
    pub expanded: bool,
}

/// Plain-text scrollback for the agent terminal pane.
#[derive(Debug, Clone, Default)]
pub struct TerminalBuffer {
    lines: Vec<String>,
}

impl TerminalBuffer {
    pub fn apply(&mut self, update: SurfaceUpdate) {
        match update {
            SurfaceUpdate::Clear => self.lines.clear(),
            SurfaceUpdate::Write(text) => self.write(&text),
        }
    }

    fn write(&mut self, text: &str) {
        let clean = strip_ansi(text);
        let mut pieces = clean.split('\n');

        if let Some(first) = pieces.next() {
            if self.lines.is_empty() {
                self.lines.push(String::new());
            }
            if let Some(last) = self.lines.last_mut() {
                last.push_str(first.trim_end_matches('\r'));
            }
        }
        for piece in pieces {
            self.lines.push(piece.trim_end_matches('\r').to_string());
        }

        if self.lines.len() > TERMINAL_SCROLLBACK {
            let excess = self.lines.len() - TERMINAL_SCROLLBACK;
            self.lines.drain(..excess);
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

/// Drop ANSI escape sequences (CSI, OSC and two-byte escapes).
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('[') => {
                for c in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&c) {
                        break;
                    }
                }
            }
            Some(']') => {
                while let Some(c) = chars.next() {
                    if c == '\x07' {
                        break;
                    }
                    if c == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    out
}

/// All dashboard-visible state.
pub struct AppState {
    // -- Trace list --
    pub log_entries: Vec<LogEntry>,

    // -- Run status, mirrored from the runner --
    pub run_status: RunStatus,
    pub run_id: Option<String>,
    pub guidance: Option<String>,
    pub run_error: Option<String>,
    pub tool_count: usize,
    pub failed_tool_count: usize,
    pub decision_count: usize,

    // -- Terminal pane --
    pub terminal: TerminalBuffer,
    /// When true, keystrokes go to the agent terminal.
    pub terminal_input: bool,

    // -- Navigation --
    /// 0 = Trace, 1 = Terminal.
    pub active_tab: usize,
    pub log_scroll_offset: usize,
    pub auto_scroll: bool,

    /// True after the first 'q' press; a second 'q' confirms quit.
    pub quit_pending: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            log_entries: Vec::new(),
            run_status: RunStatus::Idle,
            run_id: None,
            guidance: None,
            run_error: None,
            tool_count: 0,
            failed_tool_count: 0,
            decision_count: 0,
            terminal: TerminalBuffer::default(),
            terminal_input: false,
            active_tab: 0,
            log_scroll_offset: 0,
            auto_scroll: true,
            quit_pending: false,
        }
    }

    /// Apply a dashboard event. Sole mutation path for run-originated entries.
    pub fn apply_event(&mut self, event: DashboardEvent) {
        match event {
            DashboardEvent::Run(run_event) => self.apply_run_event(run_event),
            DashboardEvent::Terminal(update) => self.terminal.apply(update),
            DashboardEvent::Notice { message, is_error } => {
                let kind = if is_error {
                    LogEntryKind::Error
                } else {
                    LogEntryKind::System
                };
                self.push(kind, first_line_or_truncate(&message, 120), message, false);
            }
        }
    }

    fn apply_run_event(&mut self, event: RunEvent) {
        match event {
            RunEvent::AgentThinking { text } => {
                self.push(LogEntryKind::Thinking, first_line_or_truncate(&text, 120), text, false);
            }

            RunEvent::ToolStart { tool, args } => {
                let summary = format!("{tool}({})", args_summary(&args));
                self.push(LogEntryKind::ToolStart, summary, String::new(), false);
            }

            RunEvent::ToolEnd {
                tool,
                args,
                exit_code,
                success,
                duration,
            } => {
                self.tool_count += 1;
                if !success {
                    self.failed_tool_count += 1;
                }
                let exit = exit_code.map_or_else(|| "-".to_string(), |c| c.to_string());
                let summary = format!("{tool}: exit {exit} in {duration:.0} ms");
                let full = serde_json::to_string_pretty(&args).unwrap_or_default();
                self.push(LogEntryKind::ToolEnd { success }, summary, full, false);
            }

            RunEvent::AgentDecision {
                decision,
                raw_response,
            } => {
                self.decision_count += 1;
                let summary = decision_summary(&decision);
                let full = raw_response
                    .unwrap_or_else(|| serde_json::to_string_pretty(&decision).unwrap_or_default());
                self.push(LogEntryKind::Decision, summary, full, false);
            }

            RunEvent::AgentPause { guidance } => {
                let text = guidance.unwrap_or_else(|| "Agent paused".to_string());
                self.push(LogEntryKind::Pause, first_line_or_truncate(&text, 120), text, true);
            }

            RunEvent::AgentFinish { summary } => {
                let text = summary.unwrap_or_else(|| "Run finished".to_string());
                self.push(LogEntryKind::Finish, first_line_or_truncate(&text, 120), text, true);
            }

            RunEvent::AgentError { error } => {
                let text = error.unwrap_or_else(|| "Unknown agent error".to_string());
                self.push(LogEntryKind::Error, first_line_or_truncate(&text, 120), text, true);
            }

            RunEvent::Unknown => {}
        }
    }

    /// Copy status fields from a runner snapshot.
    pub fn sync_run(&mut self, run: &RunState) {
        self.run_status = run.status;
        self.run_id.clone_from(&run.run_id);
        self.guidance.clone_from(&run.guidance);
        self.run_error.clone_from(&run.error);
    }

    fn push(&mut self, kind: LogEntryKind, summary: String, full_content: String, expanded: bool) {
        self.log_entries.push(LogEntry {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            kind,
            summary,
            full_content,
            expanded,
        });
        self.auto_scroll_to_bottom();
    }

    /// Toggle the expanded state of an entry. No-op if out of bounds.
    pub fn toggle_expand(&mut self, index: usize) {
        if let Some(entry) = self.log_entries.get_mut(index) {
            entry.expanded = !entry.expanded;
        }
    }

    /// Scroll up one entry; disables auto-scroll.
    pub fn scroll_up(&mut self) {
        self.log_scroll_offset = self.log_scroll_offset.saturating_sub(1);
        self.auto_scroll = false;
    }

    pub fn scroll_down(&mut self) {
        self.log_scroll_offset = self
            .log_scroll_offset
            .saturating_add(1)
            .min(self.log_entries.len().saturating_sub(1));
    }

    /// Jump to the newest entry and re-enable auto-scroll.
    pub fn jump_to_bottom(&mut self) {
        self.log_scroll_offset = self.log_entries.len().saturating_sub(1);
        self.auto_scroll = true;
    }

    fn auto_scroll_to_bottom(&mut self) {
        if self.auto_scroll {
            self.log_scroll_offset = self.log_entries.len().saturating_sub(1);
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// `key=value` pairs of tool args on one line.
fn args_summary(args: &serde_json::Map<String, Value>) -> String {
    let joined = args
        .iter()
        .map(|(k, v)| match v {
            Value::String(s) => format!("{k}={s}"),
            other => format!("{k}={other}"),
        })
        .collect::<Vec<_>>()
        .join(", ");
    first_line_or_truncate(&joined, 80)
}

/// Short label for a decision: its `action` (plus `command`) when present.
fn decision_summary(decision: &Value) -> String {
    let action = decision.get("action").and_then(Value::as_str);
    let command = decision.get("command").and_then(Value::as_str);
    match (action, command) {
        (Some(a), Some(c)) => first_line_or_truncate(&format!("{a}: {c}"), 120),
        (Some(a), None) => a.to_string(),
        _ => first_line_or_truncate(&decision.to_string(), 120),
    }
}

/// First line of `text`, cut to `max_chars` characters with an ellipsis.
fn first_line_or_truncate(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("");
    if first_line.chars().count() > max_chars {
        let cut: String = first_line.chars().take(max_chars).collect();
        format!("{cut}...")
    } else {
        first_line.to_string()
    }
}
