//! Keyboard event handler for the dashboard.
//!
//! Maps key events to [`AppState`] mutations and [`ControlSignal`]s. Called by
//! the main loop in [`super::runner`] for each key from the crossterm
//! `EventStream`.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc::UnboundedSender;

use super::app_state::AppState;
use super::event::ControlSignal;
use crate::run::RunStatus;

const TAB_COUNT: usize = 2;
const TERMINAL_TAB: usize = 1;

/// Process a key event. Returns `true` if the dashboard should exit.
///
/// Only `KeyEventKind::Press` is handled so key-up events on Windows do not
/// trigger actions twice.
pub fn handle_key_event(
    key: KeyEvent,
    state: &mut AppState,
    control_tx: &UnboundedSender<ControlSignal>,
) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }

    if state.quit_pending {
        return match key.code {
            KeyCode::Char('q') | KeyCode::Char('y') => {
                let _ = control_tx.send(ControlSignal::Quit);
                true
            }
            _ => {
                state.quit_pending = false;
                false
            }
        };
    }

    if state.terminal_input {
        if key.code == KeyCode::Esc {
            state.terminal_input = false;
        } else if let Some(bytes) = key_to_terminal_bytes(key) {
            let _ = control_tx.send(ControlSignal::TerminalInput(bytes));
        }
        return false;
    }

    match key.code {
        // Ctrl+C quits at once, before the plain 'c' binding.
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let _ = control_tx.send(ControlSignal::Quit);
            return true;
        }
        KeyCode::Tab => {
            state.active_tab = (state.active_tab + 1) % TAB_COUNT;
        }
        KeyCode::BackTab => {
            state.active_tab = (state.active_tab + TAB_COUNT - 1) % TAB_COUNT;
        }
        KeyCode::Up => state.scroll_up(),
        KeyCode::Down => state.scroll_down(),
        KeyCode::Char('g') | KeyCode::End => state.jump_to_bottom(),
        KeyCode::Char('e') => state.toggle_expand(state.log_scroll_offset),
        KeyCode::Char('p') => match state.run_status {
            RunStatus::Running => {
                let _ = control_tx.send(ControlSignal::Pause);
            }
            RunStatus::Paused => {
                let _ = control_tx.send(ControlSignal::Resume);
            }
            _ => {}
        },
        KeyCode::Char('r') => {
            if state.run_status == RunStatus::Paused {
                let _ = control_tx.send(ControlSignal::Resume);
            }
        }
        KeyCode::Char('c') => {
            if !state.run_status.is_terminal() && state.run_status != RunStatus::Idle {
                let _ = control_tx.send(ControlSignal::Cancel);
            }
        }
        KeyCode::Char('i') => {
            state.active_tab = TERMINAL_TAB;
            state.terminal_input = true;
        }
        KeyCode::Char('q') => {
            state.quit_pending = true;
        }
        _ => {}
    }

    false
}

/// Bytes a terminal expects for `key`, if it has any.
fn key_to_terminal_bytes(key: KeyEvent) -> Option<String> {
    let text = match key.code {
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
            if !c.is_ascii_alphabetic() {
                return None;
            }
            // Ctrl+A is 0x01 through Ctrl+Z at 0x1A.
            char::from(c.to_ascii_lowercase() as u8 - b'a' + 1).to_string()
        }
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "\r".to_string(),
        KeyCode::Backspace => "\x7f".to_string(),
        KeyCode::Tab => "\t".to_string(),
        KeyCode::Up => "\x1b[A".to_string(),
        KeyCode::Down => "\x1b[B".to_string(),
        KeyCode::Right => "\x1b[C".to_string(),
        KeyCode::Left => "\x1b[D".to_string(),
        _ => return None,
    };
    Some(text)
}
