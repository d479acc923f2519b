//! Messages flowing into and out of the dashboard loop.

use crate::run::RunEvent;
use crate::terminal::SurfaceUpdate;

/// Something the dashboard should show.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    /// An event dispatched by the run stream.
    Run(RunEvent),
    /// Output for the agent terminal pane.
    Terminal(SurfaceUpdate),
    /// Outcome of a control action or of the run itself.
    Notice { message: String, is_error: bool },
}

impl DashboardEvent {
    pub fn notice(message: impl Into<String>) -> Self {
        Self::Notice {
            message: message.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Notice {
            message: message.into(),
            is_error: true,
        }
    }
}

/// Requests from the keyboard handler to the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlSignal {
    Pause,
    Resume,
    Cancel,
    /// Keystrokes for the agent terminal.
    TerminalInput(String),
    Quit,
}
