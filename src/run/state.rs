//! Run state accumulator.
//!
//! [`RunState`] is the single source of truth for one run. Stream frames are
//! applied via [`RunState::apply_frame`]; control operations in the runner use
//! the transition helpers below. Trace and decision lists are append-only.

use chrono::Utc;
use serde::Serialize;

use super::types::{Decision, Frame, RunEvent, RunId, RunStatus, ToolTrace};

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunState {
    pub run_id: Option<RunId>,
    pub status: RunStatus,
    pub traces: Vec<ToolTrace>,
    pub decisions: Vec<Decision>,
    /// Set while paused; shown to the user.
    pub guidance: Option<String>,
    pub error: Option<String>,
    /// Summary carried by `agent-finish`.
    pub summary: Option<String>,
}

impl RunState {
    /// A fresh running run with no id yet.
    pub fn running() -> Self {
        Self {
            status: RunStatus::Running,
            ..Self::default()
        }
    }

    /// Apply one stream frame. `[DONE]` finishes a run that is still running.
    pub fn apply_frame(&mut self, frame: &Frame) {
        match frame {
            Frame::Event(event) => self.apply_event(event),
            Frame::Done => {
                if self.status == RunStatus::Running {
                    self.status = RunStatus::Finished;
                }
            }
        }
    }

    /// Apply one typed event.
    pub fn apply_event(&mut self, event: &RunEvent) {
        match event {
            RunEvent::ToolEnd {
                tool,
                args,
                exit_code,
                success,
                duration,
            } => {
                self.traces.push(ToolTrace {
                    tool: tool.clone(),
                    args: args.clone(),
                    exit_code: *exit_code,
                    success: *success,
                    duration_ms: *duration,
                    observed_at: Utc::now(),
                });
            }

            RunEvent::AgentDecision {
                decision,
                raw_response,
            } => {
                self.decisions.push(Decision {
                    decision: decision.clone(),
                    raw_response: raw_response.clone(),
                    observed_at: Utc::now(),
                });
            }

            RunEvent::AgentPause { guidance } => {
                if self.pause(guidance.clone()) {
                    tracing::info!(guidance = guidance.as_deref().unwrap_or(""), "Run paused by agent");
                }
            }

            RunEvent::AgentFinish { summary } => {
                if self.transition(RunStatus::Finished) {
                    self.summary = summary.clone();
                }
            }

            RunEvent::AgentError { error } => {
                if self.transition(RunStatus::Failed) {
                    self.error = Some(error.clone().unwrap_or_else(|| "Unknown agent error".to_string()));
                }
            }

            // Informational only: no state change.
            RunEvent::ToolStart { .. } | RunEvent::AgentThinking { .. } | RunEvent::Unknown => {}
        }
    }

    /// Move to `next` unless the run already reached a terminal status.
    /// Returns whether the status changed.
    pub fn transition(&mut self, next: RunStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = next;
        true
    }

    /// Running -> paused, storing guidance. No-op from any other status.
    pub fn pause(&mut self, guidance: Option<String>) -> bool {
        if self.status != RunStatus::Running {
            return false;
        }
        self.status = RunStatus::Paused;
        self.guidance = guidance;
        true
    }

    /// Paused -> running, clearing guidance. No-op from any other status.
    pub fn resume(&mut self) -> bool {
        if self.status != RunStatus::Paused {
            return false;
        }
        self.status = RunStatus::Running;
        self.guidance = None;
        true
    }

    /// Mark the run failed with a message, unless already terminal.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if !self.transition(RunStatus::Failed) {
            return false;
        }
        self.error = Some(message.into());
        true
    }
}
