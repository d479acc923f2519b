//! Type definitions for agent runs.
//!
//! These types form the shared vocabulary between the stream parser
//! ([`super::sse`]), the run state ([`super::state`]), the runner, the run
//! journal, and the dashboard. Wire types use the backend's camelCase keys.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Opaque run identifier issued by the backend.
pub type RunId = String;

/// Lifecycle status of the current run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// No run has been started, or the last one was cleared.
    #[default]
    Idle,
    /// The event stream is open and the agent is working.
    Running,
    /// The agent is waiting for user guidance.
    Paused,
    Finished,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Finished, failed and cancelled runs never change status again.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Finished | RunStatus::Failed | RunStatus::Cancelled)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunStatus::Idle => "Idle",
            RunStatus::Running => "Running",
            RunStatus::Paused => "Paused",
            RunStatus::Finished => "Finished",
            RunStatus::Failed => "Failed",
            RunStatus::Cancelled => "Cancelled",
        };
        f.write_str(label)
    }
}

/// One role/content pair of the conversation sent with a run request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Record of one completed tool invocation. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolTrace {
    pub tool: String,
    pub args: Map<String, Value>,
    pub exit_code: Option<i64>,
    pub success: bool,
    /// Duration reported by the backend, in milliseconds.
    pub duration_ms: f64,
    /// When the client saw the `tool-end` record.
    pub observed_at: DateTime<Utc>,
}

/// Record of one agent decision. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Decision {
    pub decision: Value,
    pub raw_response: Option<String>,
    pub observed_at: DateTime<Utc>,
}

/// A typed event record carried on a `data:` line, dispatched on `type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    /// A tool started. Informational only.
    #[serde(rename = "tool-start")]
    ToolStart {
        #[serde(default, alias = "command", deserialize_with = "null_as_default")]
        tool: String,
        #[serde(default, deserialize_with = "null_as_default")]
        args: Map<String, Value>,
    },

    #[serde(rename = "tool-end")]
    ToolEnd {
        #[serde(default, alias = "command", deserialize_with = "null_as_default")]
        tool: String,
        #[serde(default, deserialize_with = "null_as_default")]
        args: Map<String, Value>,
        #[serde(default, rename = "exitCode")]
        exit_code: Option<i64>,
        #[serde(default, deserialize_with = "null_as_default")]
        success: bool,
        #[serde(default, deserialize_with = "null_as_default")]
        duration: f64,
    },

    #[serde(rename = "agent-decision")]
    AgentDecision {
        #[serde(default)]
        decision: Value,
        #[serde(default, rename = "rawResponse")]
        raw_response: Option<String>,
    },

    #[serde(rename = "agent-pause")]
    AgentPause {
        #[serde(default)]
        guidance: Option<String>,
    },

    #[serde(rename = "agent-finish")]
    AgentFinish {
        #[serde(default)]
        summary: Option<String>,
    },

    #[serde(rename = "agent-error")]
    AgentError {
        #[serde(default, alias = "message")]
        error: Option<String>,
    },

    /// Progress text while the agent decides its next step.
    #[serde(rename = "agent-thinking")]
    AgentThinking {
        #[serde(default, deserialize_with = "null_as_default")]
        text: String,
    },

    /// Any record whose `type` this client does not know.
    #[serde(other, rename = "unknown")]
    Unknown,
}

impl RunEvent {
    /// The wire discriminator of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            RunEvent::ToolStart { .. } => "tool-start",
            RunEvent::ToolEnd { .. } => "tool-end",
            RunEvent::AgentDecision { .. } => "agent-decision",
            RunEvent::AgentPause { .. } => "agent-pause",
            RunEvent::AgentFinish { .. } => "agent-finish",
            RunEvent::AgentError { .. } => "agent-error",
            RunEvent::AgentThinking { .. } => "agent-thinking",
            RunEvent::Unknown => "unknown",
        }
    }
}

/// Treat an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One parsed unit of the run stream.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Event(RunEvent),
    /// The `[DONE]` sentinel.
    Done,
}
