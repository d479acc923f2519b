//! Agent run stream consumer.
//!
//! A run is started with a POST to the backend; the response body is a stream
//! of `data:` records that [`sse`] decodes into [`types::Frame`]s and
//! [`state::RunState`] accumulates. [`runner::AgentRunner`] ties both to an
//! injected [`transport::RunTransport`] and adds pause/resume/cancel.

pub mod journal;
pub mod runner;
pub mod sse;
pub mod state;
pub mod transport;
pub mod types;

pub use journal::RunJournal;
pub use runner::AgentRunner;
pub use sse::{ByteStream, LineDecoder, frames, parse_line};
pub use state::RunState;
pub use transport::{ControlReply, HttpTransport, PauseReply, RunResponse, RunTransport};
pub use types::{ChatMessage, Decision, Frame, RunEvent, RunId, RunStatus, ToolTrace};
