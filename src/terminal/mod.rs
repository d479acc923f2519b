//! Terminal byte stream bridge.
//!
//! Connects a display surface to the backend's terminal socket: inbound frames
//! are classified and rendered, local keystrokes and resizes go back out.

pub mod bridge;
pub mod envelope;
pub mod sessions;
pub mod surface;

pub use bridge::{SessionEnd, SessionInput, TerminalEndpoint, TerminalHandle, attach};
pub use envelope::{Control, Inbound, classify, render};
pub use sessions::{SessionKey, TerminalSessions};
pub use surface::{ChannelSurface, RecordingSurface, StdoutSurface, SurfaceUpdate, TerminalSurface};
