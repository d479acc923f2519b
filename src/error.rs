use std::path::PathBuf;

/// Errors related to configuration loading and parsing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid backend URL `{url}`: {message}")]
    InvalidUrl { url: String, message: String },
}

/// Network-level failures talking to the backend.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Stream read failed: {0}")]
    Stream(String),

    #[error("Malformed control response: {0}")]
    Decode(String),
}

/// Errors surfaced by the agent run tracker.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Run was cancelled")]
    Cancelled,

    #[error("Backend response did not carry a run id")]
    MissingRunId,

    #[error("No active run")]
    NoActiveRun,

    #[error("Backend rejected {action} for run {run_id}")]
    Rejected { action: &'static str, run_id: String },
}

/// Errors related to the terminal socket bridge.
#[derive(Debug, thiserror::Error)]
pub enum TerminalError {
    #[error("Failed to connect terminal socket at {url}: {message}")]
    ConnectFailed { url: String, message: String },

    #[error("Terminal socket error: {0}")]
    Socket(String),

    #[error("Terminal session `{0}` is not attached")]
    NotAttached(String),

    #[error("Terminal session closed")]
    Closed,
}

/// Errors related to file uploads.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No files provided")]
    NoFiles,

    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}
