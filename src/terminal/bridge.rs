//! One terminal socket session.
//!
//! [`attach`] spawns a task that owns the socket and a [`TerminalSurface`].
//! The returned [`TerminalHandle`] feeds it keystrokes and resizes. There is
//! no reconnection: once the socket drops the session is over.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::envelope::{Control, classify, error_line, render, status_line};
use super::surface::TerminalSurface;
use crate::config::AppConfig;
use crate::error::TerminalError;

/// Where a session connects, and the session cookie to present.
///
/// The backend keys its terminal by the session cookie, so the socket must
/// carry the same cookie as the run requests to reach the agent's terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalEndpoint {
    pub url: String,
    pub cookie: Option<String>,
}

impl TerminalEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            cookie: None,
        }
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookie = Some(format!("{name}={value}"));
        self
    }

    /// Handshake request with the cookie header set.
    fn request(&self) -> Result<Request, TerminalError> {
        let connect_failed = |message: String| TerminalError::ConnectFailed {
            url: self.url.clone(),
            message,
        };

        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| connect_failed(e.to_string()))?;
        if let Some(cookie) = &self.cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| connect_failed(format!("invalid session cookie: {e}")))?;
            request.headers_mut().insert(COOKIE, value);
        }
        Ok(request)
    }
}

impl From<&AppConfig> for TerminalEndpoint {
    fn from(config: &AppConfig) -> Self {
        let endpoint = Self::new(&config.terminal_url);
        match &config.session_id {
            Some(session_id) => endpoint.with_cookie(&config.session_cookie, session_id),
            None => endpoint,
        }
    }
}

impl From<&str> for TerminalEndpoint {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<&String> for TerminalEndpoint {
    fn from(url: &String) -> Self {
        Self::new(url.as_str())
    }
}

/// Local input queued for the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    /// Keystroke bytes, sent as a raw text frame.
    Data(String),
    Resize { cols: u16, rows: u16 },
}

/// How a session task ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The backend closed the socket.
    Closed,
    /// Torn down locally.
    Detached,
    Failed(TerminalError),
}

/// Control side of a running session.
#[derive(Debug)]
pub struct TerminalHandle {
    input: mpsc::UnboundedSender<SessionInput>,
    cancel: CancellationToken,
    task: JoinHandle<SessionEnd>,
}

impl TerminalHandle {
    /// Queue keystrokes. Fails once the session has ended.
    pub fn send_input(&self, data: impl Into<String>) -> Result<(), TerminalError> {
        self.input
            .send(SessionInput::Data(data.into()))
            .map_err(|_| TerminalError::Closed)
    }

    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), TerminalError> {
        self.input
            .send(SessionInput::Resize { cols, rows })
            .map_err(|_| TerminalError::Closed)
    }

    /// Close the socket and stop the task. Idempotent.
    pub fn detach(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session task to end.
    pub async fn join(self) -> SessionEnd {
        self.task
            .await
            .unwrap_or_else(|e| SessionEnd::Failed(TerminalError::Socket(e.to_string())))
    }
}

/// Connect to `endpoint` and bridge it to `surface` on a new task.
pub fn attach<S: TerminalSurface>(endpoint: impl Into<TerminalEndpoint>, surface: S) -> TerminalHandle {
    spawn_session(endpoint.into(), surface, || {})
}

/// [`attach`], running `on_exit` after the task ends for any reason.
pub(crate) fn spawn_session<S, F>(endpoint: TerminalEndpoint, surface: S, on_exit: F) -> TerminalHandle
where
    S: TerminalSurface,
    F: FnOnce() + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();

    let task = tokio::spawn(async move {
        let end = run_session(&endpoint, surface, rx, task_cancel).await;
        tracing::debug!(url = %endpoint.url, ?end, "Terminal session ended");
        on_exit();
        end
    });

    TerminalHandle {
        input: tx,
        cancel,
        task,
    }
}

async fn run_session<S: TerminalSurface>(
    endpoint: &TerminalEndpoint,
    mut surface: S,
    mut input: mpsc::UnboundedReceiver<SessionInput>,
    cancel: CancellationToken,
) -> SessionEnd {
    let url = endpoint.url.as_str();
    let request = match endpoint.request() {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(%url, error = %e, "Terminal request invalid");
            surface.write(&error_line(&format!("connection error: {e}")));
            return SessionEnd::Failed(e);
        }
    };

    let connected = tokio::select! {
        biased;
        _ = cancel.cancelled() => return SessionEnd::Detached,
        connected = connect_async(request) => connected,
    };

    let socket = match connected {
        Ok((socket, _)) => socket,
        Err(e) => {
            tracing::warn!(%url, error = %e, "Terminal connect failed");
            surface.write(&error_line(&format!("connection error: {e}")));
            return SessionEnd::Failed(TerminalError::ConnectFailed {
                url: url.to_string(),
                message: e.to_string(),
            });
        }
    };

    tracing::info!(%url, "Terminal attached");
    surface.clear();
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                let _ = sink.close().await;
                return SessionEnd::Detached;
            }

            queued = input.recv() => {
                let Some(queued) = queued else {
                    // Every handle is gone; nobody can type or detach.
                    let _ = sink.close().await;
                    return SessionEnd::Detached;
                };
                let text = match queued {
                    SessionInput::Data(data) => data,
                    SessionInput::Resize { cols, rows } => Control::Resize { cols, rows }.to_text(),
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    surface.write(&error_line(&format!("connection error: {e}")));
                    return SessionEnd::Failed(TerminalError::Socket(e.to_string()));
                }
            }

            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    surface.write(&render(&classify(text.as_str())));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    surface.write(&render(&classify(&String::from_utf8_lossy(&bytes))));
                }
                Some(Ok(Message::Close(_))) | None => {
                    surface.write(&status_line("connection closed"));
                    return SessionEnd::Closed;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(%url, error = %e, "Terminal socket error");
                    surface.write(&error_line(&format!("connection error: {e}")));
                    return SessionEnd::Failed(TerminalError::Socket(e.to_string()));
                }
            },
        }
    }
}
