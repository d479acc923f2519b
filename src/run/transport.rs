//! Network seam for agent runs.
//!
//! [`RunTransport`] is what the runner talks to; [`HttpTransport`] is the
//! reqwest implementation used against the real backend. Tests substitute
//! in-memory transports.

use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::sse::ByteStream;
use super::types::ChatMessage;
use crate::config::AppConfig;
use crate::error::TransportError;

/// Response header carrying the backend-issued run id.
pub const RUN_ID_HEADER: &str = "x-run-id";

/// An opened run stream.
pub struct RunResponse {
    pub run_id: Option<String>,
    pub body: ByteStream,
}

/// Envelope returned by the pause endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PauseReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub guidance: Option<String>,
}

/// Envelope returned by the resume and cancel endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlReply {
    #[serde(default)]
    pub success: bool,
}

/// Requests the runner issues against the backend.
///
/// None of these retry. Dropping a returned future abandons the request,
/// which is how the runner applies cooperative cancellation.
pub trait RunTransport: Send + Sync {
    /// Open a run stream for the given conversation.
    fn start(
        &self,
        messages: &[ChatMessage],
    ) -> impl Future<Output = Result<RunResponse, TransportError>> + Send;

    fn pause(&self, run_id: &str) -> impl Future<Output = Result<PauseReply, TransportError>> + Send;

    fn resume(&self, run_id: &str)
    -> impl Future<Output = Result<ControlReply, TransportError>> + Send;

    fn cancel(&self, run_id: &str)
    -> impl Future<Output = Result<ControlReply, TransportError>> + Send;
}

/// Build the shared reqwest client.
///
/// Only the connect phase is bounded; streamed bodies may stall indefinitely
/// and are ended by cancellation instead. The session cookie, when configured,
/// is attached to every request.
pub fn build_http_client(config: &AppConfig) -> Result<reqwest::Client, TransportError> {
    let mut headers = HeaderMap::new();
    if let Some(session_id) = &config.session_id {
        let cookie = format!("{}={}", config.session_cookie, session_id);
        let value = HeaderValue::from_str(&cookie).map_err(|e| TransportError::Request {
            url: config.backend_url.clone(),
            message: format!("invalid session cookie: {e}"),
        })?;
        headers.insert(COOKIE, value);
    }

    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .default_headers(headers)
        .build()
        .map_err(|e| TransportError::Request {
            url: config.backend_url.clone(),
            message: format!("failed to build client: {e}"),
        })
}

/// reqwest-backed transport for the agent endpoints.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct StartRequest<'a> {
    messages: &'a [ChatMessage],
}

impl HttpTransport {
    pub fn new(config: &AppConfig) -> Result<Self, TransportError> {
        Ok(Self::with_client(build_http_client(config)?, &config.backend_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn run_url(&self) -> String {
        format!("{}/api/agent/run", self.base_url)
    }

    fn control_url(&self, run_id: &str, action: &str) -> String {
        format!("{}/api/agent/{run_id}/{action}", self.base_url)
    }

    /// POST to a control endpoint and decode its JSON envelope.
    async fn control<T: DeserializeOwned>(
        &self,
        run_id: &str,
        action: &str,
    ) -> Result<T, TransportError> {
        let url = self.control_url(run_id, action);
        tracing::debug!(%url, "Sending run control request");

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| TransportError::Request {
                url: url.clone(),
                message: e.to_string(),
            })?;
        let response = ensure_success(response).await?;

        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::Decode(format!("{action}: {e}")))
    }
}

/// Turn a non-2xx response into [`TransportError::Status`] with its body text.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}

impl RunTransport for HttpTransport {
    async fn start(&self, messages: &[ChatMessage]) -> Result<RunResponse, TransportError> {
        let url = self.run_url();
        tracing::info!(%url, messages = messages.len(), "Starting agent run");

        let response = self
            .client
            .post(&url)
            .json(&StartRequest { messages })
            .send()
            .await
            .map_err(|e| TransportError::Request {
                url: url.clone(),
                message: e.to_string(),
            })?;
        let response = ensure_success(response).await?;

        let run_id = response
            .headers()
            .get(RUN_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Stream(e.to_string())));

        Ok(RunResponse {
            run_id,
            body: Box::pin(body),
        })
    }

    async fn pause(&self, run_id: &str) -> Result<PauseReply, TransportError> {
        self.control(run_id, "pause").await
    }

    async fn resume(&self, run_id: &str) -> Result<ControlReply, TransportError> {
        self.control(run_id, "resume").await
    }

    async fn cancel(&self, run_id: &str) -> Result<ControlReply, TransportError> {
        self.control(run_id, "cancel").await
    }
}
