//! File uploads for a chat.

use std::path::{Path, PathBuf};

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use crate::error::{TransportError, UploadError};
use crate::run::transport::ensure_success;

/// A file as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub path: String,
    /// Text content, when the backend could read the file as text.
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    files: Vec<UploadedFile>,
    #[serde(default)]
    upload_dir: Option<String>,
}

/// Fresh chat id in the backend's `chat-{uuid}` form.
pub fn new_chat_id() -> String {
    format!("chat-{}", uuid::Uuid::new_v4())
}

/// Upload `paths` to `{backend}/api/upload/{chat_id}` as multipart `files`.
pub async fn upload_files(
    client: &reqwest::Client,
    backend: &str,
    chat_id: &str,
    paths: &[PathBuf],
) -> Result<Vec<UploadedFile>, UploadError> {
    if paths.is_empty() {
        return Err(UploadError::NoFiles);
    }

    let mut form = Form::new();
    for path in paths {
        form = form.part("files", file_part(path).await?);
    }

    let url = format!("{}/api/upload/{chat_id}", backend.trim_end_matches('/'));
    tracing::info!(%url, files = paths.len(), "Uploading files");

    let response = client
        .post(&url)
        .multipart(form)
        .send()
        .await
        .map_err(|e| TransportError::Request {
            url: url.clone(),
            message: e.to_string(),
        })?;
    let response = ensure_success(response).await?;

    let body: UploadResponse = response
        .json()
        .await
        .map_err(|e| TransportError::Decode(format!("upload: {e}")))?;
    tracing::debug!(upload_dir = body.upload_dir.as_deref().unwrap_or(""), "Upload stored");

    Ok(body.files)
}

async fn file_part(path: &Path) -> Result<Part, UploadError> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|source| UploadError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(Part::bytes(data).file_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_id_shape() {
        let id = new_chat_id();
        assert!(id.starts_with("chat-"));
        assert!(uuid::Uuid::parse_str(&id["chat-".len()..]).is_ok());
        assert_ne!(id, new_chat_id());
    }

    #[tokio::test]
    async fn empty_list_sends_nothing() {
        let client = reqwest::Client::new();
        // Unroutable backend: any request would fail with a transport error.
        let err = upload_files(&client, "http://127.0.0.1:9", "chat-1", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::NoFiles));
    }

    #[tokio::test]
    async fn missing_file_is_read_error() {
        let client = reqwest::Client::new();
        let err = upload_files(
            &client,
            "http://127.0.0.1:9",
            "chat-1",
            &[PathBuf::from("/definitely/not/here.sql")],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, UploadError::ReadFailed { .. }));
    }
}
