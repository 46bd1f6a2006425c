//! HTTP client for the AURA backend.

use std::error::Error;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use std::{io, result};

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::fs;
use tracing::{debug, info};
use url::Url;

use crate::config::Config;

/// Standard User-Agent header for AURA requests.
pub const USER_AGENT: &str = concat!("aura/", env!("CARGO_PKG_VERSION"));

/// Upload progress never reports more than this until the server answers.
pub const UPLOAD_PROGRESS_CAP: u8 = 90;

pub const DEFAULT_RESET_MESSAGE: &str = "KB reset";
pub const DEFAULT_CLEAR_HISTORY_MESSAGE: &str = "Chat history cleared.";
/// Shown when the server answers with an empty message.
pub const EMPTY_CHAT_REPLY: &str = "No response";

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    /// Connection refused, DNS failure, broken body stream
    Transport,
    /// Request or connect timeout
    Timeout,
    /// Non-2xx response
    HttpStatus,
    /// Response body was not the expected JSON
    Parse,
    /// JSON was valid but lacked a required field
    MissingField,
    /// The file to upload could not be read
    LocalFile,
}

impl fmt::Display for ClientErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientErrorKind::Transport => write!(f, "transport"),
            ClientErrorKind::Timeout => write!(f, "timeout"),
            ClientErrorKind::HttpStatus => write!(f, "http_status"),
            ClientErrorKind::Parse => write!(f, "parse"),
            ClientErrorKind::MissingField => write!(f, "missing_field"),
            ClientErrorKind::LocalFile => write!(f, "local_file"),
        }
    }
}

/// Structured backend error with kind and details.
#[derive(Debug, Clone)]
pub struct ClientError {
    pub kind: ClientErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Raw response body or underlying error text
    pub details: Option<String>,
}

impl ClientError {
    pub fn new(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Builds an HTTP status error, preferring a server-supplied message.
    pub fn http_status(status: u16, body: &str) -> Self {
        let server_message = serde_json::from_str::<Value>(body).ok().and_then(|json| {
            ["message", "error", "detail"]
                .iter()
                .find_map(|key| json.get(key).and_then(Value::as_str).map(str::to_string))
        });
        let message = match server_message {
            Some(msg) => format!("HTTP {status}: {msg}"),
            None => format!("HTTP {status}"),
        };
        let error = Self::new(ClientErrorKind::HttpStatus, message);
        if body.is_empty() {
            error
        } else {
            error.with_details(body)
        }
    }

    pub fn parse(body: &str, err: &serde_json::Error) -> Self {
        Self::new(
            ClientErrorKind::Parse,
            format!("Server returned non-JSON: {err}"),
        )
        .with_details(body)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ClientErrorKind::MissingField,
            format!("Response is missing `{field}`"),
        )
    }

    fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::new(ClientErrorKind::Timeout, format!("Request timed out: {e}"))
        } else if e.is_connect() {
            Self::new(ClientErrorKind::Transport, format!("Connection failed: {e}"))
        } else {
            Self::new(ClientErrorKind::Transport, format!("Network error: {e}"))
        }
    }

    /// Message text followed by the raw details, if any.
    pub fn display_with_details(&self) -> String {
        match &self.details {
            Some(details) => format!("{}\n\n{details}", self.message),
            None => self.message.clone(),
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ClientError {}

pub type ClientResult<T> = result::Result<T, ClientError>;

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploaded {
    pub file_id: String,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file_id: Option<Value>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<String>,
    response: Option<String>,
    reply: Option<String>,
    answer: Option<String>,
}

impl ChatResponse {
    /// First non-empty answer field, `message` first. Fields that are all
    /// empty give [`EMPTY_CHAT_REPLY`]; no field at all gives `None`.
    fn into_reply(self) -> Option<String> {
        let fields = [self.message, self.response, self.reply, self.answer];
        let mut present = fields.into_iter().flatten().peekable();
        present.peek()?;
        Some(
            present
                .find(|reply| !reply.trim().is_empty())
                .unwrap_or_else(|| EMPTY_CHAT_REPLY.to_string()),
        )
    }
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    message: Option<String>,
}

/// Percentage reported after `sent` of `total` bytes.
pub fn upload_percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return UPLOAD_PROGRESS_CAP;
    }
    let pct = (sent as f64 / total as f64 * f64::from(UPLOAD_PROGRESS_CAP)).round();
    (pct as u8).min(UPLOAD_PROGRESS_CAP)
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: Url,
    pub timeout: Option<Duration>,
}

impl ClientSettings {
    /// # Errors
    /// Returns an error if `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut url = Url::parse(base_url.trim())
            .with_context(|| format!("Invalid server URL: {base_url}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("Server URL must use http or https: {base_url}");
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self {
            base_url: url,
            timeout,
        })
    }

    /// Settings from config, with an optional server override.
    ///
    /// # Errors
    /// Returns an error if the resolved server URL is invalid.
    pub fn from_config(config: &Config, server: Option<&str>) -> Result<Self> {
        let base = server.unwrap_or(&config.server_url);
        Self::new(base, config.request_timeout())
    }
}

#[derive(Debug, Clone)]
pub struct AuraClient {
    http: reqwest::Client,
    base_url: Url,
}

impl AuraClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: ClientSettings) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: settings.base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        self.base_url.join(path).map_err(|e| {
            ClientError::new(
                ClientErrorKind::Transport,
                format!("Invalid endpoint {path}: {e}"),
            )
        })
    }

    /// Uploads a document as multipart field `file`.
    ///
    /// `progress` receives percentages up to [`UPLOAD_PROGRESS_CAP`] while the
    /// body is sent.
    ///
    /// # Errors
    /// Returns a [`ClientError`] if the file cannot be read, the request
    /// fails, or the response lacks `file_id`.
    pub async fn upload<F>(&self, path: &Path, progress: F) -> ClientResult<Uploaded>
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        let data = fs::read(path).await.map_err(|e| {
            ClientError::new(
                ClientErrorKind::LocalFile,
                format!("Cannot read {}: {e}", path.display()),
            )
        })?;
        let file_name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
        let mime = infer::get(&data).map_or("application/octet-stream", |kind| kind.mime_type());
        let total = data.len() as u64;
        info!(file = %file_name, bytes = total, mime, "uploading document");

        let data = Bytes::from(data);
        let pieces: Vec<Bytes> = (0..data.len())
            .step_by(UPLOAD_CHUNK_SIZE)
            .map(|start| data.slice(start..(start + UPLOAD_CHUNK_SIZE).min(data.len())))
            .collect();
        let mut sent = 0u64;
        let body = stream::iter(pieces).map(move |piece| {
            sent += piece.len() as u64;
            progress(upload_percent(sent, total));
            Ok::<_, io::Error>(piece)
        });

        let part = Part::stream_with_length(Body::wrap_stream(body), total)
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|e| ClientError::from_reqwest(&e))?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(self.endpoint("upload")?)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&e))?;
        let parsed: UploadResponse = read_json(response).await?;
        let file_id = match parsed.file_id {
            Some(Value::String(id)) if !id.is_empty() => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(ClientError::missing_field("file_id")),
        };
        debug!(%file_id, "upload indexed");
        Ok(Uploaded {
            file_id,
            message: parsed.message,
        })
    }

    /// Asks a question, optionally scoped to an uploaded file.
    ///
    /// # Errors
    /// Returns a [`ClientError`] if the request fails or the response has no
    /// message.
    pub async fn chat(&self, user_input: &str, file_id: Option<&str>) -> ClientResult<String> {
        let response = self
            .http
            .post(self.endpoint("")?)
            .json(&json!({ "user_input": user_input, "file_id": file_id }))
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&e))?;
        let parsed: ChatResponse = read_json(response).await?;
        parsed
            .into_reply()
            .ok_or_else(|| ClientError::missing_field("message"))
    }

    /// Clears the backend knowledge base.
    ///
    /// # Errors
    /// Returns a [`ClientError`] if the request fails.
    pub async fn reset(&self) -> ClientResult<String> {
        self.post_for_message("reset", DEFAULT_RESET_MESSAGE).await
    }

    /// Clears the backend's conversation memory.
    ///
    /// # Errors
    /// Returns a [`ClientError`] if the request fails.
    pub async fn clear_history(&self) -> ClientResult<String> {
        self.post_for_message("clear_history", DEFAULT_CLEAR_HISTORY_MESSAGE)
            .await
    }

    async fn post_for_message(&self, path: &str, default: &str) -> ClientResult<String> {
        let response = self
            .http
            .post(self.endpoint(path)?)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&e))?;
        let parsed: MessageResponse = read_json(response).await?;
        Ok(parsed
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default.to_string()))
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ClientError::from_reqwest(&e))?;
    if !status.is_success() {
        return Err(ClientError::http_status(status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|e| ClientError::parse(&body, &e))
}
