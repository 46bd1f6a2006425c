//! Chat widget state machine.
//!
//! `ChatState` holds everything the widget shows (transcript, status line,
//! upload progress, knowledge-base badge) and changes only through the
//! transition methods below. Transitions never perform I/O: `begin_*` methods
//! return a [`Request`] for the caller to run, and the matching `finish_*`
//! method takes its result. [`ChatSession`] is the async driver that runs
//! requests against an [`AuraClient`].

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::client::{
    AuraClient, ClientError, ClientErrorKind, ClientResult, UPLOAD_PROGRESS_CAP, Uploaded,
};
use crate::reveal::{RenderTarget, Renderer, RevealHandle};
use crate::transcript::{MessageId, RenderMode, Transcript};

pub const STATUS_READY: &str = "Ready";
pub const STATUS_FILE_SELECTED: &str = "File selected";
pub const STATUS_CHOOSE_FILE: &str = "Choose a file first";
pub const STATUS_UPLOADING: &str = "Uploading...";
pub const STATUS_UPLOAD_DONE: &str = "Upload done";
pub const STATUS_UPLOAD_FAILED: &str = "Upload failed";
pub const STATUS_UPLOAD_ERROR: &str = "Upload error";
pub const STATUS_TYPE_SOMETHING: &str = "Type something";
pub const STATUS_BUSY: &str = "Busy";
pub const STATUS_THINKING: &str = "Thinking...";
pub const STATUS_ERROR: &str = "Error";
pub const STATUS_RESETTING: &str = "Resetting...";
pub const STATUS_FORGETTING: &str = "Clearing history...";

pub const NOTICE_UPLOADED: &str = "Uploaded & indexed. Now ask your question.";
pub const NOTICE_CHAT_CLEARED: &str = "Chat cleared. Upload again or ask a new question.";
pub const PENDING_PLACEHOLDER: &str = "Processing…";

/// Progress shown as soon as an upload starts.
pub const UPLOAD_START_PROGRESS: u8 = 8;

/// Knowledge-base badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KbState {
    #[default]
    Empty,
    Loaded,
}

impl fmt::Display for KbState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KbState::Empty => write!(f, "KB: empty"),
            KbState::Loaded => write!(f, "KB: loaded"),
        }
    }
}

/// Backend work requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Upload {
        path: PathBuf,
    },
    Send {
        message: MessageId,
        text: String,
        file_id: Option<String>,
    },
    Reset,
    ForgetHistory,
}

/// A response ready to be revealed into its message's target.
#[derive(Debug, Clone)]
pub struct RevealRequest {
    pub message: MessageId,
    pub target: RenderTarget,
    pub text: String,
}

pub struct ChatState {
    renderer: Renderer,
    transcript: Transcript,
    selected_file: Option<PathBuf>,
    file_id: Option<String>,
    status: String,
    progress: u8,
    kb: KbState,
    sending: Option<MessageId>,
    uploading: bool,
    resetting: bool,
}

impl ChatState {
    pub fn new(renderer: Renderer) -> Self {
        Self {
            renderer,
            transcript: Transcript::new(),
            selected_file: None,
            file_id: None,
            status: STATUS_READY.to_string(),
            progress: 0,
            kb: KbState::Empty,
            sending: None,
            uploading: false,
            resetting: false,
        }
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn kb(&self) -> KbState {
        self.kb
    }

    pub fn file_id(&self) -> Option<&str> {
        self.file_id.as_deref()
    }

    pub fn selected_file(&self) -> Option<&Path> {
        self.selected_file.as_deref()
    }

    pub fn is_sending(&self) -> bool {
        self.sending.is_some()
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading
    }

    pub fn is_resetting(&self) -> bool {
        self.resetting
    }

    /// Uses an id from an earlier upload without uploading again.
    pub fn set_file_id(&mut self, file_id: &str) {
        self.file_id = Some(file_id.to_string());
        self.kb = KbState::Loaded;
    }

    pub fn set_status(&mut self, status: &str) {
        debug!(status, "status");
        self.status = status.to_string();
    }

    /// Appends an assistant-side markdown notice.
    pub fn notice(&mut self, text: &str) -> MessageId {
        self.transcript
            .push_assistant(text, RenderMode::Markdown, &self.renderer)
    }

    fn error_notice(&mut self, text: &str) -> MessageId {
        let id = self
            .transcript
            .push_assistant(text, RenderMode::Plain, &self.renderer);
        self.transcript.mark_error(id, text);
        id
    }

    pub fn select_file(&mut self, path: PathBuf) {
        info!(path = %path.display(), "file selected");
        self.selected_file = Some(path);
        self.progress = 0;
        self.set_status(STATUS_FILE_SELECTED);
    }

    pub fn begin_upload(&mut self) -> Option<Request> {
        let Some(path) = self.selected_file.clone() else {
            self.set_status(STATUS_CHOOSE_FILE);
            return None;
        };
        if self.uploading {
            self.set_status(STATUS_BUSY);
            return None;
        }
        self.uploading = true;
        self.progress = UPLOAD_START_PROGRESS;
        self.set_status(STATUS_UPLOADING);
        Some(Request::Upload { path })
    }

    pub fn upload_progress(&mut self, pct: u8) {
        if self.uploading {
            self.progress = pct.min(UPLOAD_PROGRESS_CAP);
        }
    }

    pub fn finish_upload(&mut self, result: ClientResult<Uploaded>) {
        self.uploading = false;
        match result {
            Ok(uploaded) => {
                info!(file_id = %uploaded.file_id, "upload done");
                self.file_id = Some(uploaded.file_id);
                self.kb = KbState::Loaded;
                self.progress = 100;
                self.set_status(STATUS_UPLOAD_DONE);
                let id = self.notice(NOTICE_UPLOADED);
                if let Some(message) = uploaded.message.filter(|m| !m.trim().is_empty()) {
                    self.transcript.annotate(id, &message);
                }
            }
            Err(err) => {
                warn!(kind = %err.kind, error = %err, "upload failed");
                self.progress = 0;
                if err.kind == ClientErrorKind::HttpStatus {
                    self.set_status(STATUS_UPLOAD_FAILED);
                    let body = err.details.as_deref().unwrap_or(&err.message);
                    self.error_notice(&format!("Upload failed: {body}"));
                } else {
                    self.set_status(STATUS_UPLOAD_ERROR);
                    self.error_notice(&format!("Upload error: {err}"));
                }
            }
        }
    }

    pub fn begin_send(&mut self, input: &str) -> Option<Request> {
        let text = input.trim();
        if text.is_empty() {
            self.set_status(STATUS_TYPE_SOMETHING);
            return None;
        }
        if self.sending.is_some() || self.transcript.is_revealing() {
            self.set_status(STATUS_BUSY);
            return None;
        }
        self.transcript.push_user(text);
        let message = self.transcript.push_pending(PENDING_PLACEHOLDER);
        self.sending = Some(message);
        self.set_status(STATUS_THINKING);
        Some(Request::Send {
            message,
            text: text.to_string(),
            file_id: self.file_id.clone(),
        })
    }

    pub fn finish_send(
        &mut self,
        message: MessageId,
        result: ClientResult<String>,
    ) -> Option<RevealRequest> {
        if self.sending == Some(message) {
            self.sending = None;
        }
        match result {
            Ok(text) => {
                self.set_status(STATUS_READY);
                let target = self.transcript.resolve(message, &text)?;
                Some(RevealRequest {
                    message,
                    target,
                    text,
                })
            }
            Err(err) => {
                warn!(kind = %err.kind, error = %err, "chat request failed");
                self.transcript
                    .mark_error(message, &format!("Error: {}", describe(&err)));
                self.set_status(STATUS_ERROR);
                None
            }
        }
    }

    /// Shows a response whose reveal was dropped, without animation, so the
    /// message does not stay on its placeholder.
    pub fn finish_dropped_reveal(&mut self, message: MessageId) -> bool {
        let Some(entry) = self.transcript.get(message) else {
            return false;
        };
        let shown = entry
            .target()
            .replace(self.renderer.render_now(entry.content()));
        if shown {
            debug!(%message, "reveal dropped, shown at once");
        }
        shown
    }

    pub fn begin_reset(&mut self) -> Option<Request> {
        if self.resetting {
            self.set_status(STATUS_BUSY);
            return None;
        }
        self.resetting = true;
        self.set_status(STATUS_RESETTING);
        Some(Request::Reset)
    }

    pub fn finish_reset(&mut self, result: ClientResult<String>) {
        self.resetting = false;
        match result {
            Ok(message) => {
                self.notice(&message);
                self.file_id = None;
                self.kb = KbState::Empty;
                self.progress = 0;
                self.set_status(STATUS_READY);
            }
            Err(err) => {
                warn!(kind = %err.kind, error = %err, "reset failed");
                let text = if err.kind == ClientErrorKind::Parse {
                    err.display_with_details()
                } else {
                    format!("Reset failed: {err}")
                };
                self.error_notice(&text);
                self.set_status(STATUS_ERROR);
            }
        }
    }

    /// Clears the local transcript only.
    pub fn clear_chat(&mut self) {
        self.transcript.clear();
        self.sending = None;
        self.notice(NOTICE_CHAT_CLEARED);
        self.set_status(STATUS_READY);
    }

    pub fn begin_forget(&mut self) -> Request {
        self.set_status(STATUS_FORGETTING);
        Request::ForgetHistory
    }

    pub fn finish_forget(&mut self, result: ClientResult<String>) {
        match result {
            Ok(message) => {
                self.notice(&message);
                self.set_status(STATUS_READY);
            }
            Err(err) => {
                warn!(kind = %err.kind, error = %err, "clear history failed");
                self.error_notice(&format!("Clear history failed: {err}"));
                self.set_status(STATUS_ERROR);
            }
        }
    }
}

fn describe(err: &ClientError) -> String {
    match err.kind {
        ClientErrorKind::Parse => err.display_with_details(),
        _ => err.to_string(),
    }
}

/// Outcome of running one [`Request`].
pub enum Performed {
    /// State was updated; nothing to reveal.
    Done,
    /// A response is being revealed.
    Revealing(RevealHandle),
}

/// Runs chat requests against the backend and applies their results.
pub struct ChatSession {
    client: AuraClient,
    state: ChatState,
}

impl ChatSession {
    pub fn new(client: AuraClient, renderer: Renderer) -> Self {
        Self {
            client,
            state: ChatState::new(renderer),
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ChatState {
        &mut self.state
    }

    pub fn client(&self) -> &AuraClient {
        &self.client
    }

    /// Runs `request` to completion. Upload progress goes to `progress`.
    ///
    /// A returned reveal is already running; await its handle to wait for it.
    pub async fn perform<F>(&mut self, request: Request, progress: F) -> Performed
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        match request {
            Request::Upload { path } => {
                let result = self.client.upload(&path, progress).await;
                self.state.finish_upload(result);
                Performed::Done
            }
            Request::Send {
                message,
                text,
                file_id,
            } => {
                let result = self.client.chat(&text, file_id.as_deref()).await;
                match self.state.finish_send(message, result) {
                    Some(reveal) => Performed::Revealing(
                        self.state.renderer().reveal(&reveal.target, &reveal.text),
                    ),
                    None => Performed::Done,
                }
            }
            Request::Reset => {
                let result = self.client.reset().await;
                self.state.finish_reset(result);
                Performed::Done
            }
            Request::ForgetHistory => {
                let result = self.client.clear_history().await;
                self.state.finish_forget(result);
                Performed::Done
            }
        }
    }

    /// Selects and uploads `path`.
    pub async fn upload<F>(&mut self, path: PathBuf, progress: F) -> bool
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        self.state.select_file(path);
        let Some(request) = self.state.begin_upload() else {
            return false;
        };
        self.perform(request, progress).await;
        self.state.file_id().is_some()
    }

    /// Sends `text` and starts revealing the answer.
    pub async fn ask(&mut self, text: &str) -> Option<RevealHandle> {
        let request = self.state.begin_send(text)?;
        match self.perform(request, |_| {}).await {
            Performed::Revealing(handle) => Some(handle),
            Performed::Done => None,
        }
    }
}
