//! Backend request handlers.
//!
//! Each handler is a plain async function returning the `UiEvent` that
//! carries its result; the runtime does the spawning.

use aura_core::client::AuraClient;
use aura_core::session::Request;
use tokio::sync::mpsc;
use tracing::info_span;
use tracing::Instrument;

use crate::events::UiEvent;

pub async fn run_request(
    client: AuraClient,
    request: Request,
    inbox: mpsc::UnboundedSender<UiEvent>,
) -> UiEvent {
    match request {
        Request::Upload { path } => {
            let span = info_span!("upload", path = %path.display());
            let progress = move |pct| {
                let _ = inbox.send(UiEvent::UploadProgress(pct));
            };
            UiEvent::UploadFinished(client.upload(&path, progress).instrument(span).await)
        }
        Request::Send {
            message,
            text,
            file_id,
        } => {
            let span = info_span!("chat", %message);
            let result = client
                .chat(&text, file_id.as_deref())
                .instrument(span)
                .await;
            UiEvent::SendFinished { message, result }
        }
        Request::Reset => UiEvent::ResetFinished(client.reset().await),
        Request::ForgetHistory => UiEvent::ForgetFinished(client.clear_history().await),
    }
}
