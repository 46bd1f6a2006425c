//! UI events consumed by the reducer.

use aura_core::client::{ClientResult, Uploaded};
use aura_core::reveal::RevealOutcome;
use aura_core::transcript::MessageId;
use crossterm::event::Event;
use tokio_util::sync::CancellationToken;

/// Everything that can change `AppState`.
///
/// Terminal input and ticks come from the runtime loop; the rest arrive
/// through the inbox from spawned tasks.
#[derive(Debug)]
pub enum UiEvent {
    /// Render cadence tick.
    Tick,

    /// Current terminal size, sent before the other events of a frame.
    Frame { width: u16, height: u16 },

    /// Raw terminal input.
    Terminal(Event),

    /// Upload body progress, already capped below 100.
    UploadProgress(u8),

    UploadFinished(ClientResult<Uploaded>),

    SendFinished {
        message: MessageId,
        result: ClientResult<String>,
    },

    ResetFinished(ClientResult<String>),

    ForgetFinished(ClientResult<String>),

    /// A reveal task started; `skip` flushes it.
    RevealStarted {
        message: MessageId,
        skip: CancellationToken,
    },

    RevealFinished {
        message: MessageId,
        outcome: RevealOutcome,
    },
}
