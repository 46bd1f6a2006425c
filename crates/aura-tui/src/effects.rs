//! UI effect types.
//!
//! Effects are commands returned by the reducer that the runtime executes.
//! They cover I/O and task spawning only, so the reducer never touches the
//! network or the clock.

use aura_core::session::{Request, RevealRequest};
use tokio_util::sync::CancellationToken;

/// Effects returned by the reducer for the runtime to execute.
#[derive(Debug)]
pub enum UiEffect {
    /// Quit the application.
    Quit,

    /// Run a backend request; its result comes back as a `*Finished` event.
    Backend(Request),

    /// Start revealing a response into its message target.
    Reveal(RevealRequest),

    /// Flush the running reveal.
    SkipReveal(CancellationToken),
}
