//! Runtime execution modes.
//!
//! - `ask`: one question, answer revealed on stdout
//! - `tui`: full-screen interactive chat (optional feature)

pub mod ask;

#[cfg(feature = "tui")]
pub use aura_tui::run_interactive_chat;

#[cfg(not(feature = "tui"))]
pub use disabled::run_interactive_chat;

#[cfg(not(feature = "tui"))]
mod disabled {
    use std::path::PathBuf;

    use anyhow::{Result, bail};
    use aura_core::client::AuraClient;
    use aura_core::config::Config;

    pub fn run_interactive_chat(
        _config: &Config,
        _client: AuraClient,
        _initial_file: Option<PathBuf>,
    ) -> Result<()> {
        bail!("TUI support is disabled in this build (feature \"tui\").");
    }
}
