//! Full-screen chat for AURA.

pub mod commands;
pub mod effects;
pub mod events;
pub mod render;
pub mod runtime;
pub mod state;
pub mod terminal;
pub mod transcript;
pub mod update;

use std::io::{IsTerminal, Write, stderr};
use std::path::PathBuf;

use anyhow::{Result, bail};
use aura_core::client::AuraClient;
use aura_core::config::{Config, paths};
use aura_core::reveal::Renderer;
pub use runtime::TuiRuntime;

const WELCOME: &str = "Upload a document with `/upload PATH` (or paste its path), \
                       then ask a question. `/help` lists commands.";

/// Runs the interactive chat until the user quits.
///
/// Must be called inside a tokio runtime context; requests and reveals are
/// spawned onto it.
///
/// # Errors
/// Returns an error if stderr is not a terminal or terminal I/O fails.
pub fn run_interactive_chat(
    config: &Config,
    client: AuraClient,
    initial_file: Option<PathBuf>,
) -> Result<()> {
    if !stderr().is_terminal() {
        bail!(
            "Chat mode requires a terminal.\n\
             Use `aura ask --prompt '...'` for non-interactive use."
        );
    }

    // Shown until the alternate screen takes over.
    let mut err = stderr();
    writeln!(err, "AURA Chat")?;
    writeln!(err, "Server: {}", client.base_url())?;
    err.flush()?;

    let mut runtime = TuiRuntime::new(client, Renderer::from_config(config))?;

    runtime.state.chat.notice(WELCOME);
    let config_path = paths::config_path();
    if config_path.exists() {
        runtime
            .state
            .chat
            .notice(&format!("Config file: `{}`", config_path.display()));
    }
    if let Some(path) = initial_file {
        runtime.upload_on_start(path);
    }

    runtime.run()?;
    drop(runtime);

    writeln!(stderr(), "Goodbye!")?;
    Ok(())
}
