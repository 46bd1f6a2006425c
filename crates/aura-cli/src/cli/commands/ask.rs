//! Ask command handler.

use std::path::PathBuf;

use anyhow::{Context, Result};
use aura_core::client::AuraClient;
use aura_core::config::Config;
use tracing::info;

use crate::modes::ask::{self, AskOptions};

pub struct AskRunOptions<'a> {
    pub config: &'a Config,
    pub client: AuraClient,
    pub prompt: &'a str,
    pub file_id: Option<&'a str>,
    pub file: Option<PathBuf>,
    pub plain: bool,
}

pub async fn run(options: AskRunOptions<'_>) -> Result<()> {
    let ask_opts = AskOptions {
        file: options.file,
        file_id: options.file_id.map(str::to_string),
        plain: options.plain,
    };

    let outcome = ask::run_ask(options.prompt, options.config, options.client, ask_opts)
        .await
        .context("ask")?;
    info!(?outcome, "ask finished");
    Ok(())
}
