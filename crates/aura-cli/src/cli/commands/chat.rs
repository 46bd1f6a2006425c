//! Chat command handler.

use std::io::{IsTerminal, Read, stdin};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use aura_core::client::AuraClient;
use aura_core::config::Config;
use tokio::runtime::Runtime;

use super::ask;
use crate::modes;

pub fn run(rt: &Runtime, config: &Config, client: AuraClient, file: Option<PathBuf>) -> Result<()> {
    // If stdin is piped, ask once in line mode instead
    if !stdin().is_terminal() {
        let mut prompt = String::new();
        stdin().lock().read_to_string(&mut prompt)?;
        let prompt = prompt.trim();
        if prompt.is_empty() {
            bail!("No input provided via pipe");
        }
        return rt.block_on(ask::run(ask::AskRunOptions {
            config,
            client,
            prompt,
            file_id: None,
            file,
            plain: false,
        }));
    }

    let _enter = rt.enter();
    modes::run_interactive_chat(config, client, file).context("interactive chat failed")
}
