//! Knowledge-base command handlers: upload, reset, forget.

use std::io::{Write, stderr};
use std::path::Path;

use anyhow::{Context, Result, bail};
use aura_core::client::AuraClient;

/// Uploads `path` and prints the server's file id on stdout.
pub async fn upload(client: &AuraClient, path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!("No such file: {}", path.display());
    }
    let progress = |pct: u8| {
        let mut err = stderr();
        let _ = write!(err, "\rUploading... {pct}%");
        let _ = err.flush();
    };
    let result = client.upload(path, progress).await;
    eprintln!();
    let uploaded = result.with_context(|| format!("upload {}", path.display()))?;
    if let Some(message) = uploaded.message.as_deref().filter(|m| !m.trim().is_empty()) {
        eprintln!("{message}");
    }
    println!("{}", uploaded.file_id);
    Ok(())
}

pub async fn reset(client: &AuraClient) -> Result<()> {
    let message = client.reset().await.context("reset knowledge base")?;
    println!("{message}");
    Ok(())
}

pub async fn forget(client: &AuraClient) -> Result<()> {
    let message = client
        .clear_history()
        .await
        .context("clear conversation history")?;
    println!("{message}");
    Ok(())
}
