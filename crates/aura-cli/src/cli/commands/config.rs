//! `aura config` handlers.
//!
//! These run before the config file is loaded, so they work even when
//! `$AURA_HOME/config.toml` no longer parses.

use anyhow::{Context, Result};
use aura_core::config::{Config, paths};

/// Prints where the config file is read from (honours `AURA_HOME`).
pub fn path() {
    println!("{}", paths::config_path().display());
}

/// Writes the commented default template to the config path. Refuses to
/// overwrite an existing file.
pub fn init() -> Result<()> {
    let target = paths::config_path();
    Config::init(&target).with_context(|| format!("init config at {}", target.display()))?;
    println!("Created config at {}", target.display());
    Ok(())
}

/// Prints the default template with every value taken from `Config::default()`.
///
/// Not meant for users: `cargo xtask update-default-config` writes this output
/// to `aura-core/default_config.toml`, and `cargo xtask check-default-config`
/// fails when the checked-in template has drifted from the Rust defaults.
pub fn generate() -> Result<()> {
    let rendered = Config::generate().context("render default config")?;
    print!("{rendered}");
    Ok(())
}
