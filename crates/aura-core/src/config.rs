//! Configuration management for AURA.
//!
//! Loads configuration from ${AURA_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use toml_edit::{DocumentMut, Item, Table};

use crate::reveal::{ChunkPolicy, Pacing, RevealOptions};

/// Commented template embedded from `default_config.toml`.
///
/// To update, run `cargo xtask update-default-config`.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Recursively merges items from `source` into `target`, keeping comments.
fn merge_items(target: &mut Table, source: &Table) {
    for (key, value) in source.iter() {
        match value {
            Item::Value(v) => {
                target[key] = Item::Value(v.clone());
            }
            Item::Table(src_table) => {
                if let Some(Item::Table(target_table)) = target.get_mut(key) {
                    merge_items(target_table, src_table);
                } else {
                    target[key] = Item::Table(src_table.clone());
                }
            }
            Item::ArrayOfTables(src_arr) => {
                target[key] = Item::ArrayOfTables(src_arr.clone());
            }
            Item::None => {}
        }
    }
}

pub mod paths {
    //! Path resolution for AURA configuration and data directories.
    //!
    //! AURA_HOME resolution order:
    //! 1. AURA_HOME environment variable (if set)
    //! 2. ~/.config/aura (default)

    use std::env;
    use std::path::PathBuf;

    /// Returns the AURA home directory.
    pub fn aura_home() -> PathBuf {
        if let Ok(home) = env::var("AURA_HOME")
            && !home.trim().is_empty()
        {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".aura"),
            |h| h.join(".config").join("aura"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        aura_home().join("config.toml")
    }

    /// Returns the directory holding log files.
    pub fn logs_dir() -> PathBuf {
        aura_home().join("logs")
    }
}

/// Text chunking used by the reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chunking {
    #[default]
    Char,
    Burst,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    pub chunking: Chunking,
    pub burst_min: usize,
    pub burst_max: usize,
    pub base_delay_ms: u64,
    pub sentence_pause_ms: u64,
    pub clause_pause_ms: u64,
    pub whitespace_delay_ms: u64,
    pub cursor: bool,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            chunking: Chunking::Char,
            burst_min: 2,
            burst_max: 5,
            base_delay_ms: Pacing::DEFAULT_BASE_MS,
            sentence_pause_ms: Pacing::DEFAULT_SENTENCE_PAUSE_MS,
            clause_pause_ms: Pacing::DEFAULT_CLAUSE_PAUSE_MS,
            whitespace_delay_ms: Pacing::DEFAULT_WHITESPACE_MS,
            cursor: true,
        }
    }
}

impl RevealConfig {
    pub fn pacing(&self) -> Pacing {
        Pacing::from_millis(
            self.base_delay_ms,
            self.sentence_pause_ms,
            self.clause_pause_ms,
            self.whitespace_delay_ms,
        )
    }

    pub fn chunk_policy(&self) -> ChunkPolicy {
        match self.chunking {
            Chunking::Char => ChunkPolicy::PerGrapheme,
            Chunking::Burst => ChunkPolicy::Burst {
                min: self.burst_min,
                max: self.burst_max,
            },
        }
    }

    pub fn options(&self) -> RevealOptions {
        RevealOptions {
            chunking: self.chunk_policy(),
            pacing: self.pacing(),
            cursor: self.cursor,
        }
    }

    /// # Errors
    /// Returns an error if the pacing ordering or burst bounds are invalid.
    pub fn validate(&self) -> Result<()> {
        self.pacing().validate().context("Invalid [reveal] pacing")?;
        if self.chunking == Chunking::Burst {
            if self.burst_min == 0 {
                bail!("Invalid [reveal] burst_min: must be at least 1");
            }
            if self.burst_min > self.burst_max {
                bail!(
                    "Invalid [reveal] burst bounds: burst_min ({}) > burst_max ({})",
                    self.burst_min,
                    self.burst_max
                );
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub markdown: bool,
    pub math: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            markdown: true,
            math: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub file: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    pub request_timeout_secs: u32,
    pub reveal: RevealConfig,
    pub render: RenderConfig,
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: Self::DEFAULT_SERVER_URL.to_string(),
            request_timeout_secs: Self::DEFAULT_REQUEST_TIMEOUT_SECS,
            reveal: RevealConfig::default(),
            render: RenderConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    const DEFAULT_SERVER_URL: &'static str = "http://127.0.0.1:5000";
    const DEFAULT_REQUEST_TIMEOUT_SECS: u32 = 120;

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or is invalid.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if the file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config: Config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))?
        } else {
            Config::default()
        };
        config
            .validate()
            .with_context(|| format!("Invalid config at {}", path.display()))?;
        Ok(config)
    }

    /// # Errors
    /// Returns an error if any section holds inconsistent values.
    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            bail!("server_url must not be empty");
        }
        self.reveal.validate()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(u64::from(self.request_timeout_secs)))
        }
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Generates a fresh config TOML from Rust defaults.
    ///
    /// Uses the embedded template for structure/comments and merges
    /// generated values from `Config::default()` into it.
    ///
    /// # Errors
    /// Returns an error if the defaults or the template cannot be serialized
    /// or parsed.
    pub fn generate() -> Result<String> {
        let generated_toml = toml::to_string(&Config::default())
            .context("Failed to serialize default config to TOML")?;

        let mut doc: DocumentMut = default_config_template()
            .parse()
            .context("Failed to parse default config template")?;
        let generated_doc: DocumentMut = generated_toml
            .parse()
            .context("Failed to parse generated config")?;

        merge_items(doc.as_table_mut(), generated_doc.as_table());

        Ok(doc.to_string())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename).
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}
