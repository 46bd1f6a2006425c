//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use aura_core::client::{AuraClient, ClientSettings};
use aura_core::config::{self, Config};
use aura_core::{interrupt, logging};
use clap::Parser;
use tokio::runtime::Runtime;

mod commands;

#[derive(Parser)]
#[command(name = "aura")]
#[command(version)]
#[command(about = "Chat with your documents from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Backend base URL (overrides `server_url` from config)
    #[arg(long, global = true, env = "AURA_SERVER", value_name = "URL")]
    server: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Full-screen chat (default)
    Chat {
        /// Upload this document on start
        #[arg(short, long, value_name = "PATH")]
        file: Option<PathBuf>,
    },

    /// Asks one question and prints the revealed answer
    Ask {
        /// The question to send
        #[arg(short, long)]
        prompt: String,

        /// Ask about an already uploaded document
        #[arg(long, value_name = "ID", conflicts_with = "file")]
        file_id: Option<String>,

        /// Upload this document before asking
        #[arg(short, long, value_name = "PATH")]
        file: Option<PathBuf>,

        /// Print the answer as plain text, without markdown or animation
        #[arg(long)]
        plain: bool,
    },

    /// Uploads a document and prints its file id
    Upload {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Resets the knowledge base on the server
    Reset,

    /// Clears the server-side conversation history
    Forget,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Generate a fresh config from Rust defaults (for xtask)
    Generate,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Config commands must work with a broken config file.
    if let Some(Commands::Config { command }) = &cli.command {
        return match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::Generate => commands::config::generate(),
        };
    }

    interrupt::init()?;

    let config = Config::load().context("load config")?;
    let _log_guard = logging::init(&config.log, &config::paths::logs_dir())?;

    let settings = ClientSettings::from_config(&config, cli.server.as_deref())?;
    let client = AuraClient::new(settings).context("create backend client")?;

    // one tokio runtime for everything
    let rt = Runtime::new().context("create tokio runtime")?;

    let Cli { command, server: _ } = cli;
    match command.unwrap_or(Commands::Chat { file: None }) {
        Commands::Chat { file } => commands::chat::run(&rt, &config, client, file),
        Commands::Ask {
            prompt,
            file_id,
            file,
            plain,
        } => rt.block_on(commands::ask::run(commands::ask::AskRunOptions {
            config: &config,
            client,
            prompt: &prompt,
            file_id: file_id.as_deref(),
            file,
            plain,
        })),
        Commands::Upload { path } => rt.block_on(commands::kb::upload(&client, &path)),
        Commands::Reset => rt.block_on(commands::kb::reset(&client)),
        Commands::Forget => rt.block_on(commands::kb::forget(&client)),
        Commands::Config { .. } => Ok(()),
    }
}
