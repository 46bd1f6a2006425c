//! Slash commands and dropped-file detection.

use std::path::PathBuf;

use url::Url;

/// Definition of a command.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Primary name without the leading slash.
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub usage: &'static str,
    pub description: &'static str,
}

/// Available commands.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "file",
        aliases: &["select"],
        usage: "/file PATH",
        description: "Select a document to upload",
    },
    CommandSpec {
        name: "upload",
        aliases: &[],
        usage: "/upload [PATH]",
        description: "Upload the selected document (or PATH)",
    },
    CommandSpec {
        name: "reset",
        aliases: &[],
        usage: "/reset",
        description: "Reset the server knowledge base",
    },
    CommandSpec {
        name: "clear",
        aliases: &["new"],
        usage: "/clear",
        description: "Clear the chat on screen",
    },
    CommandSpec {
        name: "forget",
        aliases: &[],
        usage: "/forget",
        description: "Clear the server chat history",
    },
    CommandSpec {
        name: "help",
        aliases: &["?"],
        usage: "/help",
        description: "List commands",
    },
    CommandSpec {
        name: "quit",
        aliases: &["exit", "q"],
        usage: "/quit",
        description: "Exit",
    },
];

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    File(PathBuf),
    Upload(Option<PathBuf>),
    Reset,
    Clear,
    Forget,
    Help,
    Quit,
}

/// Why a slash command was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Unknown(String),
    MissingArgument(&'static str),
}

impl CommandError {
    /// Status-line text for the error.
    pub fn status(&self) -> String {
        match self {
            CommandError::Unknown(name) => format!("Unknown command: /{name}"),
            CommandError::MissingArgument(usage) => format!("Usage: {usage}"),
        }
    }
}

fn lookup(name: &str) -> Option<&'static CommandSpec> {
    let name = name.to_lowercase();
    COMMANDS
        .iter()
        .find(|c| c.name == name || c.aliases.contains(&name.as_str()))
}

/// Parses `input` as a slash command.
///
/// Returns `None` when the input is not a command, so it can be sent as a
/// chat message.
pub fn parse(input: &str) -> Option<Result<Command, CommandError>> {
    let rest = input.trim().strip_prefix('/')?;
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    if name.is_empty() {
        return None;
    }

    let Some(spec) = lookup(name) else {
        return Some(Err(CommandError::Unknown(name.to_string())));
    };
    let path = clean_path(arg);
    let command = match spec.name {
        "file" => match path {
            Some(path) => Command::File(path),
            None => return Some(Err(CommandError::MissingArgument(spec.usage))),
        },
        "upload" => Command::Upload(path),
        "reset" => Command::Reset,
        "clear" => Command::Clear,
        "forget" => Command::Forget,
        "help" => Command::Help,
        _ => Command::Quit,
    };
    Some(Ok(command))
}

/// Markdown help listing, shown as a notice.
pub fn help_text() -> String {
    let mut out = String::from("Commands:\n\n");
    for command in COMMANDS {
        out.push_str(&format!("- `{}`: {}\n", command.usage, command.description));
    }
    out.push_str("\nPaste or drop a file path to select it. Esc skips the answer animation.");
    out
}

/// Strips shell quoting and `file://` URLs from a path argument.
fn clean_path(raw: &str) -> Option<PathBuf> {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| {
            trimmed
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
        })
        .unwrap_or(trimmed);
    if unquoted.is_empty() {
        return None;
    }

    if unquoted.starts_with("file://") {
        return Url::parse(unquoted)
            .ok()
            .and_then(|url| url.to_file_path().ok());
    }

    // Terminals escape spaces in dropped paths.
    Some(PathBuf::from(unquoted.replace("\\ ", " ")))
}

/// Treats a single-line paste naming an existing file as a file drop.
pub fn dropped_file(pasted: &str) -> Option<PathBuf> {
    let line = pasted.trim();
    if line.is_empty() || line.contains('\n') {
        return None;
    }
    clean_path(line).filter(|path| path.is_file())
}
