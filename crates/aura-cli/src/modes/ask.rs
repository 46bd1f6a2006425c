//! Line-mode ask: one question, the answer revealed on stdout.
//!
//! Output contract: the answer goes to stdout, upload progress and errors go
//! to stderr. The first Ctrl+C during the reveal skips to the end.

use std::io::{self, IsTerminal, Write, stderr, stdout};
use std::path::PathBuf;
use std::pin::pin;

use anyhow::{Result, bail};
use aura_core::client::AuraClient;
use aura_core::config::Config;
use aura_core::fragment::Tag;
use aura_core::interrupt;
use aura_core::reveal::{AppliedChunk, RevealEvent, RevealOutcome, Renderer};
use aura_core::session::ChatSession;
use crossterm::style::{Color, ContentStyle, Stylize};
use tokio::sync::mpsc;
use tracing::debug;

const RULE_WIDTH: usize = 40;

#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    /// Document to upload before asking.
    pub file: Option<PathBuf>,
    /// Previously uploaded document to ask about.
    pub file_id: Option<String>,
    /// Skip markdown and print the answer as it arrived.
    pub plain: bool,
}

/// Asks `prompt` and reveals the answer on stdout.
///
/// # Errors
/// Returns an error if the upload or the chat request fails, or on an
/// interrupt before the answer arrives.
pub async fn run_ask(
    prompt: &str,
    config: &Config,
    client: AuraClient,
    options: AskOptions,
) -> Result<RevealOutcome> {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut renderer = Renderer::from_config(config).with_events(events_tx);
    if options.plain {
        renderer = renderer.without_markdown();
    }
    let mut session = ChatSession::new(client, renderer);

    if let Some(file_id) = options.file_id.as_deref() {
        session.state_mut().set_file_id(file_id);
    }
    if let Some(path) = options.file {
        upload(&mut session, path).await?;
    }

    let handle = tokio::select! {
        handle = session.ask(prompt) => handle,
        () = interrupt::wait_for_interrupt() => bail!("Interrupted"),
    };
    let Some(handle) = handle else {
        bail!("{}", last_message(&session));
    };

    let styled = !options.plain && stdout().is_terminal();
    let mut printer = AskRenderer::new(stdout(), styled);
    let skip = handle.skip_token();
    let mut finished = pin!(handle.finished());
    let mut skipped = false;
    let outcome = loop {
        tokio::select! {
            biased;
            Some(event) = events_rx.recv() => printer.handle_event(&event)?,
            () = interrupt::wait_for_interrupt(), if !skipped => {
                debug!("interrupt, skipping reveal");
                skip.cancel();
                skipped = true;
            }
            outcome = &mut finished => break outcome,
        }
    };
    while let Ok(event) = events_rx.try_recv() {
        printer.handle_event(&event)?;
    }
    printer.finish()?;
    Ok(outcome)
}

async fn upload(session: &mut ChatSession, path: PathBuf) -> Result<()> {
    let progress = |pct: u8| {
        let mut err = stderr();
        let _ = write!(err, "\rUploading... {pct}%");
        let _ = err.flush();
    };
    let uploaded = session.upload(path, progress).await;
    let mut err = stderr();
    writeln!(err)?;
    if !uploaded {
        bail!("{}", last_message(session));
    }
    if let Some(file_id) = session.state().file_id() {
        writeln!(err, "Uploaded file {file_id}")?;
    }
    Ok(())
}

fn last_message(session: &ChatSession) -> String {
    let state = session.state();
    state.transcript().last().map_or_else(
        || state.status().to_string(),
        |message| message.target().text_content(),
    )
}

/// Writes reveal events as styled terminal text.
///
/// Block layout is rebuilt from the tags each chunk opens, so output stays
/// append-only and the answer appears at the pace of the reveal.
pub struct AskRenderer<W: Write> {
    out: W,
    styled: bool,
    wrote_any: bool,
    /// Newlines at the end of the output so far.
    trailing_newlines: usize,
    /// A block just started and nothing was written into it yet.
    block_open: bool,
    /// Next ordinal per list depth; `None` for bullet lists.
    lists: Vec<Option<u64>>,
    cells_in_row: usize,
}

impl<W: Write> AskRenderer<W> {
    pub fn new(out: W, styled: bool) -> Self {
        Self {
            out,
            styled,
            wrote_any: false,
            trailing_newlines: 0,
            block_open: false,
            lists: Vec::new(),
            cells_in_row: 0,
        }
    }

    pub fn handle_event(&mut self, event: &RevealEvent) -> io::Result<()> {
        match event {
            RevealEvent::Chunk { applied, .. } => self.apply(applied),
            RevealEvent::Replaced { text, .. } => {
                // Fallback after a failed reveal, or plain mode: show it all.
                if self.wrote_any {
                    self.newlines(2)?;
                }
                self.write(text, ContentStyle::new())
            }
            // Math is typeset after the last chunk, when its source text has
            // already been printed; stdout is append-only, so TeX stays as sent.
            RevealEvent::Typeset { .. } => Ok(()),
            RevealEvent::Started { .. } | RevealEvent::Finished { .. } => Ok(()),
        }
    }

    /// Ends the output on a newline and flushes.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.wrote_any {
            self.newlines(1)?;
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn apply(&mut self, chunk: &AppliedChunk) -> io::Result<()> {
        if let Some(tag) = &chunk.opened {
            self.open(tag, &chunk.ancestors)?;
        }
        if let Some(text) = &chunk.text {
            let style = text_style(&chunk.ancestors);
            self.write(text, style)?;
        }
        self.out.flush()
    }

    fn open(&mut self, tag: &Tag, ancestors: &[Tag]) -> io::Result<()> {
        let list_depth = ancestors
            .iter()
            .filter(|t| matches!(t, Tag::List { .. }))
            .count();
        match tag {
            Tag::Paragraph | Tag::Heading(_) | Tag::CodeBlock { .. } | Tag::BlockQuote
            | Tag::Table | Tag::Rule | Tag::Math { display: true } => {
                self.start_block(list_depth)?;
                self.block_prefix(tag, ancestors)?;
            }
            Tag::List { start } => {
                if list_depth == 0 {
                    self.start_block(0)?;
                }
                self.lists.truncate(list_depth);
                self.lists.push(*start);
            }
            Tag::Item => {
                if self.wrote_any {
                    self.newlines(1)?;
                }
                let indent = "  ".repeat(list_depth.saturating_sub(1));
                let bullet = match self.lists.get_mut(list_depth.saturating_sub(1)) {
                    Some(Some(next)) => {
                        let n = *next;
                        *next += 1;
                        format!("{indent}{n}. ")
                    }
                    _ => format!("{indent}- "),
                };
                self.write(&bullet, ContentStyle::new().dark_grey())?;
                self.block_open = true;
            }
            Tag::TableRow => {
                if !self.block_open {
                    self.newlines(1)?;
                }
                self.cells_in_row = 0;
            }
            Tag::TableCell { .. } => {
                if self.cells_in_row > 0 {
                    self.write(" │ ", ContentStyle::new().dark_grey())?;
                }
                self.cells_in_row += 1;
            }
            Tag::LineBreak => self.write("\n", ContentStyle::new())?,
            Tag::TaskMarker { checked } => {
                let marker = if *checked { "[x] " } else { "[ ] " };
                self.write(marker, ContentStyle::new().dark_grey())?;
            }
            Tag::Image { alt, .. } => {
                self.write(&format!("[image: {alt}]"), ContentStyle::new().dark_grey())?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Separates a new block from what came before.
    fn start_block(&mut self, list_depth: usize) -> io::Result<()> {
        if self.block_open || !self.wrote_any {
            return Ok(());
        }
        if list_depth == 0 {
            self.newlines(2)?;
        } else {
            self.newlines(1)?;
            self.write(&"  ".repeat(list_depth), ContentStyle::new())?;
        }
        self.block_open = true;
        Ok(())
    }

    fn block_prefix(&mut self, tag: &Tag, ancestors: &[Tag]) -> io::Result<()> {
        if matches!(tag, Tag::Paragraph) && ancestors.contains(&Tag::BlockQuote) {
            self.write("│ ", ContentStyle::new().dark_grey())?;
        }
        match tag {
            Tag::Heading(level) => {
                let marks = "#".repeat(usize::from(*level));
                self.write(&format!("{marks} "), ContentStyle::new().magenta().bold())?;
            }
            Tag::Rule => self.write(&"─".repeat(RULE_WIDTH), ContentStyle::new().dark_grey())?,
            _ => {}
        }
        self.block_open = true;
        Ok(())
    }

    /// Ends the output with at least `n` newlines.
    fn newlines(&mut self, n: usize) -> io::Result<()> {
        for _ in self.trailing_newlines..n {
            writeln!(self.out)?;
        }
        self.trailing_newlines = self.trailing_newlines.max(n);
        Ok(())
    }

    fn write(&mut self, text: &str, style: ContentStyle) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        if self.styled {
            write!(self.out, "{}", style.apply(text))?;
        } else {
            write!(self.out, "{text}")?;
        }
        self.wrote_any = true;
        self.block_open = false;
        let newlines = text.chars().rev().take_while(|c| *c == '\n').count();
        self.trailing_newlines = if newlines == text.chars().count() {
            self.trailing_newlines + newlines
        } else {
            newlines
        };
        Ok(())
    }
}

fn text_style(ancestors: &[Tag]) -> ContentStyle {
    let mut style = ContentStyle::new();
    for tag in ancestors {
        style = match tag {
            Tag::Strong | Tag::TableCell { header: true } => style.bold(),
            Tag::Emphasis => style.italic(),
            Tag::Strikethrough => style.crossed_out(),
            Tag::Code => style.with(Color::Yellow),
            Tag::CodeBlock { .. } => style.with(Color::Green),
            Tag::Heading(_) => style.with(Color::Magenta).bold(),
            Tag::Link { .. } => style.with(Color::Cyan).underlined(),
            Tag::Math { .. } => style.with(Color::Blue),
            Tag::BlockQuote => style.dim(),
            _ => style,
        };
    }
    style
}

#[cfg(test)]
mod tests {
    use aura_core::reveal::{RenderTarget, TargetId};

    use super::*;

    /// Reveals `md` into a detached target and prints the events unstyled.
    async fn print(md: &str) -> String {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let target = RenderTarget::detached();
        Renderer::default()
            .with_events(tx)
            .reveal(&target, md)
            .finished()
            .await;
        let mut printer = AskRenderer::new(Vec::new(), false);
        while let Ok(event) = rx.try_recv() {
            printer.handle_event(&event).unwrap();
        }
        printer.finish().unwrap();
        String::from_utf8(printer.into_inner()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_paragraphs_are_separated_by_a_blank_line() {
        assert_eq!(print("one\n\ntwo").await, "one\n\ntwo\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_heading_and_lists() {
        let out = print("# Title\n\n- a\n- b\n\n1. x\n2. y").await;
        assert_eq!(out, "# Title\n\n- a\n- b\n\n1. x\n2. y\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_code_block_keeps_its_newlines() {
        let out = print("```\nlet x = 1;\n```\n\nafter").await;
        assert_eq!(out, "let x = 1;\n\nafter\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_table_cells_are_separated() {
        let out = print("| a | b |\n|---|---|\n| 1 | 2 |").await;
        assert_eq!(out, "a │ b\n1 │ 2\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_math_keeps_its_delimited_source() {
        let out = print("Area is $\\pi r^2$.").await;
        assert_eq!(out, "Area is $\\pi r^2$.\n");
    }

    #[test]
    fn test_replaced_text_is_printed_whole() {
        let mut printer = AskRenderer::new(Vec::new(), false);
        printer
            .handle_event(&RevealEvent::Replaced {
                target: TargetId(0),
                text: "plain *answer*".to_string(),
            })
            .unwrap();
        printer.finish().unwrap();
        assert_eq!(printer.into_inner(), b"plain *answer*\n");
    }

    #[test]
    fn test_styled_output_carries_escape_codes() {
        let mut printer = AskRenderer::new(Vec::new(), true);
        printer
            .write("bold", text_style(&[Tag::Paragraph, Tag::Strong]))
            .unwrap();
        let out = String::from_utf8(printer.into_inner()).unwrap();
        assert!(out.contains("\u{1b}["));
        assert!(out.contains("bold"));
    }
}
