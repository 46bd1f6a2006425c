//! Incremental reveal renderer.
//!
//! A response is parsed once into a [`Fragment`], flattened into path-addressed
//! chunks and replayed into a [`RenderTarget`] by a spawned task that sleeps
//! between chunks. Only one reveal may hold a target's gate at a time; a
//! request made while the gate is held is dropped.

pub mod chunk;
pub mod pacing;
pub mod target;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

pub use self::chunk::{ApplyError, Chunk, ChunkPolicy, apply_chunk, flatten, flatten_with};
pub use self::pacing::{Pacing, PauseClass};
pub use self::target::{
    AppliedChunk, RenderTarget, RevealGate, RevealState, RevealToken, ScrollSignal, TargetId,
    TargetSnapshot,
};
use crate::config::Config;
use crate::fragment::Fragment;
use crate::markdown::{CommonMark, MarkdownRenderer};
use crate::math::{DelimiterTypesetter, MathTypesetter};

/// How a reveal ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    /// Every chunk was revealed with pacing.
    Completed,
    /// Content was shown as plain text without animation.
    PlainText,
    /// Skipped: the remaining chunks were applied at once.
    Flushed,
    /// Another reveal held the gate; nothing was changed.
    Dropped,
    /// The reveal task panicked.
    Aborted,
}

/// Progress notifications for observers such as the line-mode printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealEvent {
    Started { target: TargetId, chunks: usize },
    Chunk { target: TargetId, applied: AppliedChunk },
    Replaced { target: TargetId, text: String },
    Typeset { target: TargetId, spans: usize },
    Finished { target: TargetId, outcome: RevealOutcome },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealOptions {
    pub chunking: ChunkPolicy,
    pub pacing: Pacing,
    /// Show the cursor marker while revealing.
    pub cursor: bool,
}

impl Default for RevealOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkPolicy::PerGrapheme,
            pacing: Pacing::default(),
            cursor: true,
        }
    }
}

/// Reveals markdown responses into render targets.
#[derive(Clone)]
pub struct Renderer {
    markdown: Option<Arc<dyn MarkdownRenderer>>,
    typesetter: Option<Arc<dyn MathTypesetter>>,
    options: RevealOptions,
    events: Option<mpsc::UnboundedSender<RevealEvent>>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(RevealOptions::default())
    }
}

impl Renderer {
    /// Renderer with CommonMark markdown and `$`-delimited math.
    pub fn new(options: RevealOptions) -> Self {
        Self {
            markdown: Some(Arc::new(CommonMark)),
            typesetter: Some(Arc::new(DelimiterTypesetter::default())),
            options,
            events: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut renderer = Self::new(config.reveal.options());
        if !config.render.markdown {
            renderer = renderer.without_markdown();
        }
        if !config.render.math {
            renderer = renderer.without_math();
        }
        renderer
    }

    pub fn with_markdown(mut self, markdown: Arc<dyn MarkdownRenderer>) -> Self {
        self.markdown = Some(markdown);
        self
    }

    pub fn with_typesetter(mut self, typesetter: Arc<dyn MathTypesetter>) -> Self {
        self.typesetter = Some(typesetter);
        self
    }

    pub fn without_markdown(mut self) -> Self {
        self.markdown = None;
        self
    }

    pub fn without_math(mut self) -> Self {
        self.typesetter = None;
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<RevealEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn options(&self) -> &RevealOptions {
        &self.options
    }

    pub fn has_markdown(&self) -> bool {
        self.markdown.is_some()
    }

    /// Parses and typesets `raw` at once, without a reveal.
    pub fn render_now(&self, raw: &str) -> Fragment {
        let Some(markdown) = self.markdown.as_ref() else {
            return Fragment::plain(raw);
        };
        let mut fragment = markdown.render(raw);
        if let Some(typesetter) = self.typesetter.as_ref() {
            typesetter.typeset(&mut fragment);
        }
        fragment
    }

    fn emit(&self, event: RevealEvent) {
        if let Some(events) = self.events.as_ref() {
            let _ = events.send(event);
        }
    }

    /// Starts revealing `raw` into `target`.
    ///
    /// Returns immediately. If another reveal holds the target's gate the
    /// request is dropped and the handle resolves to [`RevealOutcome::Dropped`].
    /// Must be called from within a Tokio runtime.
    pub fn reveal(&self, target: &RenderTarget, raw: &str) -> RevealHandle {
        let skip = CancellationToken::new();
        let Some(token) = target.gate().try_acquire() else {
            debug!(target_id = %target.id(), "reveal dropped, gate busy");
            return RevealHandle::ready(target.clone(), skip, RevealOutcome::Dropped);
        };

        let Some(markdown) = self.markdown.as_ref() else {
            self.show_plain(target, raw);
            drop(token);
            self.emit(RevealEvent::Finished {
                target: target.id(),
                outcome: RevealOutcome::PlainText,
            });
            return RevealHandle::ready(target.clone(), skip, RevealOutcome::PlainText);
        };

        let fragment = markdown.render(raw);
        let chunks = flatten(&fragment, self.options.chunking);
        let span = info_span!("reveal", target_id = %target.id(), chunks = chunks.len());
        let job = RevealJob {
            renderer: self.clone(),
            target: target.clone(),
            raw: raw.to_string(),
            chunks,
            skip: skip.clone(),
            token,
        };
        let task = tokio::spawn(job.run().instrument(span));
        RevealHandle {
            target: target.clone(),
            skip,
            state: HandleState::Running(task),
        }
    }

    fn show_plain(&self, target: &RenderTarget, raw: &str) {
        if !target.replace_plain(raw) {
            target.fill(Fragment::plain(raw));
        }
        self.emit(RevealEvent::Replaced {
            target: target.id(),
            text: raw.to_string(),
        });
    }
}

struct RevealJob {
    renderer: Renderer,
    target: RenderTarget,
    raw: String,
    chunks: Vec<Chunk>,
    skip: CancellationToken,
    token: RevealToken,
}

impl RevealJob {
    async fn run(self) -> RevealOutcome {
        let RevealJob {
            renderer,
            target,
            raw,
            chunks,
            skip,
            token,
        } = self;
        let options = renderer.options;
        let id = target.id();

        target.begin_reveal();
        renderer.emit(RevealEvent::Started {
            target: id,
            chunks: chunks.len(),
        });

        let mut flushing = false;
        let mut failed = false;
        for chunk in &chunks {
            match target.apply(chunk, options.cursor && !flushing) {
                Ok(applied) => renderer.emit(RevealEvent::Chunk {
                    target: id,
                    applied,
                }),
                Err(err) => {
                    warn!(%err, "reveal failed, showing plain text");
                    failed = true;
                    break;
                }
            }
            target.scroll().request();
            if flushing {
                continue;
            }

            let delay = options.pacing.delay_after(chunk);
            if delay.is_zero() {
                flushing = skip.is_cancelled();
                continue;
            }
            tokio::select! {
                biased;
                () = skip.cancelled() => flushing = true,
                () = time::sleep(delay) => {}
            }
        }

        let outcome = if failed {
            target.fill(Fragment::plain(&raw));
            target.finish_reveal(None);
            renderer.emit(RevealEvent::Replaced {
                target: id,
                text: raw,
            });
            RevealOutcome::PlainText
        } else {
            let spans = target.finish_reveal(renderer.typesetter.as_deref());
            if renderer.typesetter.is_some() {
                renderer.emit(RevealEvent::Typeset { target: id, spans });
            }
            if flushing {
                RevealOutcome::Flushed
            } else {
                RevealOutcome::Completed
            }
        };

        target.scroll().request();
        drop(token);
        debug!(?outcome, "reveal finished");
        renderer.emit(RevealEvent::Finished {
            target: id,
            outcome,
        });
        outcome
    }
}

enum HandleState {
    Ready(RevealOutcome),
    Running(JoinHandle<RevealOutcome>),
}

/// Completion handle for one reveal. Dropping it does not cancel the reveal.
pub struct RevealHandle {
    target: RenderTarget,
    skip: CancellationToken,
    state: HandleState,
}

impl RevealHandle {
    fn ready(target: RenderTarget, skip: CancellationToken, outcome: RevealOutcome) -> Self {
        Self {
            target,
            skip,
            state: HandleState::Ready(outcome),
        }
    }

    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    /// Applies the remaining chunks at once and finishes the reveal.
    pub fn skip(&self) {
        self.skip.cancel();
    }

    /// Token that triggers [`RevealHandle::skip`] from elsewhere.
    pub fn skip_token(&self) -> CancellationToken {
        self.skip.clone()
    }

    pub fn is_finished(&self) -> bool {
        match &self.state {
            HandleState::Ready(_) => true,
            HandleState::Running(task) => task.is_finished(),
        }
    }

    /// Waits until the reveal is fully complete.
    pub async fn finished(self) -> RevealOutcome {
        match self.state {
            HandleState::Ready(outcome) => outcome,
            HandleState::Running(task) => match task.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(%err, target_id = %self.target.id(), "reveal task failed");
                    RevealOutcome::Aborted
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::fragment::CURSOR_MARKUP;

    fn renderer() -> Renderer {
        Renderer::default()
    }

    #[tokio::test(start_paused = true)]
    async fn test_reveal_renders_markdown_and_frees_gate() {
        let target = RenderTarget::detached();
        let outcome = renderer()
            .reveal(&target, "Hello **world**")
            .finished()
            .await;

        assert_eq!(outcome, RevealOutcome::Completed);
        assert_eq!(target.html(), "<p>Hello <strong>world</strong></p>");
        assert!(!target.html().contains(CURSOR_MARKUP));
        assert_eq!(target.state(), RevealState::Complete);
        assert!(!target.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_markdown_shows_plain_text() {
        let target = RenderTarget::detached();
        let handle = renderer()
            .without_markdown()
            .reveal(&target, "plain text");
        assert!(handle.is_finished());
        assert_eq!(handle.finished().await, RevealOutcome::PlainText);
        assert_eq!(target.text_content(), "plain text");
        assert_eq!(target.html(), "plain text");
        assert_eq!(target.state(), RevealState::Complete);
        assert!(!target.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reveal_is_dropped() {
        let gate = RevealGate::new();
        let scroll = ScrollSignal::new();
        let first_target = RenderTarget::new(gate.clone(), scroll.clone());
        let second_target = RenderTarget::new(gate.clone(), scroll);
        let renderer = renderer();

        let first = renderer.reveal(&first_target, "First answer, slowly.");
        let second = renderer.reveal(&second_target, "Second");
        let again = renderer.reveal(&first_target, "Interleaved?");

        assert!(gate.is_busy());
        assert_eq!(second.finished().await, RevealOutcome::Dropped);
        assert_eq!(again.finished().await, RevealOutcome::Dropped);
        assert!(gate.is_busy());

        assert_eq!(first.finished().await, RevealOutcome::Completed);
        assert_eq!(first_target.html(), "<p>First answer, slowly.</p>");
        assert!(second_target.html().is_empty());
        assert!(!gate.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_reveals_replace_content() {
        let target = RenderTarget::detached();
        let renderer = renderer();
        renderer.reveal(&target, "*first*").finished().await;
        renderer.reveal(&target, "second").finished().await;
        assert_eq!(target.html(), "<p>second</p>");
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_flushes_remaining_chunks() {
        let target = RenderTarget::detached();
        let handle = renderer().reveal(&target, "A long answer. With pauses, everywhere!");
        handle.skip();
        assert_eq!(handle.finished().await, RevealOutcome::Flushed);
        assert_eq!(
            target.html(),
            "<p>A long answer. With pauses, everywhere!</p>"
        );
        assert!(!target.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_math_is_typeset_on_completion() {
        let target = RenderTarget::detached();
        renderer()
            .reveal(&target, "Energy is $E=mc^2$.")
            .finished()
            .await;
        assert_eq!(
            target.html(),
            "<p>Energy is <span class=\"math inline\">E=mc^2</span>.</p>"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_bracket_the_reveal() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let target = RenderTarget::detached();
        let outcome = renderer()
            .with_events(tx)
            .reveal(&target, "Hi *there*")
            .finished()
            .await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(RevealEvent::Started { .. })));
        assert_eq!(
            events.last(),
            Some(&RevealEvent::Finished {
                target: target.id(),
                outcome
            })
        );
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                RevealEvent::Chunk { applied, .. } => applied.text.clone(),
                _ => None,
            })
            .collect();
        assert_eq!(text, "Hi there");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursor_visible_while_revealing() {
        let target = RenderTarget::detached();
        let handle = renderer().reveal(&target, "Typing. Slowly. Very slowly.");
        time::sleep(Duration::from_millis(20)).await;
        assert_eq!(target.state(), RevealState::Revealing);
        assert!(target.html().contains(CURSOR_MARKUP));
        handle.finished().await;
        assert!(!target.has_cursor());
    }

    #[test]
    fn test_render_now_typesets() {
        let fragment = renderer().render_now("**x** $y$");
        assert_eq!(
            fragment.to_html(),
            "<p><strong>x</strong> <span class=\"math inline\">y</span></p>"
        );
        assert_eq!(
            renderer().without_markdown().render_now("**x**").to_html(),
            "**x**"
        );
    }
}
