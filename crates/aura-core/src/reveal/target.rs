//! Render targets and the reveal ownership token.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use super::chunk::{ApplyError, Chunk, apply_chunk};
use crate::fragment::{Cursor, Fragment, Tag};
use crate::math::MathTypesetter;

static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

impl TargetId {
    fn next() -> Self {
        Self(NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevealState {
    #[default]
    Pending,
    Revealing,
    Complete,
}

/// Exclusive right to reveal into the targets sharing this gate.
#[derive(Debug, Clone, Default)]
pub struct RevealGate {
    busy: Arc<AtomicBool>,
}

impl RevealGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the gate, or `None` if a reveal already holds it.
    pub fn try_acquire(&self) -> Option<RevealToken> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RevealToken { gate: self.clone() })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the lifetime of one reveal; releases the gate on drop.
#[derive(Debug)]
pub struct RevealToken {
    gate: RevealGate,
}

impl Drop for RevealToken {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

/// Coalescing scroll-to-bottom requests.
///
/// Each request bumps a generation counter; observers only ever see the
/// latest generation.
#[derive(Debug, Clone)]
pub struct ScrollSignal {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for ScrollSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrollSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn request(&self) {
        self.tx.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    pub fn generation(&self) -> u64 {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

/// Result of applying one chunk, for observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChunk {
    /// Element created by this chunk, if any.
    pub opened: Option<Tag>,
    /// Text appended by this chunk, if any.
    pub text: Option<String>,
    /// Enclosing element tags, outermost first.
    pub ancestors: Vec<Tag>,
}

/// Point-in-time copy of a target for rendering.
#[derive(Debug, Clone)]
pub struct TargetSnapshot {
    pub fragment: Fragment,
    pub cursor: Option<Cursor>,
    pub state: RevealState,
    pub version: u64,
}

#[derive(Debug, Default)]
struct TargetInner {
    fragment: Fragment,
    cursor: Option<Cursor>,
    state: RevealState,
    version: u64,
}

impl TargetInner {
    fn touch(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}

/// Live output sink owned by one message.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    id: TargetId,
    inner: Arc<Mutex<TargetInner>>,
    gate: RevealGate,
    scroll: ScrollSignal,
}

impl RenderTarget {
    /// Creates a target sharing a gate and scroll signal with its siblings.
    pub fn new(gate: RevealGate, scroll: ScrollSignal) -> Self {
        Self {
            id: TargetId::next(),
            inner: Arc::new(Mutex::new(TargetInner::default())),
            gate,
            scroll,
        }
    }

    /// Creates a standalone target with its own gate.
    pub fn detached() -> Self {
        Self::new(RevealGate::new(), ScrollSignal::new())
    }

    fn lock(&self) -> MutexGuard<'_, TargetInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn gate(&self) -> &RevealGate {
        &self.gate
    }

    /// Whether a reveal currently holds this target's gate.
    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    pub fn scroll(&self) -> &ScrollSignal {
        &self.scroll
    }

    pub fn state(&self) -> RevealState {
        self.lock().state
    }

    /// Changes whenever content, cursor or state change.
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    /// HTML of the current content, including the cursor marker if present.
    pub fn html(&self) -> String {
        let inner = self.lock();
        inner.fragment.to_html_with_cursor(inner.cursor.as_ref())
    }

    pub fn text_content(&self) -> String {
        self.lock().fragment.text_content()
    }

    pub fn has_cursor(&self) -> bool {
        self.lock().cursor.is_some()
    }

    pub fn snapshot(&self) -> TargetSnapshot {
        let inner = self.lock();
        TargetSnapshot {
            fragment: inner.fragment.clone(),
            cursor: inner.cursor.clone(),
            state: inner.state,
            version: inner.version,
        }
    }

    /// Replaces the content with plain text and marks it complete.
    ///
    /// Refused (returns `false`) while a reveal is writing this target.
    pub fn replace_plain(&self, text: &str) -> bool {
        self.replace(Fragment::plain(text))
    }

    /// Replaces the content with a finished fragment and marks it complete.
    ///
    /// Refused (returns `false`) while a reveal is writing this target.
    pub fn replace(&self, fragment: Fragment) -> bool {
        let mut inner = self.lock();
        if inner.state == RevealState::Revealing {
            return false;
        }
        inner.fragment = fragment;
        inner.cursor = None;
        inner.state = RevealState::Complete;
        inner.touch();
        drop(inner);
        self.scroll.request();
        true
    }

    /// Shows `text` as a placeholder until a reveal or replacement arrives.
    pub fn show_placeholder(&self, text: &str) -> bool {
        let mut inner = self.lock();
        if inner.state == RevealState::Revealing {
            return false;
        }
        inner.fragment = Fragment::plain(text);
        inner.cursor = None;
        inner.state = RevealState::Pending;
        inner.touch();
        drop(inner);
        self.scroll.request();
        true
    }

    pub(crate) fn begin_reveal(&self) {
        let mut inner = self.lock();
        inner.fragment.clear();
        inner.cursor = None;
        inner.state = RevealState::Revealing;
        inner.touch();
    }

    pub(crate) fn apply(&self, chunk: &Chunk, track_cursor: bool) -> Result<AppliedChunk, ApplyError> {
        let mut inner = self.lock();
        let cursor = apply_chunk(&mut inner.fragment, chunk)?;
        inner.cursor = track_cursor.then_some(cursor);
        inner.touch();
        let ancestors = inner.fragment.ancestor_tags(chunk.path());
        Ok(match chunk {
            Chunk::Open { tag, .. } => AppliedChunk {
                opened: Some(tag.clone()),
                text: None,
                ancestors,
            },
            Chunk::Text { text, .. } => AppliedChunk {
                opened: None,
                text: Some(text.clone()),
                ancestors,
            },
        })
    }

    /// Shows `fragment` at once in place of a partially revealed tree.
    pub(crate) fn fill(&self, fragment: Fragment) {
        let mut inner = self.lock();
        inner.fragment = fragment;
        inner.touch();
    }

    /// Removes the cursor, typesets and marks the target complete.
    pub(crate) fn finish_reveal(&self, typesetter: Option<&dyn MathTypesetter>) -> usize {
        let mut inner = self.lock();
        inner.cursor = None;
        let spans = typesetter.map_or(0, |t| t.typeset(&mut inner.fragment));
        inner.state = RevealState::Complete;
        inner.touch();
        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_is_exclusive_until_token_dropped() {
        let gate = RevealGate::new();
        let token = gate.try_acquire().unwrap();
        assert!(gate.is_busy());
        assert!(gate.try_acquire().is_none());
        drop(token);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn test_targets_sharing_a_gate_share_busy_state() {
        let gate = RevealGate::new();
        let scroll = ScrollSignal::new();
        let a = RenderTarget::new(gate.clone(), scroll.clone());
        let b = RenderTarget::new(gate.clone(), scroll);
        let _token = a.gate().try_acquire().unwrap();
        assert!(b.is_busy());
        assert!(!RenderTarget::detached().is_busy());
    }

    #[test]
    fn test_scroll_requests_coalesce() {
        let scroll = ScrollSignal::new();
        let mut rx = scroll.subscribe();
        scroll.request();
        scroll.request();
        scroll.request();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 3);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_replace_refused_while_revealing() {
        let target = RenderTarget::detached();
        target.begin_reveal();
        assert!(!target.replace_plain("nope"));
        target.finish_reveal(None);
        assert!(target.replace_plain("ok"));
        assert_eq!(target.text_content(), "ok");
        assert_eq!(target.state(), RevealState::Complete);
    }

    #[test]
    fn test_apply_tracks_cursor_and_ancestors() {
        let target = RenderTarget::detached();
        target.begin_reveal();
        target
            .apply(
                &Chunk::Open {
                    path: vec![0],
                    tag: Tag::Emphasis,
                },
                true,
            )
            .unwrap();
        let applied = target
            .apply(
                &Chunk::Text {
                    path: vec![0, 0],
                    text: "hi".into(),
                },
                true,
            )
            .unwrap();
        assert_eq!(applied.ancestors, vec![Tag::Emphasis]);
        assert!(target.has_cursor());
        assert_eq!(
            target.html(),
            format!("<em>hi{}</em>", crate::fragment::CURSOR_MARKUP)
        );
        target.finish_reveal(None);
        assert!(!target.has_cursor());
        assert_eq!(target.html(), "<em>hi</em>");
    }
}
