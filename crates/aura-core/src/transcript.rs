//! Chat transcript: ordered messages, each owning one render target.

use std::fmt;

use crate::reveal::{RenderTarget, Renderer, RevealGate, RevealState, ScrollSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "AURA",
        }
    }
}

/// How a message's content is turned into a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Shown verbatim (escaped).
    Plain,
    /// Parsed as markdown.
    Markdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: String,
    mode: RenderMode,
    target: RenderTarget,
    annotations: Vec<String>,
    error: bool,
}

impl Message {
    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    pub fn reveal_state(&self) -> RevealState {
        self.target.state()
    }

    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }

    pub fn is_error(&self) -> bool {
        self.error
    }
}

/// Ordered messages sharing one reveal gate and one scroll signal.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    next_id: u64,
    gate: RevealGate,
    scroll: ScrollSignal,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gate(&self) -> &RevealGate {
        &self.gate
    }

    pub fn scroll(&self) -> &ScrollSignal {
        &self.scroll
    }

    fn push(&mut self, role: Role, content: &str, mode: RenderMode) -> &Message {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(Message {
            id,
            role,
            content: content.to_string(),
            mode,
            target: RenderTarget::new(self.gate.clone(), self.scroll.clone()),
            annotations: Vec::new(),
            error: false,
        });
        &self.messages[self.messages.len() - 1]
    }

    /// Adds a user message, shown verbatim.
    pub fn push_user(&mut self, text: &str) -> MessageId {
        let message = self.push(Role::User, text, RenderMode::Plain);
        message.target.replace_plain(text);
        message.id
    }

    /// Adds an assistant message shown at once, without a reveal.
    pub fn push_assistant(&mut self, text: &str, mode: RenderMode, renderer: &Renderer) -> MessageId {
        let message = self.push(Role::Assistant, text, mode);
        match mode {
            RenderMode::Plain => message.target.replace_plain(text),
            RenderMode::Markdown => message.target.replace(renderer.render_now(text)),
        };
        message.id
    }

    /// Adds an assistant message showing `placeholder` until it is resolved.
    pub fn push_pending(&mut self, placeholder: &str) -> MessageId {
        let message = self.push(Role::Assistant, "", RenderMode::Plain);
        message.target.show_placeholder(placeholder);
        message.id
    }

    /// Stores the response text for a pending message and returns its target.
    ///
    /// The caller reveals `text` into the returned target.
    pub fn resolve(&mut self, id: MessageId, text: &str) -> Option<RenderTarget> {
        let message = self.get_mut(id)?;
        if message.reveal_state() != RevealState::Pending {
            return None;
        }
        message.content = text.to_string();
        message.mode = RenderMode::Markdown;
        Some(message.target.clone())
    }

    /// Turns a message into an error message showing `text`.
    pub fn mark_error(&mut self, id: MessageId, text: &str) -> bool {
        let Some(message) = self.get_mut(id) else {
            return false;
        };
        if !message.target.replace_plain(text) {
            return false;
        }
        message.content = text.to_string();
        message.mode = RenderMode::Plain;
        message.error = true;
        true
    }

    pub fn annotate(&mut self, id: MessageId, note: &str) -> bool {
        match self.get_mut(id) {
            Some(message) => {
                message.annotations.push(note.to_string());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn target(&self, id: MessageId) -> Option<RenderTarget> {
        self.get(id).map(|m| m.target.clone())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether a reveal is running into any of this transcript's targets.
    pub fn is_revealing(&self) -> bool {
        self.gate.is_busy()
    }

    /// Removes every message. A running reveal finishes into its detached
    /// target.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.scroll.request();
    }
}
