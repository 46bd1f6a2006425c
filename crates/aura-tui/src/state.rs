//! Application state for the chat screen.
//!
//! ```text
//! AppState
//! ├── chat: ChatState      (transcript, status, upload progress, KB badge)
//! ├── input: InputState    (line being typed)
//! ├── scroll: ScrollState  (transcript viewport)
//! └── reveal: Option<ActiveReveal>
//! ```

use std::mem;

use aura_core::session::ChatState;
use aura_core::transcript::MessageId;
use tokio_util::sync::CancellationToken;

/// Lines moved per mouse wheel step.
pub const WHEEL_LINES: usize = 3;

pub struct AppState {
    pub chat: ChatState,
    pub input: InputState,
    pub scroll: ScrollState,
    pub reveal: Option<ActiveReveal>,
    pub should_quit: bool,
    pub spinner_frame: usize,
    pub width: u16,
    pub height: u16,
}

impl AppState {
    pub fn new(chat: ChatState) -> Self {
        let seen = chat.transcript().scroll().generation();
        Self {
            chat,
            input: InputState::default(),
            scroll: ScrollState::new(seen),
            reveal: None,
            should_quit: false,
            spinner_frame: 0,
            width: 0,
            height: 0,
        }
    }

    /// Whether something is in flight and the UI should tick fast.
    pub fn is_busy(&self) -> bool {
        self.reveal.is_some()
            || self.chat.is_sending()
            || self.chat.is_uploading()
            || self.chat.is_resetting()
    }
}

/// The reveal currently animating in the transcript.
#[derive(Debug, Clone)]
pub struct ActiveReveal {
    pub message: MessageId,
    pub skip: CancellationToken,
}

/// Single-line input with a character cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputState {
    text: String,
    /// Cursor position in chars.
    cursor: usize,
}

impl InputState {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn byte_index(&self, chars: usize) -> usize {
        self.text
            .char_indices()
            .nth(chars)
            .map_or(self.text.len(), |(i, _)| i)
    }

    pub fn insert_str(&mut self, text: &str) {
        // Newlines would break the single-line field.
        let text: String = text
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();
        let at = self.byte_index(self.cursor);
        self.text.insert_str(at, &text);
        self.cursor += text.chars().count();
    }

    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.text.insert(at, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_index(self.cursor);
        self.text.remove(at);
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let at = self.byte_index(self.cursor);
            self.text.remove(at);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    /// Takes the text, leaving the input empty.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        mem::take(&mut self.text)
    }
}

/// Transcript viewport position.
///
/// `offset` counts lines scrolled up from the bottom; zero follows new
/// output. A scroll request from the transcript snaps back to the bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollState {
    offset: usize,
    seen_generation: u64,
}

impl ScrollState {
    pub fn new(generation: u64) -> Self {
        Self {
            offset: 0,
            seen_generation: generation,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_following(&self) -> bool {
        self.offset == 0
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.offset = self.offset.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.offset = self.offset.saturating_sub(lines);
    }

    /// Follows the bottom if the transcript asked for a scroll since the
    /// last call. Returns whether it did.
    pub fn observe(&mut self, generation: u64) -> bool {
        if generation == self.seen_generation {
            return false;
        }
        self.seen_generation = generation;
        self.offset = 0;
        true
    }

    /// First visible line for `total` lines in a `height`-line viewport.
    pub fn top_line(&self, total: usize, height: usize) -> usize {
        let max_top = total.saturating_sub(height);
        max_top.saturating_sub(self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_editing_is_char_based() {
        let mut input = InputState::default();
        input.insert_str("héllo");
        input.move_left();
        input.move_left();
        input.insert_char('X');
        assert_eq!(input.text(), "hélXlo");
        input.backspace();
        input.move_home();
        input.delete();
        assert_eq!(input.text(), "éllo");
        input.move_end();
        assert_eq!(input.cursor(), 4);
        assert_eq!(input.take(), "éllo");
        assert!(input.is_empty());
    }

    #[test]
    fn test_paste_newlines_become_spaces() {
        let mut input = InputState::default();
        input.insert_str("a\nb");
        assert_eq!(input.text(), "a b");
    }

    #[test]
    fn test_scroll_request_snaps_to_bottom() {
        let mut scroll = ScrollState::new(0);
        scroll.scroll_up(10);
        assert_eq!(scroll.top_line(100, 20), 70);
        assert!(!scroll.observe(0));
        assert_eq!(scroll.offset(), 10);
        assert!(scroll.observe(1));
        assert!(scroll.is_following());
        assert_eq!(scroll.top_line(100, 20), 80);
    }

    #[test]
    fn test_top_line_clamps() {
        let mut scroll = ScrollState::new(0);
        scroll.scroll_up(500);
        assert_eq!(scroll.top_line(100, 20), 0);
        assert_eq!(scroll.top_line(5, 20), 0);
    }
}
