//! Transcript pane: messages to styled lines.
//!
//! Lines are rebuilt from target snapshots every frame, so a running reveal
//! shows up without any extra bookkeeping in the UI state.

mod fragment;
mod style;
mod wrap;

use aura_core::reveal::RevealState;
use aura_core::transcript::{Message, Role, Transcript};
pub use fragment::{CURSOR_GLYPH, fragment_lines};
pub use style::{Style, StyledLine, StyledSpan};
pub use wrap::{WrapOptions, wrap_styled_spans};

const ANNOTATION_PREFIX: &str = "↳ ";

/// Lines for one message: role label, body, then annotations.
pub fn message_lines(message: &Message, width: usize) -> Vec<StyledLine> {
    let label_style = match message.role() {
        Role::User => Style::UserLabel,
        Role::Assistant => Style::AssistantLabel,
    };
    let mut lines = vec![StyledLine::plain(message.role().label(), label_style)];

    let snapshot = message.target().snapshot();
    let base = match message.role() {
        Role::User => Style::User,
        Role::Assistant if message.is_error() => Style::Error,
        Role::Assistant if snapshot.state == RevealState::Pending => Style::Pending,
        Role::Assistant => Style::Assistant,
    };
    let cursor = snapshot
        .cursor
        .as_ref()
        .filter(|_| snapshot.state == RevealState::Revealing);
    lines.extend(fragment_lines(&snapshot.fragment, cursor, base, width));

    for note in message.annotations() {
        let opts = WrapOptions {
            width,
            first_prefix: vec![StyledSpan::new(ANNOTATION_PREFIX, Style::Annotation)],
            rest_prefix: vec![StyledSpan::new("  ", Style::Annotation)],
        };
        lines.extend(wrap_styled_spans(
            &[StyledSpan::new(note.as_str(), Style::Annotation)],
            &opts,
        ));
    }
    lines
}

/// All transcript lines, messages separated by a blank line.
pub fn transcript_lines(transcript: &Transcript, width: usize) -> Vec<StyledLine> {
    let mut lines = Vec::new();
    for message in transcript.messages() {
        if !lines.is_empty() {
            lines.push(StyledLine::empty());
        }
        lines.extend(message_lines(message, width));
    }
    lines
}

#[cfg(test)]
mod tests {
    use aura_core::reveal::Renderer;
    use aura_core::transcript::RenderMode;

    use super::*;

    fn texts(lines: &[StyledLine]) -> Vec<String> {
        lines.iter().map(StyledLine::text).collect()
    }

    #[test]
    fn test_messages_are_labelled_and_separated() {
        let renderer = Renderer::default();
        let mut transcript = Transcript::new();
        transcript.push_user("hi there");
        transcript.push_assistant("**Hello**", RenderMode::Markdown, &renderer);

        let lines = transcript_lines(&transcript, 40);
        assert_eq!(texts(&lines), ["You", "hi there", "", "AURA", "Hello"]);
        assert_eq!(lines[4].spans[0].style, Style::Strong);
    }

    #[test]
    fn test_pending_and_error_styles() {
        let renderer = Renderer::default();
        let mut transcript = Transcript::new();
        let pending = transcript.push_pending("Processing…");
        let lines = message_lines(transcript.get(pending).unwrap(), 40);
        assert_eq!(lines[1].spans[0].style, Style::Pending);

        transcript.mark_error(pending, "Error: HTTP 500");
        let lines = message_lines(transcript.get(pending).unwrap(), 40);
        assert_eq!(lines[1].text(), "Error: HTTP 500");
        assert_eq!(lines[1].spans[0].style, Style::Error);

        let notice = transcript.push_assistant("Done", RenderMode::Markdown, &renderer);
        transcript.annotate(notice, "indexed 3 chunks");
        let lines = message_lines(transcript.get(notice).unwrap(), 40);
        assert_eq!(lines.last().unwrap().text(), "↳ indexed 3 chunks");
    }
}
