//! TUI reducer (update function).
//!
//! All state mutations happen here. The runtime calls `update(app, event)`
//! and executes the returned effects.

use aura_core::reveal::RevealOutcome;
use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind,
};
use tracing::debug;

use crate::commands::{self, Command};
use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::state::{ActiveReveal, AppState, WHEEL_LINES};

/// Rows taken by everything but the transcript (header, gauge, status, input).
pub const CHROME_HEIGHT: u16 = 6;

/// The main reducer function.
pub fn update(app: &mut AppState, event: UiEvent) -> Vec<UiEffect> {
    match event {
        UiEvent::Tick => {
            app.spinner_frame = app.spinner_frame.wrapping_add(1);
            let generation = app.chat.transcript().scroll().generation();
            app.scroll.observe(generation);
            vec![]
        }
        UiEvent::Frame { width, height } => {
            app.width = width;
            app.height = height;
            vec![]
        }
        UiEvent::Terminal(event) => handle_terminal_event(app, event),
        UiEvent::UploadProgress(pct) => {
            app.chat.upload_progress(pct);
            vec![]
        }
        UiEvent::UploadFinished(result) => {
            app.chat.finish_upload(result);
            vec![]
        }
        UiEvent::SendFinished { message, result } => app
            .chat
            .finish_send(message, result)
            .map(UiEffect::Reveal)
            .into_iter()
            .collect(),
        UiEvent::ResetFinished(result) => {
            app.chat.finish_reset(result);
            vec![]
        }
        UiEvent::ForgetFinished(result) => {
            app.chat.finish_forget(result);
            vec![]
        }
        UiEvent::RevealStarted { message, skip } => {
            app.reveal = Some(ActiveReveal { message, skip });
            vec![]
        }
        UiEvent::RevealFinished { message, outcome } => {
            debug!(%message, ?outcome, "reveal finished");
            if outcome == RevealOutcome::Dropped {
                app.chat.finish_dropped_reveal(message);
            }
            if app.reveal.as_ref().is_some_and(|r| r.message == message) {
                app.reveal = None;
            }
            vec![]
        }
    }
}

fn handle_terminal_event(app: &mut AppState, event: Event) -> Vec<UiEffect> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => handle_key(app, key),
        Event::Paste(text) => {
            handle_paste(app, &text);
            vec![]
        }
        Event::Mouse(mouse) => {
            handle_mouse(app, mouse);
            vec![]
        }
        _ => vec![],
    }
}

fn page_lines(app: &AppState) -> usize {
    usize::from(app.height.saturating_sub(CHROME_HEIGHT).max(2) / 2)
}

fn handle_key(app: &mut AppState, key: KeyEvent) -> Vec<UiEffect> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => return vec![UiEffect::Quit],
        KeyCode::Char('u') if ctrl => app.input.clear(),
        KeyCode::Esc => match &app.reveal {
            Some(reveal) => return vec![UiEffect::SkipReveal(reveal.skip.clone())],
            None => app.input.clear(),
        },
        KeyCode::Enter => return submit(app),
        KeyCode::PageUp => app.scroll.scroll_up(page_lines(app)),
        KeyCode::PageDown => app.scroll.scroll_down(page_lines(app)),
        KeyCode::Backspace => app.input.backspace(),
        KeyCode::Delete => app.input.delete(),
        KeyCode::Left => app.input.move_left(),
        KeyCode::Right => app.input.move_right(),
        KeyCode::Home => app.input.move_home(),
        KeyCode::End => app.input.move_end(),
        KeyCode::Char(c) if !ctrl => app.input.insert_char(c),
        _ => {}
    }
    vec![]
}

fn handle_paste(app: &mut AppState, text: &str) {
    // A dropped file arrives as a pasted path.
    match commands::dropped_file(text) {
        Some(path) => app.chat.select_file(path),
        None => app.input.insert_str(text),
    }
}

fn handle_mouse(app: &mut AppState, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll.scroll_up(WHEEL_LINES),
        MouseEventKind::ScrollDown => app.scroll.scroll_down(WHEEL_LINES),
        _ => {}
    }
}

fn submit(app: &mut AppState) -> Vec<UiEffect> {
    let text = app.input.take();
    match commands::parse(&text) {
        Some(Ok(command)) => run_command(app, command),
        Some(Err(err)) => {
            app.chat.set_status(&err.status());
            vec![]
        }
        None => {
            if let Some(request) = app.chat.begin_send(&text) {
                vec![UiEffect::Backend(request)]
            } else {
                // Keep the text so it can be sent once the current turn ends.
                app.input.insert_str(&text);
                vec![]
            }
        }
    }
}

fn run_command(app: &mut AppState, command: Command) -> Vec<UiEffect> {
    match command {
        Command::File(path) => {
            app.chat.select_file(path);
            vec![]
        }
        Command::Upload(path) => {
            if let Some(path) = path {
                app.chat.select_file(path);
            }
            app.chat
                .begin_upload()
                .map(UiEffect::Backend)
                .into_iter()
                .collect()
        }
        Command::Reset => app
            .chat
            .begin_reset()
            .map(UiEffect::Backend)
            .into_iter()
            .collect(),
        Command::Clear => {
            let effects = app
                .reveal
                .take()
                .map(|reveal| UiEffect::SkipReveal(reveal.skip))
                .into_iter()
                .collect();
            app.chat.clear_chat();
            effects
        }
        Command::Forget => vec![UiEffect::Backend(app.chat.begin_forget())],
        Command::Help => {
            app.chat.notice(&commands::help_text());
            vec![]
        }
        Command::Quit => vec![UiEffect::Quit],
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use aura_core::client::ClientError;
    use aura_core::reveal::{Renderer, RevealState};
    use aura_core::session::{
        ChatState, PENDING_PLACEHOLDER, Request, STATUS_BUSY, STATUS_CHOOSE_FILE, STATUS_ERROR,
        STATUS_FILE_SELECTED, STATUS_THINKING,
    };
    use aura_core::transcript::MessageId;
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;

    use super::*;

    fn app() -> AppState {
        let mut app = AppState::new(ChatState::new(Renderer::default()));
        app.height = 30;
        app
    }

    fn key(code: KeyCode) -> UiEvent {
        UiEvent::Terminal(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    fn type_text(app: &mut AppState, text: &str) {
        for c in text.chars() {
            update(app, key(KeyCode::Char(c)));
        }
    }

    fn send_request(effects: &[UiEffect]) -> Option<(&Request, MessageId)> {
        match effects {
            [UiEffect::Backend(request @ Request::Send { message, .. })] => Some((request, *message)),
            _ => None,
        }
    }

    #[test]
    fn test_enter_sends_typed_text() {
        let mut app = app();
        type_text(&mut app, "What is AURA?");
        let effects = update(&mut app, key(KeyCode::Enter));

        let (request, _) = send_request(&effects).unwrap();
        let Request::Send { text, file_id, .. } = request else {
            unreachable!()
        };
        assert_eq!(text, "What is AURA?");
        assert_eq!(*file_id, None);
        assert!(app.input.is_empty());
        assert_eq!(app.chat.status(), STATUS_THINKING);
        assert_eq!(
            app.chat.transcript().last().unwrap().target().text_content(),
            PENDING_PLACEHOLDER
        );
    }

    #[test]
    fn test_enter_while_busy_keeps_input() {
        let mut app = app();
        type_text(&mut app, "first");
        update(&mut app, key(KeyCode::Enter));
        type_text(&mut app, "second");
        let effects = update(&mut app, key(KeyCode::Enter));

        assert!(effects.is_empty());
        assert_eq!(app.input.text(), "second");
        assert_eq!(app.chat.status(), STATUS_BUSY);
    }

    #[test]
    fn test_send_result_starts_reveal_or_shows_error() {
        let mut app = app();
        type_text(&mut app, "q");
        let effects = update(&mut app, key(KeyCode::Enter));
        let (_, message) = send_request(&effects).unwrap();

        let effects = update(
            &mut app,
            UiEvent::SendFinished {
                message,
                result: Ok("**yes**".to_string()),
            },
        );
        assert!(matches!(effects.as_slice(), [UiEffect::Reveal(r)] if r.text == "**yes**"));

        type_text(&mut app, "again");
        let effects = update(&mut app, key(KeyCode::Enter));
        let (_, message) = send_request(&effects).unwrap();
        let effects = update(
            &mut app,
            UiEvent::SendFinished {
                message,
                result: Err(ClientError::http_status(500, "")),
            },
        );
        assert!(effects.is_empty());
        assert_eq!(app.chat.status(), STATUS_ERROR);
        assert!(app.chat.transcript().last().unwrap().is_error());
    }

    #[test]
    fn test_upload_needs_selected_file() {
        let mut app = app();
        type_text(&mut app, "/upload");
        let effects = update(&mut app, key(KeyCode::Enter));
        assert!(effects.is_empty());
        assert_eq!(app.chat.status(), STATUS_CHOOSE_FILE);

        type_text(&mut app, "/file notes.pdf");
        update(&mut app, key(KeyCode::Enter));
        assert_eq!(app.chat.status(), STATUS_FILE_SELECTED);

        type_text(&mut app, "/upload");
        let effects = update(&mut app, key(KeyCode::Enter));
        assert!(matches!(
            effects.as_slice(),
            [UiEffect::Backend(Request::Upload { path })] if *path == PathBuf::from("notes.pdf")
        ));
    }

    #[test]
    fn test_pasted_file_path_selects_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("report.txt");
        fs::write(&file, "hello").unwrap();

        let mut app = app();
        update(
            &mut app,
            UiEvent::Terminal(Event::Paste(file.display().to_string())),
        );
        assert_eq!(app.chat.selected_file(), Some(file.as_path()));
        assert!(app.input.is_empty());

        update(&mut app, UiEvent::Terminal(Event::Paste("plain words".into())));
        assert_eq!(app.input.text(), "plain words");
    }

    #[test]
    fn test_escape_skips_active_reveal() {
        let mut app = app();
        type_text(&mut app, "draft");
        update(&mut app, key(KeyCode::Esc));
        assert!(app.input.is_empty());

        let skip = CancellationToken::new();
        let message = MessageId(7);
        update(
            &mut app,
            UiEvent::RevealStarted {
                message,
                skip: skip.clone(),
            },
        );
        let effects = update(&mut app, key(KeyCode::Esc));
        let [UiEffect::SkipReveal(token)] = effects.as_slice() else {
            panic!("expected a skip effect");
        };
        token.cancel();
        assert!(skip.is_cancelled());

        update(
            &mut app,
            UiEvent::RevealFinished {
                message,
                outcome: RevealOutcome::Flushed,
            },
        );
        assert!(app.reveal.is_none());
    }

    #[test]
    fn test_dropped_reveal_leaves_no_placeholder() {
        let mut app = app();
        type_text(&mut app, "hi");
        let effects = update(&mut app, key(KeyCode::Enter));
        let (_, message) = send_request(&effects).unwrap();

        let effects = update(
            &mut app,
            UiEvent::SendFinished {
                message,
                result: Ok("Plain *answer*".to_string()),
            },
        );
        let [UiEffect::Reveal(reveal)] = effects.as_slice() else {
            panic!("expected a reveal effect");
        };
        let target = reveal.target.clone();

        update(
            &mut app,
            UiEvent::RevealFinished {
                message,
                outcome: RevealOutcome::Dropped,
            },
        );
        assert_eq!(target.state(), RevealState::Complete);
        assert_eq!(target.text_content(), "Plain answer");
        assert_ne!(target.text_content(), PENDING_PLACEHOLDER);
    }

    #[test]
    fn test_help_notice_pulls_view_to_bottom() {
        let mut app = app();
        update(&mut app, key(KeyCode::PageUp));
        assert!(!app.scroll.is_following());

        type_text(&mut app, "/help");
        update(&mut app, key(KeyCode::Enter));
        update(&mut app, UiEvent::Tick);
        assert!(app.scroll.is_following());
        assert!(
            app.chat
                .transcript()
                .last()
                .unwrap()
                .target()
                .text_content()
                .contains("/upload [PATH]")
        );
    }

    #[test]
    fn test_ctrl_c_and_quit_command() {
        let mut app = app();
        let effects = update(
            &mut app,
            UiEvent::Terminal(Event::Key(KeyEvent::new(
                KeyCode::Char('c'),
                KeyModifiers::CONTROL,
            ))),
        );
        assert!(matches!(effects.as_slice(), [UiEffect::Quit]));

        type_text(&mut app, "/quit");
        let effects = update(&mut app, key(KeyCode::Enter));
        assert!(matches!(effects.as_slice(), [UiEffect::Quit]));
    }

    #[test]
    fn test_unknown_command_sets_status() {
        let mut app = app();
        type_text(&mut app, "/nope");
        let effects = update(&mut app, key(KeyCode::Enter));
        assert!(effects.is_empty());
        assert_eq!(app.chat.status(), "Unknown command: /nope");
    }
}
