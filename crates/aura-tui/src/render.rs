//! Pure view functions: read `AppState`, draw a frame, never mutate.

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use aura_core::session::KbState;

use crate::state::AppState;
use crate::transcript::{self, StyledLine};

const HEADER_HEIGHT: u16 = 1;
const GAUGE_HEIGHT: u16 = 1;
const STATUS_HEIGHT: u16 = 1;
const INPUT_HEIGHT: u16 = 3;

/// Horizontal padding on each side of the transcript.
pub const TRANSCRIPT_MARGIN: u16 = 1;

const SPINNER_FRAMES: &[&str] = &["◐", "◓", "◑", "◒"];

const KEY_HINTS: &str = "Esc skip · PgUp/PgDn scroll · /help";

pub fn render(app: &AppState, frame: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Min(1),
            Constraint::Length(GAUGE_HEIGHT),
            Constraint::Length(STATUS_HEIGHT),
            Constraint::Length(INPUT_HEIGHT),
        ])
        .split(frame.area());

    render_header(app, frame, chunks[0]);
    render_transcript(app, frame, chunks[1]);
    render_gauge(app, frame, chunks[2]);
    render_status(app, frame, chunks[3]);
    render_input(app, frame, chunks[4]);
}

fn render_header(app: &AppState, frame: &mut Frame, area: Rect) {
    let kb_style = match app.chat.kb() {
        KbState::Loaded => Style::default().fg(Color::Green),
        KbState::Empty => Style::default().fg(Color::DarkGray),
    };
    let mut spans = vec![
        Span::styled(
            " AURA ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(app.chat.kb().to_string(), kb_style),
    ];
    if let Some(file_id) = app.chat.file_id() {
        spans.push(Span::styled(
            format!("  file: {file_id}"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if let Some(name) = app.chat.selected_file().and_then(|p| p.file_name()) {
        spans.push(Span::styled(
            format!("  selected: {}", name.to_string_lossy()),
            Style::default().fg(Color::DarkGray),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Visible transcript lines for a viewport, bottom-aligned.
pub fn visible_lines(app: &AppState, width: usize, height: usize) -> Vec<StyledLine> {
    let lines = transcript::transcript_lines(app.chat.transcript(), width);
    let top = app.scroll.top_line(lines.len(), height);
    let mut visible: Vec<StyledLine> = lines.into_iter().skip(top).take(height).collect();
    if visible.len() < height {
        let mut padded = vec![StyledLine::empty(); height - visible.len()];
        padded.append(&mut visible);
        visible = padded;
    }
    visible
}

fn render_transcript(app: &AppState, frame: &mut Frame, area: Rect) {
    let inner = Rect {
        x: area.x + TRANSCRIPT_MARGIN,
        width: area.width.saturating_sub(TRANSCRIPT_MARGIN * 2),
        ..area
    };
    let lines: Vec<Line<'static>> =
        visible_lines(app, usize::from(inner.width), usize::from(inner.height))
            .iter()
            .map(StyledLine::to_line)
            .collect();
    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_gauge(app: &AppState, frame: &mut Frame, area: Rect) {
    let progress = app.chat.progress();
    if progress == 0 && !app.chat.is_uploading() {
        return;
    }
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Magenta).bg(Color::Black))
        .percent(u16::from(progress.min(100)))
        .label(format!("Upload {progress}%"));
    frame.render_widget(gauge, area);
}

fn render_status(app: &AppState, frame: &mut Frame, area: Rect) {
    let mut spans = Vec::new();
    if app.is_busy() {
        let spinner = SPINNER_FRAMES[app.spinner_frame % SPINNER_FRAMES.len()];
        spans.push(Span::styled(
            format!("{spinner} "),
            Style::default().fg(Color::Magenta),
        ));
    }
    spans.push(Span::raw(app.chat.status().to_string()));

    let used: usize = spans.iter().map(|s| s.content.width()).sum();
    let room = usize::from(area.width).saturating_sub(used);
    if room > KEY_HINTS.width() + 1 {
        spans.push(Span::styled(
            format!("{KEY_HINTS:>room$}"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_input(app: &AppState, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Ask about your document ");
    let inner = block.inner(area);

    let text = app.input.text();
    let before: String = text.chars().take(app.input.cursor()).collect();
    let cursor_col = before.width();
    // Scroll the field horizontally to keep the cursor visible.
    let visible_width = usize::from(inner.width.max(1)) - 1;
    let skip = cursor_col.saturating_sub(visible_width);
    let mut skipped = 0;
    let shown: String = text
        .chars()
        .skip_while(|c| {
            if skipped < skip {
                skipped += c.width().unwrap_or(0);
                true
            } else {
                false
            }
        })
        .collect();

    frame.render_widget(Paragraph::new(shown).block(block), area);
    let x = inner.x + (cursor_col - skip) as u16;
    frame.set_cursor_position((x.min(inner.right().saturating_sub(1)), inner.y));
}

#[cfg(test)]
mod tests {
    use aura_core::reveal::Renderer;
    use aura_core::session::ChatState;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use super::*;

    fn app() -> AppState {
        AppState::new(ChatState::new(Renderer::default()))
    }

    fn screen(app: &AppState, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn test_visible_lines_are_bottom_aligned() {
        let mut app = app();
        app.chat.notice("hello");
        let lines = visible_lines(&app, 40, 5);
        assert_eq!(lines.len(), 5);
        assert!(lines[..3].iter().all(StyledLine::is_blank));
        assert_eq!(lines[3].text(), "AURA");
        assert_eq!(lines[4].text(), "hello");
    }

    #[test]
    fn test_scrolled_view_shows_earlier_lines() {
        let mut app = app();
        for i in 0..10 {
            app.chat.notice(&format!("note {i}"));
        }
        app.scroll.scroll_up(3);
        let lines = visible_lines(&app, 40, 4);
        let last = lines.last().unwrap().text();
        assert_eq!(last, "note 8");
    }

    #[test]
    fn test_screen_shows_badge_status_and_transcript() {
        let mut app = app();
        app.chat.notice("Welcome **aboard**");
        app.chat.set_file_id("doc-1");
        let screen = screen(&app, 60, 12);
        assert!(screen.contains("KB: loaded"));
        assert!(screen.contains("file: doc-1"));
        assert!(screen.contains("Welcome aboard"));
        assert!(screen.contains("Ready"));
        assert!(screen.contains("Ask about your document"));
    }
}
