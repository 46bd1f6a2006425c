use ratatui::style::{Color, Modifier, Style as TermStyle};
use ratatui::text::{Line, Span};

/// A styled span of text.
///
/// Kept free of ratatui types so line building can be tested as plain data;
/// converted with [`StyledLine::to_line`] at render time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledSpan {
    pub text: String,
    pub style: Style,
}

impl StyledSpan {
    pub fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

/// A line of styled spans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyledLine {
    pub spans: Vec<StyledSpan>,
}

impl StyledLine {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_spans(spans: Vec<StyledSpan>) -> Self {
        Self { spans }
    }

    pub fn plain(text: impl Into<String>, style: Style) -> Self {
        Self {
            spans: vec![StyledSpan::new(text, style)],
        }
    }

    pub fn is_blank(&self) -> bool {
        self.spans.iter().all(|s| s.text.trim().is_empty())
    }

    /// Concatenated text, for tests and width checks.
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn to_line(&self) -> Line<'static> {
        Line::from(
            self.spans
                .iter()
                .map(|s| Span::styled(s.text.clone(), s.style.to_ratatui()))
                .collect::<Vec<_>>(),
        )
    }
}

/// Semantic style identifiers, translated to terminal styles at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Plain,
    /// Role label above a user message.
    UserLabel,
    User,
    /// Role label above an assistant message.
    AssistantLabel,
    Assistant,
    /// Pending placeholder ("Processing…").
    Pending,
    Error,
    /// Server message attached under a notice.
    Annotation,
    RevealCursor,

    CodeInline,
    CodeBlock,
    CodeFence,
    Emphasis,
    Strong,
    Strikethrough,
    Heading,
    Link,
    LinkUrl,
    Math,
    BlockQuote,
    ListBullet,
    Rule,
    Table,
}

impl Style {
    pub fn to_ratatui(self) -> TermStyle {
        let base = TermStyle::default();
        match self {
            Style::Plain | Style::Assistant => base,
            Style::UserLabel => base.fg(Color::Cyan).add_modifier(Modifier::BOLD),
            Style::User => base.fg(Color::Cyan),
            Style::AssistantLabel => base.fg(Color::Magenta).add_modifier(Modifier::BOLD),
            Style::Pending => base.fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            Style::Error => base.fg(Color::Red),
            Style::Annotation => base.fg(Color::DarkGray),
            Style::RevealCursor => base.fg(Color::Magenta).add_modifier(Modifier::SLOW_BLINK),
            Style::CodeInline => base.fg(Color::Yellow),
            Style::CodeBlock => base.fg(Color::Green),
            Style::CodeFence | Style::Rule | Style::LinkUrl => base.fg(Color::DarkGray),
            Style::Emphasis => base.add_modifier(Modifier::ITALIC),
            Style::Strong => base.add_modifier(Modifier::BOLD),
            Style::Strikethrough => base.add_modifier(Modifier::CROSSED_OUT),
            Style::Heading => base.fg(Color::Magenta).add_modifier(Modifier::BOLD),
            Style::Link => base.fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
            Style::Math => base.fg(Color::LightBlue).add_modifier(Modifier::ITALIC),
            Style::BlockQuote => base.fg(Color::Gray).add_modifier(Modifier::ITALIC),
            Style::ListBullet => base.fg(Color::Magenta),
            Style::Table => base.fg(Color::Gray),
        }
    }
}
