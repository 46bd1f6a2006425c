use std::mem;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::style::{StyledLine, StyledSpan};

/// Options for wrapping styled spans with hanging indents.
#[derive(Debug, Clone, Default)]
pub struct WrapOptions {
    /// Maximum display width, prefixes included.
    pub width: usize,
    /// Prefix for the first line (e.g. a list bullet).
    pub first_prefix: Vec<StyledSpan>,
    /// Prefix for continuation lines.
    pub rest_prefix: Vec<StyledSpan>,
}

impl WrapOptions {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            ..Self::default()
        }
    }
}

fn spans_width(spans: &[StyledSpan]) -> usize {
    spans.iter().map(|s| s.text.width()).sum()
}

struct Wrapper<'a> {
    opts: &'a WrapOptions,
    lines: Vec<StyledLine>,
    current: Vec<StyledSpan>,
    current_width: usize,
}

impl Wrapper<'_> {
    fn avail(&self) -> usize {
        let opts = self.opts;
        let prefix = if self.lines.is_empty() {
            &opts.first_prefix
        } else {
            &opts.rest_prefix
        };
        opts.width.saturating_sub(spans_width(prefix)).max(1)
    }

    fn flush(&mut self) {
        let opts = self.opts;
        let prefix = if self.lines.is_empty() {
            &opts.first_prefix
        } else {
            &opts.rest_prefix
        };
        while let Some(last) = self.current.last_mut() {
            let trimmed = last.text.trim_end().len();
            last.text.truncate(trimmed);
            if !last.text.is_empty() {
                break;
            }
            self.current.pop();
        }
        let mut spans = prefix.clone();
        spans.append(&mut self.current);
        self.lines.push(StyledLine::from_spans(spans));
        self.current_width = 0;
    }

    fn push(&mut self, text: &str, span: &StyledSpan) {
        if let Some(last) = self.current.last_mut()
            && last.style == span.style
        {
            last.text.push_str(text);
        } else {
            self.current.push(StyledSpan::new(text, span.style));
        }
        self.current_width += text.width();
    }

    fn place_word(&mut self, word: &str, span: &StyledSpan) {
        let width = word.width();
        if self.current_width + width <= self.avail() {
            self.push(word, span);
            return;
        }
        if self.current_width > 0 {
            self.flush();
        }
        if width <= self.avail() {
            self.push(word, span);
            return;
        }
        // Longer than a whole line: break by character.
        let mut part = String::new();
        let mut part_width = 0;
        for ch in word.chars() {
            let ch_width = ch.width().unwrap_or(0);
            if part_width + ch_width > self.avail() && !part.is_empty() {
                self.push(&mem::take(&mut part), span);
                self.flush();
                part_width = 0;
            }
            part.push(ch);
            part_width += ch_width;
        }
        if !part.is_empty() {
            self.push(&part, span);
        }
    }

    fn place_space(&mut self, space: &str, span: &StyledSpan) {
        // Spaces at a wrap point are dropped.
        if self.current_width == 0 && !self.lines.is_empty() {
            return;
        }
        if self.current_width + space.width() > self.avail() {
            self.flush();
            return;
        }
        self.push(space, span);
    }

    fn place(&mut self, text: &str, span: &StyledSpan) {
        let mut token = String::new();
        let mut in_space = false;
        for ch in text.chars() {
            let is_space = ch.is_whitespace();
            if is_space != in_space && !token.is_empty() {
                let token = mem::take(&mut token);
                if in_space {
                    self.place_space(&token, span);
                } else {
                    self.place_word(&token, span);
                }
            }
            in_space = is_space;
            token.push(ch);
        }
        if !token.is_empty() {
            if in_space {
                self.place_space(&token, span);
            } else {
                self.place_word(&token, span);
            }
        }
    }
}

/// Wraps styled spans at word boundaries, honoring `\n` as a hard break.
///
/// Always returns at least one line.
pub fn wrap_styled_spans(spans: &[StyledSpan], opts: &WrapOptions) -> Vec<StyledLine> {
    let mut wrapper = Wrapper {
        opts,
        lines: Vec::new(),
        current: Vec::new(),
        current_width: 0,
    };

    for span in spans {
        for (i, part) in span.text.split('\n').enumerate() {
            if i > 0 {
                wrapper.flush();
            }
            if opts.width == 0 {
                wrapper.push(part, span);
            } else {
                wrapper.place(part, span);
            }
        }
    }
    if !wrapper.current.is_empty() || wrapper.lines.is_empty() {
        wrapper.flush();
    }
    wrapper.lines
}
