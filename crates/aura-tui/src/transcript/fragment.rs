//! Fragment to styled terminal lines.
//!
//! Walks the fragment tree the same way the HTML serializer does, so a
//! partially revealed target renders exactly the chunks applied so far. The
//! reveal cursor is drawn as a glyph at its insertion point.

use std::{mem, slice};

use comfy_table::{ContentArrangement, Table};
use unicode_width::UnicodeWidthStr;

use aura_core::fragment::{Cursor, Fragment, Node, Tag};

use super::style::{Style, StyledLine, StyledSpan};
use super::wrap::{WrapOptions, wrap_styled_spans};

/// Drawn where the next revealed character will appear.
pub const CURSOR_GLYPH: &str = "▌";

const RULE_MAX_WIDTH: usize = 40;

/// Renders `fragment` into lines at most `width` columns wide.
pub fn fragment_lines(
    fragment: &Fragment,
    cursor: Option<&Cursor>,
    base: Style,
    width: usize,
) -> Vec<StyledLine> {
    let mut builder = LineBuilder::new(width, base, cursor);
    let mut path = Vec::new();
    builder.walk(&fragment.nodes, &mut path);
    builder.finish()
}

#[derive(Debug)]
struct ListState {
    /// Next item number for ordered lists.
    next: Option<u64>,
    /// Display width of the current item's bullet.
    indent: usize,
}

struct LineBuilder<'a> {
    width: usize,
    base: Style,
    cursor: Option<&'a Cursor>,
    lines: Vec<StyledLine>,
    spans: Vec<StyledSpan>,
    styles: Vec<Style>,
    lists: Vec<ListState>,
    quote_depth: usize,
    /// Bullet waiting for the first line of its item.
    bullet: Option<String>,
    in_code: bool,
}

impl<'a> LineBuilder<'a> {
    fn new(width: usize, base: Style, cursor: Option<&'a Cursor>) -> Self {
        Self {
            width,
            base,
            cursor,
            lines: Vec::new(),
            spans: Vec::new(),
            styles: Vec::new(),
            lists: Vec::new(),
            quote_depth: 0,
            bullet: None,
            in_code: false,
        }
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or(self.base)
    }

    fn push(&mut self, text: &str, style: Style) {
        if text.is_empty() {
            return;
        }
        match self.spans.last_mut() {
            Some(last) if last.style == style => last.text.push_str(text),
            _ => self.spans.push(StyledSpan::new(text, style)),
        }
    }

    fn cursor_at(&mut self, path: &[usize], index: usize) {
        if let Some(cursor) = self.cursor
            && cursor.parent == path
            && cursor.index == index
        {
            self.push(CURSOR_GLYPH, Style::RevealCursor);
        }
    }

    fn cursor_within(&self, path: &[usize]) -> bool {
        self.cursor
            .is_some_and(|cursor| cursor.parent.starts_with(path))
    }

    fn prefixes(&mut self) -> (Vec<StyledSpan>, Vec<StyledSpan>) {
        let mut base = Vec::new();
        if self.quote_depth > 0 {
            base.push(StyledSpan::new(
                "│ ".repeat(self.quote_depth),
                Style::BlockQuote,
            ));
        }
        let outer: usize = self.lists.iter().map(|list| list.indent).sum();
        let mut rest = base.clone();
        if outer > 0 {
            rest.push(StyledSpan::new(" ".repeat(outer), Style::Plain));
        }
        let first = match self.bullet.take() {
            Some(bullet) => {
                let mut first = base;
                let before = outer.saturating_sub(bullet.width());
                if before > 0 {
                    first.push(StyledSpan::new(" ".repeat(before), Style::Plain));
                }
                first.push(StyledSpan::new(bullet, Style::ListBullet));
                first
            }
            None => rest.clone(),
        };
        (first, rest)
    }

    fn flush(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let spans = mem::take(&mut self.spans);
        let (first_prefix, rest_prefix) = self.prefixes();
        let opts = WrapOptions {
            width: if self.in_code { 0 } else { self.width },
            first_prefix,
            rest_prefix,
        };
        self.lines.extend(wrap_styled_spans(&spans, &opts));
    }

    /// Flushes and separates top-level blocks with a blank line.
    fn begin_block(&mut self) {
        self.flush();
        if self.lists.is_empty() && self.lines.last().is_some_and(|l| !l.is_blank()) {
            self.lines.push(StyledLine::empty());
        }
    }

    fn line(&mut self, text: impl Into<String>, style: Style) {
        let (mut spans, _) = self.prefixes();
        spans.push(StyledSpan::new(text, style));
        self.lines.push(StyledLine::from_spans(spans));
    }

    fn walk(&mut self, children: &[Node], path: &mut Vec<usize>) {
        for (i, node) in children.iter().enumerate() {
            self.cursor_at(path, i);
            path.push(i);
            self.visit(node, path);
            path.pop();
        }
        self.cursor_at(path, children.len());
    }

    fn visit(&mut self, node: &Node, path: &mut Vec<usize>) {
        let (tag, children) = match node {
            Node::Text(text) => {
                let style = if self.in_code {
                    Style::CodeBlock
                } else {
                    self.style()
                };
                self.push(text, style);
                return;
            }
            Node::Element { tag, children } => (tag, children),
        };

        match tag {
            Tag::Paragraph => {
                self.begin_block();
                self.walk(children, path);
                self.flush();
            }
            Tag::Heading(level) => {
                self.begin_block();
                self.push(&format!("{} ", "#".repeat(usize::from(*level))), Style::Heading);
                self.styled(Style::Heading, children, path);
                self.flush();
            }
            Tag::BlockQuote => {
                self.begin_block();
                self.quote_depth += 1;
                self.walk(children, path);
                self.flush();
                self.quote_depth -= 1;
            }
            Tag::CodeBlock { lang } => {
                self.begin_block();
                self.line(format!("```{}", lang.as_deref().unwrap_or("")), Style::CodeFence);
                self.in_code = true;
                self.walk(children, path);
                if let Some(last) = self.spans.last_mut()
                    && last.text.ends_with('\n')
                {
                    last.text.pop();
                }
                self.flush();
                self.in_code = false;
                self.line("```", Style::CodeFence);
            }
            Tag::List { start } => {
                self.begin_block();
                self.lists.push(ListState {
                    next: *start,
                    indent: 0,
                });
                self.walk(children, path);
                self.flush();
                self.lists.pop();
            }
            Tag::Item => {
                self.flush();
                let bullet = match self.lists.last_mut() {
                    Some(list) => {
                        let bullet = match list.next {
                            Some(n) => {
                                list.next = Some(n + 1);
                                format!("{n}. ")
                            }
                            None => "- ".to_string(),
                        };
                        list.indent = bullet.width();
                        bullet
                    }
                    None => "- ".to_string(),
                };
                self.bullet = Some(bullet);
                self.walk(children, path);
                self.flush();
                if self.bullet.is_some() {
                    self.line(String::new(), Style::Plain);
                }
            }
            Tag::Emphasis => self.styled(Style::Emphasis, children, path),
            Tag::Strong => self.styled(Style::Strong, children, path),
            Tag::Strikethrough => self.styled(Style::Strikethrough, children, path),
            Tag::Code => self.styled(Style::CodeInline, children, path),
            Tag::Link { href, .. } => {
                self.styled(Style::Link, children, path);
                if let Some(href) = href
                    && *href != plain_text(children)
                {
                    self.push(&format!(" ({href})"), Style::LinkUrl);
                }
            }
            Tag::Math { display: true } => {
                self.begin_block();
                self.styled(Style::Math, children, path);
                self.flush();
            }
            Tag::Math { display: false } => self.styled(Style::Math, children, path),
            Tag::Image { alt, .. } => self.push(&format!("[image: {alt}]"), Style::Link),
            Tag::Table => {
                self.begin_block();
                self.table(children, path);
            }
            Tag::Rule => {
                self.begin_block();
                self.line("─".repeat(self.width.clamp(1, RULE_MAX_WIDTH)), Style::Rule);
            }
            Tag::LineBreak => self.push("\n", self.style()),
            Tag::TaskMarker { checked } => {
                self.push(if *checked { "[x] " } else { "[ ] " }, Style::ListBullet);
            }
            Tag::TableHead | Tag::TableRow | Tag::TableCell { .. } => self.walk(children, path),
        }
    }

    fn styled(&mut self, style: Style, children: &[Node], path: &mut Vec<usize>) {
        self.styles.push(style);
        self.walk(children, path);
        self.styles.pop();
    }

    fn table(&mut self, sections: &[Node], path: &mut Vec<usize>) {
        let mut header = Vec::new();
        let mut rows = Vec::new();
        for (i, section) in sections.iter().enumerate() {
            let Node::Element { tag, children } = section else {
                continue;
            };
            path.push(i);
            match tag {
                Tag::TableHead => {
                    for (j, row) in children.iter().enumerate() {
                        path.push(j);
                        header = self.row_cells(row, path);
                        path.pop();
                    }
                }
                Tag::TableRow => rows.push(self.row_cells(section, path)),
                _ => {}
            }
            path.pop();
        }

        let mut table = Table::new();
        table.set_width(self.width.min(usize::from(u16::MAX)) as u16);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        if !header.is_empty() {
            table.set_header(&header);
        }
        for row in &rows {
            table.add_row(row);
        }
        for line in table.to_string().lines() {
            self.line(line, Style::Table);
        }
    }

    fn row_cells(&self, row: &Node, path: &mut Vec<usize>) -> Vec<String> {
        let Node::Element { children, .. } = row else {
            return Vec::new();
        };
        children
            .iter()
            .enumerate()
            .map(|(k, cell)| {
                path.push(k);
                let mut text = plain_text(slice::from_ref(cell));
                if self.cursor_within(path) {
                    text.push_str(CURSOR_GLYPH);
                }
                path.pop();
                text
            })
            .collect()
    }

    fn finish(mut self) -> Vec<StyledLine> {
        self.flush();
        while self.lines.last().is_some_and(StyledLine::is_blank) {
            self.lines.pop();
        }
        self.lines
    }
}

fn plain_text(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element {
                tag: Tag::Image { alt, .. },
                ..
            } => out.push_str(alt),
            Node::Element { children, .. } => out.push_str(&plain_text(children)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use aura_core::markdown::{CommonMark, MarkdownRenderer};

    use super::*;

    fn render(markdown: &str, width: usize) -> Vec<String> {
        let fragment = CommonMark.render(markdown);
        fragment_lines(&fragment, None, Style::Assistant, width)
            .iter()
            .map(StyledLine::text)
            .collect()
    }

    #[test]
    fn test_paragraphs_are_separated() {
        assert_eq!(render("One.\n\nTwo.", 40), ["One.", "", "Two."]);
    }

    #[test]
    fn test_inline_styles_map_to_spans() {
        let fragment = CommonMark.render("Hello **world**");
        let lines = fragment_lines(&fragment, None, Style::Assistant, 40);
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0].spans,
            [
                StyledSpan::new("Hello ", Style::Assistant),
                StyledSpan::new("world", Style::Strong),
            ]
        );
    }

    #[test]
    fn test_lists_get_bullets_and_numbers() {
        assert_eq!(render("- a\n- b", 40), ["- a", "- b"]);
        assert_eq!(render("3. x\n4. y", 40), ["3. x", "4. y"]);
        assert_eq!(render("- a\n  - b", 40), ["- a", "  - b"]);
    }

    #[test]
    fn test_code_block_keeps_lines_and_fences() {
        assert_eq!(
            render("```rust\nfn main() {}\nlet x = 1;\n```", 40),
            ["```rust", "fn main() {}", "let x = 1;", "```"]
        );
    }

    #[test]
    fn test_heading_quote_and_link() {
        assert_eq!(render("## Title", 40), ["## Title"]);
        assert_eq!(render("> quoted", 40), ["│ quoted"]);
        assert_eq!(
            render("[docs](https://example.com)", 60),
            ["docs (https://example.com)"]
        );
    }

    #[test]
    fn test_table_uses_box_drawing() {
        let lines = render("| a | b |\n|---|---|\n| 1 | 2 |", 40);
        assert!(lines.len() >= 3);
        assert!(lines.iter().any(|l| l.contains('a') && l.contains('b')));
        assert!(lines.iter().any(|l| l.contains('1') && l.contains('2')));
    }

    #[test]
    fn test_cursor_drawn_at_insertion_point() {
        let fragment = Fragment::from_nodes(vec![Node::element(
            Tag::Paragraph,
            vec![Node::text("Hel")],
        )]);
        let cursor = Cursor {
            parent: vec![0],
            index: 1,
        };
        let lines = fragment_lines(&fragment, Some(&cursor), Style::Assistant, 40);
        assert_eq!(lines[0].text(), format!("Hel{CURSOR_GLYPH}"));
        assert_eq!(lines[0].spans[1].style, Style::RevealCursor);
    }

    #[test]
    fn test_empty_fragment_renders_nothing() {
        assert!(fragment_lines(&Fragment::new(), None, Style::Assistant, 40).is_empty());
    }
}
