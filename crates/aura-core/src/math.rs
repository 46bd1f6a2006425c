//! Math typesetting over rendered fragments.

use std::mem;

use crate::fragment::{Fragment, Node, Tag};

/// Scans a fragment and replaces delimited math spans with math nodes.
pub trait MathTypesetter: Send + Sync {
    /// Returns the number of spans typeset.
    fn typeset(&self, fragment: &mut Fragment) -> usize;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiter {
    pub left: String,
    pub right: String,
    pub display: bool,
}

impl Delimiter {
    pub fn new(left: &str, right: &str, display: bool) -> Self {
        Self {
            left: left.to_string(),
            right: right.to_string(),
            display,
        }
    }
}

/// Delimiter-based typesetter (`$$…$$` display, `$…$` inline by default).
///
/// Delimiters are tried in order at each position, so longer openers must
/// come first. Text inside code and existing math is left alone.
#[derive(Debug, Clone)]
pub struct DelimiterTypesetter {
    delimiters: Vec<Delimiter>,
}

impl Default for DelimiterTypesetter {
    fn default() -> Self {
        Self {
            delimiters: vec![Delimiter::new("$$", "$$", true), Delimiter::new("$", "$", false)],
        }
    }
}

impl DelimiterTypesetter {
    pub fn with_delimiters(delimiters: Vec<Delimiter>) -> Self {
        Self { delimiters }
    }

    fn typeset_nodes(&self, nodes: &mut Vec<Node>) -> usize {
        let mut count = 0;
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes.drain(..) {
            match node {
                Node::Text(text) => {
                    let (pieces, found) = self.split_text(&text);
                    count += found;
                    out.extend(pieces);
                }
                Node::Element { tag, mut children } => {
                    if !tag.is_literal() {
                        count += self.typeset_nodes(&mut children);
                    }
                    out.push(Node::Element { tag, children });
                }
            }
        }
        *nodes = out;
        count
    }

    fn split_text(&self, text: &str) -> (Vec<Node>, usize) {
        let mut nodes = Vec::new();
        let mut plain = String::new();
        let mut count = 0;
        let mut rest = text;

        'scan: while !rest.is_empty() {
            for delim in &self.delimiters {
                let Some(after_left) = rest.strip_prefix(delim.left.as_str()) else {
                    continue;
                };
                let Some(end) = after_left.find(delim.right.as_str()) else {
                    continue;
                };
                let tex = &after_left[..end];
                if tex.trim().is_empty() {
                    continue;
                }
                if !plain.is_empty() {
                    nodes.push(Node::Text(mem::take(&mut plain)));
                }
                nodes.push(Node::element(
                    Tag::Math {
                        display: delim.display,
                    },
                    vec![Node::text(tex)],
                ));
                count += 1;
                rest = &after_left[end + delim.right.len()..];
                continue 'scan;
            }

            let mut chars = rest.chars();
            if let Some(ch) = chars.next() {
                plain.push(ch);
            }
            rest = chars.as_str();
        }

        if !plain.is_empty() {
            nodes.push(Node::Text(plain));
        }
        (nodes, count)
    }
}

impl MathTypesetter for DelimiterTypesetter {
    fn typeset(&self, fragment: &mut Fragment) -> usize {
        self.typeset_nodes(&mut fragment.nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::{CommonMark, MarkdownRenderer};

    fn typeset(source: &str) -> (String, usize) {
        let mut fragment = CommonMark.render(source);
        let count = DelimiterTypesetter::default().typeset(&mut fragment);
        (fragment.to_html(), count)
    }

    #[test]
    fn test_inline_and_display_math() {
        let (html, count) = typeset("Energy $E=mc^2$ and $$\\int x dx$$ done");
        assert_eq!(count, 2);
        assert_eq!(
            html,
            "<p>Energy <span class=\"math inline\">E=mc^2</span> and \
             <span class=\"math display\">\\int x dx</span> done</p>"
        );
    }

    #[test]
    fn test_unmatched_delimiter_is_left_alone() {
        let (html, count) = typeset("costs $5 today");
        assert_eq!(count, 0);
        assert_eq!(html, "<p>costs $5 today</p>");
    }

    #[test]
    fn test_code_is_not_typeset() {
        let (html, count) = typeset("`$x$` and $y$");
        assert_eq!(count, 1);
        assert_eq!(
            html,
            "<p><code>$x$</code> and <span class=\"math inline\">y</span></p>"
        );
    }

    #[test]
    fn test_empty_math_is_ignored() {
        let (_, count) = typeset("$$ $$");
        assert_eq!(count, 0);
    }
}
