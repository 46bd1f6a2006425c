//! Structured document fragments.
//!
//! A `Fragment` is the intermediate representation shared by the markdown
//! renderer, the reveal interpreter and the math typesetter: an ordered list
//! of element/text nodes with a canonical HTML serialization.

/// Child-index path from the fragment root to a node.
pub type NodePath = Vec<usize>;

/// Element kinds a fragment can contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    Paragraph,
    Heading(u8),
    BlockQuote,
    CodeBlock {
        lang: Option<String>,
    },
    /// `None` for unordered lists, `Some(n)` for ordered lists starting at n.
    List {
        start: Option<u64>,
    },
    Item,
    Emphasis,
    Strong,
    Strikethrough,
    Code,
    Link {
        href: Option<String>,
        title: String,
    },
    Image {
        src: String,
        alt: String,
        title: String,
    },
    Table,
    TableHead,
    TableRow,
    TableCell {
        header: bool,
    },
    Rule,
    LineBreak,
    TaskMarker {
        checked: bool,
    },
    Math {
        display: bool,
    },
}

impl Tag {
    /// Void elements never have children.
    pub fn is_void(&self) -> bool {
        matches!(
            self,
            Tag::Image { .. } | Tag::Rule | Tag::LineBreak | Tag::TaskMarker { .. }
        )
    }

    /// Block-level elements start on a fresh line in terminal output.
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            Tag::Paragraph
                | Tag::Heading(_)
                | Tag::BlockQuote
                | Tag::CodeBlock { .. }
                | Tag::List { .. }
                | Tag::Item
                | Tag::Table
                | Tag::TableHead
                | Tag::TableRow
                | Tag::Rule
        )
    }

    /// Elements whose text is literal source (never typeset or reflowed).
    pub fn is_literal(&self) -> bool {
        matches!(self, Tag::Code | Tag::CodeBlock { .. } | Tag::Math { .. })
    }

    fn write_open(&self, out: &mut String) {
        match self {
            Tag::Paragraph => out.push_str("<p>"),
            Tag::Heading(level) => {
                out.push_str("<h");
                out.push_str(&level.to_string());
                out.push('>');
            }
            Tag::BlockQuote => out.push_str("<blockquote>"),
            Tag::CodeBlock { lang: Some(lang) } => {
                out.push_str("<pre><code class=\"language-");
                escape_into(out, lang);
                out.push_str("\">");
            }
            Tag::CodeBlock { lang: None } => out.push_str("<pre><code>"),
            Tag::List { start: None } => out.push_str("<ul>"),
            Tag::List { start: Some(1) } => out.push_str("<ol>"),
            Tag::List { start: Some(n) } => {
                out.push_str("<ol start=\"");
                out.push_str(&n.to_string());
                out.push_str("\">");
            }
            Tag::Item => out.push_str("<li>"),
            Tag::Emphasis => out.push_str("<em>"),
            Tag::Strong => out.push_str("<strong>"),
            Tag::Strikethrough => out.push_str("<del>"),
            Tag::Code => out.push_str("<code>"),
            Tag::Link { href, title } => {
                out.push_str("<a");
                if let Some(href) = href {
                    push_attr(out, "href", href);
                }
                if !title.is_empty() {
                    push_attr(out, "title", title);
                }
                out.push('>');
            }
            Tag::Image { src, alt, title } => {
                out.push_str("<img");
                push_attr(out, "src", src);
                push_attr(out, "alt", alt);
                if !title.is_empty() {
                    push_attr(out, "title", title);
                }
                out.push_str(" />");
            }
            Tag::Table => out.push_str("<table>"),
            Tag::TableHead => out.push_str("<thead>"),
            Tag::TableRow => out.push_str("<tr>"),
            Tag::TableCell { header: true } => out.push_str("<th>"),
            Tag::TableCell { header: false } => out.push_str("<td>"),
            Tag::Rule => out.push_str("<hr />"),
            Tag::LineBreak => out.push_str("<br />"),
            Tag::TaskMarker { checked } => {
                out.push_str("<input type=\"checkbox\" disabled=\"\"");
                if *checked {
                    out.push_str(" checked=\"\"");
                }
                out.push_str(" />");
            }
            Tag::Math { display: true } => out.push_str("<span class=\"math display\">"),
            Tag::Math { display: false } => out.push_str("<span class=\"math inline\">"),
        }
    }

    fn write_close(&self, out: &mut String) {
        let close = match self {
            Tag::Paragraph => "</p>",
            Tag::Heading(level) => {
                out.push_str("</h");
                out.push_str(&level.to_string());
                out.push('>');
                return;
            }
            Tag::BlockQuote => "</blockquote>",
            Tag::CodeBlock { .. } => "</code></pre>",
            Tag::List { start: None } => "</ul>",
            Tag::List { start: Some(_) } => "</ol>",
            Tag::Item => "</li>",
            Tag::Emphasis => "</em>",
            Tag::Strong => "</strong>",
            Tag::Strikethrough => "</del>",
            Tag::Code => "</code>",
            Tag::Link { .. } => "</a>",
            Tag::Table => "</table>",
            Tag::TableHead => "</thead>",
            Tag::TableRow => "</tr>",
            Tag::TableCell { header: true } => "</th>",
            Tag::TableCell { header: false } => "</td>",
            Tag::Math { .. } => "</span>",
            Tag::Image { .. } | Tag::Rule | Tag::LineBreak | Tag::TaskMarker { .. } => "",
        };
        out.push_str(close);
    }
}

/// A fragment node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element { tag: Tag, children: Vec<Node> },
    Text(String),
}

impl Node {
    pub fn element(tag: Tag, children: Vec<Node>) -> Self {
        Node::Element { tag, children }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    fn write_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Element { tag, children } => {
                if let Tag::Image { alt, .. } = tag {
                    out.push_str(alt);
                }
                for child in children {
                    child.write_text(out);
                }
            }
        }
    }
}

/// Insertion point marker: rendered inside `parent` before child `index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub parent: NodePath,
    pub index: usize,
}

/// Markup emitted for the reveal cursor.
pub const CURSOR_MARKUP: &str = "<span class=\"reveal-cursor\"></span>";

/// Ordered list of top-level nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub nodes: Vec<Node>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// A fragment holding a single unformatted text node.
    pub fn plain(text: &str) -> Self {
        if text.is_empty() {
            return Self::new();
        }
        Self {
            nodes: vec![Node::text(text)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Canonical HTML serialization.
    pub fn to_html(&self) -> String {
        self.to_html_with_cursor(None)
    }

    /// HTML serialization with an optional cursor marker.
    pub fn to_html_with_cursor(&self, cursor: Option<&Cursor>) -> String {
        let mut out = String::new();
        let mut path = Vec::new();
        write_children(&self.nodes, &mut path, cursor, &mut out);
        out
    }

    /// Concatenated text of every node, without markup.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node.write_text(&mut out);
        }
        out
    }

    /// Children of the container at `path` (the root for an empty path).
    pub fn children_at(&self, path: &[usize]) -> Option<&Vec<Node>> {
        let mut children = &self.nodes;
        for &index in path {
            match children.get(index)? {
                Node::Element { children: next, .. } => children = next,
                Node::Text(_) => return None,
            }
        }
        Some(children)
    }

    pub fn children_at_mut(&mut self, path: &[usize]) -> Option<&mut Vec<Node>> {
        let mut children = &mut self.nodes;
        for &index in path {
            match children.get_mut(index)? {
                Node::Element { children: next, .. } => children = next,
                Node::Text(_) => return None,
            }
        }
        Some(children)
    }

    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let (last, parent) = path.split_last()?;
        self.children_at(parent)?.get(*last)
    }

    /// Tags of the elements enclosing the node at `path`, outermost first.
    pub fn ancestor_tags(&self, path: &[usize]) -> Vec<Tag> {
        let mut tags = Vec::new();
        let mut children = &self.nodes;
        for &index in path.iter().take(path.len().saturating_sub(1)) {
            match children.get(index) {
                Some(Node::Element { tag, children: next }) => {
                    tags.push(tag.clone());
                    children = next;
                }
                _ => break,
            }
        }
        tags
    }
}

fn write_children(
    nodes: &[Node],
    path: &mut NodePath,
    cursor: Option<&Cursor>,
    out: &mut String,
) {
    let cursor_here = cursor.filter(|c| c.parent == *path).map(|c| c.index);
    for (index, node) in nodes.iter().enumerate() {
        if cursor_here == Some(index) {
            out.push_str(CURSOR_MARKUP);
        }
        match node {
            Node::Text(text) => escape_into(out, text),
            Node::Element { tag, children } => {
                tag.write_open(out);
                if !tag.is_void() {
                    path.push(index);
                    write_children(children, path, cursor, out);
                    path.pop();
                    tag.write_close(out);
                }
            }
        }
    }
    if cursor_here == Some(nodes.len()) {
        out.push_str(CURSOR_MARKUP);
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    escape_into(out, value);
    out.push('"');
}

/// Escapes text for HTML element content and attribute values.
pub fn escape_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_into(&mut out, text);
    out
}
