//! Markdown → fragment rendering.
//!
//! Raw HTML in the source is kept as literal text so it is escaped on output,
//! and links with script-capable schemes lose their target.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag as MdTag, TagEnd};

use crate::fragment::{Fragment, Node, Tag};

/// Text → sanitized structured fragment.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, source: &str) -> Fragment;
}

/// CommonMark renderer with tables, strikethrough and task lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonMark;

impl MarkdownRenderer for CommonMark {
    fn render(&self, source: &str) -> Fragment {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let mut builder = FragmentBuilder::default();
        for event in Parser::new_ext(source, options) {
            builder.process_event(event);
        }
        builder.finish()
    }
}

const BLOCKED_SCHEMES: &[&str] = &["javascript:", "vbscript:", "data:"];

fn sanitize_href(dest: &str) -> Option<String> {
    let normalized: String = dest
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    if BLOCKED_SCHEMES.iter().any(|s| normalized.starts_with(s)) {
        None
    } else {
        Some(dest.to_string())
    }
}

struct Frame {
    /// `None` for containers we do not model; their children are spliced
    /// into the parent.
    tag: Option<Tag>,
    children: Vec<Node>,
}

struct ImageState {
    src: String,
    title: String,
    alt: String,
    depth: usize,
}

#[derive(Default)]
struct FragmentBuilder {
    root: Vec<Node>,
    stack: Vec<Frame>,
    image: Option<ImageState>,
    in_table_head: bool,
}

impl FragmentBuilder {
    fn current(&mut self) -> &mut Vec<Node> {
        match self.stack.last_mut() {
            Some(frame) => &mut frame.children,
            None => &mut self.root,
        }
    }

    fn open(&mut self, tag: Option<Tag>) {
        self.stack.push(Frame {
            tag,
            children: Vec::new(),
        });
    }

    fn close(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        match frame.tag {
            Some(tag) => self.current().push(Node::element(tag, frame.children)),
            None => {
                for node in frame.children {
                    self.push_node(node);
                }
            }
        }
    }

    fn push_node(&mut self, node: Node) {
        match node {
            Node::Text(text) => self.push_text(&text),
            element => self.current().push(element),
        }
    }

    /// Appends text, merging with a preceding text sibling.
    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let children = self.current();
        if let Some(Node::Text(last)) = children.last_mut() {
            last.push_str(text);
        } else {
            children.push(Node::text(text));
        }
    }

    fn push_void(&mut self, tag: Tag) {
        self.current().push(Node::element(tag, Vec::new()));
    }

    fn process_event(&mut self, event: Event) {
        if let Some(image) = self.image.as_mut() {
            match event {
                Event::Start(_) => image.depth += 1,
                Event::End(_) if image.depth > 0 => image.depth -= 1,
                Event::End(_) => {
                    if let Some(image) = self.image.take() {
                        self.push_void(Tag::Image {
                            src: image.src,
                            alt: image.alt,
                            title: image.title,
                        });
                    }
                }
                Event::Text(text) | Event::Code(text) => image.alt.push_str(&text),
                _ => {}
            }
            return;
        }

        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => {
                self.push_text(&text);
            }
            Event::Code(code) => {
                self.current()
                    .push(Node::element(Tag::Code, vec![Node::text(code.as_ref())]));
            }
            Event::InlineMath(tex) => self.push_text(&format!("${tex}$")),
            Event::DisplayMath(tex) => self.push_text(&format!("$${tex}$$")),
            Event::FootnoteReference(name) => self.push_text(&format!("[^{name}]")),
            Event::SoftBreak => self.push_text("\n"),
            Event::HardBreak => self.push_void(Tag::LineBreak),
            Event::Rule => self.push_void(Tag::Rule),
            Event::TaskListMarker(checked) => self.push_void(Tag::TaskMarker { checked }),
        }
    }

    fn start_tag(&mut self, tag: MdTag) {
        match tag {
            MdTag::Paragraph | MdTag::HtmlBlock => self.open(Some(Tag::Paragraph)),
            MdTag::Heading { level, .. } => self.open(Some(Tag::Heading(level as u8))),
            MdTag::BlockQuote(_) => self.open(Some(Tag::BlockQuote)),
            MdTag::CodeBlock(kind) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .filter(|lang| !lang.is_empty())
                        .map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                self.open(Some(Tag::CodeBlock { lang }));
            }
            MdTag::List(start) => self.open(Some(Tag::List { start })),
            MdTag::Item => self.open(Some(Tag::Item)),
            MdTag::Emphasis => self.open(Some(Tag::Emphasis)),
            MdTag::Strong => self.open(Some(Tag::Strong)),
            MdTag::Strikethrough => self.open(Some(Tag::Strikethrough)),
            MdTag::Link {
                dest_url, title, ..
            } => self.open(Some(Tag::Link {
                href: sanitize_href(&dest_url),
                title: title.to_string(),
            })),
            MdTag::Image {
                dest_url, title, ..
            } => {
                self.image = Some(ImageState {
                    src: sanitize_href(&dest_url).unwrap_or_default(),
                    title: title.to_string(),
                    alt: String::new(),
                    depth: 0,
                });
            }
            MdTag::Table(_) => self.open(Some(Tag::Table)),
            MdTag::TableHead => {
                self.in_table_head = true;
                self.open(Some(Tag::TableHead));
                self.open(Some(Tag::TableRow));
            }
            MdTag::TableRow => self.open(Some(Tag::TableRow)),
            MdTag::TableCell => self.open(Some(Tag::TableCell {
                header: self.in_table_head,
            })),
            MdTag::FootnoteDefinition(_)
            | MdTag::MetadataBlock(_)
            | MdTag::DefinitionList
            | MdTag::DefinitionListTitle
            | MdTag::DefinitionListDefinition
            | MdTag::Superscript
            | MdTag::Subscript => self.open(None),
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        if matches!(tag, TagEnd::TableHead) {
            self.in_table_head = false;
            // Synthetic row inside the head.
            self.close();
        }
        self.close();
    }

    fn finish(mut self) -> Fragment {
        while !self.stack.is_empty() {
            self.close();
        }
        Fragment::from_nodes(self.root)
    }
}
