//! Flattening fragments into reveal chunks and applying them back.
//!
//! Flattening walks the fragment depth-first and records, for every element,
//! an `Open` chunk at its path and, for every text node, one or more `Text`
//! chunks at the text node's path. Applying the chunks in order to an empty
//! fragment rebuilds the original tree.

use std::error::Error;
use std::fmt;

use rand::Rng;
use unicode_segmentation::UnicodeSegmentation;

use crate::fragment::{Cursor, Fragment, Node, NodePath, Tag};

/// One atomic reveal step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Create an (empty) element at `path`.
    Open { path: NodePath, tag: Tag },
    /// Append `text` to the text node at `path`, creating it if needed.
    Text { path: NodePath, text: String },
}

impl Chunk {
    pub fn path(&self) -> &[usize] {
        match self {
            Chunk::Open { path, .. } | Chunk::Text { path, .. } => path,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Chunk::Text { text, .. } => Some(text),
            Chunk::Open { .. } => None,
        }
    }
}

/// How text nodes are cut into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkPolicy {
    /// One grapheme cluster per chunk.
    #[default]
    PerGrapheme,
    /// Random-sized bursts of `min..=max` graphemes.
    Burst { min: usize, max: usize },
}

impl ChunkPolicy {
    fn burst_len<R: Rng + ?Sized>(self, rng: &mut R) -> usize {
        match self {
            ChunkPolicy::PerGrapheme => 1,
            ChunkPolicy::Burst { min, max } => {
                let min = min.max(1);
                let max = max.max(min);
                rng.random_range(min..=max)
            }
        }
    }
}

/// Flattens a fragment using the thread-local RNG for burst sizes.
pub fn flatten(fragment: &Fragment, policy: ChunkPolicy) -> Vec<Chunk> {
    flatten_with(fragment, policy, &mut rand::rng())
}

/// Flattens a fragment with a caller-supplied RNG.
pub fn flatten_with<R: Rng + ?Sized>(
    fragment: &Fragment,
    policy: ChunkPolicy,
    rng: &mut R,
) -> Vec<Chunk> {
    let mut out = Vec::new();
    let mut path = Vec::new();
    walk(&fragment.nodes, &mut path, policy, rng, &mut out);
    out
}

fn walk<R: Rng + ?Sized>(
    nodes: &[Node],
    path: &mut NodePath,
    policy: ChunkPolicy,
    rng: &mut R,
    out: &mut Vec<Chunk>,
) {
    for (index, node) in nodes.iter().enumerate() {
        path.push(index);
        match node {
            Node::Element { tag, children } => {
                out.push(Chunk::Open {
                    path: path.clone(),
                    tag: tag.clone(),
                });
                walk(children, path, policy, rng, out);
            }
            Node::Text(text) if text.is_empty() => out.push(Chunk::Text {
                path: path.clone(),
                text: String::new(),
            }),
            Node::Text(text) => {
                let graphemes: Vec<&str> = text.graphemes(true).collect();
                let mut start = 0;
                while start < graphemes.len() {
                    let end = (start + policy.burst_len(rng)).min(graphemes.len());
                    out.push(Chunk::Text {
                        path: path.clone(),
                        text: graphemes[start..end].concat(),
                    });
                    start = end;
                }
            }
        }
        path.pop();
    }
}

/// A chunk path that does not fit the tree it is applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyError {
    pub path: NodePath,
    pub reason: &'static str,
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot apply chunk at {:?}: {}", self.path, self.reason)
    }
}

impl Error for ApplyError {}

/// Applies one chunk, returning the insertion point after it.
///
/// # Errors
/// Returns an error if the parent path does not exist or the index is not the
/// next append position.
pub fn apply_chunk(fragment: &mut Fragment, chunk: &Chunk) -> Result<Cursor, ApplyError> {
    let fail = |reason| ApplyError {
        path: chunk.path().to_vec(),
        reason,
    };
    let Some((&index, parent)) = chunk.path().split_last() else {
        return Err(fail("empty path"));
    };
    let children = fragment
        .children_at_mut(parent)
        .ok_or_else(|| fail("parent is missing or not an element"))?;

    match chunk {
        Chunk::Open { path, tag } => {
            if index != children.len() {
                return Err(fail("element is not the next child"));
            }
            children.push(Node::element(tag.clone(), Vec::new()));
            Ok(if tag.is_void() {
                Cursor {
                    parent: parent.to_vec(),
                    index: index + 1,
                }
            } else {
                Cursor {
                    parent: path.clone(),
                    index: 0,
                }
            })
        }
        Chunk::Text { text, .. } => {
            if index == children.len() {
                children.push(Node::text(text.as_str()));
            } else if index + 1 == children.len()
                && let Some(Node::Text(existing)) = children.last_mut()
            {
                existing.push_str(text);
            } else {
                return Err(fail("text is not at the append position"));
            }
            Ok(Cursor {
                parent: parent.to_vec(),
                index: index + 1,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::markdown::{CommonMark, MarkdownRenderer};

    const SAMPLES: &[&str] = &[
        "Hello **world**",
        "# Title\n\nSome *nested **strong** text* here.\n\n- a\n- b\n  - c",
        "```python\nprint('hi')\n```\n\n> quoted `code`\n\n---\n\n1. one\n2. two",
        "| h1 | h2 |\n|----|----|\n| x  | y  |\n\n- [x] done\n- [ ] todo",
        "line one  \nline two with ![img](a.png) and [link](https://x.y \"t\")",
        "emoji 👩‍👩‍👧 and é",
    ];

    fn rebuild(chunks: &[Chunk]) -> Fragment {
        let mut fragment = Fragment::new();
        for chunk in chunks {
            apply_chunk(&mut fragment, chunk).unwrap();
        }
        fragment
    }

    #[test]
    fn test_per_grapheme_round_trip() {
        for source in SAMPLES {
            let fragment = CommonMark.render(source);
            let chunks = flatten(&fragment, ChunkPolicy::PerGrapheme);
            assert_eq!(rebuild(&chunks).to_html(), fragment.to_html(), "{source}");
        }
    }

    #[test]
    fn test_burst_round_trip() {
        let mut rng = StdRng::seed_from_u64(7);
        let policy = ChunkPolicy::Burst { min: 2, max: 6 };
        for source in SAMPLES {
            let fragment = CommonMark.render(source);
            let chunks = flatten_with(&fragment, policy, &mut rng);
            assert_eq!(rebuild(&chunks), fragment, "{source}");
        }
    }

    #[test]
    fn test_per_grapheme_keeps_clusters_whole() {
        let fragment = Fragment::plain("a👩‍👩‍👧b");
        let texts: Vec<String> = flatten(&fragment, ChunkPolicy::PerGrapheme)
            .iter()
            .filter_map(|c| c.text().map(str::to_string))
            .collect();
        assert_eq!(texts, vec!["a", "👩‍👩‍👧", "b"]);
    }

    #[test]
    fn test_burst_sizes_within_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let fragment = Fragment::plain(&"x".repeat(200));
        let chunks = flatten_with(&fragment, ChunkPolicy::Burst { min: 3, max: 5 }, &mut rng);
        let (last, rest) = chunks.split_last().unwrap();
        for chunk in rest {
            let len = chunk.text().unwrap().len();
            assert!((3..=5).contains(&len), "burst of {len}");
        }
        assert!(last.text().unwrap().len() <= 5);
    }

    #[test]
    fn test_open_precedes_children() {
        let fragment = CommonMark.render("Hello **world**");
        let chunks = flatten(&fragment, ChunkPolicy::PerGrapheme);
        assert_eq!(
            chunks[0],
            Chunk::Open {
                path: vec![0],
                tag: Tag::Paragraph
            }
        );
        let strong = chunks
            .iter()
            .position(|c| matches!(c, Chunk::Open { tag: Tag::Strong, .. }))
            .unwrap();
        assert_eq!(chunks[strong].path(), &[0, 1]);
        assert_eq!(chunks[strong + 1].path(), &[0, 1, 0]);
    }

    #[test]
    fn test_apply_rejects_out_of_order_chunk() {
        let mut fragment = Fragment::new();
        let err = apply_chunk(
            &mut fragment,
            &Chunk::Text {
                path: vec![1],
                text: "x".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err.path, vec![1]);
    }

    #[test]
    fn test_apply_returns_insertion_point() {
        let mut fragment = Fragment::new();
        let cursor = apply_chunk(
            &mut fragment,
            &Chunk::Open {
                path: vec![0],
                tag: Tag::Paragraph,
            },
        )
        .unwrap();
        assert_eq!(
            cursor,
            Cursor {
                parent: vec![0],
                index: 0
            }
        );
        let cursor = apply_chunk(
            &mut fragment,
            &Chunk::Text {
                path: vec![0, 0],
                text: "hi".into(),
            },
        )
        .unwrap();
        assert_eq!(
            cursor,
            Cursor {
                parent: vec![0],
                index: 1
            }
        );
    }
}
