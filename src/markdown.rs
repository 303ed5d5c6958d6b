//! Markdown body to ordered content blocks.
//!
//! Only the constructs a lecture slide uses are kept apart (paragraphs, headings, list
//! items). Everything else is flattened into paragraph text, so parsing never fails.

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// Marker drawn in front of a list item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListMarker {
    Bullet,
    /// 1-based position within its list, offset by the list's start number.
    Ordered(u64),
    /// Text of an item that resumes after a nested list; indented like the item, no marker.
    Continuation,
}

/// One semantic unit of slide content, in document order.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentBlock {
    Paragraph { text: String },
    Heading { level: u8, text: String },
    ListItem { text: String, marker: ListMarker },
}

impl ContentBlock {
    pub fn text(&self) -> &str {
        match self {
            Self::Paragraph { text } | Self::Heading { text, .. } | Self::ListItem { text, .. } => {
                text
            }
        }
    }

    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            Self::ListItem {
                marker: ListMarker::Ordered(_),
                ..
            }
        )
    }
}

#[derive(Clone, Copy, Debug)]
enum PendingKind {
    Paragraph,
    Heading(u8),
    Item(ListMarker),
}

#[derive(Debug)]
struct Pending {
    kind: PendingKind,
    text: String,
}

#[derive(Debug)]
struct ListCtx {
    next_ordinal: Option<u64>,
}

#[derive(Debug, Default)]
struct BlockCollector {
    blocks: Vec<ContentBlock>,
    lists: Vec<ListCtx>,
    pending: Option<Pending>,
    /// Inside an item, paragraphs extend the item instead of starting new blocks.
    item_depth: usize,
}

impl BlockCollector {
    fn begin(&mut self, kind: PendingKind) {
        self.flush();
        self.pending = Some(Pending {
            kind,
            text: String::new(),
        });
    }

    fn push_text(&mut self, s: &str) {
        let kind = if self.item_depth > 0 {
            PendingKind::Item(ListMarker::Continuation)
        } else {
            PendingKind::Paragraph
        };
        let pending = self.pending.get_or_insert_with(|| Pending {
            kind,
            text: String::new(),
        });
        pending.text.push_str(s);
    }

    fn push_space(&mut self) {
        if let Some(p) = self.pending.as_mut() {
            p.text.push(' ');
        }
    }

    fn flush(&mut self) {
        let Some(p) = self.pending.take() else {
            return;
        };
        let text = collapse_whitespace(&p.text);
        if text.is_empty() {
            return;
        }
        self.blocks.push(match p.kind {
            PendingKind::Paragraph => ContentBlock::Paragraph { text },
            PendingKind::Heading(level) => ContentBlock::Heading { level, text },
            PendingKind::Item(marker) => ContentBlock::ListItem { text, marker },
        });
    }

    fn next_marker(&mut self) -> ListMarker {
        match self.lists.last_mut() {
            Some(ListCtx {
                next_ordinal: Some(n),
            }) => {
                let marker = ListMarker::Ordered(*n);
                *n += 1;
                marker
            }
            _ => ListMarker::Bullet,
        }
    }

    fn event(&mut self, ev: Event<'_>) {
        match ev {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(s) | Event::Code(s) | Event::InlineMath(s) | Event::DisplayMath(s) => {
                self.push_text(&s)
            }
            Event::Html(s) | Event::InlineHtml(s) => self.push_text(&s),
            Event::FootnoteReference(s) => {
                self.push_text("[");
                self.push_text(&s);
                self.push_text("]");
            }
            Event::SoftBreak | Event::HardBreak => self.push_space(),
            Event::TaskListMarker(done) => self.push_text(if done { "[x] " } else { "[ ] " }),
            Event::Rule => self.flush(),
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if self.item_depth > 0 && self.pending.is_some() {
                    self.push_space();
                } else if self.item_depth == 0 {
                    self.begin(PendingKind::Paragraph);
                }
            }
            Tag::Heading { level, .. } => self.begin(PendingKind::Heading(heading_level(level))),
            Tag::List(start) => {
                // Text collected so far belongs to the parent item.
                self.flush();
                self.lists.push(ListCtx {
                    next_ordinal: start,
                });
            }
            Tag::Item => {
                let marker = self.next_marker();
                self.begin(PendingKind::Item(marker));
                self.item_depth += 1;
            }
            Tag::CodeBlock(_) | Tag::HtmlBlock => {
                if self.item_depth == 0 {
                    self.begin(PendingKind::Paragraph);
                } else {
                    self.push_space();
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                if self.item_depth == 0 {
                    self.flush();
                }
            }
            TagEnd::Heading(_) => self.flush(),
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
            }
            TagEnd::Item => {
                self.flush();
                self.item_depth = self.item_depth.saturating_sub(1);
            }
            TagEnd::CodeBlock | TagEnd::HtmlBlock => {
                if self.item_depth == 0 {
                    self.flush();
                }
            }
            _ => {}
        }
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a slide body into content blocks.
pub fn parse_blocks(markdown: &str) -> Vec<ContentBlock> {
    let mut collector = BlockCollector::default();
    for ev in Parser::new_ext(markdown, Options::empty()) {
        collector.event(ev);
    }
    collector.flush();

    if collector.blocks.is_empty() {
        let text = collapse_whitespace(markdown);
        if !text.is_empty() {
            tracing::debug!("markdown produced no blocks; using the raw text as one paragraph");
            return vec![ContentBlock::Paragraph { text }];
        }
    }
    collector.blocks
}
