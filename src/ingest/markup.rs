//! Intermediate markup to document tree
//!
//! The converter emits Markdown with inline HTML allowed. Signature
//! placeholders arrive as a recognized HTML tag
//! (`<signature-field role="tenant" label="...">`); everything else maps
//! to content nodes, with raw HTML passing through untouched.

use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use serde_json::{json, Map, Value};

use crate::document::{ContentNode, DocumentNode, DocumentTree, SignatureNode};
use crate::types::{CovenantError, Result};

/// Markup-construct to node-type mapping, passed to the pipeline at
/// construction. One instance per deployment; nothing here is global.
#[derive(Debug, Clone)]
pub struct MarkupTypeMap {
    pub document: String,
    pub heading: String,
    pub paragraph: String,
    pub list: String,
    pub list_item: String,
    pub text: String,
    pub image: String,
    pub divider: String,
    pub html: String,
    /// HTML tag name recognized as a signature placeholder
    pub signature_tag: String,
}

impl Default for MarkupTypeMap {
    fn default() -> Self {
        Self {
            document: "doc".to_string(),
            heading: "heading".to_string(),
            paragraph: "paragraph".to_string(),
            list: "list".to_string(),
            list_item: "list_item".to_string(),
            text: "text".to_string(),
            image: "image".to_string(),
            divider: "divider".to_string(),
            html: "html".to_string(),
            signature_tag: "signature-field".to_string(),
        }
    }
}

/// An open container while the event stream is being folded into a tree.
struct Frame {
    node_type: String,
    attrs: Map<String, Value>,
    children: Vec<DocumentNode>,
}

impl Frame {
    fn new(node_type: &str) -> Self {
        Frame {
            node_type: node_type.to_string(),
            attrs: Map::new(),
            children: Vec::new(),
        }
    }

    fn with_attr(node_type: &str, key: &str, value: Value) -> Self {
        let mut frame = Frame::new(node_type);
        frame.attrs.insert(key.to_string(), value);
        frame
    }
}

/// Parse converter markup into a canonical tree.
///
/// Headings, paragraphs, lists, and images become containers; inline
/// formatting (emphasis, links) is flattened to its text. Fails only on
/// empty markup; unrecognized constructs degrade to text or raw HTML
/// rather than erroring.
pub fn parse_markup(markup: &str, map: &MarkupTypeMap) -> Result<DocumentTree> {
    if markup.trim().is_empty() {
        return Err(CovenantError::Parse(
            "converter returned empty markup".to_string(),
        ));
    }

    let mut stack: Vec<Frame> = vec![Frame::new(&map.document)];

    for event in Parser::new(markup) {
        match event {
            Event::Start(Tag::Paragraph) => stack.push(Frame::new(&map.paragraph)),
            Event::Start(Tag::Heading { level, .. }) => stack.push(Frame::with_attr(
                &map.heading,
                "level",
                json!(heading_level(level)),
            )),
            Event::Start(Tag::List(ordered)) => stack.push(Frame::with_attr(
                &map.list,
                "ordered",
                json!(ordered.is_some()),
            )),
            Event::Start(Tag::Item) => stack.push(Frame::new(&map.list_item)),
            Event::Start(Tag::Image { dest_url, .. }) => stack.push(Frame::with_attr(
                &map.image,
                "url",
                json!(dest_url.to_string()),
            )),

            Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::Heading(_))
            | Event::End(TagEnd::List(_))
            | Event::End(TagEnd::Item)
            | Event::End(TagEnd::Image) => close_frame(&mut stack),

            Event::Text(text) => push_text(&mut stack, map, &text),
            Event::Code(code) => push_text(&mut stack, map, &code),
            Event::SoftBreak => push_text(&mut stack, map, " "),
            Event::HardBreak => push_text(&mut stack, map, "\n"),

            Event::Rule => push_node(
                &mut stack,
                DocumentNode::Content(ContentNode {
                    node_type: map.divider.clone(),
                    attrs: Map::new(),
                    children: Vec::new(),
                }),
            ),

            Event::Html(html) | Event::InlineHtml(html) => {
                push_html(&mut stack, map, &html);
            }

            // Inline formatting and any future constructs flatten: their
            // text children land in the enclosing frame.
            _ => {}
        }
    }

    while stack.len() > 1 {
        close_frame(&mut stack);
    }
    let root = stack.pop().ok_or_else(|| {
        CovenantError::Parse("markup produced no document".to_string())
    })?;

    Ok(DocumentTree::new(DocumentNode::Content(ContentNode {
        node_type: root.node_type,
        attrs: root.attrs,
        children: root.children,
    })))
}

fn heading_level(level: HeadingLevel) -> u64 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn close_frame(stack: &mut Vec<Frame>) {
    if stack.len() < 2 {
        return;
    }
    if let Some(frame) = stack.pop() {
        let node = DocumentNode::Content(ContentNode {
            node_type: frame.node_type,
            attrs: frame.attrs,
            children: frame.children,
        });
        push_node(stack, node);
    }
}

fn push_node(stack: &mut [Frame], node: DocumentNode) {
    if let Some(top) = stack.last_mut() {
        top.children.push(node);
    }
}

fn push_text(stack: &mut [Frame], map: &MarkupTypeMap, text: &str) {
    if text.is_empty() {
        return;
    }
    push_node(
        stack,
        DocumentNode::Content(ContentNode {
            node_type: map.text.clone(),
            attrs: {
                let mut attrs = Map::new();
                attrs.insert("text".to_string(), json!(text));
                attrs
            },
            children: Vec::new(),
        }),
    );
}

fn push_html(stack: &mut [Frame], map: &MarkupTypeMap, html: &str) {
    let trimmed = html.trim();
    if trimmed.is_empty() {
        return;
    }
    // Closing placeholder tags carry no content of their own
    if trimmed.starts_with(&format!("</{}", map.signature_tag)) {
        return;
    }
    if let Some(node) = signature_placeholder(trimmed, &map.signature_tag) {
        push_node(stack, DocumentNode::Signature(node));
        return;
    }
    push_node(
        stack,
        DocumentNode::Content(ContentNode {
            node_type: map.html.clone(),
            attrs: {
                let mut attrs = Map::new();
                attrs.insert("html".to_string(), json!(trimmed));
                attrs
            },
            children: Vec::new(),
        }),
    );
}

/// Recognize `<signature-field role="..." [label="..."]>` in raw HTML.
/// A tag without a role is not a placeholder and passes through as HTML.
fn signature_placeholder(tag: &str, tag_name: &str) -> Option<SignatureNode> {
    let open = format!("<{tag_name}");
    if !tag.starts_with(&open) {
        return None;
    }
    match tag[open.len()..].chars().next() {
        Some(' ') | Some('\t') | Some('\n') | Some('>') | Some('/') => {}
        _ => return None,
    }
    let role = attr_value(tag, "role")?;
    Some(SignatureNode {
        role,
        label: attr_value(tag, "label"),
        signature_url: None,
        signed_by_name: None,
        signed_at: None,
        children: Vec::new(),
    })
}

/// Scan `name="value"` (or single-quoted) out of a raw tag. A match
/// counts only on an attribute boundary, so `data-role=` is not `role=`.
fn attr_value(tag: &str, name: &str) -> Option<String> {
    let needle = format!("{name}=");
    let mut from = 0;
    while let Some(pos) = tag[from..].find(&needle) {
        let at = from + pos;
        let on_boundary = tag[..at]
            .chars()
            .next_back()
            .map_or(false, |c| c.is_ascii_whitespace());
        if !on_boundary {
            from = at + needle.len();
            continue;
        }
        let rest = &tag[at + needle.len()..];
        let quote = rest.chars().next()?;
        if quote != '"' && quote != '\'' {
            return None;
        }
        let inner = &rest[1..];
        let end = inner.find(quote)?;
        return Some(inner[..end].to_string());
    }
    None
}
