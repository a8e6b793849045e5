//! Canonical document tree model
//!
//! Every lease document, whatever format it arrived in, is stored and
//! exchanged as a single-rooted tree of typed nodes. Child order is
//! rendering order and is preserved through every read and transform.
//! Only the `signature` node type is interpreted by the signing workflow;
//! all other types pass through untouched so future content types never
//! break traversal.

use chrono::{DateTime, Utc};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::types::{CovenantError, Result};

/// Wire discriminant for signature placeholder nodes.
pub const SIGNATURE_NODE_TYPE: &str = "signature";

// ============================================================================
// Node types
// ============================================================================

/// A signature placeholder bound to a signer role.
///
/// A node is signed iff `signature_url` is present; the other evidence
/// fields are display data and do not affect signed-ness.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureNode {
    /// Role string as authored in the document (vocabulary casing varies;
    /// see `roles::SignerRole` for the canonical mapping).
    pub role: String,
    pub label: Option<String>,
    pub signature_url: Option<String>,
    pub signed_by_name: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
    pub children: Vec<DocumentNode>,
}

impl SignatureNode {
    pub fn is_signed(&self) -> bool {
        self.signature_url.is_some()
    }
}

/// Any non-signature node: content the signing workflow does not interpret.
///
/// Attributes other than `type` and `children` are carried verbatim so
/// unknown node types survive a parse/serialize round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentNode {
    pub node_type: String,
    pub attrs: Map<String, Value>,
    pub children: Vec<DocumentNode>,
}

/// One node of the canonical document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentNode {
    Signature(SignatureNode),
    Content(ContentNode),
}

impl DocumentNode {
    pub fn node_type(&self) -> &str {
        match self {
            DocumentNode::Signature(_) => SIGNATURE_NODE_TYPE,
            DocumentNode::Content(node) => &node.node_type,
        }
    }

    pub fn children(&self) -> &[DocumentNode] {
        match self {
            DocumentNode::Signature(node) => &node.children,
            DocumentNode::Content(node) => &node.children,
        }
    }

    /// Depth-first pre-order visit: this node first, then each child in
    /// list order.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a DocumentNode)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Mutable pre-order visit, same order as `walk`.
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut DocumentNode)) {
        f(self);
        let children = match self {
            DocumentNode::Signature(node) => &mut node.children,
            DocumentNode::Content(node) => &mut node.children,
        };
        for child in children {
            child.walk_mut(f);
        }
    }

    /// Parse a JSON value into a node. Returns `None` for values that are
    /// not an object with a string `type`; malformed entries inside a
    /// `children` array are skipped rather than failing the whole tree.
    pub fn from_value(value: &Value) -> Option<DocumentNode> {
        let obj = value.as_object()?;
        let node_type = obj.get("type")?.as_str()?;

        let children: Vec<DocumentNode> = obj
            .get("children")
            .and_then(|c| c.as_array())
            .map(|items| items.iter().filter_map(DocumentNode::from_value).collect())
            .unwrap_or_default();

        if node_type == SIGNATURE_NODE_TYPE {
            let get_str =
                |key: &str| obj.get(key).and_then(|v| v.as_str()).map(|s| s.to_string());
            // Unparseable timestamps degrade to "not recorded" instead of
            // failing the parse.
            let signed_at = obj
                .get("signedAt")
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));
            Some(DocumentNode::Signature(SignatureNode {
                role: get_str("role").unwrap_or_default(),
                label: get_str("label"),
                signature_url: get_str("signatureUrl"),
                signed_by_name: get_str("signedByName"),
                signed_at,
                children,
            }))
        } else {
            let attrs: Map<String, Value> = obj
                .iter()
                .filter(|(k, _)| k.as_str() != "type" && k.as_str() != "children")
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Some(DocumentNode::Content(ContentNode {
                node_type: node_type.to_string(),
                attrs,
                children,
            }))
        }
    }

    /// Render the node back to its wire JSON shape.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        match self {
            DocumentNode::Signature(node) => {
                obj.insert("type".into(), Value::String(SIGNATURE_NODE_TYPE.into()));
                obj.insert("role".into(), Value::String(node.role.clone()));
                if let Some(label) = &node.label {
                    obj.insert("label".into(), Value::String(label.clone()));
                }
                if let Some(url) = &node.signature_url {
                    obj.insert("signatureUrl".into(), Value::String(url.clone()));
                }
                if let Some(name) = &node.signed_by_name {
                    obj.insert("signedByName".into(), Value::String(name.clone()));
                }
                if let Some(at) = &node.signed_at {
                    obj.insert("signedAt".into(), Value::String(at.to_rfc3339()));
                }
                if !node.children.is_empty() {
                    obj.insert(
                        "children".into(),
                        Value::Array(node.children.iter().map(|c| c.to_value()).collect()),
                    );
                }
            }
            DocumentNode::Content(node) => {
                obj.insert("type".into(), Value::String(node.node_type.clone()));
                for (k, v) in &node.attrs {
                    obj.insert(k.clone(), v.clone());
                }
                if !node.children.is_empty() {
                    obj.insert(
                        "children".into(),
                        Value::Array(node.children.iter().map(|c| c.to_value()).collect()),
                    );
                }
            }
        }
        Value::Object(obj)
    }
}

// ============================================================================
// Tree
// ============================================================================

/// A complete document: exactly one root node.
///
/// `Clone` deep-clones; a cloned tree shares no structure with its source.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentTree {
    pub root: DocumentNode,
}

impl DocumentTree {
    pub fn new(root: DocumentNode) -> Self {
        DocumentTree { root }
    }

    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a DocumentNode)) {
        self.root.walk(f);
    }

    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut DocumentNode)) {
        self.root.walk_mut(f);
    }

    /// Total character count of text content, the stored size metric for
    /// an ingested document.
    pub fn text_length(&self) -> usize {
        let mut total = 0usize;
        self.walk(&mut |node| {
            if let DocumentNode::Content(content) = node {
                if let Some(text) = content.attrs.get("text").and_then(|v| v.as_str()) {
                    total += text.chars().count();
                }
            }
        });
        total
    }

    /// Serialize to the wire JSON string persisted by the storage layer.
    pub fn to_json(&self) -> String {
        self.root.to_value().to_string()
    }
}

/// Parse stored or incoming content into a tree.
///
/// This is the strict entry point used by ingestion and signing; the
/// walker wraps it with a lenient empty-result contract.
pub fn parse_tree(content: &str) -> Result<DocumentTree> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| CovenantError::Parse(format!("content is not valid JSON: {e}")))?;
    let root = DocumentNode::from_value(&value).ok_or_else(|| {
        CovenantError::Parse("root must be an object with a string `type`".to_string())
    })?;
    Ok(DocumentTree::new(root))
}

impl Serialize for DocumentNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DocumentNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        DocumentNode::from_value(&value)
            .ok_or_else(|| D::Error::custom("node must be an object with a string `type`"))
    }
}

impl Serialize for DocumentTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DocumentTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(DocumentTree::new(DocumentNode::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tree_json() -> String {
        json!({
            "type": "doc",
            "version": 2,
            "children": [
                {"type": "heading", "level": 1, "children": [
                    {"type": "text", "text": "Residential Lease"}
                ]},
                {"type": "paragraph", "children": [
                    {"type": "text", "text": "The parties agree as follows."}
                ]},
                {"type": "signature", "role": "tenant", "label": "Tenant"},
                {"type": "hologram", "spin": true, "children": [
                    {"type": "text", "text": "future node type"}
                ]}
            ]
        })
        .to_string()
    }

    #[test]
    fn test_parse_preserves_child_order() {
        let tree = parse_tree(&sample_tree_json()).unwrap();
        let mut types = Vec::new();
        tree.walk(&mut |node| types.push(node.node_type().to_string()));
        assert_eq!(
            types,
            vec![
                "doc",
                "heading",
                "text",
                "paragraph",
                "text",
                "signature",
                "hologram",
                "text"
            ]
        );
    }

    #[test]
    fn test_unknown_node_type_round_trips() {
        let tree = parse_tree(&sample_tree_json()).unwrap();
        let reparsed = parse_tree(&tree.to_json()).unwrap();
        assert_eq!(tree, reparsed);

        // The passthrough attrs survive untouched
        let mut found_spin = false;
        reparsed.walk(&mut |node| {
            if let DocumentNode::Content(c) = node {
                if c.node_type == "hologram" {
                    found_spin = c.attrs.get("spin") == Some(&json!(true));
                }
            }
        });
        assert!(found_spin);
    }

    #[test]
    fn test_clone_then_serialize_equals_serialize_then_clone() {
        let tree = parse_tree(&sample_tree_json()).unwrap();
        let cloned = tree.clone();
        assert_eq!(cloned.to_json(), tree.to_json());
        assert_eq!(parse_tree(&tree.to_json()).unwrap(), cloned);
    }

    #[test]
    fn test_clone_shares_no_structure() {
        let tree = parse_tree(&sample_tree_json()).unwrap();
        let mut cloned = tree.clone();
        cloned.walk_mut(&mut |node| {
            if let DocumentNode::Signature(sig) = node {
                sig.signature_url = Some("https://example.com/sig.png".into());
            }
        });
        // Source still unsigned
        let mut source_signed = false;
        tree.walk(&mut |node| {
            if let DocumentNode::Signature(sig) = node {
                source_signed = sig.is_signed();
            }
        });
        assert!(!source_signed);
    }

    #[test]
    fn test_signed_iff_signature_url_present() {
        let with_name_only = json!({
            "type": "signature", "role": "tenant", "signedByName": "Jane Doe"
        })
        .to_string();
        let tree = parse_tree(&with_name_only).unwrap();
        if let DocumentNode::Signature(sig) = &tree.root {
            assert!(!sig.is_signed());
        } else {
            panic!("expected signature node");
        }
    }

    #[test]
    fn test_malformed_children_entries_are_skipped() {
        let content = json!({
            "type": "doc",
            "children": [42, "nope", {"missing": "type"}, {"type": "text", "text": "kept"}]
        })
        .to_string();
        let tree = parse_tree(&content).unwrap();
        assert_eq!(tree.root.children().len(), 1);
        assert_eq!(tree.root.children()[0].node_type(), "text");
    }

    #[test]
    fn test_parse_rejects_non_object_root() {
        assert!(parse_tree("[1,2,3]").is_err());
        assert!(parse_tree("not json at all").is_err());
        assert!(parse_tree("{\"children\": []}").is_err());
    }

    #[test]
    fn test_text_length_counts_characters() {
        let content = json!({
            "type": "doc",
            "children": [
                {"type": "text", "text": "ab"},
                {"type": "paragraph", "children": [{"type": "text", "text": "cde"}]}
            ]
        })
        .to_string();
        let tree = parse_tree(&content).unwrap();
        assert_eq!(tree.text_length(), 5);
    }

    #[test]
    fn test_unparseable_signed_at_degrades_to_none() {
        let content = json!({
            "type": "signature", "role": "tenant", "signedAt": "last tuesday"
        })
        .to_string();
        let tree = parse_tree(&content).unwrap();
        if let DocumentNode::Signature(sig) = &tree.root {
            assert!(sig.signed_at.is_none());
        } else {
            panic!("expected signature node");
        }
    }
}
