//! Read-only signature placeholder traversal
//!
//! Both operations here are best-effort by contract: missing or
//! unparseable content yields an empty list, never an error. Callers
//! treat "no signature information yet" and "content we cannot read"
//! identically, because these lists are advisory display data, not a
//! gate.

use serde::Serialize;

use super::node::{parse_tree, DocumentNode, DocumentTree};
use super::roles::SignerRole;

/// A witness placeholder found in a document, label defaulted when the
/// author left it off.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WitnessField {
    pub role: String,
    pub label: String,
}

/// Signed-ness of one signature placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignatureStatus {
    pub role: String,
    pub signed: bool,
}

/// Witness placeholders in stored content. `None` or content that fails
/// to parse returns an empty list.
pub fn collect_witness_nodes(content: Option<&str>) -> Vec<WitnessField> {
    match content.map(parse_tree) {
        Some(Ok(tree)) => witness_fields(&tree),
        _ => Vec::new(),
    }
}

/// Signed-status of every signature placeholder in stored content, any
/// role vocabulary. Same lenient contract as `collect_witness_nodes`.
pub fn collect_signature_statuses(content: Option<&str>) -> Vec<SignatureStatus> {
    match content.map(parse_tree) {
        Some(Ok(tree)) => signature_statuses(&tree),
        _ => Vec::new(),
    }
}

/// Tree-level witness collection. Role strings are echoed verbatim from
/// the document; only the label falls back to the canonical display name.
pub fn witness_fields(tree: &DocumentTree) -> Vec<WitnessField> {
    let mut fields = Vec::new();
    tree.walk(&mut |node| {
        if let DocumentNode::Signature(sig) = node {
            let Some(role) = SignerRole::parse(&sig.role) else {
                return;
            };
            if !role.is_witness() {
                return;
            }
            fields.push(WitnessField {
                role: sig.role.clone(),
                label: sig
                    .label
                    .clone()
                    .unwrap_or_else(|| role.display_label().to_string()),
            });
        }
    });
    fields
}

/// Tree-level status collection: every signature node, signed iff its
/// `signatureUrl` is present.
pub fn signature_statuses(tree: &DocumentTree) -> Vec<SignatureStatus> {
    let mut statuses = Vec::new();
    tree.walk(&mut |node| {
        if let DocumentNode::Signature(sig) = node {
            statuses.push(SignatureStatus {
                role: sig.role.clone(),
                signed: sig.is_signed(),
            });
        }
    });
    statuses
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_none_content_returns_empty() {
        assert!(collect_witness_nodes(None).is_empty());
        assert!(collect_signature_statuses(None).is_empty());
    }

    #[test]
    fn test_unparseable_content_returns_empty_without_raising() {
        assert!(collect_witness_nodes(Some("not valid content")).is_empty());
        assert!(collect_signature_statuses(Some("not valid content")).is_empty());
        assert!(collect_witness_nodes(Some("{\"no\": \"type\"}")).is_empty());
    }

    #[test]
    fn test_witness_label_defaults_to_display_name() {
        let content = json!({"type": "signature", "role": "tenant_witness"}).to_string();
        let fields = collect_witness_nodes(Some(content.as_str()));
        assert_eq!(
            fields,
            vec![WitnessField {
                role: "tenant_witness".to_string(),
                label: "Tenant Witness".to_string(),
            }]
        );
    }

    #[test]
    fn test_witness_collection_keeps_authored_labels_and_skips_principals() {
        let content = json!({
            "type": "doc",
            "children": [
                {"type": "signature", "role": "tenant"},
                {"type": "signature", "role": "Tenant Witness", "label": "First witness"},
                {"type": "signature", "role": "PROPERTY_MANAGER_WITNESS"},
                {"type": "signature", "role": "notary"}
            ]
        })
        .to_string();
        let fields = collect_witness_nodes(Some(content.as_str()));
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].role, "Tenant Witness");
        assert_eq!(fields[0].label, "First witness");
        assert_eq!(fields[1].role, "PROPERTY_MANAGER_WITNESS");
        assert_eq!(fields[1].label, "Property Manager Witness");
    }

    #[test]
    fn test_statuses_cover_every_signature_node_any_role() {
        let content = json!({
            "type": "doc",
            "children": [
                {"type": "signature", "role": "TENANT", "signatureUrl": "https://x/sig.png"},
                {"type": "signature", "role": "notary"},
                {"type": "paragraph", "children": [
                    {"type": "signature", "role": "tenant_witness", "signedByName": "unsigned anyway"}
                ]}
            ]
        })
        .to_string();
        let statuses = collect_signature_statuses(Some(content.as_str()));
        assert_eq!(
            statuses,
            vec![
                SignatureStatus { role: "TENANT".to_string(), signed: true },
                SignatureStatus { role: "notary".to_string(), signed: false },
                SignatureStatus { role: "tenant_witness".to_string(), signed: false },
            ]
        );
    }
}
