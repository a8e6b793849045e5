//! Signature injection
//!
//! Stamping is pure: the input tree is never touched, the caller gets a
//! new tree back. "Sign once" is not enforced here; that is the token
//! state machine's job. Stamping overwrites any prior evidence
//! (last-write-wins).

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::node::{DocumentNode, DocumentTree};
use super::roles::SignerRole;

/// Stamp every placeholder for `role` with the signer's evidence and
/// return the resulting tree. Zero matching placeholders yields a plain
/// clone; multiple matching placeholders are all stamped identically.
pub fn inject_signature(
    tree: &DocumentTree,
    role: SignerRole,
    signature_url: &str,
    signed_by_name: &str,
    signed_at: DateTime<Utc>,
) -> DocumentTree {
    let mut stamped = tree.clone();
    stamped.walk_mut(&mut |node| {
        if let DocumentNode::Signature(sig) = node {
            if role.matches(&sig.role) {
                sig.signature_url = Some(signature_url.to_string());
                sig.signed_by_name = Some(signed_by_name.to_string());
                sig.signed_at = Some(signed_at);
            }
        }
    });
    stamped
}

/// Role strings that appear on more than one placeholder, grouped through
/// the canonical vocabulary ("TENANT" and "tenant" count as one role).
/// Returned in first-seen order. Template authors are expected to place
/// one placeholder per role; ingestion warns on violations but stamping
/// still covers all matches.
pub fn duplicate_signature_roles(tree: &DocumentTree) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut seen_order: Vec<String> = Vec::new();
    tree.walk(&mut |node| {
        if let DocumentNode::Signature(sig) = node {
            let key = match SignerRole::parse(&sig.role) {
                Some(role) => role.as_str().to_string(),
                None => sig.role.clone(),
            };
            let count = counts.entry(key.clone()).or_insert(0);
            if *count == 0 {
                seen_order.push(key);
            }
            *count += 1;
        }
    });
    seen_order
        .into_iter()
        .filter(|key| counts.get(key).copied().unwrap_or(0) > 1)
        .collect()
}
