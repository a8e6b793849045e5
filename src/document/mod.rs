//! Canonical document tree: model, traversal, and signature stamping
//!
//! The tree is the one representation every part of the signing workflow
//! agrees on: ingestion produces it, the walker reads it, injection
//! stamps it, and storage persists its wire JSON verbatim.

pub mod inject;
pub mod node;
pub mod roles;
pub mod walker;

pub use inject::{duplicate_signature_roles, inject_signature};
pub use node::{
    parse_tree, ContentNode, DocumentNode, DocumentTree, SignatureNode, SIGNATURE_NODE_TYPE,
};
pub use roles::SignerRole;
pub use walker::{
    collect_signature_statuses, collect_witness_nodes, signature_statuses, witness_fields,
    SignatureStatus, WitnessField,
};
