//! Lease document schema
//!
//! Holds the canonical document tree as its wire JSON, plus the revision
//! counter that serializes concurrent signing writes.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::metadata::Metadata;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::document::{parse_tree, DocumentTree};
use crate::types::Result;

/// Collection name for lease documents
pub const LEASE_DOCUMENT_COLLECTION: &str = "lease_documents";

/// Lease document stored in MongoDB.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LeaseDocumentDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Standard metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Owning property
    #[serde(default)]
    pub property_id: ObjectId,

    /// Template this document was instantiated from, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<ObjectId>,

    /// Display title
    #[serde(default)]
    pub title: String,

    /// Canonical document tree, persisted verbatim as its wire JSON
    #[serde(default)]
    pub content: String,

    /// Character count of text content, computed at ingestion
    #[serde(default)]
    pub content_size: i64,

    /// Upload format this document was ingested from ("docx", "pdf"),
    /// absent for documents authored in-app
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_format: Option<String>,

    /// Optimistic concurrency counter: tree writes are conditioned on the
    /// revision they read and bump it on success
    #[serde(default)]
    pub revision: i64,

    /// Per-role issuance slots: each value is the signing token holding
    /// the (document, role) claim. The Mongo store swaps slots with
    /// conditional writes; a slot pointing at a dead token reads as free.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub role_slots: HashMap<String, ObjectId>,
}

impl LeaseDocumentDoc {
    pub fn new(
        property_id: ObjectId,
        template_id: Option<ObjectId>,
        title: String,
        content: String,
        content_size: i64,
        source_format: Option<String>,
    ) -> Self {
        Self {
            id: None,
            metadata: Metadata::new(),
            property_id,
            template_id,
            title,
            content,
            content_size,
            source_format,
            revision: 0,
            role_slots: HashMap::new(),
        }
    }

    /// Parse the stored content into a tree.
    pub fn tree(&self) -> Result<DocumentTree> {
        parse_tree(&self.content)
    }
}

impl IntoIndexes for LeaseDocumentDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "property_id": 1 },
            Some(
                IndexOptions::builder()
                    .name("property_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for LeaseDocumentDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tree_round_trips_through_stored_content() {
        let content = json!({
            "type": "doc",
            "children": [{"type": "signature", "role": "tenant"}]
        })
        .to_string();
        let doc = LeaseDocumentDoc::new(
            ObjectId::new(),
            None,
            "Unit 4B lease".to_string(),
            content.clone(),
            0,
            Some("docx".to_string()),
        );
        let tree = doc.tree().unwrap();
        assert_eq!(parse_tree(&content).unwrap(), tree);
        assert_eq!(doc.revision, 0);
    }

    #[test]
    fn test_tree_surfaces_parse_error() {
        let doc = LeaseDocumentDoc::new(
            ObjectId::new(),
            None,
            "broken".to_string(),
            "not json".to_string(),
            0,
            None,
        );
        assert!(doc.tree().is_err());
    }
}
