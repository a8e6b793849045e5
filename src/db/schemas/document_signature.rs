//! Document signature schema
//!
//! The durable record of one completed signing act. Written exactly once
//! per successful sign and never modified afterward.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use super::metadata::Metadata;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::document::SignerRole;

/// Collection name for document signatures
pub const DOCUMENT_SIGNATURE_COLLECTION: &str = "document_signatures";

/// Immutable audit record of a completed signing.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DocumentSignatureDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Standard metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Document that was signed
    #[serde(default)]
    pub document_id: ObjectId,

    /// Workflow linkage (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_application_id: Option<ObjectId>,

    /// Role that was stamped
    pub role: SignerRole,

    /// Uploaded signature image
    #[serde(default)]
    pub signature_url: String,

    /// Name the signer entered
    #[serde(default)]
    pub signed_by_name: String,

    /// Account of the signer, when they had one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_by_id: Option<ObjectId>,

    /// Connection address captured at signing time
    #[serde(default)]
    pub ip_address: String,

    /// When the signing completed
    #[serde(default = "default_created_at")]
    pub created_at: DateTime<Utc>,
}

fn default_created_at() -> DateTime<Utc> {
    Utc::now()
}

impl DocumentSignatureDoc {
    pub fn new(
        document_id: ObjectId,
        tenant_application_id: Option<ObjectId>,
        role: SignerRole,
        signature_url: String,
        signed_by_name: String,
        ip_address: String,
    ) -> Self {
        Self {
            id: None,
            metadata: Metadata::new(),
            document_id,
            tenant_application_id,
            role,
            signature_url,
            signed_by_name,
            signed_by_id: None,
            ip_address,
            created_at: Utc::now(),
        }
    }
}

impl IntoIndexes for DocumentSignatureDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "document_id": 1, "role": 1 },
            Some(
                IndexOptions::builder()
                    .name("document_role_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for DocumentSignatureDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
