//! Signing token schema
//!
//! One token grants one signer access to sign one role on one document.
//! Tokens are never hard-deleted: a consumed or revoked token is the
//! audit trail of who was invited to sign and when. Expiry is a derived
//! check at verify/sign time, so there is deliberately no TTL index here.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::metadata::Metadata;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::document::SignerRole;
use crate::types::{CovenantError, Result};

/// Collection name for signing tokens
pub const SIGNING_TOKEN_COLLECTION: &str = "signing_tokens";

/// Explicit token lifecycle state.
///
/// Expiry is not a state: a token can sit in `Issued` or `Accessed` past
/// its `expires_at` and is then unusable, but the stored state records
/// how far it actually got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    /// Created, never presented.
    #[default]
    Issued,
    /// Presented at least once (`last_accessed_at` set), not yet signed.
    Accessed,
    /// Terminal: the signing completed and a DocumentSignature exists.
    Signed,
    /// Terminal: withdrawn by an operator before signing.
    Revoked,
}

impl fmt::Display for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenState::Issued => "issued",
            TokenState::Accessed => "accessed",
            TokenState::Signed => "signed",
            TokenState::Revoked => "revoked",
        };
        f.write_str(s)
    }
}

/// Signing token document stored in MongoDB.
///
/// Only the SHA-256 hash of the secret is stored; the plaintext is
/// returned once at issue time and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SigningTokenDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Standard metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// SHA-256 hex of the token secret
    #[serde(default)]
    pub token_hash: String,

    /// Document this token signs
    #[serde(default)]
    pub document_id: ObjectId,

    /// Workflow linkage (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_application_id: Option<ObjectId>,

    /// Workflow linkage (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_id: Option<ObjectId>,

    /// Role this token is allowed to stamp
    pub role: SignerRole,

    /// Signer contact info
    #[serde(default)]
    pub signer_name: String,

    #[serde(default)]
    pub signer_email: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer_phone: Option<String>,

    /// Operator who issued the token
    #[serde(default)]
    pub created_by_id: ObjectId,

    /// Lifecycle state
    #[serde(default)]
    pub state: TokenState,

    /// Hard deadline; past this, verify and sign always fail
    #[serde(default = "default_expires_at")]
    pub expires_at: DateTime<Utc>,

    /// Audit: when the signer last opened their link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<DateTime<Utc>>,

    /// Audit: when the signing completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,

    /// The DocumentSignature created at signing, set exactly once
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_signature_id: Option<ObjectId>,
}

fn default_expires_at() -> DateTime<Utc> {
    Utc::now()
}

impl SigningTokenDoc {
    /// Create a new token in `Issued` state.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        token_hash: String,
        document_id: ObjectId,
        role: SignerRole,
        signer_name: String,
        signer_email: String,
        signer_phone: Option<String>,
        created_by_id: ObjectId,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            metadata: Metadata::new(),
            token_hash,
            document_id,
            tenant_application_id: None,
            lease_id: None,
            role,
            signer_name,
            signer_email,
            signer_phone,
            created_by_id,
            state: TokenState::Issued,
            expires_at,
            last_accessed_at: None,
            signed_at: None,
            document_signature_id: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// A live token blocks issuing another for the same (document, role):
    /// unexpired, unsigned, unrevoked.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        if self.metadata.is_deleted || self.is_expired(now) {
            return false;
        }
        match self.state {
            TokenState::Issued | TokenState::Accessed => true,
            TokenState::Signed | TokenState::Revoked => false,
        }
    }

    /// The shared validity gate for verify and sign. Check order: expiry,
    /// then terminal states.
    pub fn ensure_usable(&self, now: DateTime<Utc>) -> Result<()> {
        if self.is_expired(now) {
            return Err(CovenantError::TokenExpired);
        }
        match self.state {
            TokenState::Signed => Err(CovenantError::TokenAlreadySigned),
            TokenState::Revoked => Err(CovenantError::TokenRevoked),
            TokenState::Issued | TokenState::Accessed => Ok(()),
        }
    }
}

impl IntoIndexes for SigningTokenDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on the secret hash for verify lookups
            (
                doc! { "token_hash": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("token_hash_unique".to_string())
                        .build(),
                ),
            ),
            // Live-token conflict checks scan per (document, role)
            (
                doc! { "document_id": 1, "role": 1 },
                Some(
                    IndexOptions::builder()
                        .name("document_role_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for SigningTokenDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
