//! Persistence collaborator for the signing workflow
//!
//! The signing service talks to storage only through `SigningStore`, so
//! the Mongo adapter can be swapped for the in-memory store in tests and
//! dev mode. Every racy transition is a conditional write: tree content
//! is conditioned on the revision the caller read, a token moves to
//! `Signed` only out of a still-usable state, and a token is inserted
//! only while no live one holds its (document, role). A `false` or
//! `None` return means another caller got there first and this one must
//! re-read or give up.

use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db::schemas::{DocumentSignatureDoc, LeaseDocumentDoc, SigningTokenDoc, TokenState};
use crate::types::{CovenantError, Result};

// ============================================================================
// Store Trait (for dependency injection)
// ============================================================================

/// Storage operations the signing workflow needs (allows mocking in tests)
#[async_trait::async_trait]
pub trait SigningStore: Send + Sync {
    /// Store a newly ingested document, returning its id
    async fn insert_document(&self, doc: LeaseDocumentDoc) -> Result<ObjectId>;

    /// Load a document by id
    async fn find_document(&self, id: ObjectId) -> Result<Option<LeaseDocumentDoc>>;

    /// Conditionally replace a document's tree content: writes only when
    /// the stored revision still equals `expected_revision`, bumping the
    /// revision. Returns false on a lost race.
    async fn update_document_content(
        &self,
        id: ObjectId,
        content: &str,
        expected_revision: i64,
    ) -> Result<bool>;

    /// Store a freshly issued token unless a live one already holds its
    /// (document, role). The scan and the insert are one step; `None`
    /// means a live token blocked the issue.
    async fn insert_token_if_no_live(
        &self,
        token: SigningTokenDoc,
        now: DateTime<Utc>,
    ) -> Result<Option<ObjectId>>;

    /// Look up a token by the SHA-256 hex of its secret
    async fn find_token_by_hash(&self, token_hash: &str) -> Result<Option<SigningTokenDoc>>;

    /// Load a token by id
    async fn find_token(&self, id: ObjectId) -> Result<Option<SigningTokenDoc>>;

    /// Every token ever issued for a document, any state
    async fn find_tokens_for_document(&self, document_id: ObjectId)
        -> Result<Vec<SigningTokenDoc>>;

    /// Record a verification: bump state out of `Issued` and stamp
    /// `last_accessed_at`
    async fn touch_token(&self, id: ObjectId, accessed_at: DateTime<Utc>) -> Result<()>;

    /// Terminal transition to `Signed`, linking the audit record. The
    /// transition is taken only out of `Issued` or `Accessed`; false
    /// means another signing already claimed the token.
    async fn mark_token_signed(
        &self,
        id: ObjectId,
        signed_at: DateTime<Utc>,
        signature_id: ObjectId,
    ) -> Result<bool>;

    /// Undo a `Signed` claim whose stamp never landed, so the signer can
    /// present the same token again
    async fn release_token_claim(&self, id: ObjectId) -> Result<()>;

    /// Terminal transition to `Revoked`
    async fn mark_token_revoked(&self, id: ObjectId) -> Result<()>;

    /// Append one immutable signature audit record. A caller-set id is
    /// kept, so the record can be linked before it is written.
    async fn insert_signature(&self, signature: DocumentSignatureDoc) -> Result<ObjectId>;

    /// Liveness probe for the readiness endpoint
    async fn ping(&self) -> Result<()>;
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// In-memory store for tests and --dev-mode runs.
#[derive(Clone, Default)]
pub struct MemoryStore {
    documents: Arc<RwLock<HashMap<ObjectId, LeaseDocumentDoc>>>,
    tokens: Arc<RwLock<HashMap<ObjectId, SigningTokenDoc>>>,
    signatures: Arc<RwLock<HashMap<ObjectId, DocumentSignatureDoc>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored signature records (test visibility).
    pub async fn signature_count(&self) -> usize {
        self.signatures.read().await.len()
    }
}

#[async_trait::async_trait]
impl SigningStore for MemoryStore {
    async fn insert_document(&self, mut doc: LeaseDocumentDoc) -> Result<ObjectId> {
        let id = ObjectId::new();
        doc.id = Some(id);
        self.documents.write().await.insert(id, doc);
        Ok(id)
    }

    async fn find_document(&self, id: ObjectId) -> Result<Option<LeaseDocumentDoc>> {
        Ok(self.documents.read().await.get(&id).cloned())
    }

    async fn update_document_content(
        &self,
        id: ObjectId,
        content: &str,
        expected_revision: i64,
    ) -> Result<bool> {
        let mut documents = self.documents.write().await;
        let doc = documents
            .get_mut(&id)
            .ok_or_else(|| CovenantError::NotFound(format!("document {id}")))?;
        if doc.revision != expected_revision {
            return Ok(false);
        }
        doc.content = content.to_string();
        doc.revision += 1;
        doc.metadata.updated_at = Some(bson::DateTime::now());
        Ok(true)
    }

    async fn insert_token_if_no_live(
        &self,
        mut token: SigningTokenDoc,
        now: DateTime<Utc>,
    ) -> Result<Option<ObjectId>> {
        // The scan and the insert happen under one write lock, so two
        // issuers for the same (document, role) cannot both pass the scan.
        let mut tokens = self.tokens.write().await;
        let blocked = tokens
            .values()
            .any(|t| t.document_id == token.document_id && t.role == token.role && t.is_live(now));
        if blocked {
            return Ok(None);
        }
        let id = ObjectId::new();
        token.id = Some(id);
        tokens.insert(id, token);
        Ok(Some(id))
    }

    async fn find_token_by_hash(&self, token_hash: &str) -> Result<Option<SigningTokenDoc>> {
        Ok(self
            .tokens
            .read()
            .await
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn find_token(&self, id: ObjectId) -> Result<Option<SigningTokenDoc>> {
        Ok(self.tokens.read().await.get(&id).cloned())
    }

    async fn find_tokens_for_document(
        &self,
        document_id: ObjectId,
    ) -> Result<Vec<SigningTokenDoc>> {
        Ok(self
            .tokens
            .read()
            .await
            .values()
            .filter(|t| t.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn touch_token(&self, id: ObjectId, accessed_at: DateTime<Utc>) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        let token = tokens
            .get_mut(&id)
            .ok_or(CovenantError::TokenNotFound)?;
        token.last_accessed_at = Some(accessed_at);
        if token.state == TokenState::Issued {
            token.state = TokenState::Accessed;
        }
        token.metadata.updated_at = Some(bson::DateTime::now());
        Ok(())
    }

    async fn mark_token_signed(
        &self,
        id: ObjectId,
        signed_at: DateTime<Utc>,
        signature_id: ObjectId,
    ) -> Result<bool> {
        let mut tokens = self.tokens.write().await;
        let token = tokens
            .get_mut(&id)
            .ok_or(CovenantError::TokenNotFound)?;
        // The state check and the transition share the write lock; this
        // is the single-writer gate for a token's signing.
        match token.state {
            TokenState::Signed | TokenState::Revoked => return Ok(false),
            TokenState::Issued | TokenState::Accessed => {}
        }
        token.state = TokenState::Signed;
        token.signed_at = Some(signed_at);
        token.document_signature_id = Some(signature_id);
        token.metadata.updated_at = Some(bson::DateTime::now());
        Ok(true)
    }

    async fn release_token_claim(&self, id: ObjectId) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        let token = tokens
            .get_mut(&id)
            .ok_or(CovenantError::TokenNotFound)?;
        token.state = TokenState::Accessed;
        token.signed_at = None;
        token.document_signature_id = None;
        token.metadata.updated_at = Some(bson::DateTime::now());
        Ok(())
    }

    async fn mark_token_revoked(&self, id: ObjectId) -> Result<()> {
        let mut tokens = self.tokens.write().await;
        let token = tokens
            .get_mut(&id)
            .ok_or(CovenantError::TokenNotFound)?;
        token.state = TokenState::Revoked;
        token.metadata.updated_at = Some(bson::DateTime::now());
        Ok(())
    }

    async fn insert_signature(&self, mut signature: DocumentSignatureDoc) -> Result<ObjectId> {
        let id = signature.id.unwrap_or_else(ObjectId::new);
        signature.id = Some(id);
        self.signatures.write().await.insert(id, signature);
        Ok(id)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
