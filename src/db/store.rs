//! MongoDB-backed signing store
//!
//! Chrono fields serialize as RFC 3339 strings through serde, so update
//! documents write the same representation rather than BSON dates.
//!
//! Single-document conditional writes carry every racy transition: tree
//! content is filtered on the revision the caller read, the `Signed`
//! transition is filtered on a still-usable state, and issuance claims a
//! per-role slot on the lease document before the token is written.

use bson::{doc, oid::ObjectId, Bson, Document};
use chrono::{DateTime, Utc};

use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{
    DocumentSignatureDoc, LeaseDocumentDoc, SigningTokenDoc, DOCUMENT_SIGNATURE_COLLECTION,
    LEASE_DOCUMENT_COLLECTION, SIGNING_TOKEN_COLLECTION,
};
use crate::signing::SigningStore;
use crate::types::{CovenantError, Result};

/// Production store over the three signing collections.
#[derive(Clone)]
pub struct MongoStore {
    client: MongoClient,
    documents: MongoCollection<LeaseDocumentDoc>,
    tokens: MongoCollection<SigningTokenDoc>,
    signatures: MongoCollection<DocumentSignatureDoc>,
}

impl MongoStore {
    /// Open the collections and apply their indexes.
    pub async fn new(client: MongoClient) -> Result<Self> {
        let documents = client.collection(LEASE_DOCUMENT_COLLECTION).await?;
        let tokens = client.collection(SIGNING_TOKEN_COLLECTION).await?;
        let signatures = client.collection(DOCUMENT_SIGNATURE_COLLECTION).await?;
        Ok(Self {
            client,
            documents,
            tokens,
            signatures,
        })
    }
}

#[async_trait::async_trait]
impl SigningStore for MongoStore {
    async fn insert_document(&self, doc: LeaseDocumentDoc) -> Result<ObjectId> {
        self.documents.insert_one(doc).await
    }

    async fn find_document(&self, id: ObjectId) -> Result<Option<LeaseDocumentDoc>> {
        self.documents.find_one(doc! { "_id": id }).await
    }

    async fn update_document_content(
        &self,
        id: ObjectId,
        content: &str,
        expected_revision: i64,
    ) -> Result<bool> {
        let result = self
            .documents
            .update_one(
                doc! { "_id": id, "revision": expected_revision },
                doc! {
                    "$set": {
                        "content": content,
                        "metadata.updated_at": bson::DateTime::now(),
                    },
                    "$inc": { "revision": 1 },
                },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn insert_token_if_no_live(
        &self,
        mut token: SigningTokenDoc,
        now: DateTime<Utc>,
    ) -> Result<Option<ObjectId>> {
        let token_id = ObjectId::new();
        token.id = Some(token_id);
        let slot_path = format!("role_slots.{}", token.role.as_str());

        let document = self
            .documents
            .find_one(doc! { "_id": token.document_id })
            .await?
            .ok_or_else(|| {
                CovenantError::NotFound(format!("document {}", token.document_id))
            })?;

        // The slot names the token holding the (document, role) claim.
        // A dead holder (signed, revoked, expired, or never written) is
        // swapped out; a live one blocks the issue.
        let expected = match document.role_slots.get(token.role.as_str()) {
            None => Bson::Null,
            Some(&holder_id) => {
                let holder = self.tokens.find_one(doc! { "_id": holder_id }).await?;
                if holder.map_or(false, |h| h.is_live(now)) {
                    return Ok(None);
                }
                Bson::ObjectId(holder_id)
            }
        };

        // Conditional claim in the revision-check mold: the write lands
        // only while the slot still holds what this issuer read.
        let mut filter = doc! { "_id": token.document_id };
        filter.insert(slot_path.clone(), expected);
        let mut claim = Document::new();
        claim.insert(slot_path, token_id);
        let result = self
            .documents
            .update_one(filter, doc! { "$set": claim })
            .await?;
        if result.matched_count == 0 {
            return Ok(None);
        }

        let id = self.tokens.insert_one(token).await?;
        Ok(Some(id))
    }

    async fn find_token_by_hash(&self, token_hash: &str) -> Result<Option<SigningTokenDoc>> {
        self.tokens.find_one(doc! { "token_hash": token_hash }).await
    }

    async fn find_token(&self, id: ObjectId) -> Result<Option<SigningTokenDoc>> {
        self.tokens.find_one(doc! { "_id": id }).await
    }

    async fn find_tokens_for_document(
        &self,
        document_id: ObjectId,
    ) -> Result<Vec<SigningTokenDoc>> {
        self.tokens.find_many(doc! { "document_id": document_id }).await
    }

    async fn touch_token(&self, id: ObjectId, accessed_at: DateTime<Utc>) -> Result<()> {
        let result = self
            .tokens
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "last_accessed_at": accessed_at.to_rfc3339(),
                        "metadata.updated_at": bson::DateTime::now(),
                    },
                },
            )
            .await?;
        if result.matched_count == 0 {
            return Err(CovenantError::TokenNotFound);
        }
        // First access moves the token out of Issued; later accesses only
        // refresh the timestamp above.
        self.tokens
            .update_one(
                doc! { "_id": id, "state": "issued" },
                doc! { "$set": { "state": "accessed" } },
            )
            .await?;
        Ok(())
    }

    async fn mark_token_signed(
        &self,
        id: ObjectId,
        signed_at: DateTime<Utc>,
        signature_id: ObjectId,
    ) -> Result<bool> {
        // Filtered on the usable states, so two signs presenting the same
        // secret cannot both take the transition.
        let result = self
            .tokens
            .update_one(
                doc! { "_id": id, "state": { "$in": ["issued", "accessed"] } },
                doc! {
                    "$set": {
                        "state": "signed",
                        "signed_at": signed_at.to_rfc3339(),
                        "document_signature_id": signature_id,
                        "metadata.updated_at": bson::DateTime::now(),
                    },
                },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn release_token_claim(&self, id: ObjectId) -> Result<()> {
        let result = self
            .tokens
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "state": "accessed",
                        "metadata.updated_at": bson::DateTime::now(),
                    },
                    "$unset": { "signed_at": "", "document_signature_id": "" },
                },
            )
            .await?;
        if result.matched_count == 0 {
            return Err(CovenantError::TokenNotFound);
        }
        Ok(())
    }

    async fn mark_token_revoked(&self, id: ObjectId) -> Result<()> {
        let result = self
            .tokens
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "state": "revoked",
                        "metadata.updated_at": bson::DateTime::now(),
                    },
                },
            )
            .await?;
        if result.matched_count == 0 {
            return Err(CovenantError::TokenNotFound);
        }
        Ok(())
    }

    async fn insert_signature(&self, signature: DocumentSignatureDoc) -> Result<ObjectId> {
        self.signatures.insert_one(signature).await
    }

    async fn ping(&self) -> Result<()> {
        self.client.ping().await
    }
}
