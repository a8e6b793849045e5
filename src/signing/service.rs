//! Signing token state machine
//!
//! Coordinates token issuance, verification, and signing over a
//! `SigningStore`. The service owns the workflow; every racy transition
//! is decided by one conditional store write: the issue-time liveness
//! check, the Signed claim, and the revision-checked tree stamp. The
//! stamp itself is delegated to `document::inject_signature`.
//!
//! Token lifecycle: Issued -> Accessed -> Signed, with Revoked as the
//! operator escape hatch. Expiry is derived from `expires_at` at each
//! check, never stored as a state.

use bson::oid::ObjectId;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::db::schemas::{DocumentSignatureDoc, LeaseDocumentDoc, SigningTokenDoc, TokenState};
use crate::document::{
    collect_signature_statuses, inject_signature, signature_statuses, DocumentTree,
    SignatureStatus, SignerRole,
};
use crate::signing::store::SigningStore;
use crate::types::{CovenantError, Result};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the signing service
#[derive(Debug, Clone)]
pub struct SigningConfig {
    /// Default token lifetime when the issuer does not pick an expiry
    pub token_ttl: Duration,
    /// Attempts for the revision-checked tree write before giving up
    pub max_write_retries: usize,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            token_ttl: Duration::from_secs(72 * 3600),
            max_write_retries: 3,
        }
    }
}

// ============================================================================
// Requests and outcomes
// ============================================================================

/// Everything needed to issue a signing token for one (document, role).
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub document_id: ObjectId,
    pub role: SignerRole,
    pub signer_name: String,
    pub signer_email: String,
    pub signer_phone: Option<String>,
    pub created_by_id: ObjectId,
    pub tenant_application_id: Option<ObjectId>,
    pub lease_id: Option<ObjectId>,
    /// Explicit expiry; defaults to now + `token_ttl`
    pub expires_at: Option<DateTime<Utc>>,
}

/// An issued token. `token_secret` is the only copy of the plaintext;
/// the store keeps its hash.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token_id: ObjectId,
    pub token_secret: String,
    pub role: SignerRole,
    pub expires_at: DateTime<Utc>,
}

/// Signer-facing context returned by a successful verification.
#[derive(Debug, Clone)]
pub struct SigningAccess {
    pub token_id: ObjectId,
    pub role: SignerRole,
    pub role_label: String,
    pub signer_name: String,
    pub document_id: ObjectId,
    pub document_title: String,
    pub tenant_application_id: Option<ObjectId>,
    pub lease_id: Option<ObjectId>,
    pub expires_at: DateTime<Utc>,
    pub tree: DocumentTree,
    pub statuses: Vec<SignatureStatus>,
}

/// Evidence submitted by the signer.
#[derive(Debug, Clone)]
pub struct SignRequest {
    pub token_secret: String,
    pub signature_url: String,
    pub signer_name: String,
    pub ip_address: String,
}

/// The result of a completed signing.
#[derive(Debug, Clone)]
pub struct SignOutcome {
    pub document_id: ObjectId,
    pub signature_id: ObjectId,
    pub role: SignerRole,
    pub tree: DocumentTree,
    pub fully_signed: bool,
}

/// Per-role view of how far a document's signing has progressed.
#[derive(Debug, Clone)]
pub struct RoleCompletion {
    pub role: SignerRole,
    /// Every placeholder for this role carries a signature
    pub placeholder_signed: bool,
    /// Most advanced token for this role, if one was issued
    pub token_state: Option<TokenState>,
}

/// Derived completion summary; computed on demand, never stored.
#[derive(Debug, Clone)]
pub struct CompletionStatus {
    pub document_id: ObjectId,
    pub fully_signed: bool,
    pub roles: Vec<RoleCompletion>,
}

// ============================================================================
// Secrets
// ============================================================================

/// 32 random bytes, hex-encoded: the opaque credential in a signing link.
fn generate_token_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 hex of a secret, the only form that touches storage.
pub fn hash_token_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

// ============================================================================
// Signing Service
// ============================================================================

/// Signing workflow orchestration over a pluggable store.
pub struct SigningService<S: SigningStore> {
    config: SigningConfig,
    store: Arc<S>,
}

impl<S: SigningStore> SigningService<S> {
    pub fn new(config: SigningConfig, store: Arc<S>) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Issue a token for one (document, role). Fails with `IssueConflict`
    /// while a live token for the pair exists; signed, revoked, and
    /// expired tokens do not block reissue.
    pub async fn issue(&self, request: IssueRequest) -> Result<IssuedToken> {
        // Sign-time name fallback reads the issued name, so a token must
        // never be minted for a blank signer.
        if request.signer_name.trim().is_empty() {
            return Err(CovenantError::InvalidRequest(
                "signerName must not be blank".to_string(),
            ));
        }
        if request.signer_email.trim().is_empty() {
            return Err(CovenantError::InvalidRequest(
                "signerEmail must not be blank".to_string(),
            ));
        }

        let now = Utc::now();
        let document = self.load_document(request.document_id).await?;

        let expires_at = request.expires_at.unwrap_or_else(|| {
            now + ChronoDuration::seconds(self.config.token_ttl.as_secs() as i64)
        });
        let secret = generate_token_secret();

        let mut token = SigningTokenDoc::new(
            hash_token_secret(&secret),
            request.document_id,
            request.role,
            request.signer_name,
            request.signer_email,
            request.signer_phone,
            request.created_by_id,
            expires_at,
        );
        token.tenant_application_id = request.tenant_application_id;
        token.lease_id = request.lease_id;

        // The liveness scan and the insert are one store operation, so
        // two issuers for the same (document, role) cannot both pass it.
        let Some(token_id) = self.store.insert_token_if_no_live(token, now).await? else {
            return Err(CovenantError::IssueConflict {
                role: request.role.to_string(),
            });
        };

        info!(
            document_id = %request.document_id,
            role = %request.role,
            token_id = %token_id,
            expires_at = %expires_at,
            title = %document.title,
            "Issued signing token"
        );

        Ok(IssuedToken {
            token_id,
            token_secret: secret,
            role: request.role,
            expires_at,
        })
    }

    /// Verify a presented secret and return the signer-facing context.
    /// Repeated calls before signing change nothing but
    /// `last_accessed_at`.
    pub async fn verify(&self, token_secret: &str) -> Result<SigningAccess> {
        let now = Utc::now();
        let token = self.lookup(token_secret).await?;
        token.ensure_usable(now)?;

        let token_id = token.id.ok_or_else(|| {
            CovenantError::Database("stored token missing _id".to_string())
        })?;
        self.store.touch_token(token_id, now).await?;

        let document = self.load_document(token.document_id).await?;
        let tree = document.tree()?;
        let statuses = signature_statuses(&tree);

        info!(
            token_id = %token_id,
            document_id = %token.document_id,
            role = %token.role,
            "Verified signing token"
        );

        Ok(SigningAccess {
            token_id,
            role: token.role,
            role_label: token.role.display_label().to_string(),
            signer_name: token.signer_name,
            document_id: token.document_id,
            document_title: document.title,
            tenant_application_id: token.tenant_application_id,
            lease_id: token.lease_id,
            expires_at: token.expires_at,
            tree,
            statuses,
        })
    }

    /// Complete a signing: claim the token, stamp the tree, and record
    /// the audit signature. Expired, signed, and revoked tokens fail
    /// before any write happens.
    pub async fn sign(&self, request: SignRequest) -> Result<SignOutcome> {
        let now = Utc::now();
        let token = self.lookup(&request.token_secret).await?;
        token.ensure_usable(now)?;

        let token_id = token.id.ok_or_else(|| {
            CovenantError::Database("stored token missing _id".to_string())
        })?;

        // The name typed at signing wins; fall back to the name the token
        // was issued for.
        let signer_name = if request.signer_name.trim().is_empty() {
            token.signer_name.clone()
        } else {
            request.signer_name.clone()
        };

        // Claim the token before anything else is written. The Signed
        // transition is conditional in the store, so of two signings
        // presenting the same secret exactly one gets past this point.
        let signature_id = ObjectId::new();
        let claimed = self
            .store
            .mark_token_signed(token_id, now, signature_id)
            .await?;
        if !claimed {
            return Err(CovenantError::TokenAlreadySigned);
        }

        let stamped = match self
            .stamp_tree(&token, &request.signature_url, &signer_name, now)
            .await
        {
            Ok(tree) => tree,
            Err(err) => {
                // Hand the claim back so the signer can present the same
                // link again once the write storm passes.
                if let Err(release_err) = self.store.release_token_claim(token_id).await {
                    warn!(
                        token_id = %token_id,
                        error = %release_err,
                        "Failed to release the signing claim after a stamp failure"
                    );
                }
                return Err(err);
            }
        };

        let mut signature = DocumentSignatureDoc::new(
            token.document_id,
            token.tenant_application_id,
            token.role,
            request.signature_url,
            signer_name,
            request.ip_address,
        );
        signature.id = Some(signature_id);
        self.store.insert_signature(signature).await?;

        let completion = self.completion(token.document_id).await?;

        info!(
            token_id = %token_id,
            document_id = %token.document_id,
            role = %token.role,
            signature_id = %signature_id,
            fully_signed = completion.fully_signed,
            "Recorded signature"
        );

        Ok(SignOutcome {
            document_id: token.document_id,
            signature_id,
            role: token.role,
            tree: stamped,
            fully_signed: completion.fully_signed,
        })
    }

    /// Withdraw a not-yet-signed token. Idempotent for already-revoked
    /// tokens; a signed token cannot be revoked.
    pub async fn revoke(&self, token_id: ObjectId) -> Result<()> {
        let token = self
            .store
            .find_token(token_id)
            .await?
            .ok_or(CovenantError::TokenNotFound)?;

        match token.state {
            TokenState::Signed => return Err(CovenantError::TokenAlreadySigned),
            TokenState::Revoked => return Ok(()),
            TokenState::Issued | TokenState::Accessed => {}
        }

        self.store.mark_token_revoked(token_id).await?;
        info!(
            token_id = %token_id,
            document_id = %token.document_id,
            role = %token.role,
            "Revoked signing token"
        );
        Ok(())
    }

    /// Derive the completion state of a document's signing workflow.
    ///
    /// A document is fully signed when every canonical role with a
    /// placeholder in the tree has a Signed token. Placeholder roles
    /// outside the canonical vocabulary cannot be issued tokens and do
    /// not gate completion.
    pub async fn completion(&self, document_id: ObjectId) -> Result<CompletionStatus> {
        let document = self.load_document(document_id).await?;
        let statuses = collect_signature_statuses(Some(document.content.as_str()));
        let tokens = self.store.find_tokens_for_document(document_id).await?;

        let mut roles: Vec<RoleCompletion> = Vec::new();
        for status in &statuses {
            let Some(role) = SignerRole::parse(&status.role) else {
                continue;
            };
            if roles.iter().any(|r| r.role == role) {
                continue;
            }
            let placeholder_signed = statuses
                .iter()
                .filter(|s| SignerRole::parse(&s.role) == Some(role))
                .all(|s| s.signed);
            let token_state = best_token_state(&tokens, role);
            roles.push(RoleCompletion {
                role,
                placeholder_signed,
                token_state,
            });
        }

        let fully_signed = roles
            .iter()
            .all(|r| r.token_state == Some(TokenState::Signed));

        Ok(CompletionStatus {
            document_id,
            fully_signed,
            roles,
        })
    }

    /// Stamp the token's role into the latest tree, the write conditioned
    /// on the revision that was read; a lost race re-reads and re-stamps.
    async fn stamp_tree(
        &self,
        token: &SigningTokenDoc,
        signature_url: &str,
        signer_name: &str,
        now: DateTime<Utc>,
    ) -> Result<DocumentTree> {
        let mut attempt = 0usize;
        loop {
            let document = self.load_document(token.document_id).await?;
            let tree = document.tree()?;
            let stamped = inject_signature(&tree, token.role, signature_url, signer_name, now);
            let written = self
                .store
                .update_document_content(token.document_id, &stamped.to_json(), document.revision)
                .await?;
            if written {
                return Ok(stamped);
            }
            attempt += 1;
            if attempt > self.config.max_write_retries {
                return Err(CovenantError::Database(format!(
                    "document {} write conflict after {} attempts",
                    token.document_id, attempt
                )));
            }
            warn!(
                document_id = %token.document_id,
                role = %token.role,
                attempt,
                "Concurrent tree write detected, retrying"
            );
        }
    }

    async fn lookup(&self, token_secret: &str) -> Result<SigningTokenDoc> {
        self.store
            .find_token_by_hash(&hash_token_secret(token_secret))
            .await?
            .ok_or(CovenantError::TokenNotFound)
    }

    async fn load_document(&self, id: ObjectId) -> Result<LeaseDocumentDoc> {
        self.store
            .find_document(id)
            .await?
            .ok_or_else(|| CovenantError::NotFound(format!("document {id}")))
    }
}

/// Most advanced token state for a role: Signed beats in-flight beats
/// terminal-without-signing.
fn best_token_state(tokens: &[SigningTokenDoc], role: SignerRole) -> Option<TokenState> {
    let mut best: Option<TokenState> = None;
    for token in tokens.iter().filter(|t| t.role == role) {
        let rank = |state: TokenState| match state {
            TokenState::Signed => 3,
            TokenState::Accessed => 2,
            TokenState::Issued => 1,
            TokenState::Revoked => 0,
        };
        if best.map_or(true, |b| rank(token.state) > rank(b)) {
            best = Some(token.state);
        }
    }
    best
}
