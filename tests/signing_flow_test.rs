//! Multi-party signing workflow integration tests
//!
//! Exercises the whole pipeline the way the office uses it:
//! - Import a converted lease into the canonical tree
//! - Issue per-role signing tokens
//! - Verify and sign over the token state machine
//! - Derive completion as roles finish in any order
//! - Replace expired or revoked links without losing audit state

use std::sync::Arc;

use bson::oid::ObjectId;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;

use covenant::db::schemas::{LeaseDocumentDoc, TokenState};
use covenant::document::{
    collect_witness_nodes, signature_statuses, DocumentNode, SignerRole,
};
use covenant::ingest::{DocumentConverter, IngestContext, IngestPipeline, SourceFormat};
use covenant::signing::{
    IssueRequest, MemoryStore, SignRequest, SigningConfig, SigningService, SigningStore,
};
use covenant::types::{CovenantError, Result};

// =============================================================================
// Fixtures
// =============================================================================

const LEASE_MARKUP: &str = r#"# Residential Lease Agreement

This agreement is made between Haven Property Management and the tenant
named below, for the premises at 14 Orchard Way, Unit 4B.

## Terms

1. Rent is due on the first of each month.
2. The security deposit is refundable as provided by state law.

Signatures:

<signature-field role="tenant" label="Tenant">

<signature-field role="property_manager" label="Property Manager">
"#;

/// Stands in for the conversion sidecar: always answers with fixed markup.
struct MarkupConverter {
    markup: &'static str,
}

#[async_trait::async_trait]
impl DocumentConverter for MarkupConverter {
    async fn convert(&self, _format: SourceFormat, _bytes: &[u8]) -> Result<String> {
        Ok(self.markup.to_string())
    }
}

/// Run an upload through ingestion and store the resulting document.
async fn import_lease(store: &Arc<MemoryStore>, markup: &'static str) -> ObjectId {
    let pipeline = IngestPipeline::new(Arc::new(MarkupConverter { markup }));
    let output = pipeline
        .ingest(
            SourceFormat::Docx,
            b"binary upload bytes",
            &IngestContext::default(),
        )
        .await
        .unwrap();

    let doc = LeaseDocumentDoc::new(
        ObjectId::new(),
        None,
        "Unit 4B lease".to_string(),
        output.tree.to_json(),
        output.text_size as i64,
        Some("docx".to_string()),
    );
    store.insert_document(doc).await.unwrap()
}

fn service(store: &Arc<MemoryStore>) -> SigningService<MemoryStore> {
    SigningService::new(SigningConfig::default(), Arc::clone(store))
}

fn issue_request(document_id: ObjectId, role: SignerRole, name: &str) -> IssueRequest {
    IssueRequest {
        document_id,
        role,
        signer_name: name.to_string(),
        signer_email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        signer_phone: None,
        created_by_id: ObjectId::new(),
        tenant_application_id: None,
        lease_id: None,
        expires_at: None,
    }
}

fn sign_request(secret: &str, name: &str) -> SignRequest {
    SignRequest {
        token_secret: secret.to_string(),
        signature_url: "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAAB".to_string(),
        signer_name: name.to_string(),
        ip_address: "198.51.100.7".to_string(),
    }
}

/// Signed-ness of the signature node carrying `role`, from the stored tree.
async fn stored_role_signed(store: &Arc<MemoryStore>, document_id: ObjectId, role: &str) -> bool {
    let document = store.find_document(document_id).await.unwrap().unwrap();
    let tree = document.tree().unwrap();
    signature_statuses(&tree)
        .iter()
        .filter(|s| s.role == role)
        .all(|s| s.signed)
}

// =============================================================================
// Full two-party flow
// =============================================================================

#[tokio::test]
async fn test_full_two_party_signing_flow() {
    let store = Arc::new(MemoryStore::new());
    let document_id = import_lease(&store, LEASE_MARKUP).await;
    let service = service(&store);

    // Fresh document: both roles pending, no tokens issued yet
    let initial = service.completion(document_id).await.unwrap();
    assert!(!initial.fully_signed);
    assert_eq!(initial.roles.len(), 2);
    assert!(initial.roles.iter().all(|r| !r.placeholder_signed));
    assert!(initial.roles.iter().all(|r| r.token_state.is_none()));

    // Tenant receives a link, opens it, signs
    let tenant = service
        .issue(issue_request(document_id, SignerRole::Tenant, "Dana Whitfield"))
        .await
        .unwrap();

    let access = service.verify(&tenant.token_secret).await.unwrap();
    assert_eq!(access.role, SignerRole::Tenant);
    assert_eq!(access.role_label, "Tenant");
    assert_eq!(access.document_title, "Unit 4B lease");
    assert_eq!(access.statuses.len(), 2);
    assert!(access.statuses.iter().all(|s| !s.signed));

    let outcome = service
        .sign(sign_request(&tenant.token_secret, "Dana Whitfield"))
        .await
        .unwrap();
    assert!(!outcome.fully_signed);
    assert!(stored_role_signed(&store, document_id, "tenant").await);
    assert!(!stored_role_signed(&store, document_id, "property_manager").await);

    // Halfway: tenant done, manager not yet issued
    let midway = service.completion(document_id).await.unwrap();
    assert!(!midway.fully_signed);
    let tenant_row = midway
        .roles
        .iter()
        .find(|r| r.role == SignerRole::Tenant)
        .unwrap();
    assert!(tenant_row.placeholder_signed);
    assert_eq!(tenant_row.token_state, Some(TokenState::Signed));
    let manager_row = midway
        .roles
        .iter()
        .find(|r| r.role == SignerRole::PropertyManager)
        .unwrap();
    assert!(!manager_row.placeholder_signed);
    assert_eq!(manager_row.token_state, None);

    // Manager signs; the workflow completes
    let manager = service
        .issue(issue_request(
            document_id,
            SignerRole::PropertyManager,
            "Ruth Calloway",
        ))
        .await
        .unwrap();
    let outcome = service
        .sign(sign_request(&manager.token_secret, "Ruth Calloway"))
        .await
        .unwrap();
    assert!(outcome.fully_signed);

    let done = service.completion(document_id).await.unwrap();
    assert!(done.fully_signed);
    assert!(done
        .roles
        .iter()
        .all(|r| r.token_state == Some(TokenState::Signed)));

    // Every stamp carries url, name, and timestamp
    let stored = store.find_document(document_id).await.unwrap().unwrap();
    let tree = stored.tree().unwrap();
    let mut stamped = 0;
    tree.walk(&mut |node| {
        if let DocumentNode::Signature(sig) = node {
            assert!(sig.signature_url.is_some());
            assert!(sig.signed_by_name.is_some());
            assert!(sig.signed_at.is_some());
            stamped += 1;
        }
    });
    assert_eq!(stamped, 2);
    assert_eq!(stored.revision, 2);
}

#[tokio::test]
async fn test_signing_order_is_commutative() {
    let store = Arc::new(MemoryStore::new());
    let document_id = import_lease(&store, LEASE_MARKUP).await;
    let service = service(&store);

    // Manager signs before the tenant this time
    let manager = service
        .issue(issue_request(
            document_id,
            SignerRole::PropertyManager,
            "Ruth Calloway",
        ))
        .await
        .unwrap();
    service
        .sign(sign_request(&manager.token_secret, "Ruth Calloway"))
        .await
        .unwrap();

    let tenant = service
        .issue(issue_request(document_id, SignerRole::Tenant, "Dana Whitfield"))
        .await
        .unwrap();
    let outcome = service
        .sign(sign_request(&tenant.token_secret, "Dana Whitfield"))
        .await
        .unwrap();

    assert!(outcome.fully_signed);
    assert!(stored_role_signed(&store, document_id, "tenant").await);
    assert!(stored_role_signed(&store, document_id, "property_manager").await);
}

#[tokio::test]
async fn test_concurrent_cross_role_signing() {
    let store = Arc::new(MemoryStore::new());
    let document_id = import_lease(&store, LEASE_MARKUP).await;
    let service = service(&store);

    let tenant = service
        .issue(issue_request(document_id, SignerRole::Tenant, "Dana Whitfield"))
        .await
        .unwrap();
    let manager = service
        .issue(issue_request(
            document_id,
            SignerRole::PropertyManager,
            "Ruth Calloway",
        ))
        .await
        .unwrap();

    // Both parties submit at once; the revision check serializes the tree
    // writes and the loser re-stamps against the winner's tree.
    let (tenant_outcome, manager_outcome) = tokio::join!(
        service.sign(sign_request(&tenant.token_secret, "Dana Whitfield")),
        service.sign(sign_request(&manager.token_secret, "Ruth Calloway")),
    );
    tenant_outcome.unwrap();
    manager_outcome.unwrap();

    let stored = store.find_document(document_id).await.unwrap().unwrap();
    assert_eq!(stored.revision, 2);
    assert_eq!(store.signature_count().await, 2);
    assert!(stored_role_signed(&store, document_id, "tenant").await);
    assert!(stored_role_signed(&store, document_id, "property_manager").await);

    let done = service.completion(document_id).await.unwrap();
    assert!(done.fully_signed);
}

// =============================================================================
// Expiry and revocation
// =============================================================================

#[tokio::test]
async fn test_expired_link_is_replaced_not_resurrected() {
    let store = Arc::new(MemoryStore::new());
    let document_id = import_lease(&store, LEASE_MARKUP).await;
    let service = service(&store);

    let mut stale = issue_request(document_id, SignerRole::Tenant, "Dana Whitfield");
    stale.expires_at = Some(Utc::now() - ChronoDuration::hours(1));
    let expired = service.issue(stale).await.unwrap();

    assert!(matches!(
        service.verify(&expired.token_secret).await.unwrap_err(),
        CovenantError::TokenExpired
    ));
    assert!(matches!(
        service
            .sign(sign_request(&expired.token_secret, "Dana Whitfield"))
            .await
            .unwrap_err(),
        CovenantError::TokenExpired
    ));
    assert_eq!(store.signature_count().await, 0);

    // The office issues a fresh link; the old secret stays dead
    let fresh = service
        .issue(issue_request(document_id, SignerRole::Tenant, "Dana Whitfield"))
        .await
        .unwrap();
    service
        .sign(sign_request(&fresh.token_secret, "Dana Whitfield"))
        .await
        .unwrap();

    assert!(matches!(
        service.verify(&expired.token_secret).await.unwrap_err(),
        CovenantError::TokenExpired
    ));
    assert!(stored_role_signed(&store, document_id, "tenant").await);
}

#[tokio::test]
async fn test_revoked_link_cannot_sign_and_is_replaceable() {
    let store = Arc::new(MemoryStore::new());
    let document_id = import_lease(&store, LEASE_MARKUP).await;
    let service = service(&store);

    let first = service
        .issue(issue_request(document_id, SignerRole::Tenant, "Dana Whitfield"))
        .await
        .unwrap();
    service.verify(&first.token_secret).await.unwrap();
    service.revoke(first.token_id).await.unwrap();

    assert!(matches!(
        service.verify(&first.token_secret).await.unwrap_err(),
        CovenantError::TokenRevoked
    ));
    assert!(matches!(
        service
            .sign(sign_request(&first.token_secret, "Dana Whitfield"))
            .await
            .unwrap_err(),
        CovenantError::TokenRevoked
    ));
    assert_eq!(store.signature_count().await, 0);

    let replacement = service
        .issue(issue_request(document_id, SignerRole::Tenant, "Dana Whitfield"))
        .await
        .unwrap();
    let outcome = service
        .sign(sign_request(&replacement.token_secret, "Dana Whitfield"))
        .await
        .unwrap();
    assert!(!outcome.fully_signed);
    assert!(stored_role_signed(&store, document_id, "tenant").await);
}

// =============================================================================
// Completion edge cases
// =============================================================================

#[tokio::test]
async fn test_unknown_placeholder_roles_do_not_gate_completion() {
    let store = Arc::new(MemoryStore::new());
    let content = json!({
        "type": "doc",
        "children": [
            {"type": "paragraph", "children": [{"type": "text", "text": "short form"}]},
            {"type": "signature", "role": "tenant"},
            {"type": "signature", "role": "notary"}
        ]
    })
    .to_string();
    let doc = LeaseDocumentDoc::new(
        ObjectId::new(),
        None,
        "Short form".to_string(),
        content,
        10,
        None,
    );
    let document_id = store.insert_document(doc).await.unwrap();
    let service = service(&store);

    // Only the canonical role is tracked
    let initial = service.completion(document_id).await.unwrap();
    assert_eq!(initial.roles.len(), 1);
    assert_eq!(initial.roles[0].role, SignerRole::Tenant);

    let tenant = service
        .issue(issue_request(document_id, SignerRole::Tenant, "Dana Whitfield"))
        .await
        .unwrap();
    let outcome = service
        .sign(sign_request(&tenant.token_secret, "Dana Whitfield"))
        .await
        .unwrap();

    // The notary placeholder stays blank but does not hold up the workflow
    assert!(outcome.fully_signed);
    assert!(!stored_role_signed(&store, document_id, "notary").await);
}

#[tokio::test]
async fn test_unknown_nodes_survive_import_and_signing() {
    let store = Arc::new(MemoryStore::new());
    let content = json!({
        "type": "doc",
        "children": [
            {
                "type": "clause-callout",
                "severity": "high",
                "children": [{"type": "text", "text": "Mold disclosure required."}]
            },
            {"type": "signature", "role": "tenant"}
        ]
    })
    .to_string();
    let doc = LeaseDocumentDoc::new(
        ObjectId::new(),
        None,
        "Addendum".to_string(),
        content,
        26,
        None,
    );
    let document_id = store.insert_document(doc).await.unwrap();
    let service = service(&store);

    let tenant = service
        .issue(issue_request(document_id, SignerRole::Tenant, "Dana Whitfield"))
        .await
        .unwrap();
    service
        .sign(sign_request(&tenant.token_secret, "Dana Whitfield"))
        .await
        .unwrap();

    // The callout's type and attrs ride through the stamp untouched
    let stored = store.find_document(document_id).await.unwrap().unwrap();
    let tree = stored.tree().unwrap();
    let mut callout_severity = None;
    tree.walk(&mut |node| {
        if let DocumentNode::Content(content) = node {
            if content.node_type == "clause-callout" {
                callout_severity = content.attrs.get("severity").cloned();
            }
        }
    });
    assert_eq!(callout_severity, Some(json!("high")));
}

// =============================================================================
// Ingestion details
// =============================================================================

#[tokio::test]
async fn test_witness_placeholders_get_default_labels() {
    let markup = "Lease body.\n\n<signature-field role=\"tenant\">\n\n<signature-field role=\"tenant_witness\">\n";
    let store = Arc::new(MemoryStore::new());
    let document_id = import_lease(&store, markup).await;

    let stored = store.find_document(document_id).await.unwrap().unwrap();
    let witnesses = collect_witness_nodes(Some(stored.content.as_str()));
    assert_eq!(witnesses.len(), 1);
    assert_eq!(witnesses[0].role, "tenant_witness");
    assert_eq!(witnesses[0].label, "Tenant Witness");
}

#[tokio::test]
async fn test_duplicate_role_upload_is_stamped_everywhere() {
    let markup = "Sign both copies:\n\n<signature-field role=\"tenant\">\n\n<signature-field role=\"tenant\">\n";
    let store = Arc::new(MemoryStore::new());

    let pipeline = IngestPipeline::new(Arc::new(MarkupConverter { markup }));
    let output = pipeline
        .ingest(SourceFormat::Pdf, b"upload", &IngestContext::default())
        .await
        .unwrap();
    assert_eq!(output.duplicate_roles, vec!["tenant".to_string()]);

    let doc = LeaseDocumentDoc::new(
        ObjectId::new(),
        None,
        "Duplicate copy lease".to_string(),
        output.tree.to_json(),
        output.text_size as i64,
        Some("pdf".to_string()),
    );
    let document_id = store.insert_document(doc).await.unwrap();
    let service = service(&store);

    let tenant = service
        .issue(issue_request(document_id, SignerRole::Tenant, "Dana Whitfield"))
        .await
        .unwrap();
    let outcome = service
        .sign(sign_request(&tenant.token_secret, "Dana Whitfield"))
        .await
        .unwrap();

    // One signing covers every placeholder carrying the role
    assert!(outcome.fully_signed);
    let statuses = signature_statuses(&outcome.tree);
    assert_eq!(statuses.len(), 2);
    assert!(statuses.iter().all(|s| s.role == "tenant" && s.signed));
}
