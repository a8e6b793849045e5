//! Document management routes
//!
//! Staff-facing API for the signing workflow:
//! - `POST /api/v1/documents/import` - convert an uploaded lease and store its tree
//! - `GET /api/v1/documents/{id}/completion` - derived signing progress
//! - `POST /api/v1/documents/{id}/tokens` - issue a signing token for one role
//! - `POST /api/v1/tokens/{id}/revoke` - withdraw an outstanding token
//!
//! Imports are all-or-nothing: a converter or parse failure stores nothing.
//! Duplicate signature roles in the upload are reported in the response so
//! template authors can fix the source document, but do not block the import.

use base64::{engine::general_purpose, Engine as _};
use bson::oid::ObjectId;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::schemas::{LeaseDocumentDoc, TokenState};
use crate::document::{witness_fields, SignerRole, WitnessField};
use crate::ingest::{IngestContext, SourceFormat};
use crate::routes::respond::{error_response, failure_response, json_response};
use crate::server::AppState;
use crate::signing::{IssueRequest, SigningStore};

// =============================================================================
// Import
// =============================================================================

/// Request body for document import
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    /// Property this lease belongs to
    pub property_id: String,
    /// Optional template the upload was generated from
    #[serde(default)]
    pub template_id: Option<String>,
    /// Display title for the document
    pub title: String,
    /// Original filename; the extension selects the converter format
    pub file_name: String,
    /// Base64 of the raw upload bytes
    pub data_base64: String,
}

/// Response from document import
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub success: bool,
    pub document_id: String,
    pub title: String,
    /// Visible text length of the parsed tree, in characters
    pub text_size: usize,
    /// Witness placeholders found in the document
    pub witness_fields: Vec<WitnessField>,
    /// Roles that appear on more than one placeholder (template defect)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub duplicate_roles: Vec<String>,
}

/// Handle POST /api/v1/documents/import
pub async fn handle_import_document<S: SigningStore>(
    req: Request<Incoming>,
    state: Arc<AppState<S>>,
) -> Response<Full<Bytes>> {
    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Import request body error: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Failed to read request body");
        }
    };

    let request: ImportRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid JSON: {}", e));
        }
    };

    let property_id = match ObjectId::parse_str(&request.property_id) {
        Ok(id) => id,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid propertyId"),
    };

    let template_id = match request.template_id.as_deref() {
        Some(raw) => match ObjectId::parse_str(raw) {
            Ok(id) => Some(id),
            Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid templateId"),
        },
        None => None,
    };

    let format = match SourceFormat::from_filename(&request.file_name) {
        Some(f) => f,
        None => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Unsupported document format (expected .docx or .pdf)",
            );
        }
    };

    let bytes = match general_purpose::STANDARD.decode(&request.data_base64) {
        Ok(b) => b,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid base64 in dataBase64"),
    };

    let context = IngestContext {
        property_id: Some(request.property_id.clone()),
        template_id: request.template_id.clone(),
    };

    let output = match state.ingest.ingest(format, &bytes, &context).await {
        Ok(o) => o,
        Err(e) => {
            warn!(property_id = %request.property_id, error = %e, "Document import failed");
            return failure_response(&e);
        }
    };

    let content = output.tree.to_json();
    let doc = LeaseDocumentDoc::new(
        property_id,
        template_id,
        request.title.clone(),
        content,
        output.text_size as i64,
        Some(format.as_str().to_string()),
    );

    let document_id = match state.signing.store().insert_document(doc).await {
        Ok(id) => id,
        Err(e) => return failure_response(&e),
    };

    info!(
        document_id = %document_id.to_hex(),
        title = %request.title,
        text_size = output.text_size,
        "Lease document imported"
    );

    json_response(
        StatusCode::OK,
        &ImportResponse {
            success: true,
            document_id: document_id.to_hex(),
            title: request.title,
            text_size: output.text_size,
            witness_fields: witness_fields(&output.tree),
            duplicate_roles: output.duplicate_roles,
        },
    )
}

// =============================================================================
// Completion
// =============================================================================

/// Per-role completion detail
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleCompletionView {
    pub role: String,
    pub label: String,
    /// Every placeholder for this role carries a signature
    pub placeholder_signed: bool,
    /// Most advanced token state for this role, if a token was issued
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_state: Option<TokenState>,
}

/// Response for completion status
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    pub success: bool,
    pub document_id: String,
    pub fully_signed: bool,
    pub roles: Vec<RoleCompletionView>,
}

/// Handle GET /api/v1/documents/{id}/completion
pub async fn handle_completion<S: SigningStore>(
    state: Arc<AppState<S>>,
    document_id: &str,
) -> Response<Full<Bytes>> {
    let id = match ObjectId::parse_str(document_id) {
        Ok(id) => id,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid document id"),
    };

    match state.signing.completion(id).await {
        Ok(status) => json_response(
            StatusCode::OK,
            &CompletionResponse {
                success: true,
                document_id: status.document_id.to_hex(),
                fully_signed: status.fully_signed,
                roles: status
                    .roles
                    .into_iter()
                    .map(|r| RoleCompletionView {
                        role: r.role.as_str().to_string(),
                        label: r.role.display_label().to_string(),
                        placeholder_signed: r.placeholder_signed,
                        token_state: r.token_state,
                    })
                    .collect(),
            },
        ),
        Err(e) => failure_response(&e),
    }
}

// =============================================================================
// Token issue / revoke
// =============================================================================

/// Request body for issuing a signing token
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueTokenRequest {
    /// Signer role: tenant, property_manager, tenant_witness, property_manager_witness
    pub role: String,
    pub signer_name: String,
    pub signer_email: String,
    #[serde(default)]
    pub signer_phone: Option<String>,
    /// Staff user issuing the token
    pub created_by_id: String,
    #[serde(default)]
    pub tenant_application_id: Option<String>,
    #[serde(default)]
    pub lease_id: Option<String>,
    /// Explicit expiry; defaults to now + configured TTL
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Response from issuing a token. `token` is the only copy of the secret.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueTokenResponse {
    pub success: bool,
    pub token_id: String,
    /// Plaintext signing secret; only the hash is stored
    pub token: String,
    pub role: String,
    pub expires_at: String,
    /// Path the recipient's signing link should point at
    pub signing_path: String,
}

/// Handle POST /api/v1/documents/{id}/tokens
pub async fn handle_issue_token<S: SigningStore>(
    req: Request<Incoming>,
    state: Arc<AppState<S>>,
    document_id: &str,
) -> Response<Full<Bytes>> {
    let doc_id = match ObjectId::parse_str(document_id) {
        Ok(id) => id,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid document id"),
    };

    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Issue token request body error: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Failed to read request body");
        }
    };

    let request: IssueTokenRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid JSON: {}", e));
        }
    };

    let role = match SignerRole::parse(&request.role) {
        Some(r) => r,
        None => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Unknown signer role: {}", request.role),
            );
        }
    };

    let created_by_id = match ObjectId::parse_str(&request.created_by_id) {
        Ok(id) => id,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid createdById"),
    };

    let tenant_application_id = match request.tenant_application_id.as_deref() {
        Some(raw) => match ObjectId::parse_str(raw) {
            Ok(id) => Some(id),
            Err(_) => {
                return error_response(StatusCode::BAD_REQUEST, "Invalid tenantApplicationId");
            }
        },
        None => None,
    };

    let lease_id = match request.lease_id.as_deref() {
        Some(raw) => match ObjectId::parse_str(raw) {
            Ok(id) => Some(id),
            Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid leaseId"),
        },
        None => None,
    };

    let issue = IssueRequest {
        document_id: doc_id,
        role,
        signer_name: request.signer_name,
        signer_email: request.signer_email,
        signer_phone: request.signer_phone,
        created_by_id,
        tenant_application_id,
        lease_id,
        expires_at: request.expires_at,
    };

    match state.signing.issue(issue).await {
        Ok(issued) => json_response(
            StatusCode::OK,
            &IssueTokenResponse {
                success: true,
                token_id: issued.token_id.to_hex(),
                signing_path: format!("/sign/{}", issued.token_secret),
                token: issued.token_secret,
                role: issued.role.as_str().to_string(),
                expires_at: issued.expires_at.to_rfc3339(),
            },
        ),
        Err(e) => failure_response(&e),
    }
}

/// Handle POST /api/v1/tokens/{id}/revoke
pub async fn handle_revoke_token<S: SigningStore>(
    state: Arc<AppState<S>>,
    token_id: &str,
) -> Response<Full<Bytes>> {
    let id = match ObjectId::parse_str(token_id) {
        Ok(id) => id,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid token id"),
    };

    match state.signing.revoke(id).await {
        Ok(()) => {
            info!(token_id = %id.to_hex(), "Signing token revoked");
            json_response(
                StatusCode::OK,
                &serde_json::json!({
                    "success": true,
                    "tokenId": id.to_hex(),
                    "state": "revoked",
                }),
            )
        }
        Err(e) => failure_response(&e),
    }
}
