//! Public signing entry point
//!
//! The only routes a lease signer ever touches. The token in the path is
//! the whole credential; there is no account or session behind it.
//!
//! - `GET /sign/{token}` - signer-facing context: document tree, role, progress
//! - `POST /sign/{token}` - submit a drawn signature
//!
//! Verification marks the token as accessed, so the office can see that a
//! recipient opened their link before signing.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::document::{DocumentTree, SignatureStatus};
use crate::routes::respond::{error_response, failure_response, json_response};
use crate::server::AppState;
use crate::signing::{SignRequest, SigningStore};

// =============================================================================
// Types
// =============================================================================

/// Signer-facing context for the signing page
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningPageResponse {
    pub success: bool,
    pub role: String,
    pub role_label: String,
    pub signer_name: String,
    pub document_id: String,
    pub document_title: String,
    pub expires_at: String,
    /// Canonical document tree for rendering
    pub document: DocumentTree,
    /// Signed-ness of every placeholder, this role's and the others'
    pub statuses: Vec<SignatureStatus>,
}

/// Request body for submitting a signature
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSignatureRequest {
    /// Data URL of the drawn signature image
    pub signature_url: String,
    /// Name as typed by the signer; falls back to the name on the token
    #[serde(default)]
    pub signed_by_name: Option<String>,
}

/// Response after a completed signing
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSignatureResponse {
    pub success: bool,
    pub document_id: String,
    pub signature_id: String,
    pub role: String,
    /// True when every placeholder role now has a completed signing
    pub fully_signed: bool,
    /// Updated document tree with the new signature stamped in
    pub document: DocumentTree,
}

// =============================================================================
// Route handlers
// =============================================================================

/// Handle GET /sign/{token}
pub async fn handle_signing_page<S: SigningStore>(
    state: Arc<AppState<S>>,
    token_secret: &str,
) -> Response<Full<Bytes>> {
    match state.signing.verify(token_secret).await {
        Ok(access) => json_response(
            StatusCode::OK,
            &SigningPageResponse {
                success: true,
                role: access.role.as_str().to_string(),
                role_label: access.role_label,
                signer_name: access.signer_name,
                document_id: access.document_id.to_hex(),
                document_title: access.document_title,
                expires_at: access.expires_at.to_rfc3339(),
                document: access.tree,
                statuses: access.statuses,
            },
        ),
        Err(e) => failure_response(&e),
    }
}

/// Handle POST /sign/{token}
pub async fn handle_submit_signature<S: SigningStore>(
    req: Request<Incoming>,
    state: Arc<AppState<S>>,
    token_secret: &str,
    peer: SocketAddr,
) -> Response<Full<Bytes>> {
    // Prefer the proxy-reported client address over the socket peer
    let ip_address = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| peer.ip().to_string());

    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Signature request body error: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Failed to read request body");
        }
    };

    let request: SubmitSignatureRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid JSON: {}", e));
        }
    };

    if request.signature_url.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "signatureUrl must not be empty");
    }

    let sign = SignRequest {
        token_secret: token_secret.to_string(),
        signature_url: request.signature_url,
        signer_name: request.signed_by_name.unwrap_or_default(),
        ip_address,
    };

    match state.signing.sign(sign).await {
        Ok(outcome) => {
            info!(
                document_id = %outcome.document_id.to_hex(),
                role = %outcome.role,
                fully_signed = outcome.fully_signed,
                "Signature recorded"
            );
            json_response(
                StatusCode::OK,
                &SubmitSignatureResponse {
                    success: true,
                    document_id: outcome.document_id.to_hex(),
                    signature_id: outcome.signature_id.to_hex(),
                    role: outcome.role.as_str().to_string(),
                    fully_signed: outcome.fully_signed,
                    document: outcome.tree,
                },
            )
        }
        Err(e) => failure_response(&e),
    }
}
