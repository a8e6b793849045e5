//! HTTP server implementation
//!
//! hyper http1 with TokioIo for async handling, one spawned task per
//! connection. Routing is a single method/path match; handlers live in
//! `crate::routes`.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::ingest::{HttpConverter, IngestPipeline};
use crate::routes;
use crate::signing::{SigningService, SigningStore};
use crate::types::Result;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
///
/// Generic over the signing store so production (MongoDB) and dev mode
/// (in-memory) run the same code paths.
pub struct AppState<S: SigningStore> {
    pub args: Args,
    /// Token issue/verify/sign/revoke workflow
    pub signing: Arc<SigningService<S>>,
    /// Upload conversion and markup parsing
    pub ingest: Arc<IngestPipeline<HttpConverter>>,
}

impl<S: SigningStore> AppState<S> {
    pub fn new(
        args: Args,
        signing: Arc<SigningService<S>>,
        ingest: Arc<IngestPipeline<HttpConverter>>,
    ) -> Self {
        Self {
            args,
            signing,
            ingest,
        }
    }
}

/// Start the HTTP server
pub async fn run<S: SigningStore + 'static>(state: Arc<AppState<S>>) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.args.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Covenant listening on {}", addr);

    if state.args.dev_mode {
        warn!("Development mode enabled - using in-memory store");
    }

    info!("Converter sidecar: {}", state.args.converter_url);
    info!("Signing links served at /sign/{{token}}");

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, peer, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", peer, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request<S: SigningStore>(
    state: Arc<AppState<S>>,
    peer: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", peer, method, path);

    let response = match (method, path.as_str()) {
        // Liveness probe - returns 200 if covenant is running
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            to_boxed(routes::health_check(Arc::clone(&state)).await)
        }

        // Readiness probe - returns 200 only if the store answers a ping
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            to_boxed(routes::readiness_check(Arc::clone(&state)).await)
        }

        // Version info for deployment verification
        (Method::GET, "/version") => to_boxed(routes::version_info()),

        // CORS preflight
        (Method::OPTIONS, _) => to_boxed(preflight_response()),

        // ====================================================================
        // Public signing entry point (token-authenticated, no session)
        // ====================================================================

        // Signer-facing context: document tree, role, progress
        (Method::GET, p) if p.starts_with("/sign/") => {
            let token_secret = p.strip_prefix("/sign/").unwrap_or("");
            if token_secret.is_empty() || token_secret.contains('/') {
                to_boxed(not_found_response(p))
            } else {
                to_boxed(routes::handle_signing_page(Arc::clone(&state), token_secret).await)
            }
        }

        // Submit a drawn signature
        (Method::POST, p) if p.starts_with("/sign/") => {
            let token_secret = p.strip_prefix("/sign/").unwrap_or("").to_string();
            if token_secret.is_empty() || token_secret.contains('/') {
                to_boxed(not_found_response(&path))
            } else {
                return Ok(to_boxed(
                    routes::handle_submit_signature(req, Arc::clone(&state), &token_secret, peer)
                        .await,
                ));
            }
        }

        // ====================================================================
        // Document management API
        // ====================================================================

        // Import an uploaded lease (docx/pdf) through the converter
        (Method::POST, "/api/v1/documents/import") => {
            return Ok(to_boxed(
                routes::handle_import_document(req, Arc::clone(&state)).await,
            ));
        }

        // Derived completion status
        (Method::GET, p)
            if p.starts_with("/api/v1/documents/") && p.ends_with("/completion") =>
        {
            let document_id = p
                .strip_prefix("/api/v1/documents/")
                .and_then(|s| s.strip_suffix("/completion"))
                .unwrap_or("");
            to_boxed(routes::handle_completion(Arc::clone(&state), document_id).await)
        }

        // Issue a signing token for one (document, role)
        (Method::POST, p)
            if p.starts_with("/api/v1/documents/") && p.ends_with("/tokens") =>
        {
            let document_id = p
                .strip_prefix("/api/v1/documents/")
                .and_then(|s| s.strip_suffix("/tokens"))
                .unwrap_or("")
                .to_string();
            return Ok(to_boxed(
                routes::handle_issue_token(req, Arc::clone(&state), &document_id).await,
            ));
        }

        // Revoke an outstanding token
        (Method::POST, p)
            if p.starts_with("/api/v1/tokens/") && p.ends_with("/revoke") =>
        {
            let token_id = p
                .strip_prefix("/api/v1/tokens/")
                .and_then(|s| s.strip_suffix("/revoke"))
                .unwrap_or("");
            to_boxed(routes::handle_revoke_token(Arc::clone(&state), token_id).await)
        }

        // Default: not found
        _ => to_boxed(not_found_response(&path)),
    };

    Ok(response)
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
        "hint": "Signing links look like /sign/{token}"
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
