//! Health check endpoints
//!
//! Kubernetes-style probes:
//! - /health, /healthz - liveness (is the process running?)
//! - /ready, /readyz - readiness (can the signing store be reached?)
//!
//! Liveness always answers 200 while the process is up; the body still
//! carries store status for operators. Readiness answers 200 only when the
//! store responds to a ping, so load balancers hold traffic during MongoDB
//! outages. Dev mode runs on the in-memory store, which is always ready.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::routes::respond::json_response;
use crate::server::AppState;
use crate::signing::SigningStore;

/// Health response body
#[derive(Serialize)]
pub struct HealthResponse {
    /// True whenever the process is up
    pub healthy: bool,
    /// 'online' when the store answers, 'degraded' otherwise
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
    /// Current timestamp
    pub timestamp: String,
    /// Operating mode
    pub mode: String,
    /// Signing store connectivity
    pub store: StoreHealth,
    /// Ping failure detail when the store is unreachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Store connectivity details
#[derive(Serialize)]
pub struct StoreHealth {
    pub connected: bool,
}

/// Build health response with current state
async fn build_health_response<S: SigningStore>(state: &AppState<S>) -> HealthResponse {
    let store_error = state.signing.store().ping().await.err();
    let connected = store_error.is_none();

    HealthResponse {
        healthy: true,
        status: if connected { "online" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development".to_string()
        } else {
            "production".to_string()
        },
        store: StoreHealth { connected },
        error: store_error.map(|e| e.to_string()),
    }
}

/// Handle liveness probe (/health, /healthz)
///
/// Returns 200 OK if the service is running, regardless of store status.
pub async fn health_check<S: SigningStore>(state: Arc<AppState<S>>) -> Response<Full<Bytes>> {
    let response = build_health_response(&state).await;
    json_response(StatusCode::OK, &response)
}

/// Handle readiness probe (/ready, /readyz)
///
/// Returns 200 OK only when the store answers; 503 otherwise.
pub async fn readiness_check<S: SigningStore>(state: Arc<AppState<S>>) -> Response<Full<Bytes>> {
    let response = build_health_response(&state).await;

    let status = if response.store.connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    json_response(status, &response)
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    /// Cargo package version
    pub version: &'static str,
    /// Git commit hash (short)
    pub commit: &'static str,
    /// Build timestamp
    pub build_time: &'static str,
    /// Service name
    pub service: &'static str,
}

/// Handle version endpoint (/version)
///
/// Returns build information so deployments can be matched to commits.
pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "covenant",
    };

    json_response(StatusCode::OK, &response)
}
