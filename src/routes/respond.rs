//! Shared JSON response helpers for route handlers

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::types::CovenantError;

/// Create JSON response
pub fn json_response<T: Serialize>(status: StatusCode, data: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(data)
        .unwrap_or_else(|_| r#"{"error":"Serialization failed"}"#.to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Create error response
pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "success": false,
        "error": message,
    });

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Map a workflow error to its HTTP shape.
///
/// Token failures each get a distinct status/code pair so the signing UI
/// can offer the correct remedy (request a new link, show the signed
/// state, contact the office).
pub fn failure_response(err: &CovenantError) -> Response<Full<Bytes>> {
    let (status, code) = match err {
        CovenantError::TokenNotFound | CovenantError::NotFound(_) => {
            (StatusCode::NOT_FOUND, "not_found")
        }
        CovenantError::TokenExpired => (StatusCode::GONE, "token_expired"),
        CovenantError::TokenAlreadySigned => (StatusCode::CONFLICT, "already_signed"),
        CovenantError::IssueConflict { .. } => (StatusCode::CONFLICT, "issue_conflict"),
        CovenantError::TokenRevoked => (StatusCode::FORBIDDEN, "token_revoked"),
        CovenantError::InvalidRequest(_) | CovenantError::Parse(_) => {
            (StatusCode::BAD_REQUEST, "bad_request")
        }
        CovenantError::Conversion { .. } => (StatusCode::BAD_GATEWAY, "conversion_failed"),
        CovenantError::Database(_) | CovenantError::Io(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        }
    };

    let body = serde_json::json!({
        "success": false,
        "error": code,
        "message": err.to_string(),
    });

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_failures_map_to_distinct_statuses() {
        assert_eq!(
            failure_response(&CovenantError::TokenNotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            failure_response(&CovenantError::TokenExpired).status(),
            StatusCode::GONE
        );
        assert_eq!(
            failure_response(&CovenantError::TokenAlreadySigned).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            failure_response(&CovenantError::TokenRevoked).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            failure_response(&CovenantError::IssueConflict {
                role: "tenant".to_string()
            })
            .status(),
            StatusCode::CONFLICT
        );
    }
}
