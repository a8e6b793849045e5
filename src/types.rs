//! Shared error and result types for covenant

use crate::ingest::SourceFormat;

/// Errors surfaced by covenant's signing workflow and its collaborators.
///
/// Token-shaped failures are deliberately separate variants so callers can
/// offer the correct remedy (request a new link vs. show the completed
/// state vs. re-upload the document).
#[derive(Debug, thiserror::Error)]
pub enum CovenantError {
    /// The external converter could not turn the upload into markup.
    #[error("failed to import this {format} document: {message}")]
    Conversion {
        format: SourceFormat,
        message: String,
    },

    /// Markup or stored content failed to parse into a document tree.
    #[error("document content parse error: {0}")]
    Parse(String),

    /// No token matches the presented secret.
    #[error("signing token not found")]
    TokenNotFound,

    /// The token's expiry has passed.
    #[error("signing token has expired")]
    TokenExpired,

    /// The token already completed its single signing.
    #[error("signing token has already been used to sign")]
    TokenAlreadySigned,

    /// The token was revoked before use.
    #[error("signing token has been revoked")]
    TokenRevoked,

    /// A live token already exists for this (document, role).
    #[error("a signing token is already outstanding for role {role}")]
    IssueConflict { role: String },

    /// Persistence collaborator failure (connection, write conflict budget
    /// exhausted, malformed stored data).
    #[error("database error: {0}")]
    Database(String),

    /// Requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid caller input (blank signer identity, malformed body).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Socket-level failure while binding or serving.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CovenantError>;
