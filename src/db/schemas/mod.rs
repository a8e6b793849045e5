//! Database schemas for Covenant
//!
//! Defines MongoDB document structures for lease documents, signing
//! tokens, and signature audit records.

mod document_signature;
mod lease_document;
mod metadata;
mod signing_token;

pub use document_signature::{DocumentSignatureDoc, DOCUMENT_SIGNATURE_COLLECTION};
pub use lease_document::{LeaseDocumentDoc, LEASE_DOCUMENT_COLLECTION};
pub use metadata::Metadata;
pub use signing_token::{SigningTokenDoc, TokenState, SIGNING_TOKEN_COLLECTION};
