//! Signing workflow: token state machine and its storage boundary

pub mod service;
pub mod store;

pub use service::{
    hash_token_secret, CompletionStatus, IssueRequest, IssuedToken, RoleCompletion, SignOutcome,
    SignRequest, SigningAccess, SigningConfig, SigningService,
};
pub use store::{MemoryStore, SigningStore};
