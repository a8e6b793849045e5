//! Covenant - lease document signing for Haven Property
//!
//! "I signed and sealed the deed, and called witnesses" - Jeremiah 32:10
//!
//! Covenant turns uploaded lease documents (docx/pdf) into a canonical
//! document tree, issues per-role signing links, stamps drawn signatures
//! into the tree, and derives workflow completion from the stored state.
//!
//! ## Components
//!
//! - **Document**: canonical tree, signer role vocabulary, walkers, injection
//! - **Ingest**: converter sidecar client and markup parsing
//! - **Signing**: token state machine over a pluggable store
//! - **Db**: MongoDB collections with soft delete and declared indexes
//! - **Server / Routes**: hyper HTTP surface

pub mod config;
pub mod db;
pub mod document;
pub mod ingest;
pub mod routes;
pub mod server;
pub mod signing;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{CovenantError, Result};
