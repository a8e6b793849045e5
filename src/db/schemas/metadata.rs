//! Audit metadata embedded in every stored record
//!
//! Lease records are never hard-deleted: the audit trail has to outlive
//! the leases it describes. Deletion is a flag plus a timestamp set by
//! whichever service retires the record, and every read filters on the
//! flag.

use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Lifecycle timestamps and the soft-delete flag.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Metadata {
    /// When the record was first written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,

    /// When the record last changed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    /// Soft-delete flag; reads treat a flagged record as absent
    #[serde(default)]
    pub is_deleted: bool,

    /// When the record was retired
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime>,
}

impl Metadata {
    /// Metadata for a record about to be written.
    pub fn new() -> Self {
        Self {
            created_at: Some(DateTime::now()),
            updated_at: Some(DateTime::now()),
            is_deleted: false,
            deleted_at: None,
        }
    }
}
