//! HTTP routes for Covenant

pub mod documents;
pub mod health;
pub mod respond;
pub mod sign;

pub use documents::{
    handle_completion, handle_import_document, handle_issue_token, handle_revoke_token,
};
pub use health::{health_check, readiness_check, version_info};
pub use respond::{error_response, failure_response, json_response};
pub use sign::{handle_signing_page, handle_submit_signature};
