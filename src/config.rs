//! Configuration for Covenant
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::time::Duration;

/// Covenant - multi-party lease document signing
///
/// "I signed and sealed the deed, and called witnesses" - Jeremiah 32:10
#[derive(Parser, Debug, Clone)]
#[command(name = "covenant")]
#[command(about = "Lease document signing service for Haven Property")]
pub struct Args {
    /// Port to listen on
    #[arg(long, env = "COVENANT_PORT", default_value = "8090")]
    pub port: u16,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "covenant")]
    pub mongodb_db: String,

    /// URL of the document conversion sidecar
    /// Receives raw docx/pdf bytes, answers with intermediate markup
    #[arg(long, env = "CONVERTER_URL", default_value = "http://localhost:8091")]
    pub converter_url: String,

    /// Timeout for a single conversion request, in seconds
    #[arg(long, env = "CONVERTER_TIMEOUT_SECS", default_value = "45")]
    pub converter_timeout_secs: u64,

    /// Lifetime of issued signing tokens, in hours
    #[arg(long, env = "TOKEN_TTL_HOURS", default_value = "72")]
    pub token_ttl_hours: u64,

    /// Retry budget for contended document writes
    #[arg(long, env = "MAX_WRITE_RETRIES", default_value = "3")]
    pub max_write_retries: usize,

    /// Enable development mode (in-memory store, no MongoDB required)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Converter request timeout as a Duration
    pub fn converter_timeout(&self) -> Duration {
        Duration::from_secs(self.converter_timeout_secs)
    }

    /// Signing token lifetime as a Duration
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_hours * 3600)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.token_ttl_hours == 0 {
            return Err("TOKEN_TTL_HOURS must be at least 1".to_string());
        }

        if self.converter_timeout_secs == 0 {
            return Err("CONVERTER_TIMEOUT_SECS must be at least 1".to_string());
        }

        if !self.converter_url.starts_with("http://")
            && !self.converter_url.starts_with("https://")
        {
            return Err("CONVERTER_URL must be an http(s) URL".to_string());
        }

        Ok(())
    }
}
