//! External document converter collaborator
//!
//! The converter turns uploaded bytes into intermediate markup (Markdown
//! with inline HTML allowed). The contract is one-shot and stateless;
//! covenant holds no converter state between calls.

use std::fmt;
use std::time::Duration;

use crate::types::{CovenantError, Result};

/// Upload formats the ingestion pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Docx,
    Pdf,
}

impl SourceFormat {
    /// Stored format tag ("docx", "pdf").
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Docx => "docx",
            SourceFormat::Pdf => "pdf",
        }
    }

    /// Pick the format from an uploaded filename.
    pub fn from_filename(filename: &str) -> Option<SourceFormat> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".docx") || lower.ends_with(".doc") {
            Some(SourceFormat::Docx)
        } else if lower.ends_with(".pdf") {
            Some(SourceFormat::Pdf)
        } else {
            None
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Reads as "failed to import this Word document" in errors
        let s = match self {
            SourceFormat::Docx => "Word",
            SourceFormat::Pdf => "PDF",
        };
        f.write_str(s)
    }
}

/// Trait for the byte-to-markup conversion collaborator (allows mocking
/// in tests)
#[async_trait::async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert document bytes to intermediate markup
    async fn convert(&self, format: SourceFormat, bytes: &[u8]) -> Result<String>;
}

/// HTTP adapter for a converter service.
///
/// POSTs the raw bytes to `{base_url}/convert/{format}` and expects the
/// markup back as the response body. A timeout is a conversion failure
/// with its own message so callers can tell "converter down" from
/// "converter rejected the file".
pub struct HttpConverter {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpConverter {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl DocumentConverter for HttpConverter {
    async fn convert(&self, format: SourceFormat, bytes: &[u8]) -> Result<String> {
        let url = format!("{}/convert/{}", self.base_url, format.as_str());

        let send = self
            .client
            .post(&url)
            .header("Content-Type", "application/octet-stream")
            .body(bytes.to_vec())
            .send();

        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| CovenantError::Conversion {
                format,
                message: format!("converter timed out after {}s", self.timeout.as_secs()),
            })?
            .map_err(|e| CovenantError::Conversion {
                format,
                message: format!("converter unreachable: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(CovenantError::Conversion {
                format,
                message: format!("converter returned {}", response.status()),
            });
        }

        response.text().await.map_err(|e| CovenantError::Conversion {
            format,
            message: format!("failed to read converter response: {e}"),
        })
    }
}
