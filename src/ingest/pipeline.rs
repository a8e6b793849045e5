//! Ingestion pipeline: uploaded binary in, canonical document tree out.
//!
//! ```text
//! Client upload → Converter sidecar (this module) → Markup parser → Tree
//!                        │                                │
//!                  (docx/pdf bytes)                 (signature tags →
//!                        │                           placeholder nodes)
//!                        ▼
//!                  intermediate markup
//! ```
//!
//! The pipeline is a pure function over its inputs: it persists nothing and
//! produces either a complete tree or an error. A failure at any stage aborts
//! the import with no partial output.

use std::sync::Arc;
use tracing::{info, warn};

use crate::document::{duplicate_signature_roles, DocumentTree};
use crate::ingest::converter::{DocumentConverter, SourceFormat};
use crate::ingest::markup::{parse_markup, MarkupTypeMap};
use crate::types::Result;

// ============================================================================
// Types
// ============================================================================

/// Caller-supplied identifiers, carried through ingestion logs only.
#[derive(Debug, Clone, Default)]
pub struct IngestContext {
    pub property_id: Option<String>,
    pub template_id: Option<String>,
}

/// Result of a successful ingestion.
#[derive(Debug, Clone)]
pub struct IngestOutput {
    /// Canonical tree parsed from the converted markup.
    pub tree: DocumentTree,
    /// Total visible text length, in characters.
    pub text_size: usize,
    /// Signature roles that appear on more than one placeholder.
    pub duplicate_roles: Vec<String>,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Document ingestion service.
///
/// Generic over the converter so tests can run without the sidecar.
pub struct IngestPipeline<C: DocumentConverter> {
    converter: Arc<C>,
    type_map: MarkupTypeMap,
}

impl<C: DocumentConverter> IngestPipeline<C> {
    pub fn new(converter: Arc<C>) -> Self {
        Self {
            converter,
            type_map: MarkupTypeMap::default(),
        }
    }

    /// Create a pipeline with a custom markup-to-node-type mapping.
    pub fn with_type_map(converter: Arc<C>, type_map: MarkupTypeMap) -> Self {
        Self {
            converter,
            type_map,
        }
    }

    /// Convert an uploaded document and parse it into the canonical tree.
    ///
    /// Duplicate signature roles are reported in the output and logged, not
    /// rejected. Everything else is all-or-nothing.
    pub async fn ingest(
        &self,
        format: SourceFormat,
        bytes: &[u8],
        context: &IngestContext,
    ) -> Result<IngestOutput> {
        info!(
            format = %format,
            bytes = bytes.len(),
            property_id = context.property_id.as_deref().unwrap_or("-"),
            template_id = context.template_id.as_deref().unwrap_or("-"),
            "Converting uploaded document"
        );

        let markup = self.converter.convert(format, bytes).await?;
        let tree = parse_markup(&markup, &self.type_map)?;
        let text_size = tree.text_length();
        let duplicate_roles = duplicate_signature_roles(&tree);

        if !duplicate_roles.is_empty() {
            warn!(
                roles = %duplicate_roles.join(","),
                property_id = context.property_id.as_deref().unwrap_or("-"),
                "Converted document repeats signature roles"
            );
        }

        info!(
            format = %format,
            text_size = text_size,
            "Document converted and parsed"
        );

        Ok(IngestOutput {
            tree,
            text_size,
            duplicate_roles,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
