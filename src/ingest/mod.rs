//! Document ingestion for Covenant
//!
//! Turns uploaded lease binaries into canonical document trees.
//!
//! ## Stages
//!
//! - **Converter**: ships docx/pdf bytes to the conversion sidecar, gets markup back
//! - **Markup**: parses the intermediate markup, turning signature tags into placeholders
//! - **Pipeline**: glues the two together and measures the result

pub mod converter;
pub mod markup;
pub mod pipeline;

pub use converter::{DocumentConverter, HttpConverter, SourceFormat};
pub use markup::{parse_markup, MarkupTypeMap};
pub use pipeline::{IngestContext, IngestOutput, IngestPipeline};
