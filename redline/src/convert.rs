//! Converter seam.
//!
//! The converter is an external collaborator: it turns source documents into
//! canonical markup text and encoded text into target-format documents. The
//! pipeline only ever talks to this trait; the production implementation
//! lives in [`crate::pandoc`].

use crate::{Options, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// One side of a diff request.
#[derive(Debug, Clone)]
pub enum Source {
    /// Raw document text.
    Text(String),
    /// A document on disk.
    Path(PathBuf),
}

impl Source {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Source::Path(path.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Source::Text(text.into())
    }
}

/// External document converter.
///
/// Invocations are the pipeline's only suspension points. A failed
/// invocation is fatal for the request; implementations must not retry.
#[async_trait]
pub trait Convert: Send + Sync {
    /// Convert a source document into canonical markup text.
    async fn source_to_markup(&self, source: &Source, opts: &Options) -> Result<String>;

    /// Serialize canonical markup into target-neutral text (markdown) ready
    /// for critic encoding.
    async fn markup_to_text(&self, markup: &str, opts: &Options) -> Result<String>;

    /// Emit final text, optionally converting it and writing it to `output`.
    /// Returns `None` when the result was written to a file.
    async fn emit(&self, text: &str, args: &[String], output: Option<&Path>)
        -> Result<Option<String>>;

    /// Ingest a word-processor document, preserving its revision marks as
    /// `insertion`/`deletion` containers in the returned markup.
    async fn track_changes_markup(&self, file: &Path) -> Result<String>;
}
