//! Options bag for a diff request.
//!
//! Everything beyond `threshold` and `wrap` is either a target-format switch
//! or an opaque pass-through handed to the converter.

use std::path::PathBuf;

/// Configuration for one diff request.
#[derive(Debug, Clone)]
pub struct Options {
    /// Minimum similarity in `[0, 1]` for a diff to be rendered. `0.0`
    /// disables the gate.
    pub threshold: f64,
    /// Wrap width in columns; `0` disables wrapping.
    pub wrap: usize,
    /// Source format hint, forwarded to the converter.
    pub from: Option<String>,
    /// Target output format.
    pub to: Option<String>,
    /// Destination file; when set, output is written there and the pipeline
    /// returns no text.
    pub output: Option<PathBuf>,
    /// Produce a standalone document. Implied by PDF output.
    pub standalone: bool,
    /// Use ATX headings in markdown output.
    pub atx_headers: bool,
    /// Use reference-style links in markdown output.
    pub reference_links: bool,
    /// Syntax highlighting style for emitted documents.
    pub highlight_style: Option<String>,
    /// PDF engine, forwarded to the converter.
    pub pdf_engine: Option<String>,
    /// Resource search path, forwarded to the converter.
    pub resource_path: Option<String>,
    /// Extract embedded media to this directory, forwarded to the converter.
    pub extract_media: Option<PathBuf>,
    /// Style reference document, forwarded to the converter.
    pub reference_doc: Option<PathBuf>,
    /// Bibliography files, forwarded to the converter.
    pub bibliography: Vec<PathBuf>,
    /// Citation style file, forwarded to the converter.
    pub csl: Option<PathBuf>,
    /// Converter filters, forwarded in order.
    pub filters: Vec<String>,
    /// Converter Lua filters, forwarded in order.
    pub lua_filters: Vec<String>,
    /// Render math as MathML instead of the default math markup.
    pub mathml: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            wrap: 72,
            from: None,
            to: None,
            output: None,
            standalone: false,
            atx_headers: false,
            reference_links: false,
            highlight_style: None,
            pdf_engine: None,
            resource_path: None,
            extract_media: None,
            reference_doc: None,
            bibliography: Vec::new(),
            csl: None,
            filters: Vec::new(),
            lua_filters: Vec::new(),
            mathml: false,
        }
    }
}
