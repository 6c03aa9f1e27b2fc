//! Structurally-aware document diffs rendered as inline critic markup.
//!
//! The pipeline: both sources go through the converter into canonical markup
//! text, the diff engine merges them into one inline-tagged tree, the
//! similarity gate vetoes diffs that are too different to read, the
//! postprocessor rewrites the tree into a canonical annotation tree, the
//! converter serializes it to markdown, the critic codec encodes annotation
//! spans as `{--..--}` / `{++..++}` / `{~~..~>..~~}` tokens, the wrap
//! renderer reflows the text, and emission converts to the requested target
//! view.
//!
//! Each request is a strict sequential chain that owns its tree exclusively;
//! the only suspension points are collaborator invocations, and a failed
//! invocation aborts the request without retry.

pub mod convert;
pub mod critic;
pub mod engine;
mod options;
pub mod pandoc;
pub mod postprocess;
pub mod similarity;
pub mod wrap;

pub use convert::{Convert, Source};
pub use critic::View;
pub use engine::{DiffEngine, TokenDiff};
pub use options::Options;
pub use pandoc::Pandoc;

use std::io::Write as _;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum Error {
    #[error("converter unavailable: {0}")]
    ConverterMissing(String),
    #[error("converter failed: {0}")]
    Converter(String),
    #[error("diff engine failed: {0}")]
    Engine(String),
    #[error(transparent)]
    Markup(#[from] redline_markup::ParseError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Diff two documents and render the result.
///
/// Returns `Ok(None)` when the similarity gate rejects the diff or when the
/// output was written to a file.
pub async fn diff(
    old: &Source,
    new: &Source,
    converter: &dyn Convert,
    engine: &dyn DiffEngine,
    opts: &Options,
) -> Result<Option<String>> {
    let old_markup = converter.source_to_markup(old, opts).await?;
    let new_markup = converter.source_to_markup(new, opts).await?;
    let merged = engine.merge(&old_markup, &new_markup).await?;

    if opts.threshold > 0.0 {
        let similarity = similarity::score(&merged);
        if similarity < opts.threshold {
            let changed = similarity::changed_percent(similarity);
            warn!("{changed}% of the content has changed");
            return Ok(None);
        }
    }

    render(&merged, converter, opts).await
}

/// Render an inline-tagged diff tree: postprocess, encode, wrap, emit.
pub async fn render(
    merged: &str,
    converter: &dyn Convert,
    opts: &Options,
) -> Result<Option<String>> {
    let mut tree = redline_markup::parse(merged)?;
    postprocess::postprocess(&mut tree);
    let markup = redline_markup::serialize(&tree);
    debug!(len = markup.len(), "postprocessed annotation tree");

    let markdown = converter.markup_to_text(&markup, opts).await?;
    let encoded = critic::encode(&markdown);
    let wrapped = wrap::reflow(&encoded, opts.wrap);
    postrender(wrapped, converter, opts).await
}

/// Render the revision marks already present in a word-processor document.
pub async fn track_changes(
    file: &Path,
    converter: &dyn Convert,
    opts: &Options,
) -> Result<Option<String>> {
    let markup = converter.track_changes_markup(file).await?;
    render(&markup, converter, opts).await
}

/// Re-diff a critic-markup document against itself, normalising its
/// annotations: the reject view is treated as the old document and the
/// accept view as the new one.
pub async fn normalise(
    text: &str,
    converter: &dyn Convert,
    engine: &dyn DiffEngine,
    opts: &Options,
) -> Result<Option<String>> {
    let old = Source::text(critic::reject(text));
    let new = Source::text(critic::accept(text));
    diff(&old, &new, converter, engine, opts).await
}

/// Decode the critic text for the requested target and hand it to the
/// converter for emission.
async fn postrender(
    text: String,
    converter: &dyn Convert,
    opts: &Options,
) -> Result<Option<String>> {
    if opts.output.is_none() && opts.to.is_none() {
        return Ok(Some(text));
    }

    let out_ext = opts
        .output
        .as_ref()
        .and_then(|p| p.extension())
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    let has_ext = |ext: &str| out_ext.as_deref() == Some(ext);
    let to = opts.to.as_deref();
    let standalone = opts.standalone || has_ext("pdf");

    let highlight = opts.highlight_style.as_deref().unwrap_or("kate");
    let mut args = vec![format!("--highlight-style={highlight}")];
    if let Some(engine) = &opts.pdf_engine {
        args.push(format!("--pdf-engine={engine}"));
    }
    if let Some(path) = &opts.resource_path {
        args.push(format!("--resource-path={path}"));
    }
    if standalone {
        args.push("--standalone".to_string());
    }
    if let Some(to) = to {
        args.push(format!("--to={to}"));
    }

    let mut text = text;
    // The stylesheet handed to the converter must outlive the invocation.
    let mut stylesheet_file = None;
    if to == Some("latex") || has_ext("tex") || has_ext("pdf") {
        text = critic::decode(&text, View::Latex);
        args.push("--variable".to_string());
        args.push("colorlinks=true".to_string());
    } else if to == Some("docx") || has_ext("docx") {
        text = critic::decode(&text, View::TrackChanges);
    } else if to == Some("html") || has_ext("html") {
        text = wrap_annotation_blocks(&critic::decode(&text, View::Html));
        if standalone {
            let file = stylesheet()?;
            args.push(format!("--css={}", file.path().display()));
            args.push("--variable".to_string());
            args.push("include-before=<article class=\"markdown-body\">".to_string());
            args.push("--variable".to_string());
            args.push("include-after=</article>".to_string());
            args.push("--self-contained".to_string());
            stylesheet_file = Some(file);
        }
    }

    let result = converter.emit(&text, &args, opts.output.as_deref()).await;
    drop(stylesheet_file);
    result
}

/// Blocks that open with a bare annotation tag need explicit paragraph
/// wrappers, or the converter would treat the whole block as raw markup.
fn wrap_annotation_blocks(text: &str) -> String {
    text.split("\n\n")
        .map(|block| {
            if block.starts_with("<ins>") || block.starts_with("<del>") {
                format!("<p>{block}</p>")
            } else {
                block.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Bundled annotation stylesheet, written out for the converter.
fn stylesheet() -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("redline")
        .suffix(".css")
        .tempfile()?;
    file.write_all(include_str!("../assets/redline.css").as_bytes())?;
    file.flush()?;
    Ok(file)
}
