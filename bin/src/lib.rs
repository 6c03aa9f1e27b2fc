//! Command-line interface for redline.
//!
//! Dispatch follows the input files: two documents are diffed against each
//! other; a single word-processor file is rendered from its own revision
//! marks; a single markdown file has its critic annotations normalised.

use anyhow::{bail, Context as _};
use clap::Parser;
use redline::{Options, Pandoc, Source, TokenDiff};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Command-line interface configuration.
#[derive(Debug, Parser)]
#[command(name = "redline", version, about, long_about = None)]
pub struct Cli {
    /// Two documents to compare, or one annotated document
    #[arg(value_name = "FILE", num_args = 0..=2)]
    pub files: Vec<PathBuf>,

    /// Source format, forwarded to the converter
    #[arg(short = 'f', long, value_name = "FORMAT")]
    pub from: Option<String>,

    /// Output format
    #[arg(short = 't', long, value_name = "FORMAT")]
    pub to: Option<String>,

    /// Write output to FILE instead of stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Line wrapping: "auto" or "none"
    #[arg(long, value_name = "auto|none")]
    pub wrap: Option<String>,

    /// Wrap width in columns
    #[arg(long, value_name = "NUM")]
    pub columns: Option<usize>,

    /// Give up when less than this fraction of the content is unchanged
    /// (0 disables the check)
    #[arg(long, value_name = "RATIO", default_value_t = 0.0)]
    pub threshold: f64,

    /// Use ATX-style headings in markdown output
    #[arg(long)]
    pub atx_headers: bool,

    /// Use reference-style links in markdown output
    #[arg(long)]
    pub reference_links: bool,

    /// Syntax highlighting style
    #[arg(long, value_name = "STYLE")]
    pub highlight_style: Option<String>,

    /// PDF rendering engine, forwarded to the converter
    #[arg(long, value_name = "PROGRAM")]
    pub pdf_engine: Option<String>,

    /// Resource search path, forwarded to the converter
    #[arg(long, value_name = "DIRS")]
    pub resource_path: Option<String>,

    /// Extract embedded media into DIR
    #[arg(long, value_name = "DIR")]
    pub extract_media: Option<PathBuf>,

    /// Style reference document for word-processor output
    #[arg(long, value_name = "FILE")]
    pub reference_doc: Option<PathBuf>,

    /// Bibliography file, repeatable
    #[arg(long, value_name = "FILE")]
    pub bibliography: Vec<PathBuf>,

    /// Citation style file
    #[arg(long, value_name = "FILE")]
    pub csl: Option<PathBuf>,

    /// Converter filter, repeatable
    #[arg(long, value_name = "PROGRAM")]
    pub filter: Vec<String>,

    /// Converter Lua filter, repeatable
    #[arg(long, value_name = "SCRIPT")]
    pub lua_filter: Vec<String>,

    /// Produce a standalone document
    #[arg(short = 's', long)]
    pub standalone: bool,

    /// Render math as MathML
    #[arg(long)]
    pub mathml: bool,
}

impl Cli {
    /// Map CLI flags onto the pipeline options bag.
    pub fn options(&self) -> Options {
        let wrap = match self.wrap.as_deref() {
            Some("none") => 0,
            _ => self.columns.unwrap_or(72),
        };
        Options {
            threshold: self.threshold,
            wrap,
            from: self.from.clone(),
            to: self.to.clone(),
            output: self.output.clone(),
            standalone: self.standalone,
            atx_headers: self.atx_headers,
            reference_links: self.reference_links,
            highlight_style: self.highlight_style.clone(),
            pdf_engine: self.pdf_engine.clone(),
            resource_path: self.resource_path.clone(),
            extract_media: self.extract_media.clone(),
            reference_doc: self.reference_doc.clone(),
            bibliography: self.bibliography.clone(),
            csl: self.csl.clone(),
            filters: self.filter.clone(),
            lua_filters: self.lua_filter.clone(),
            mathml: self.mathml,
        }
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Run the requested operation and print the result, if any, to stdout.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let opts = cli.options();
    let converter = Pandoc::new()?;
    let engine = TokenDiff::new();

    let text = match cli.files.as_slice() {
        [file] if has_extension(file, "docx") => {
            debug!(file = %file.display(), "rendering tracked changes");
            redline::track_changes(file, &converter, &opts).await?
        },
        [file] if has_extension(file, "md") || has_extension(file, "markdown") => {
            debug!(file = %file.display(), "normalising annotations");
            let text = std::fs::read_to_string(file)
                .with_context(|| format!("reading {}", file.display()))?;
            redline::normalise(&text, &converter, &engine, &opts).await?
        },
        [old, new] => {
            debug!(old = %old.display(), new = %new.display(), "diffing documents");
            let old = Source::path(old);
            let new = Source::path(new);
            redline::diff(&old, &new, &converter, &engine, &opts).await?
        },
        _ => bail!("expected two documents to compare, or one annotated document"),
    };

    if let Some(text) = text {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_none_disables_wrapping() {
        let cli = Cli::parse_from(["redline", "--wrap=none", "a", "b"]);
        assert_eq!(cli.options().wrap, 0);
    }

    #[test]
    fn columns_override_default_width() {
        let cli = Cli::parse_from(["redline", "--columns=100", "a", "b"]);
        assert_eq!(cli.options().wrap, 100);
    }

    #[test]
    fn wrap_defaults_to_72_columns() {
        let cli = Cli::parse_from(["redline", "a", "b"]);
        assert_eq!(cli.options().wrap, 72);
    }

    #[test]
    fn threshold_defaults_to_disabled() {
        let cli = Cli::parse_from(["redline", "a", "b"]);
        assert_eq!(cli.options().threshold, 0.0);
    }

    #[test]
    fn repeatable_options_accumulate() {
        let cli = Cli::parse_from([
            "redline",
            "--bibliography=a.bib",
            "--bibliography=b.bib",
            "--filter=one",
            "a",
            "b",
        ]);
        let opts = cli.options();
        assert_eq!(opts.bibliography.len(), 2);
        assert_eq!(opts.filters, ["one"]);
    }
}
