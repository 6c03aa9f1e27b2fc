//! Pandoc-backed converter.
//!
//! Documents are converted through pandoc's HTML writer with math kept in
//! single-backslash TeX delimiters and quotes in `q` tags, so the diff
//! engine sees one uniform markup dialect. Markdown is produced with the
//! extension set that disables span/attribute syntax, which keeps annotation
//! spans intact as raw markup for the critic encoder.

use crate::convert::{Convert, Source};
use crate::{Error, Options, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Markdown dialect for the encoded text: spans, attribute syntax and table
/// variants are disabled so annotation spans survive as raw markup and the
/// output stays diff-friendly.
const MARKDOWN: &str = "markdown-bracketed_spans-fenced_code_attributes-fenced_divs\
-grid_tables-header_attributes-inline_code_attributes-link_attributes\
-multiline_tables-pipe_tables-simple_tables-smart";

/// Math delimiters injected by the HTML writer; stripped before diffing so
/// they cannot register as changes, and re-added by the postprocessor.
static MATH_DELIMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[()\[\]]").expect("static pattern"));

/// Converter shelling out to a pandoc binary.
pub struct Pandoc {
    program: PathBuf,
}

impl Pandoc {
    /// Locate pandoc on the search path.
    pub fn new() -> Result<Self> {
        let program = which::which("pandoc").map_err(|e| Error::ConverterMissing(e.to_string()))?;
        Ok(Self { program })
    }

    /// Use a specific pandoc binary.
    pub fn at(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[String], stdin: Option<&str>) -> Result<String> {
        debug!(?args, "invoking pandoc");
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = command.spawn()?;
        if let Some(input) = stdin {
            if let Some(mut handle) = child.stdin.take() {
                handle.write_all(input.as_bytes()).await?;
            }
        } else {
            drop(child.stdin.take());
        }
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(Error::Converter(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Pass-through options forwarded to every source conversion.
    fn convert_args(&self, opts: &Options) -> Vec<String> {
        let mut args = Vec::new();
        for bib in &opts.bibliography {
            args.push(format!("--bibliography={}", bib.display()));
        }
        if let Some(csl) = &opts.csl {
            args.push(format!("--csl={}", csl.display()));
        }
        if let Some(dir) = &opts.extract_media {
            args.push(format!("--extract-media={}", dir.display()));
        }
        for filter in &opts.filters {
            args.push(format!("--filter={filter}"));
        }
        if let Some(from) = &opts.from {
            args.push(format!("--from={from}"));
        }
        for filter in &opts.lua_filters {
            args.push(format!("--lua-filter={filter}"));
        }
        if opts.mathml {
            args.push("--mathml".to_string());
        }
        if let Some(doc) = &opts.reference_doc {
            args.push(format!("--reference-doc={}", doc.display()));
        }
        if let Some(path) = &opts.resource_path {
            args.push(format!("--resource-path={path}"));
        }
        args
    }
}

#[async_trait]
impl Convert for Pandoc {
    async fn source_to_markup(&self, source: &Source, opts: &Options) -> Result<String> {
        let mut args = self.convert_args(opts);
        args.push("--html-q-tags".to_string());
        args.push("--mathjax".to_string());

        let markup = match source {
            Source::Path(path) => {
                let mut args = args.clone();
                args.push(path.display().to_string());
                self.run(&args, None).await?
            },
            Source::Text(text) => self.run(&args, Some(text)).await?,
        };
        let markup = MATH_DELIMS.replace_all(&markup, "").into_owned();

        // With media extraction the rewritten references only appear after a
        // second pass over the extracted document.
        if opts.extract_media.is_some() {
            let mut args = args.clone();
            args.push("--from=html".to_string());
            return self.run(&args, Some(&markup)).await;
        }
        Ok(markup)
    }

    async fn markup_to_text(&self, markup: &str, opts: &Options) -> Result<String> {
        let first_pass = [
            "-f".to_string(),
            "html+tex_math_single_backslash".to_string(),
            "-t".to_string(),
            MARKDOWN.to_string(),
        ];
        let intermediate = self.run(&first_pass, Some(markup)).await?;

        let mut args = Vec::new();
        if opts.atx_headers || opts.output.is_some() || opts.to.is_some() {
            args.push("--atx-headers".to_string());
        }
        if opts.reference_links {
            args.push("--reference-links".to_string());
        }
        args.push("--wrap=none".to_string());
        args.push("-t".to_string());
        args.push(MARKDOWN.to_string());
        self.run(&args, Some(&intermediate)).await
    }

    async fn emit(
        &self,
        text: &str,
        args: &[String],
        output: Option<&Path>,
    ) -> Result<Option<String>> {
        let mut args = args.to_vec();
        if let Some(path) = output {
            args.push(format!("--output={}", path.display()));
            self.run(&args, Some(text)).await?;
            return Ok(None);
        }
        self.run(&args, Some(text)).await.map(Some)
    }

    async fn track_changes_markup(&self, file: &Path) -> Result<String> {
        let args = [file.display().to_string(), "--track-changes=all".to_string()];
        self.run(&args, None).await
    }
}
