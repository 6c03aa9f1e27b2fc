//! Diff engine seam and the bundled token-level engine.
//!
//! The engine contract: take two canonical markup serializations, return one
//! merged serialization with deletion/insertion regions tagged inline as raw
//! `<del>`/`<ins>` elements at word/run granularity. The postprocessor
//! canonicalizes those tags afterwards; the engine itself stays oblivious to
//! annotation classes.

use crate::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use similar::{capture_diff_slices, Algorithm, DiffTag};
use std::sync::LazyLock;

/// Structural diff collaborator.
#[async_trait]
pub trait DiffEngine: Send + Sync {
    /// Merge two markup serializations into one inline-tagged tree.
    async fn merge(&self, old: &str, new: &str) -> Result<String>;
}

/// Bundled word-level engine.
///
/// Markup is tokenized into tags, words and whitespace runs; the token
/// streams are diffed and changed runs are wrapped in `<del>`/`<ins>`.
/// Non-void tags are never wrapped: an inserted tag passes through bare so
/// the merged tree keeps the new document's structure, and a deleted tag is
/// dropped so stale structure does not resurface. Void tags (images, breaks)
/// are content and get wrapped like words. Whitespace-only changes are not
/// annotated.
#[derive(Debug, Default)]
pub struct TokenDiff;

impl TokenDiff {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DiffEngine for TokenDiff {
    async fn merge(&self, old: &str, new: &str) -> Result<String> {
        let old_tokens = tokenize(old);
        let new_tokens = tokenize(new);
        let ops = capture_diff_slices(Algorithm::Myers, &old_tokens, &new_tokens);

        let mut out = String::new();
        for op in ops {
            match op.tag() {
                DiffTag::Equal => {
                    for token in &new_tokens[op.new_range()] {
                        out.push_str(token);
                    }
                },
                DiffTag::Delete => emit_deleted(&old_tokens[op.old_range()], &mut out),
                DiffTag::Insert => emit_inserted(&new_tokens[op.new_range()], &mut out),
                DiffTag::Replace => {
                    emit_deleted(&old_tokens[op.old_range()], &mut out);
                    emit_inserted(&new_tokens[op.new_range()], &mut out);
                },
            }
        }
        if out.is_empty() && !old.is_empty() && !new.is_empty() {
            return Err(Error::Engine("merged diff came out empty".into()));
        }
        Ok(out)
    }
}

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>|\s+|[^<\s]+").expect("static pattern"));

fn tokenize(markup: &str) -> Vec<&str> {
    TOKEN.find_iter(markup).map(|m| m.as_str()).collect()
}

fn is_tag(token: &str) -> bool {
    token.starts_with('<')
}

/// Whether a token may live inside a del/ins wrapper: any non-tag token,
/// plus void-element tags, which carry content of their own.
fn is_wrappable(token: &str) -> bool {
    if !is_tag(token) {
        return true;
    }
    let name = token
        .trim_start_matches('<')
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    redline_markup::is_void_element(&name)
}

fn emit_deleted(tokens: &[&str], out: &mut String) {
    emit_changed(tokens, out, "del", false)
}

fn emit_inserted(tokens: &[&str], out: &mut String) {
    emit_changed(tokens, out, "ins", true)
}

/// Wrap maximal wrappable runs in the annotation tag. Unwrappable tags are
/// emitted bare when `keep_tags` is set (insertions keep the new structure)
/// and dropped otherwise (deleted structure must not resurface).
fn emit_changed(tokens: &[&str], out: &mut String, tag: &str, keep_tags: bool) {
    let mut run: Vec<&str> = Vec::new();
    let flush = |run: &mut Vec<&str>, out: &mut String| {
        if run.is_empty() {
            return;
        }
        let body: String = run.concat();
        if body.trim().is_empty() {
            // Whitespace-only change: keep new whitespace, drop old.
            if keep_tags {
                out.push_str(&body);
            }
        } else {
            out.push('<');
            out.push_str(tag);
            out.push('>');
            out.push_str(&body);
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        run.clear();
    };

    for &token in tokens {
        if is_wrappable(token) {
            run.push(token);
        } else {
            flush(&mut run, out);
            if keep_tags {
                out.push_str(token);
            }
        }
    }
    flush(&mut run, out);
}
