//! Critic markup codec.
//!
//! Encoding turns the annotation spans surviving in the serialized markdown
//! into inline critic tokens: `{--old--}` deletion, `{++new++}` insertion,
//! `{~~old~>new~~}` substitution. Decoding re-renders those tokens for a
//! target view. All transforms are pure functions over text; the compiled
//! patterns are process-wide immutable statics.
//!
//! Token content must not contain its own closing delimiter; inside a
//! substitution, `~>` and `~~}` are reserved. A decoder fed hand-edited text
//! with unbalanced delimiters leaves the unmatched text unannotated.

use redline_markup::AnnotationKind;
use regex::Regex;
use std::sync::LazyLock;

static CRITIC_DEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{--(.*?)--\}").expect("static pattern"));
static CRITIC_INS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\+\+(.*?)\+\+\}").expect("static pattern"));
// Non-greedy up to the first `~>` / `~~}`, equivalent to the reference
// lookahead pattern for well-formed tokens.
static CRITIC_SUB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{~~(.*?)~>(.*?)~~\}").expect("static pattern"));

static SPAN_SUB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<span class="sub"><span class="del">(.*?)</span><span class="ins">(.*?)</span></span>"#)
        .expect("static pattern")
});
static SPAN_DEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<span class="del">(.*?)</span>"#).expect("static pattern"));
static SPAN_INS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<span class="ins">(.*?)</span>"#).expect("static pattern"));
static DIV_DEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div class="del">\s*(.*?)\s*</div>"#).expect("static pattern")
});
static DIV_INS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div class="ins">\s*(.*?)\s*</div>"#).expect("static pattern")
});

/// Target rendering of critic tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Explicit `<del>`/`<ins>` tag pairs.
    Html,
    /// Colored strike-through/underline markup; prepends an
    /// underline-capability preamble.
    Latex,
    /// Semantic deletion/insertion containers for native revision marks.
    TrackChanges,
    /// Post-change text only.
    Accept,
    /// Pre-change text only.
    Reject,
}

const LATEX_PREAMBLE: &str = "\\useunder{\\uline}{\\ulined}{}\n";

/// Span pattern and token template for each annotation kind.
fn span_encoding(kind: AnnotationKind) -> (&'static Regex, &'static str) {
    match kind {
        AnnotationKind::Sub => (&*SPAN_SUB, "{~~${1}~>${2}~~}"),
        AnnotationKind::Del => (&*SPAN_DEL, "{--${1}--}"),
        AnnotationKind::Ins => (&*SPAN_INS, "{++${1}++}"),
    }
}

/// Encode annotation spans in serialized markdown into critic tokens.
///
/// The substitution wrapper is rewritten first so its inner spans are
/// consumed with it; block-level `div` containers encode like spans with
/// their surrounding blank lines trimmed.
pub fn encode(text: &str) -> String {
    let mut out = text.to_string();
    for kind in [AnnotationKind::Sub, AnnotationKind::Del, AnnotationKind::Ins] {
        let (pattern, token) = span_encoding(kind);
        out = pattern.replace_all(&out, token).into_owned();
    }
    let out = DIV_DEL.replace_all(&out, "{--${1}--}");
    let out = DIV_INS.replace_all(&out, "{++${1}++}");
    out.into_owned()
}

/// Decode critic tokens in `text` for the given view.
pub fn decode(text: &str, view: View) -> String {
    let (del_rep, ins_rep, sub_rep): (&str, &str, &str) = match view {
        View::Html => (
            "<del>${1}</del>",
            "<ins>${1}</ins>",
            "<del>${1}</del><ins>${2}</ins>",
        ),
        View::Latex => (
            "<span>\\color{Maroon}~~<span>${1}</span>~~</span>",
            "<span>\\color{OliveGreen}\\ulined{}${1}</span>",
            "<span>\\color{RedOrange}~~<span>${1}</span>~~<span>\\ulined{}${2}</span></span>",
        ),
        View::TrackChanges => (
            r#"<span class="deletion">${1}</span>"#,
            r#"<span class="insertion">${1}</span>"#,
            r#"<span class="deletion">${1}</span><span class="insertion">${2}</span>"#,
        ),
        View::Accept => ("", "${1}", "${2}"),
        View::Reject => ("${1}", "", "${1}"),
    };

    let input = match view {
        View::Latex => format!("{LATEX_PREAMBLE}{text}"),
        _ => text.to_string(),
    };
    let out = CRITIC_DEL.replace_all(&input, del_rep);
    let out = CRITIC_INS.replace_all(&out, ins_rep);
    let out = CRITIC_SUB.replace_all(&out, sub_rep);
    out.into_owned()
}

/// Post-change text: insertions kept, deletions dropped.
pub fn accept(text: &str) -> String {
    decode(text, View::Accept)
}

/// Pre-change text: deletions kept, insertions dropped.
pub fn reject(text: &str) -> String {
    decode(text, View::Reject)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_all_three_span_kinds() {
        let text = concat!(
            r#"<span class="sub"><span class="del">foo</span><span class="ins">Foo</span></span>"#,
            " bar ",
            r#"<span class="del">x</span><span class="ins">y</span>"#,
        );
        assert_eq!(encode(text), "{~~foo~>Foo~~} bar {--x--}{++y++}");
    }

    #[test]
    fn encodes_block_divs_with_trimmed_separation() {
        let text = "<div class=\"del\">\n\n![a](a.png)\n\n</div><div class=\"ins\">\n\n![b](b.png)\n\n</div>";
        assert_eq!(encode(text), "{--![a](a.png)--}{++![b](b.png)++}");
    }

    #[test]
    fn accept_reconstructs_post_change_text() {
        let text = "{~~foo~>Foo~~} bar {++new++}{--old--} baz";
        assert_eq!(accept(text), "Foo bar new baz");
    }

    #[test]
    fn reject_reconstructs_pre_change_text() {
        let text = "{~~foo~>Foo~~} bar {++new++}{--old--} baz";
        assert_eq!(reject(text), "foo bar old baz");
    }

    #[test]
    fn encode_then_accept_and_reject_round_trip() {
        let spans = concat!(
            r#"<span class="del">removed </span>"#,
            "kept ",
            r#"<span class="sub"><span class="del">a</span><span class="ins">b</span></span>"#,
            r#"<span class="ins"> added</span>"#,
        );
        let encoded = encode(spans);
        assert_eq!(accept(&encoded), "kept b added");
        assert_eq!(reject(&encoded), "removed kept a");
    }

    #[test]
    fn html_view_emits_tag_pairs() {
        let out = decode("{--a--}{++b++}{~~c~>d~~}", View::Html);
        assert_eq!(out, "<del>a</del><ins>b</ins><del>c</del><ins>d</ins>");
    }

    #[test]
    fn latex_view_prepends_preamble_once() {
        let out = decode("{++b++}", View::Latex);
        assert!(out.starts_with("\\useunder{\\uline}{\\ulined}{}\n"));
        assert!(out.contains("\\color{OliveGreen}\\ulined{}b"));
    }

    #[test]
    fn track_changes_view_uses_semantic_classes() {
        let out = decode("{~~a~>b~~}", View::TrackChanges);
        assert_eq!(
            out,
            r#"<span class="deletion">a</span><span class="insertion">b</span>"#
        );
    }

    #[test]
    fn multiline_token_content_is_matched() {
        let out = accept("{++line one\nline two++}");
        assert_eq!(out, "line one\nline two");
    }

    #[test]
    fn substitution_stops_at_first_separator() {
        // Tildes are allowed in content as long as the reserved sequences
        // do not appear.
        let out = decode("{~~x~y~>new~~}", View::Accept);
        assert_eq!(out, "new");
        assert_eq!(decode("{~~x~y~>new~~}", View::Reject), "x~y");
    }

    #[test]
    fn unbalanced_tokens_are_left_alone() {
        let text = "{++never closed";
        assert_eq!(accept(text), text);
        assert_eq!(decode(text, View::Html), text);
    }
}
