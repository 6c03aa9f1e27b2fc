//! Line-wrap renderer.
//!
//! A small state machine over output lines. Lines inside fenced code regions
//! and reference-link definitions pass through verbatim; heading underlines
//! are truncated to the previous rendered line; everything else is greedily
//! word-wrapped, never breaking inside a word.

/// Reflow `text` to `width` columns. Width `0` disables wrapping; literal
/// lines are exempt either way.
pub fn reflow(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut in_fence = false;

    for line in text.split('\n') {
        let last_len = lines.last().map(|l| l.chars().count()).unwrap_or(0);
        if line.starts_with("```") {
            in_fence = !in_fence;
        }
        if in_fence || line.starts_with("  [") {
            lines.push(line.to_string());
        } else if is_heading_underline(line) && last_len > 0 {
            lines.push(line.chars().take(last_len).collect());
        } else if width > 0 {
            lines.extend(wrap_line(line, width));
        } else {
            lines.push(line.to_string());
        }
    }

    lines.join("\n")
}

fn is_heading_underline(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c == '=' || c == '-')
}

/// Greedy soft wrap: chunks are a word plus its trailing whitespace; a chunk
/// that does not fit starts a new line (trailing whitespace trimmed at the
/// break, leading whitespace dropped on the continuation). A word longer than
/// the width overflows rather than being broken.
fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let mut lines = vec![String::new()];
    for chunk in chunks(line) {
        let current = lines.last_mut().expect("lines starts non-empty");
        // Trailing whitespace does not count against the width; it is
        // trimmed anyway if a break lands here.
        let fits = current.chars().count() + chunk.trim_end().chars().count() <= width;
        if fits || current.trim().is_empty() {
            current.push_str(chunk);
        } else {
            let trimmed = current.trim_end().to_string();
            *current = trimmed;
            lines.push(chunk.trim_start().to_string());
        }
    }
    lines
}

/// Split a line into a leading-whitespace chunk followed by
/// word-plus-trailing-whitespace chunks.
fn chunks(line: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = line;
    let lead = rest
        .find(|c: char| !c.is_whitespace())
        .unwrap_or(rest.len());
    if lead > 0 {
        out.push(&rest[..lead]);
        rest = &rest[lead..];
    }
    while !rest.is_empty() {
        let word_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let chunk_end = rest[word_end..]
            .find(|c: char| !c.is_whitespace())
            .map(|i| word_end + i)
            .unwrap_or(rest.len());
        out.push(&rest[..chunk_end]);
        rest = &rest[chunk_end..];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_lines_pass_through() {
        assert_eq!(reflow("hello world", 72), "hello world");
    }

    #[test]
    fn width_zero_disables_wrapping() {
        let long = "word ".repeat(50);
        assert_eq!(reflow(&long, 0), long);
    }

    #[test]
    fn wraps_at_word_boundaries() {
        let out = reflow("aaa bbb ccc ddd", 7);
        assert_eq!(out, "aaa bbb\nccc ddd");
    }

    #[test]
    fn never_breaks_inside_a_word() {
        let out = reflow("tiny enormousunbreakableword tail", 8);
        for line in out.split('\n') {
            assert!(!line.contains(' ') || line.chars().count() <= 8);
        }
        assert!(out.contains("enormousunbreakableword"));
    }

    #[test]
    fn fenced_regions_are_verbatim() {
        let text = "before text\n```\nthis fenced line is much longer than the wrap width\n```\nafter";
        let out = reflow(text, 10);
        assert!(out.contains("\nthis fenced line is much longer than the wrap width\n"));
    }

    #[test]
    fn fence_state_toggles_per_marker() {
        let text = "```\naaa bbb ccc ddd eee\n```\naaa bbb ccc ddd eee";
        let out = reflow(text, 7);
        let lines: Vec<&str> = out.split('\n').collect();
        // Inside the fence: untouched. Outside: wrapped.
        assert_eq!(lines[1], "aaa bbb ccc ddd eee");
        assert_eq!(lines[3], "aaa bbb");
    }

    #[test]
    fn reference_link_definitions_are_verbatim() {
        let line = "  [1]: https://example.com/a/very/long/path/that/would/wrap";
        assert_eq!(reflow(line, 10), line);
    }

    #[test]
    fn heading_underline_matches_previous_line() {
        let out = reflow("Heading Text\n====================", 72);
        assert_eq!(out, "Heading Text\n============");
    }

    #[test]
    fn underline_without_previous_line_wraps_normally() {
        assert_eq!(reflow("====", 72), "====");
    }

    #[test]
    fn continuation_keeps_no_indent() {
        let out = reflow("  first second third", 9);
        assert_eq!(out, "  first\nsecond\nthird");
    }
}
