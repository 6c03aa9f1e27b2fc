//! Markup-tree postprocessor.
//!
//! Converts the raw diff tree produced by the engine into the canonical
//! annotation tree consumed by the codec. The passes run in a fixed order;
//! later passes assume the shape produced by earlier ones (math regions are
//! delimited before foreign containers are unwrapped, raw tags are
//! canonicalized before spans are merged, paragraphs are split before
//! substitutions are detected).
//!
//! Every pass that removes or replaces nodes snapshots its matches up front
//! and walks the snapshot from last to first, so a rewrite never invalidates
//! a match that has not been visited yet.

use redline_markup::{AnnotationKind, MarkupTree, NodeId};
use similar::{ChangeTag, TextDiff};

/// Inline formatting elements an annotation span is pulled out of when it is
/// the sole child.
const INLINE_TAGS: &[&str] = &["a", "code", "em", "q", "strong", "sub", "sup"];

/// Run all rewrite passes, in order.
pub fn postprocess(tree: &mut MarkupTree) {
    delimit_math(tree);
    strip_presentation_attrs(tree);
    normalize_foreign_annotations(tree);
    consolidate_image_diffs(tree);
    compact_lists(tree);
    prune_redundant_titles(tree);
    diff_code_blocks(tree);
    canonicalize_tags(tree);
    pull_up_inline(tree);
    merge_adjacent(tree);
    split_rewritten_paragraphs(tree);
    detect_substitutions(tree);
}

/// Wrap math regions in their rendering delimiters, then resolve changed
/// formulas into explicit deletion/insertion runs. A region whose formula is
/// unchanged (only presentation differed) collapses to plain text.
fn delimit_math(tree: &mut MarkupTree) {
    for id in matched(tree, |t, id| has_classes(t, id, "math", "inline")) {
        let open = tree.create_text("\\(");
        tree.prepend(id, open);
        let close = tree.create_text("\\)");
        tree.append(id, close);
    }
    for id in matched(tree, |t, id| has_classes(t, id, "math", "display")) {
        let open = tree.create_text("\\[");
        tree.prepend(id, open);
        let close = tree.create_text("\\]");
        tree.append(id, close);
    }
    for id in matched(tree, |t, id| {
        t.element(id).is_some_and(|el| el.has_class("math"))
    }) {
        let post = tree.clone_subtree(id);
        tree.remove_descendants(id, "ins");
        tree.remove_descendants(post, "del");
        let before = tree.text_content(id);
        let after = tree.text_content(post);
        if before == after {
            tree.set_text_content(id, before);
        } else {
            let children: Vec<NodeId> = tree.children(id).to_vec();
            for child in children {
                tree.detach(child);
            }
            let del = tree.create_element("del");
            let del_text = tree.create_text(before);
            tree.append(del, del_text);
            let ins = tree.create_element("ins");
            let ins_text = tree.create_text(after);
            tree.append(ins, ins_text);
            tree.append(id, del);
            tree.append(id, ins);
        }
    }
}

/// Drop converter-injected sizing/style attributes from images so they do
/// not surface as spurious differences.
fn strip_presentation_attrs(tree: &mut MarkupTree) {
    for id in matched(tree, |t, id| t.tag(id) == Some("img")) {
        if let Some(el) = tree.element_mut(id) {
            el.remove_attr("width");
            el.remove_attr("height");
            el.remove_attr("style");
        }
    }
}

/// Rewrite carried-over track-changes containers to raw `ins`/`del` tags and
/// unwrap every other generic container. Work-queue fixpoint: unwrapping can
/// expose further matches, so requeue until none remain.
fn normalize_foreign_annotations(tree: &mut MarkupTree) {
    loop {
        let matches = matched(tree, |t, id| {
            matches!(t.tag(id), Some("span" | "div" | "section"))
        });
        if matches.is_empty() {
            break;
        }
        for id in matches {
            if tree.parent(id).is_none() {
                continue;
            }
            let class = tree
                .element(id)
                .and_then(|el| el.class())
                .map(str::to_string);
            match class.as_deref() {
                Some("insertion") => rewrite_to_tag(tree, id, "ins"),
                Some("deletion") => rewrite_to_tag(tree, id, "del"),
                _ => tree.unwrap_node(id),
            }
        }
    }
}

fn rewrite_to_tag(tree: &mut MarkupTree, id: NodeId, tag: &str) {
    let replacement = tree.create_element(tag);
    let children: Vec<NodeId> = tree.children(id).to_vec();
    for child in children {
        tree.append(replacement, child);
    }
    tree.insert_before(replacement, id);
    tree.detach(id);
}

/// A figure holding both the old and the new image is rebuilt as a deletion
/// block with the original image and an insertion block with the
/// replacement. Both images take the original caption as alt text; the
/// caption itself is dropped rather than duplicated.
fn consolidate_image_diffs(tree: &mut MarkupTree) {
    for figure in matched(tree, |t, id| t.tag(id) == Some("figure")) {
        let images: Vec<NodeId> = tree
            .descendants(figure)
            .into_iter()
            .filter(|&d| tree.tag(d) == Some("img"))
            .collect();
        if images.len() <= 1 {
            continue;
        }

        let post = tree.clone_subtree(figure);
        tree.remove_descendants(figure, "ins");
        tree.remove_descendants(post, "del");

        let caption = first_descendant(tree, figure, "figcaption")
            .or_else(|| first_descendant(tree, post, "figcaption"))
            .map(|c| tree.text_content(c).trim().to_string())
            .unwrap_or_default();

        let old_img = first_descendant(tree, figure, "img");
        let new_img = first_descendant(tree, post, "img");
        let (Some(old_img), Some(new_img)) = (old_img, new_img) else {
            continue;
        };
        for &img in &[old_img, new_img] {
            if !caption.is_empty() {
                if let Some(el) = tree.element_mut(img) {
                    el.set_attr("alt", caption.clone());
                }
            }
        }

        let del_block = tree.create_element_with_class("div", "del");
        tree.append(del_block, old_img);
        let ins_block = tree.create_element_with_class("div", "ins");
        tree.append(ins_block, new_img);
        tree.replace_with(figure, &[del_block, ins_block]);
    }
}

/// Unwrap a paragraph that is the sole child of a list item, so compact
/// lists render without block wrapping.
fn compact_lists(tree: &mut MarkupTree) {
    for li in matched(tree, |t, id| t.tag(id) == Some("li")) {
        let children: Vec<NodeId> = tree.children(li).to_vec();
        let mut sole_paragraph = None;
        for &child in &children {
            if tree.tag(child) == Some("p") {
                if sole_paragraph.is_some() {
                    sole_paragraph = None;
                    break;
                }
                sole_paragraph = Some(child);
            } else if tree.text(child).is_some_and(|t| !t.trim().is_empty())
                || tree.element(child).is_some()
            {
                sole_paragraph = None;
                break;
            }
        }
        if let Some(p) = sole_paragraph {
            tree.unwrap_node(p);
        }
    }
}

/// Drop an image title that duplicates its alt text.
fn prune_redundant_titles(tree: &mut MarkupTree) {
    for id in matched(tree, |t, id| t.tag(id) == Some("img")) {
        let Some(el) = tree.element_mut(id) else {
            continue;
        };
        let redundant = match (el.attr("title"), el.attr("alt")) {
            (Some(title), Some(alt)) => !title.is_empty() && title == alt,
            _ => false,
        };
        if redundant {
            el.remove_attr("title");
        }
    }
}

/// Replace a changed preformatted block's content with a unified line-level
/// diff and mark the block as a diff block. Unchanged blocks are left
/// untouched.
fn diff_code_blocks(tree: &mut MarkupTree) {
    for pre in matched(tree, |t, id| t.tag(id) == Some("pre")) {
        let old_view = tree.clone_subtree(pre);
        tree.remove_descendants(old_view, "ins");
        let new_view = tree.clone_subtree(pre);
        tree.remove_descendants(new_view, "del");
        let old_text = tree.text_content(old_view);
        let new_text = tree.text_content(new_view);
        if old_text == new_text {
            continue;
        }
        if let Some(el) = tree.element_mut(pre) {
            el.set_attr("class", "diff");
        }
        tree.set_text_content(pre, unified_diff(&old_text, &new_text));
    }
}

/// Line-by-line unified diff with `' '`/`'-'`/`'+'` prefixes.
fn unified_diff(old: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut lines = Vec::new();
    for change in diff.iter_all_changes() {
        let prefix = match change.tag() {
            ChangeTag::Equal => ' ',
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
        };
        let value = change.value();
        let line = value.strip_suffix('\n').unwrap_or(value);
        lines.push(format!("{prefix}{line}"));
    }
    lines.join("\n")
}

/// Rewrite raw `del`/`ins` tags into uniform annotation spans.
fn canonicalize_tags(tree: &mut MarkupTree) {
    for kind in [AnnotationKind::Del, AnnotationKind::Ins] {
        for id in matched(tree, |t, id| t.tag(id) == Some(kind.class())) {
            let span = tree.create_element_with_class("span", kind.class());
            let children: Vec<NodeId> = tree.children(id).to_vec();
            for child in children {
                tree.append(span, child);
            }
            tree.insert_before(span, id);
            tree.detach(id);
        }
    }
}

/// An annotation span that is the only child of an inline formatting element
/// moves outward to annotate the whole element.
fn pull_up_inline(tree: &mut MarkupTree) {
    for span in matched(tree, |t, id| annotation_kind(t, id).is_some()) {
        let Some(parent) = tree.parent(span) else {
            continue;
        };
        let parent_is_inline = tree
            .tag(parent)
            .is_some_and(|tag| INLINE_TAGS.contains(&tag));
        if !parent_is_inline || tree.children(parent).len() != 1 {
            continue;
        }
        let Some(kind) = annotation_kind(tree, span) else {
            continue;
        };
        tree.unwrap_node(span);
        let wrapper = tree.create_element_with_class("span", kind.class());
        tree.insert_before(wrapper, parent);
        tree.append(wrapper, parent);
    }
}

/// Merge an annotation span into its immediate next sibling of the same
/// class, repeatedly, until no adjacent same-class pair remains.
fn merge_adjacent(tree: &mut MarkupTree) {
    loop {
        let mut changed = false;
        for span in matched(tree, |t, id| annotation_kind(t, id).is_some()) {
            if tree.parent(span).is_none() {
                // Already merged into a predecessor this round.
                continue;
            }
            let Some(next) = tree.next_sibling(span) else {
                continue;
            };
            let same_kind = annotation_kind(tree, span).is_some()
                && annotation_kind(tree, span) == annotation_kind(tree, next);
            if !same_kind {
                continue;
            }
            let absorbed: Vec<NodeId> = tree.children(next).to_vec();
            for child in absorbed {
                tree.append(span, child);
            }
            tree.detach(next);
            changed = true;
        }
        if !changed {
            break;
        }
    }
}

/// Split a paragraph whose only two children are a deletion span followed by
/// an insertion span into a deleted paragraph and an inserted paragraph.
fn split_rewritten_paragraphs(tree: &mut MarkupTree) {
    for p in matched(tree, |t, id| t.tag(id) == Some("p")) {
        let children: Vec<NodeId> = tree.children(p).to_vec();
        let &[first, second] = children.as_slice() else {
            continue;
        };
        if annotation_kind(tree, first) != Some(AnnotationKind::Del)
            || annotation_kind(tree, second) != Some(AnnotationKind::Ins)
        {
            continue;
        }
        let deleted = tree.create_element("p");
        tree.append(deleted, first);
        let inserted = tree.create_element("p");
        tree.append(inserted, second);
        tree.replace_with(p, &[deleted, inserted]);
    }
}

/// Wrap a deletion span immediately followed by an insertion span in a
/// substitution span.
fn detect_substitutions(tree: &mut MarkupTree) {
    for span in matched(tree, |t, id| {
        annotation_kind(t, id) == Some(AnnotationKind::Del)
    }) {
        if tree.parent(span).is_none() {
            continue;
        }
        let Some(next) = tree.next_sibling(span) else {
            continue;
        };
        if annotation_kind(tree, next) != Some(AnnotationKind::Ins) {
            continue;
        }
        let sub = tree.create_element_with_class("span", AnnotationKind::Sub.class());
        tree.insert_before(sub, span);
        tree.append(sub, span);
        tree.append(sub, next);
    }
}

/// Snapshot of matching nodes in reverse document order.
fn matched(tree: &MarkupTree, pred: impl Fn(&MarkupTree, NodeId) -> bool) -> Vec<NodeId> {
    let mut ids = tree.select(|_| true);
    ids.retain(|&id| pred(tree, id));
    ids.reverse();
    ids
}

fn annotation_kind(tree: &MarkupTree, id: NodeId) -> Option<AnnotationKind> {
    tree.element(id).and_then(|el| el.annotation_kind())
}

fn has_classes(tree: &MarkupTree, id: NodeId, a: &str, b: &str) -> bool {
    tree.element(id)
        .is_some_and(|el| el.has_class(a) && el.has_class(b))
}

fn first_descendant(tree: &MarkupTree, id: NodeId, tag: &str) -> Option<NodeId> {
    tree.descendants(id)
        .into_iter()
        .find(|&d| tree.tag(d) == Some(tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use redline_markup::{parse, serialize};

    fn processed(input: &str) -> String {
        let mut tree = parse(input).expect("parse");
        postprocess(&mut tree);
        serialize(&tree)
    }

    #[test]
    fn replacement_becomes_substitution() {
        let out = processed("<p><del>foo</del><ins>Foo</ins> bar baz</p>");
        assert_eq!(
            out,
            concat!(
                r#"<p><span class="sub"><span class="del">foo</span>"#,
                r#"<span class="ins">Foo</span></span> bar baz</p>"#,
            )
        );
    }

    #[test]
    fn fully_rewritten_paragraph_splits_instead_of_substituting() {
        let out = processed("<p><del>all old</del><ins>all new</ins></p>");
        assert_eq!(
            out,
            concat!(
                r#"<p><span class="del">all old</span></p>"#,
                r#"<p><span class="ins">all new</span></p>"#,
            )
        );
    }

    #[test]
    fn adjacent_same_class_spans_merge() {
        let mut tree = parse(r#"<p><ins>a</ins><ins>b</ins><ins>c</ins> d</p>"#).expect("parse");
        canonicalize_tags(&mut tree);
        merge_adjacent(&mut tree);
        assert_eq!(
            serialize(&tree),
            r#"<p><span class="ins">abc</span> d</p>"#
        );
    }

    #[test]
    fn merge_is_idempotent() {
        let mut tree = parse(r#"<p><ins>a</ins><ins>b</ins></p>"#).expect("parse");
        canonicalize_tags(&mut tree);
        merge_adjacent(&mut tree);
        let once = serialize(&tree);
        merge_adjacent(&mut tree);
        assert_eq!(serialize(&tree), once);
    }

    #[test]
    fn intervening_text_blocks_merge_and_substitution() {
        let out = processed("<p><del>a</del> <ins>b</ins></p>");
        assert_eq!(
            out,
            r#"<p><span class="del">a</span> <span class="ins">b</span></p>"#
        );
    }

    #[test]
    fn changed_code_block_becomes_unified_diff() {
        let out = processed("<pre><code>a\n<del>b</del><ins>c</ins></code></pre>");
        assert_eq!(out, "<pre class=\"diff\"> a\n-b\n+c</pre>");
    }

    #[test]
    fn unchanged_code_block_is_untouched() {
        let input = r#"<pre class="sourceCode"><code>a
b</code></pre>"#;
        let out = processed(input);
        assert_eq!(out, input);
    }

    #[test]
    fn foreign_track_changes_spans_are_adopted() {
        let out = processed(r#"<p><span class="insertion">new</span> kept</p>"#);
        assert_eq!(out, r#"<p><span class="ins">new</span> kept</p>"#);
    }

    #[test]
    fn other_containers_unwrap_to_their_children() {
        let out = processed(r#"<div><section><p>body <span class="x">text</span></p></section></div>"#);
        assert_eq!(out, "<p>body text</p>");
    }

    #[test]
    fn nested_containers_unwrap_to_fixpoint() {
        let out = processed(r#"<p><span><span><span class="insertion">deep</span></span></span></p>"#);
        assert_eq!(out, r#"<p><span class="ins">deep</span></p>"#);
    }

    #[test]
    fn unchanged_math_flattens_to_delimited_text() {
        let out = processed(r#"<p><span class="math inline">E=mc^2</span></p>"#);
        assert_eq!(out, r"<p>\(E=mc^2\)</p>");
    }

    #[test]
    fn changed_math_splits_into_old_and_new_formula() {
        let out = processed(r#"<p><span class="math inline"><del>a</del><ins>b</ins></span></p>"#);
        assert_eq!(
            out,
            concat!(
                r#"<p><span class="sub"><span class="del">\(a\)</span>"#,
                r#"<span class="ins">\(b\)</span></span></p>"#,
            )
        );
    }

    #[test]
    fn display_math_uses_bracket_delimiters() {
        let out = processed(r#"<p><span class="math display">x</span></p>"#);
        assert_eq!(out, r"<p>\[x\]</p>");
    }

    #[test]
    fn modified_figure_becomes_del_and_ins_blocks() {
        let input = concat!(
            r#"<figure><del><img src="a.png"></del><ins><img src="b.png"></ins>"#,
            r#"<figcaption>cap</figcaption></figure>"#,
        );
        let out = processed(input);
        assert_eq!(
            out,
            concat!(
                r#"<div class="del"><img src="a.png" alt="cap"></div>"#,
                r#"<div class="ins"><img src="b.png" alt="cap"></div>"#,
            )
        );
    }

    #[test]
    fn single_image_figure_is_left_alone() {
        let input = r#"<figure><img src="a.png"><figcaption>cap</figcaption></figure>"#;
        let out = processed(input);
        assert_eq!(out, input);
    }

    #[test]
    fn list_item_sole_paragraph_unwraps() {
        let out = processed("<ul><li><p>only</p></li><li><p>one</p><p>two</p></li></ul>");
        assert_eq!(out, "<ul><li>only</li><li><p>one</p><p>two</p></li></ul>");
    }

    // The reader stores attributes sorted by name, so serialized images
    // come out alphabetical.
    #[test]
    fn redundant_image_title_is_dropped() {
        let out = processed(r#"<p><img src="a.png" alt="cap" title="cap"></p>"#);
        assert_eq!(out, r#"<p><img alt="cap" src="a.png"></p>"#);
    }

    #[test]
    fn distinct_image_title_is_kept() {
        let out = processed(r#"<p><img src="a.png" alt="cap" title="other"></p>"#);
        assert_eq!(out, r#"<p><img alt="cap" src="a.png" title="other"></p>"#);
    }

    #[test]
    fn image_presentation_attrs_are_stripped() {
        let out = processed(r#"<p><img src="a.png" width="640" height="480" style="margin:0"></p>"#);
        assert_eq!(out, r#"<p><img src="a.png"></p>"#);
    }

    #[test]
    fn annotation_moves_outside_sole_child_inline() {
        let out = processed("<p><em><del>gone</del></em></p>");
        assert_eq!(out, r#"<p><span class="del"><em>gone</em></span></p>"#);
    }

    #[test]
    fn annotation_stays_inside_partial_inline() {
        let out = processed("<p><em><del>gone</del> kept</em></p>");
        assert_eq!(
            out,
            r#"<p><em><span class="del">gone</span> kept</em></p>"#
        );
    }

    #[test]
    fn unified_diff_prefixes_lines() {
        assert_eq!(unified_diff("a\nb", "a\nc"), " a\n-b\n+c");
    }
}
