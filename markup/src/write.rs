//! Markup writer: turns a [`MarkupTree`] back into markup text.

use crate::parse::is_void_element;
use crate::tree::{MarkupTree, NodeData, NodeId};

/// Serialize the whole document (children of the synthetic root).
pub fn serialize(tree: &MarkupTree) -> String {
    serialize_children(tree, tree.root())
}

/// Serialize the children of `id`, i.e. its inner markup.
pub fn serialize_children(tree: &MarkupTree, id: NodeId) -> String {
    let mut out = String::new();
    for &child in tree.children(id) {
        write_node(tree, child, &mut out);
    }
    out
}

/// Serialize a single node, subtree included.
pub fn serialize_node(tree: &MarkupTree, id: NodeId) -> String {
    let mut out = String::new();
    write_node(tree, id, &mut out);
    out
}

fn write_node(tree: &MarkupTree, id: NodeId, out: &mut String) {
    match tree.data(id) {
        NodeData::Text(text) => escape_text(text, out),
        NodeData::Element(el) => {
            out.push('<');
            out.push_str(el.name());
            for (key, value) in el.attrs() {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                escape_attr(value, out);
                out.push('"');
            }
            out.push('>');
            if is_void_element(el.name()) {
                return;
            }
            for &child in tree.children(id) {
                write_node(tree, child, out);
            }
            out.push_str("</");
            out.push_str(el.name());
            out.push('>');
        },
    }
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}
