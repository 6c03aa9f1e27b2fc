//! Markup reader built on the html5gum tokenizer.
//!
//! Tolerant by design: stray end tags are ignored and unclosed elements are
//! closed at end of input, since converter output is trusted but not
//! guaranteed well-formed after the diff engine has spliced trees together.

use crate::tree::{MarkupTree, NodeId};
use html5gum::{State, Token, Tokenizer};
use thiserror::Error;

/// Markup reading error.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("markup tokenizer error: {0}")]
    Tokenize(String),
}

/// Elements that never have children.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Whether `name` is a void element (never has children or a closing tag).
pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// Parse markup text into a [`MarkupTree`].
pub fn parse(input: &str) -> Result<MarkupTree, ParseError> {
    let mut tree = MarkupTree::new();
    let root = tree.root();
    // Open elements; the name is kept alongside the id for end-tag matching.
    let mut stack: Vec<(NodeId, String)> = Vec::new();

    let mut tokenizer = Tokenizer::new(input);
    while let Some(token_result) = tokenizer.next() {
        let token = token_result.map_err(|e| ParseError::Tokenize(e.to_string()))?;
        match token {
            Token::StartTag(tag) => {
                let name = String::from_utf8_lossy(&tag.name).to_ascii_lowercase();
                let id = tree.create_element(&name);
                for (key, value) in tag.attributes.iter() {
                    let key = String::from_utf8_lossy(key).into_owned();
                    let value = String::from_utf8_lossy(value).into_owned();
                    if let Some(el) = tree.element_mut(id) {
                        el.set_attr(&key, value);
                    }
                }
                let parent = stack.last().map(|(id, _)| *id).unwrap_or(root);
                tree.append(parent, id);
                if !tag.self_closing && !is_void_element(&name) {
                    match name.as_str() {
                        "script" | "style" => tokenizer.set_state(State::ScriptData),
                        "textarea" | "title" => tokenizer.set_state(State::RcData),
                        _ => {},
                    }
                    stack.push((id, name));
                }
            },
            Token::EndTag(tag) => {
                let name = String::from_utf8_lossy(&tag.name).to_ascii_lowercase();
                if let Some(idx) = stack.iter().rposition(|(_, open)| *open == name) {
                    stack.truncate(idx);
                }
                // No matching start tag: ignore the stray end tag.
            },
            Token::String(text) => {
                let text = String::from_utf8_lossy(&text).into_owned();
                let parent = stack.last().map(|(id, _)| *id).unwrap_or(root);
                tree.append_text(parent, &text);
            },
            Token::Doctype(_) | Token::Comment(_) | Token::Error(_) => {},
        }
    }

    Ok(tree)
}
