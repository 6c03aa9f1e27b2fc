//! Canonical markup tree for the redline pipeline.
//!
//! A document is an ordered, rooted tree of elements and text runs, stored in
//! an id-indexed arena. The converter produces markup text, [`parse`] turns it
//! into a [`MarkupTree`], the postprocessor rewrites the tree in place, and
//! [`serialize`] turns it back into markup text. A tree lives for exactly one
//! pipeline request; detached nodes stay in the arena until the tree is
//! dropped.

pub mod parse;
pub mod tree;
pub mod write;

pub use parse::{is_void_element, parse, ParseError};
pub use tree::{AnnotationKind, Element, MarkupTree, NodeData, NodeId};
pub use write::{serialize, serialize_children, serialize_node};
