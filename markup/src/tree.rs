//! Arena-backed markup tree with in-place structural mutation.

use compact_str::CompactString;
use std::fmt;

/// Handle to a node in a [`MarkupTree`] arena.
///
/// Ids stay valid for the lifetime of the tree; detaching a node never
/// invalidates other ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Annotation classification of an element.
///
/// Exactly one of these classes marks an annotation span after
/// postprocessing; the codec matches on this exhaustively rather than on
/// class strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    /// Removed content.
    Del,
    /// Added content.
    Ins,
    /// A deletion immediately followed by an insertion, wrapped together.
    Sub,
}

impl AnnotationKind {
    /// The class string carried by annotation elements of this kind.
    pub fn class(self) -> &'static str {
        match self {
            AnnotationKind::Del => "del",
            AnnotationKind::Ins => "ins",
            AnnotationKind::Sub => "sub",
        }
    }

    fn from_class(class: &str) -> Option<Self> {
        match class {
            "del" => Some(AnnotationKind::Del),
            "ins" => Some(AnnotationKind::Ins),
            "sub" => Some(AnnotationKind::Sub),
            _ => None,
        }
    }
}

/// An element node: tag name plus ordered attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: CompactString,
    attrs: Vec<(CompactString, String)>,
}

impl Element {
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attrs(&self) -> &[(CompactString, String)] {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        if let Some(slot) = self.attrs.iter_mut().find(|(k, _)| k == name) {
            slot.1 = value.into();
        } else {
            self.attrs.push((CompactString::from(name), value.into()));
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(k, _)| k != name);
    }

    /// The full `class` attribute value, if any.
    pub fn class(&self) -> Option<&str> {
        self.attr("class")
    }

    /// Whether the whitespace-separated class list contains `name`.
    pub fn has_class(&self, name: &str) -> bool {
        self.class()
            .is_some_and(|c| c.split_ascii_whitespace().any(|part| part == name))
    }

    /// Annotation kind, for a `span` whose sole class is `del`/`ins`/`sub`.
    pub fn annotation_kind(&self) -> Option<AnnotationKind> {
        if self.name != "span" {
            return None;
        }
        AnnotationKind::from_class(self.class()?)
    }
}

/// Payload of a tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeEntry {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// An ordered, rooted markup tree.
///
/// The root is a synthetic `#document` element that is never serialized; the
/// document's top-level nodes are its children.
pub struct MarkupTree {
    nodes: Vec<NodeEntry>,
    root: NodeId,
}

impl MarkupTree {
    pub fn new() -> Self {
        let root_entry = NodeEntry {
            parent: None,
            children: Vec::new(),
            data: NodeData::Element(Element::new("#document")),
        };
        Self {
            nodes: vec![root_entry],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn entry(&self, id: NodeId) -> &NodeEntry {
        &self.nodes[id.0]
    }

    fn entry_mut(&mut self, id: NodeId) -> &mut NodeEntry {
        &mut self.nodes[id.0]
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeEntry {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.alloc(NodeData::Element(Element::new(name)))
    }

    /// Shorthand for an element carrying only a class attribute.
    pub fn create_element_with_class(&mut self, name: &str, class: &str) -> NodeId {
        let id = self.create_element(name);
        if let NodeData::Element(el) = &mut self.entry_mut(id).data {
            el.set_attr("class", class);
        }
        id
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Text(text.into()))
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.entry(id).data
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.entry(id).data {
            NodeData::Element(el) => Some(el),
            NodeData::Text(_) => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.entry_mut(id).data {
            NodeData::Element(el) => Some(el),
            NodeData::Text(_) => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(Element::name)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.entry(id).data {
            NodeData::Text(t) => Some(t),
            NodeData::Element(_) => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.entry(id).children
    }

    /// The next sibling node, element or text.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings.get(pos + 1).copied()
    }

    fn position_in_parent(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(id)?;
        let pos = self.children(parent).iter().position(|&c| c == id)?;
        Some((parent, pos))
    }

    /// Detach `id` from its parent. The node (and its subtree) stays in the
    /// arena and can be re-attached.
    pub fn detach(&mut self, id: NodeId) {
        if let Some((parent, pos)) = self.position_in_parent(id) {
            self.entry_mut(parent).children.remove(pos);
            self.entry_mut(id).parent = None;
        }
    }

    /// Append `child` as the last child of `parent`, detaching it from any
    /// previous parent first.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.entry_mut(parent).children.push(child);
        self.entry_mut(child).parent = Some(parent);
    }

    /// Append text under `parent`, merging with a trailing text run.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(&last) = self.entry(parent).children.last() {
            if let NodeData::Text(existing) = &mut self.entry_mut(last).data {
                existing.push_str(text);
                return;
            }
        }
        let id = self.create_text(text);
        self.append(parent, id);
    }

    /// Insert `new` immediately before `reference` among its siblings.
    pub fn insert_before(&mut self, new: NodeId, reference: NodeId) {
        let (parent, pos) = match self.position_in_parent(reference) {
            Some(found) => found,
            None => return,
        };
        self.detach(new);
        self.entry_mut(parent).children.insert(pos, new);
        self.entry_mut(new).parent = Some(parent);
    }

    /// Insert `new` as the first child of `parent`.
    pub fn prepend(&mut self, parent: NodeId, new: NodeId) {
        self.detach(new);
        self.entry_mut(parent).children.insert(0, new);
        self.entry_mut(new).parent = Some(parent);
    }

    /// Replace `old` with the given nodes, splicing them into its position.
    pub fn replace_with(&mut self, old: NodeId, new: &[NodeId]) {
        let (parent, pos) = match self.position_in_parent(old) {
            Some(found) => found,
            None => return,
        };
        self.entry_mut(parent).children.remove(pos);
        self.entry_mut(old).parent = None;
        for (offset, &id) in new.iter().enumerate() {
            self.detach(id);
            self.entry_mut(parent).children.insert(pos + offset, id);
            self.entry_mut(id).parent = Some(parent);
        }
    }

    /// Replace an element by its children.
    pub fn unwrap_node(&mut self, id: NodeId) {
        let children = self.entry(id).children.clone();
        self.replace_with(id, &children);
    }

    /// Drop all children and replace them with a single text run.
    pub fn set_text_content(&mut self, id: NodeId, text: impl Into<String>) {
        let children = self.entry(id).children.clone();
        for child in children {
            self.detach(child);
        }
        let text_id = self.create_text(text);
        self.append(id, text_id);
    }

    /// Concatenated text of all text runs under `id`, in document order.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            match &self.entry(current).data {
                NodeData::Text(t) => out.push_str(t),
                NodeData::Element(_) => {
                    for &child in self.entry(current).children.iter().rev() {
                        stack.push(child);
                    }
                },
            }
        }
        out
    }

    /// Deep-copy the subtree rooted at `id`; the copy starts detached.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let data = self.entry(id).data.clone();
        let children = self.entry(id).children.clone();
        let copy = self.alloc(data);
        for child in children {
            let child_copy = self.clone_subtree(child);
            self.append(copy, child_copy);
        }
        copy
    }

    /// All attached element nodes matching `pred`, in document order.
    pub fn select(&self, pred: impl Fn(&Element) -> bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .entry(self.root)
            .children
            .iter()
            .rev()
            .copied()
            .collect();
        while let Some(id) = stack.pop() {
            if let NodeData::Element(el) = &self.entry(id).data {
                if pred(el) {
                    out.push(id);
                }
            }
            for &child in self.entry(id).children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Element descendants of `id` (exclusive), in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.entry(id).children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            if matches!(self.entry(current).data, NodeData::Element(_)) {
                out.push(current);
            }
            for &child in self.entry(current).children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Detach every descendant element of `id` with the given tag name,
    /// subtree included.
    pub fn remove_descendants(&mut self, id: NodeId, tag: &str) {
        let matches: Vec<NodeId> = self
            .descendants(id)
            .into_iter()
            .filter(|&d| self.tag(d) == Some(tag))
            .collect();
        for node in matches.into_iter().rev() {
            self.detach(node);
        }
    }
}

impl Default for MarkupTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MarkupTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MarkupTree({} nodes)", self.nodes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph_tree() -> (MarkupTree, NodeId) {
        let mut tree = MarkupTree::new();
        let p = tree.create_element("p");
        let root = tree.root();
        tree.append(root, p);
        (tree, p)
    }

    #[test]
    fn append_and_text_content() {
        let (mut tree, p) = paragraph_tree();
        let hello = tree.create_text("hello ");
        let em = tree.create_element("em");
        let world = tree.create_text("world");
        tree.append(p, hello);
        tree.append(p, em);
        tree.append(em, world);

        assert_eq!(tree.text_content(p), "hello world");
        assert_eq!(tree.children(p).len(), 2);
    }

    #[test]
    fn detach_keeps_other_ids_valid() {
        let (mut tree, p) = paragraph_tree();
        let a = tree.create_text("a");
        let b = tree.create_text("b");
        tree.append(p, a);
        tree.append(p, b);

        tree.detach(a);
        assert_eq!(tree.children(p), &[b]);
        assert_eq!(tree.text(b), Some("b"));
        assert_eq!(tree.parent(a), None);
    }

    #[test]
    fn unwrap_splices_children_in_place() {
        let (mut tree, p) = paragraph_tree();
        let before = tree.create_text("x");
        let span = tree.create_element("span");
        let inner = tree.create_text("y");
        let after = tree.create_text("z");
        tree.append(p, before);
        tree.append(p, span);
        tree.append(span, inner);
        tree.append(p, after);

        tree.unwrap_node(span);
        assert_eq!(tree.children(p), &[before, inner, after]);
        assert_eq!(tree.parent(inner), Some(p));
    }

    #[test]
    fn next_sibling_sees_text_nodes() {
        let (mut tree, p) = paragraph_tree();
        let del = tree.create_element_with_class("span", "del");
        let space = tree.create_text(" ");
        let ins = tree.create_element_with_class("span", "ins");
        tree.append(p, del);
        tree.append(p, space);
        tree.append(p, ins);

        assert_eq!(tree.next_sibling(del), Some(space));
        assert_eq!(tree.next_sibling(space), Some(ins));
        assert_eq!(tree.next_sibling(ins), None);
    }

    #[test]
    fn clone_subtree_is_detached_deep_copy() {
        let (mut tree, p) = paragraph_tree();
        let text = tree.create_text("body");
        tree.append(p, text);

        let copy = tree.clone_subtree(p);
        assert_eq!(tree.parent(copy), None);
        assert_eq!(tree.text_content(copy), "body");

        // Mutating the copy leaves the original alone.
        tree.set_text_content(copy, "changed");
        assert_eq!(tree.text_content(p), "body");
    }

    #[test]
    fn select_returns_document_order() {
        let mut tree = MarkupTree::new();
        let root = tree.root();
        let p1 = tree.create_element("p");
        let p2 = tree.create_element("p");
        let nested = tree.create_element("p");
        tree.append(root, p1);
        tree.append(p1, nested);
        tree.append(root, p2);

        let found = tree.select(|el| el.name() == "p");
        assert_eq!(found, vec![p1, nested, p2]);
    }

    #[test]
    fn remove_descendants_takes_whole_subtrees() {
        let (mut tree, p) = paragraph_tree();
        let ins = tree.create_element("ins");
        let ins_text = tree.create_text("new");
        let keep = tree.create_text("old");
        tree.append(p, keep);
        tree.append(p, ins);
        tree.append(ins, ins_text);

        tree.remove_descendants(p, "ins");
        assert_eq!(tree.text_content(p), "old");
    }

    #[test]
    fn annotation_kind_requires_span() {
        let mut el = Element::new("span");
        el.set_attr("class", "del");
        assert_eq!(el.annotation_kind(), Some(AnnotationKind::Del));

        let mut div = Element::new("div");
        div.set_attr("class", "del");
        assert_eq!(div.annotation_kind(), None);

        let mut math = Element::new("span");
        math.set_attr("class", "math inline");
        assert_eq!(math.annotation_kind(), None);
        assert!(math.has_class("math"));
        assert!(math.has_class("inline"));
    }
}
