//! Visitor walks over the tree

use crate::document::Document;
use crate::node::NodeId;

/// Trait for traversing the tree
pub trait Traversal {
    /// Visit a node
    fn visit(&mut self, doc: &Document, id: NodeId, path: &[String]);

    /// Called when entering a node with children
    fn enter(&mut self, _doc: &Document, _id: NodeId, _path: &[String]) {}

    /// Called when leaving a node with children
    fn leave(&mut self, _doc: &Document, _id: NodeId, _path: &[String]) {}

    /// Returns true if traversal should continue
    fn should_continue(&self) -> bool {
        true
    }
}

/// Walk the subtree rooted at `start` using a visitor
pub fn walk<T: Traversal>(doc: &Document, start: NodeId, visitor: &mut T) {
    walk_recursive(doc, start, visitor, &mut vec![]);
}

fn walk_recursive<T: Traversal>(
    doc: &Document,
    id: NodeId,
    visitor: &mut T,
    path: &mut Vec<String>,
) {
    if !visitor.should_continue() {
        return;
    }

    visitor.visit(doc, id, path);

    let children = doc.children(id);
    if !children.is_empty() {
        visitor.enter(doc, id, path);
        path.push(doc.node(id).name.clone());

        for child in children {
            walk_recursive(doc, *child, visitor, path);
        }

        path.pop();
        visitor.leave(doc, id, path);
    }
}
