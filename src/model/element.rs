//! Element records as held by a store.

use serde::{Deserialize, Serialize};
use super::{ElementHandle, LinkContent, Type};

/// Source and target of an edge. Either end may itself be an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeEnds {
    pub source: ElementHandle,
    pub target: ElementHandle,
}

impl EdgeEnds {
    pub fn new(source: ElementHandle, target: ElementHandle) -> Self {
        Self { source, target }
    }

    /// The end opposite to `from`, if `from` is an end of this edge.
    pub fn other_end(&self, from: ElementHandle) -> Option<ElementHandle> {
        if from == self.source { Some(self.target) }
        else if from == self.target { Some(self.source) }
        else { None }
    }

    pub fn touches(&self, el: ElementHandle) -> bool {
        self.source == el || self.target == el
    }
}

/// What an element is, beyond its type tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElementBody {
    Node,
    Edge(EdgeEnds),
    Link(Option<LinkContent>),
}

/// A stored element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub handle: ElementHandle,
    pub ty: Type,
    pub body: ElementBody,
}

impl Element {
    pub fn node(handle: ElementHandle, ty: Type) -> Self {
        Self { handle, ty, body: ElementBody::Node }
    }

    pub fn edge(handle: ElementHandle, ty: Type, ends: EdgeEnds) -> Self {
        Self { handle, ty, body: ElementBody::Edge(ends) }
    }

    pub fn link(handle: ElementHandle, ty: Type) -> Self {
        Self { handle, ty, body: ElementBody::Link(None) }
    }

    pub fn ends(&self) -> Option<EdgeEnds> {
        match &self.body {
            ElementBody::Edge(ends) => Some(*ends),
            _ => None,
        }
    }

    pub fn content(&self) -> Option<&LinkContent> {
        match &self.body {
            ElementBody::Link(content) => content.as_ref(),
            _ => None,
        }
    }
}
