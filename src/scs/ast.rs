//! SCs syntax tree.

use super::lexer::Span;

/// `[?] source connector {attr (':' | '::')} target ;;`
#[derive(Debug, Clone, PartialEq)]
pub struct Sentence {
    pub optional: bool,
    pub source: Ident,
    pub connector: Connector,
    pub attributes: Vec<Attribute>,
    pub target: Ident,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    /// `_name` and `..name` are variables, everything else names a keynode.
    pub fn is_variable(&self) -> bool {
        self.name.starts_with('_') || self.name.starts_with("..")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorKind {
    /// `->`: access arc.
    Access,
    /// `=>`: directed common arc.
    Common,
    /// `<>`: undirected common edge.
    Undirected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connector {
    pub kind: ConnectorKind,
    /// `<-` / `<=`: the arc points from the right element to the left one.
    pub reversed: bool,
    /// Spelled with a leading `_`.
    pub explicit_var: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeMarker {
    /// `role:`
    Single,
    /// `nrel:: `
    Double,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub element: Ident,
    pub marker: AttributeMarker,
}
