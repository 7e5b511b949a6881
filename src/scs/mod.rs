//! # SCs Template Language
//!
//! A small textual front-end compiling triple notation to a [`Template`].
//! Parsing is pure; compiling resolves constants through a [`KeynodeCache`].
//!
//! ```text
//! // every instance of concept_set, with an optional common-arc neighbour
//! concept_set -> _item;;
//! ? _item => nrel_parent:: _parent;;
//! sc_node_class -> _parent;;
//! ```
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `->` / `<-` | access arc (var pos perm) |
//! | `=>` / `<=` | directed common arc |
//! | `<>` | undirected common edge |
//! | `_->` etc. | same as without `_` |
//! | `rel:` / `rel::` | attribute arc from `rel` to the connector |
//! | `?` | optional sentence |
//! | `_x`, `..x` | variable; any other identifier is a keynode |
//! | `sc_node_class -> _x;;` | declares the type of `_x` |
//!
//! Undeclared variables are nodes.

pub mod ast;
pub mod lexer;
pub mod parser;

use hashbrown::HashMap;

use crate::keynodes::KeynodeCache;
use crate::model::Type;
use crate::storage::ElementStore;
use crate::template::{Template, TemplateItem};
use crate::{Error, Result};
use ast::{ConnectorKind, Ident, Sentence};

/// Parse SCs text into sentences.
pub fn parse(text: &str) -> Result<Vec<Sentence>> {
    let tokens = lexer::tokenize(text)?;
    parser::parse_sentences(&tokens)
}

/// Variable type named by a reserved type keyword.
pub fn type_keyword(name: &str) -> Option<Type> {
    let ty = match name {
        "sc_node" => Type::NODE_VAR,
        "sc_node_tuple" => Type::NODE_VAR_TUPLE,
        "sc_node_struct" => Type::NODE_VAR_STRUCT,
        "sc_node_role_relation" => Type::NODE_VAR_ROLE,
        "sc_node_norole_relation" => Type::NODE_VAR_NOROLE,
        "sc_node_class" => Type::NODE_VAR_CLASS,
        "sc_node_abstract" => Type::NODE_VAR_ABSTRACT,
        "sc_node_material" => Type::NODE_VAR_MATERIAL,
        "sc_link" => Type::LINK_VAR,
        _ => return None,
    };
    Some(ty)
}

fn connector_type(kind: ConnectorKind) -> Type {
    match kind {
        ConnectorKind::Access => Type::EDGE_ACCESS_VAR_POS_PERM,
        ConnectorKind::Common => Type::EDGE_DCOMMON_VAR,
        ConnectorKind::Undirected => Type::EDGE_UCOMMON_VAR,
    }
}

/// Compile SCs text to a template over `store`.
pub fn build_template<S>(text: &str, store: &S, keynodes: &KeynodeCache) -> Result<Template>
where
    S: ElementStore + ?Sized,
{
    let sentences = parse(text)?;
    let mut compiler = Compiler { store, keynodes, types: HashMap::new() };
    compiler.compile(&sentences)
}

struct Compiler<'a, S: ?Sized> {
    store: &'a S,
    keynodes: &'a KeynodeCache,
    types: HashMap<String, Type>,
}

impl<S> Compiler<'_, S>
where
    S: ElementStore + ?Sized,
{
    fn compile(&mut self, sentences: &[Sentence]) -> Result<Template> {
        let mut body = Vec::with_capacity(sentences.len());
        for sentence in sentences {
            if !self.declaration(sentence)? {
                body.push(sentence);
            }
        }

        let mut template = Template::new();
        for (n, sentence) in body.into_iter().enumerate() {
            self.sentence(&mut template, n, sentence)?;
        }
        tracing::debug!(sentences = sentences.len(), triples = template.len(), "scs compiled");
        Ok(template)
    }

    /// Record `sc_xxx -> name;;`. Returns false for ordinary sentences.
    fn declaration(&mut self, sentence: &Sentence) -> Result<bool> {
        let Some(ty) = type_keyword(&sentence.source.name) else {
            return Ok(false);
        };
        let plain = sentence.connector.kind == ConnectorKind::Access
            && !sentence.connector.reversed
            && sentence.attributes.is_empty()
            && !sentence.optional;
        if !plain {
            return Err(Error::SyntaxError {
                position: sentence.span.start,
                message: format!("type keyword '{}' only supports 'keyword -> element;;'", sentence.source.name),
            });
        }
        if !sentence.target.is_variable() {
            return Ok(true);
        }

        let name = &sentence.target.name;
        let merged = match self.types.get(name) {
            Some(prev) => prev.compose(ty).map_err(|e| {
                Error::MalformedTemplate(format!("conflicting type declarations for '{name}': {e}"))
            })?,
            None => ty,
        };
        self.types.insert(name.clone(), merged);
        Ok(true)
    }

    fn element(&self, ident: &Ident) -> Result<TemplateItem> {
        if type_keyword(&ident.name).is_some() {
            return Err(Error::SyntaxError {
                position: ident.span.start,
                message: format!("type keyword '{}' used as an element", ident.name),
            });
        }
        if ident.is_variable() {
            let ty = self.types.get(&ident.name).copied().unwrap_or(Type::NODE_VAR);
            return Ok(TemplateItem::var_as(ty, ident.name.as_str()));
        }
        self.keynodes.resolve(self.store, &ident.name).map(TemplateItem::fixed)
    }

    fn sentence(&self, template: &mut Template, n: usize, sentence: &Sentence) -> Result<()> {
        let first = template.len();
        let mut source = self.element(&sentence.source)?;
        let mut target = self.element(&sentence.target)?;
        if sentence.connector.reversed {
            std::mem::swap(&mut source, &mut target);
        }
        let edge_ty = connector_type(sentence.connector.kind);

        if sentence.attributes.is_empty() {
            template.triple(source, edge_ty, target)?;
        } else {
            let edge_alias = format!("_scs_edge_{n}");
            template.triple(source, TemplateItem::var_as(edge_ty, edge_alias.as_str()), target)?;
            for attribute in &sentence.attributes {
                let attr = self.element(&attribute.element)?;
                template.triple(attr, Type::EDGE_ACCESS_VAR_POS_PERM, edge_alias.as_str())?;
            }
        }

        if sentence.optional {
            for i in first..template.len() {
                template.mark_optional(i)?;
            }
        }
        Ok(())
    }
}
