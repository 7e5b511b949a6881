//! SCs recursive descent parser.
//!
//! ```text
//! text      := { sentence } EOF
//! sentence  := [ '?' ] IDENT connector { IDENT (':' | '::') } IDENT ';;'
//! ```

use crate::{Error, Result};
use super::ast::*;
use super::lexer::{Span, Token, TokenKind};

/// Parser state: a token slice with a cursor.
struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).or_else(|| self.tokens.last())
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek_at(0).map_or(TokenKind::Eof, |t| t.kind)
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let tok = self.tokens.get(self.pos).or_else(|| self.tokens.last());
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<&'t Token> {
        if self.at(kind) {
            self.advance().ok_or_else(|| self.error(format!("Expected {what}")))
        } else {
            Err(self.error(format!("Expected {what}, got {}", self.describe())))
        }
    }

    fn describe(&self) -> String {
        match self.peek_at(0) {
            Some(t) if t.kind == TokenKind::Eof => "end of input".into(),
            Some(t) => format!("{:?} '{}'", t.kind, t.text),
            None => "end of input".into(),
        }
    }

    fn error(&self, message: String) -> Error {
        Error::SyntaxError {
            position: self.peek_at(0).map_or(0, |t| t.span.start),
            message,
        }
    }
}

/// Parse a token stream into sentences.
pub fn parse_sentences(tokens: &[Token]) -> Result<Vec<Sentence>> {
    let mut p = Parser::new(tokens);
    let mut sentences = Vec::new();
    while !p.at(TokenKind::Eof) {
        sentences.push(parse_sentence(&mut p)?);
    }
    Ok(sentences)
}

fn parse_sentence(p: &mut Parser) -> Result<Sentence> {
    let start = p.peek_at(0).map_or(0, |t| t.span.start);
    let optional = p.eat(TokenKind::Question);
    let source = parse_ident(p)?;
    let connector = parse_connector(p)?;

    let mut attributes = Vec::new();
    while p.at(TokenKind::Identifier)
        && matches!(p.peek_at(1).map(|t| t.kind), Some(TokenKind::Colon | TokenKind::DoubleColon))
    {
        let element = parse_ident(p)?;
        let marker = if p.eat(TokenKind::DoubleColon) {
            AttributeMarker::Double
        } else {
            p.expect(TokenKind::Colon, "':'")?;
            AttributeMarker::Single
        };
        attributes.push(Attribute { element, marker });
    }

    let target = parse_ident(p)?;
    let end = p.expect(TokenKind::SentenceEnd, "';;'")?.span.end;
    Ok(Sentence { optional, source, connector, attributes, target, span: Span { start, end } })
}

fn parse_ident(p: &mut Parser) -> Result<Ident> {
    let tok = p.expect(TokenKind::Identifier, "an element identifier")?;
    Ok(Ident { name: tok.text.clone(), span: tok.span })
}

fn parse_connector(p: &mut Parser) -> Result<Connector> {
    let (kind, reversed, explicit_var) = match p.peek_kind() {
        TokenKind::Arrow => (ConnectorKind::Access, false, false),
        TokenKind::LeftArrow => (ConnectorKind::Access, true, false),
        TokenKind::FatArrow => (ConnectorKind::Common, false, false),
        TokenKind::LeftFatArrow => (ConnectorKind::Common, true, false),
        TokenKind::Undirected => (ConnectorKind::Undirected, false, false),
        TokenKind::VarArrow => (ConnectorKind::Access, false, true),
        TokenKind::VarLeftArrow => (ConnectorKind::Access, true, true),
        TokenKind::VarFatArrow => (ConnectorKind::Common, false, true),
        TokenKind::VarLeftFatArrow => (ConnectorKind::Common, true, true),
        TokenKind::VarUndirected => (ConnectorKind::Undirected, false, true),
        _ => return Err(p.error(format!("Expected a connector, got {}", p.describe()))),
    };
    let span = p.peek_at(0).map_or(Span { start: 0, end: 0 }, |t| t.span);
    p.advance();
    Ok(Connector { kind, reversed, explicit_var, span })
}
