//! SCs lexer: tokenizes template text.

use crate::{Error, Result};

/// A token from the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub text: String,
}

/// Byte span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,

    // Connectors
    Arrow,          // ->
    LeftArrow,      // <-
    FatArrow,       // =>
    LeftFatArrow,   // <=
    Undirected,     // <>
    VarArrow,       // _->
    VarLeftArrow,   // _<-
    VarFatArrow,    // _=>
    VarLeftFatArrow, // _<=
    VarUndirected,  // _<>

    // Punctuation
    Colon,       // :
    DoubleColon, // ::
    SentenceEnd, // ;;
    Question,    // ?

    Eof,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '.'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Connector starting at `rest`, with its byte length.
fn connector(rest: &str) -> Option<(TokenKind, usize)> {
    let (var, body) = match rest.strip_prefix('_') {
        Some(body) => (true, body),
        None => (false, rest),
    };
    let plain = [
        ("->", TokenKind::Arrow, TokenKind::VarArrow),
        ("<-", TokenKind::LeftArrow, TokenKind::VarLeftArrow),
        ("=>", TokenKind::FatArrow, TokenKind::VarFatArrow),
        ("<=", TokenKind::LeftFatArrow, TokenKind::VarLeftFatArrow),
        ("<>", TokenKind::Undirected, TokenKind::VarUndirected),
    ];
    plain.iter().find(|(text, ..)| body.starts_with(text)).map(|(text, kind, var_kind)| {
        if var { (*var_kind, text.len() + 1) } else { (*kind, text.len()) }
    })
}

/// Tokenize SCs text.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        let rest = &input[pos..];
        match ch {
            c if c.is_whitespace() => { chars.next(); }

            // Block comments
            '/' if rest.starts_with("/*") => {
                let Some(len) = rest[2..].find("*/") else {
                    return Err(Error::SyntaxError {
                        position: pos,
                        message: "Unterminated block comment".into(),
                    });
                };
                let end = pos + 2 + len + 2;
                while chars.peek().is_some_and(|&(i, _)| i < end) {
                    chars.next();
                }
            }

            // Line comments
            '/' if rest.starts_with("//") => {
                while chars.peek().is_some_and(|&(_, c)| c != '\n') {
                    chars.next();
                }
            }

            // Connectors, including the `_`-prefixed forms
            _ if connector(rest).is_some() => {
                if let Some((kind, len)) = connector(rest) {
                    tokens.push(Token {
                        kind,
                        span: Span { start: pos, end: pos + len },
                        text: rest[..len].to_string(),
                    });
                    for _ in 0..len {
                        chars.next();
                    }
                }
            }

            c if is_ident_start(c) => {
                let start = pos;
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if is_ident_char(c) {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Identifier,
                    span: Span { start, end: start + ident.len() },
                    text: ident,
                });
            }

            ':' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, ':'))) {
                    chars.next();
                    tokens.push(punct(TokenKind::DoubleColon, pos, "::"));
                } else {
                    tokens.push(punct(TokenKind::Colon, pos, ":"));
                }
            }
            ';' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, ';'))) {
                    chars.next();
                    tokens.push(punct(TokenKind::SentenceEnd, pos, ";;"));
                } else {
                    return Err(Error::SyntaxError {
                        position: pos,
                        message: "Expected ';;' to end the sentence".into(),
                    });
                }
            }
            '?' => { chars.next(); tokens.push(punct(TokenKind::Question, pos, "?")); }

            other => {
                return Err(Error::SyntaxError {
                    position: pos,
                    message: format!("Unexpected character: '{other}'"),
                });
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span { start: input.len(), end: input.len() },
        text: String::new(),
    });

    Ok(tokens)
}

fn punct(kind: TokenKind, pos: usize, text: &str) -> Token {
    Token {
        kind,
        span: Span { start: pos, end: pos + text.len() },
        text: text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_sentence() {
        assert_eq!(kinds("a -> _x;;"), vec![
            TokenKind::Identifier,
            TokenKind::Arrow,
            TokenKind::Identifier,
            TokenKind::SentenceEnd,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_attributes() {
        assert_eq!(kinds("a => nrel_x:: rrel_1: _b;;"), vec![
            TokenKind::Identifier,
            TokenKind::FatArrow,
            TokenKind::Identifier,
            TokenKind::DoubleColon,
            TokenKind::Identifier,
            TokenKind::Colon,
            TokenKind::Identifier,
            TokenKind::SentenceEnd,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_var_connector_vs_identifier() {
        let tokens = tokenize("_a _-> _b;;").unwrap();
        assert_eq!(tokens[0].text, "_a");
        assert_eq!(tokens[1].kind, TokenKind::VarArrow);
        assert_eq!(tokens[1].span, Span { start: 3, end: 6 });
        assert_eq!(tokens[2].text, "_b");
    }

    #[test]
    fn test_all_connectors() {
        assert_eq!(kinds("<- => <= <> _<- _=> _<= _<>"), vec![
            TokenKind::LeftArrow,
            TokenKind::FatArrow,
            TokenKind::LeftFatArrow,
            TokenKind::Undirected,
            TokenKind::VarLeftArrow,
            TokenKind::VarFatArrow,
            TokenKind::VarLeftFatArrow,
            TokenKind::VarUndirected,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_dotted_variable() {
        let tokens = tokenize("..tmp").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].text, "..tmp");
    }

    #[test]
    fn test_comments() {
        assert_eq!(kinds("// line\na /* block\n */ -> b;;"), vec![
            TokenKind::Identifier,
            TokenKind::Arrow,
            TokenKind::Identifier,
            TokenKind::SentenceEnd,
            TokenKind::Eof,
        ]);
        assert!(tokenize("a /* open").is_err());
    }

    #[test]
    fn test_single_semicolon_is_error() {
        let err = tokenize("a -> b;").unwrap_err();
        assert!(matches!(err, Error::SyntaxError { position: 6, .. }));
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("a -> b$;;").unwrap_err();
        assert!(matches!(err, Error::SyntaxError { position: 6, .. }));
    }
}
