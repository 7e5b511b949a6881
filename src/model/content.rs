//! Scalar content carried by link elements.

use serde::{Deserialize, Serialize};

/// Content of a link element. Equality of the byte key drives content lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum LinkContent {
    String(String),
    Int(i64),
    Float(f64),
    Binary(Vec<u8>),
}

impl LinkContent {
    pub fn type_name(&self) -> &'static str {
        match self {
            LinkContent::String(_) => "STRING",
            LinkContent::Int(_) => "INT",
            LinkContent::Float(_) => "FLOAT",
            LinkContent::Binary(_) => "BINARY",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LinkContent::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            LinkContent::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Byte key used by the content index.
    ///
    /// The first byte tags the variant so `Int(49)` and `String("1")` never
    /// collide; floats compare by bit pattern.
    pub fn key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(9);
        match self {
            LinkContent::String(s) => {
                key.push(b's');
                key.extend_from_slice(s.as_bytes());
            }
            LinkContent::Int(i) => {
                key.push(b'i');
                key.extend_from_slice(&i.to_le_bytes());
            }
            LinkContent::Float(v) => {
                key.push(b'f');
                key.extend_from_slice(&v.to_bits().to_le_bytes());
            }
            LinkContent::Binary(b) => {
                key.push(b'b');
                key.extend_from_slice(b);
            }
        }
        key
    }
}

impl From<&str> for LinkContent {
    fn from(s: &str) -> Self { LinkContent::String(s.to_string()) }
}

impl From<String> for LinkContent {
    fn from(s: String) -> Self { LinkContent::String(s) }
}

impl From<i64> for LinkContent {
    fn from(i: i64) -> Self { LinkContent::Int(i) }
}

impl From<f64> for LinkContent {
    fn from(f: f64) -> Self { LinkContent::Float(f) }
}

impl From<Vec<u8>> for LinkContent {
    fn from(b: Vec<u8>) -> Self { LinkContent::Binary(b) }
}

impl std::fmt::Display for LinkContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkContent::String(s) => write!(f, "\"{s}\""),
            LinkContent::Int(i) => write!(f, "{i}"),
            LinkContent::Float(v) => write!(f, "{v}"),
            LinkContent::Binary(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}
