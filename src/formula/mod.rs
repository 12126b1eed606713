//! Formula storage
//!
//! A formula cell keeps the text it was given verbatim. The text is parsed
//! and compiled to binary tokens when it is set; a failure there is kept
//! alongside the text and only reported when the workbook is written.
//!
//! Formulas read from a file that use tokens this crate does not model
//! (3-D references, defined names, add-in functions and the like) keep
//! their raw bytes and are written back unchanged.

pub mod functions;
pub mod parser;
pub mod ptg;

pub use functions::{function_by_id, function_by_name, FunctionInfo};
pub use parser::{parse, CellRef, Expr, MAX_FORMULA_LEN, MAX_NESTING};
pub use ptg::{DecodeError, Ptg};

use crate::types::ErrorCode;

/// Last result a spreadsheet application stored with a formula
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CachedValue {
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(ErrorCode),
    /// Empty string result
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
enum Body {
    Tokens(Vec<Ptg>),
    /// `rgce` bytes plus any trailing constant data, kept as read
    Opaque { rgce: Vec<u8>, trailing: Vec<u8> },
    Failed(String),
}

/// Formula text plus its compiled token form
///
/// Two formulas are equal when their text and tokens are; the cached result
/// is not compared.
#[derive(Debug, Clone)]
pub struct Formula {
    text: String,
    body: Body,
    cached: Option<CachedValue>,
}

impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.body == other.body
    }
}

impl Formula {
    /// Store `text` and compile it to tokens
    pub fn new(text: &str) -> Self {
        let body = match parse(text).and_then(|expr| ptg::compile(&expr)) {
            Ok(tokens) => Body::Tokens(tokens),
            Err(reason) => Body::Failed(reason),
        };
        Formula {
            text: text.to_string(),
            body,
            cached: None,
        }
    }

    /// Rebuild a formula from `rgce` bytes read from a file.
    ///
    /// `trailing` is whatever follows the token bytes in the record. Only
    /// malformed input fails; well-formed bytes with unmodelled tokens
    /// become an opaque formula.
    pub(crate) fn from_rgce(rgce: &[u8], trailing: &[u8]) -> Result<Self, String> {
        match ptg::decode(rgce, None) {
            Ok(tokens) => Self::from_tokens(tokens),
            Err(DecodeError::Unsupported(reason)) => {
                log::debug!("keeping formula bytes as read: {reason}");
                Ok(Self::opaque(rgce, trailing))
            }
            Err(DecodeError::Malformed(reason)) => Err(reason),
        }
    }

    /// Expand the body of a shared formula for the cell at `origin`
    /// (row, column). `None` when the body holds unmodelled tokens.
    pub(crate) fn from_shared(rgce: &[u8], origin: (u32, u16)) -> Result<Option<Self>, String> {
        match ptg::decode(rgce, Some(origin)) {
            Ok(tokens) => Self::from_tokens(tokens).map(Some),
            Err(DecodeError::Unsupported(_)) => Ok(None),
            Err(DecodeError::Malformed(reason)) => Err(reason),
        }
    }

    fn from_tokens(tokens: Vec<Ptg>) -> Result<Self, String> {
        let text = ptg::render(&tokens)?;
        Ok(Formula {
            text,
            body: Body::Tokens(tokens),
            cached: None,
        })
    }

    pub(crate) fn opaque(rgce: &[u8], trailing: &[u8]) -> Self {
        Formula {
            text: String::new(),
            body: Body::Opaque {
                rgce: rgce.to_vec(),
                trailing: trailing.to_vec(),
            },
            cached: None,
        }
    }

    /// Formula text exactly as it was set; empty for opaque formulas
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Compiled tokens, or the reason there are none
    pub fn tokens(&self) -> Result<&[Ptg], &str> {
        match &self.body {
            Body::Tokens(tokens) => Ok(tokens.as_slice()),
            Body::Opaque { .. } => Err("formula is kept as raw bytes"),
            Body::Failed(reason) => Err(reason.as_str()),
        }
    }

    /// Raw `rgce` bytes of an opaque formula
    pub fn raw_tokens(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Opaque { rgce, .. } => Some(rgce),
            _ => None,
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self.body, Body::Opaque { .. })
    }

    pub fn is_encodable(&self) -> bool {
        match &self.body {
            Body::Tokens(_) => true,
            Body::Opaque { rgce, .. } => !ptg::is_range_pointer(rgce),
            Body::Failed(_) => false,
        }
    }

    /// Serialize to `rgce` bytes
    pub fn encode(&self) -> Result<Vec<u8>, String> {
        match &self.body {
            Body::Tokens(tokens) => ptg::encode(tokens),
            Body::Opaque { rgce, .. } if ptg::is_range_pointer(rgce) => {
                Err("formula belongs to an array or table range that is not kept".to_string())
            }
            Body::Opaque { rgce, .. } => Ok(rgce.clone()),
            Body::Failed(reason) => Err(reason.clone()),
        }
    }

    /// Bytes written after the tokens, such as array constants
    pub(crate) fn trailing_data(&self) -> &[u8] {
        match &self.body {
            Body::Opaque { trailing, .. } => trailing,
            _ => &[],
        }
    }

    /// Canonical text rendered from the tokens
    pub fn canonical_text(&self) -> Option<String> {
        match &self.body {
            Body::Tokens(tokens) => ptg::render(tokens).ok(),
            _ => None,
        }
    }

    /// Result stored with the formula when it was read
    pub fn cached_value(&self) -> Option<&CachedValue> {
        self.cached.as_ref()
    }

    pub fn set_cached_value(&mut self, value: Option<CachedValue>) {
        self.cached = value;
    }
}
