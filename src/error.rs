//! Error types for the biffbook library

use crate::types::CellType;
use thiserror::Error;

/// Result type alias for biffbook operations
pub type Result<T> = std::result::Result<T, BiffError>;

/// Main error type for all workbook and codec operations
#[derive(Error, Debug)]
pub enum BiffError {
    /// A typed getter was called on a cell holding a different type
    #[error("Cannot get a {expected} value from a {actual} cell")]
    TypeMismatch { expected: CellType, actual: CellType },

    /// A sheet with this name already exists in the workbook
    #[error("The workbook already contains a sheet named '{0}'")]
    DuplicateName(String),

    /// Sheet name is empty, too long or contains a reserved character
    #[error("Invalid sheet name '{name}': {reason}")]
    InvalidSheetName { name: String, reason: &'static str },

    /// Sheet not found by name or position
    #[error("Sheet '{0}' not found")]
    SheetNotFound(String),

    /// Row, column, sheet or pool index outside the allowed range
    #[error("{what} index {index} is out of range (max {max})")]
    InvalidIndex {
        what: &'static str,
        index: usize,
        max: usize,
    },

    /// Built-in number format name could not be resolved
    #[error("Unknown built-in number format: '{0}'")]
    UnknownFormat(String),

    /// Style refers to a font that has not been interned
    #[error("Unknown font index {0}")]
    UnknownFont(u16),

    /// Cell refers to a style that has not been interned
    #[error("Unknown style index {0}")]
    UnknownStyle(u16),

    /// A pool has reached the largest size the file format can address
    #[error("The {pool} table is full ({max} entries)")]
    PoolFull { pool: &'static str, max: usize },

    /// Date outside the range of the workbook's date system
    #[error("Date out of range: {0}")]
    InvalidDate(String),

    /// Stream does not start with a supported workbook signature
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Structurally invalid record in the stream
    #[error("Corrupt record 0x{record_type:04X} at offset {offset}: {reason}")]
    CorruptRecord {
        offset: usize,
        record_type: u16,
        reason: String,
    },

    /// Formula text could not be compiled to binary tokens
    #[error("Cannot encode formula in cell {cell}: {reason}")]
    FormulaEncoding { cell: String, reason: String },

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl BiffError {
    pub(crate) fn corrupt(offset: usize, record_type: u16, reason: impl Into<String>) -> Self {
        BiffError::CorruptRecord {
            offset,
            record_type,
            reason: reason.into(),
        }
    }

    pub(crate) fn index(what: &'static str, index: usize, max: usize) -> Self {
        BiffError::InvalidIndex { what, index, max }
    }
}
