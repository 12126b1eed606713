//! Cells and their typed values

use crate::date::{self, DateSystem};
use crate::error::{BiffError, Result};
use crate::formula::Formula;
use crate::tables::{StringIndex, StyleIndex};
use crate::types::{cell_reference, CellType, ErrorCode};
use chrono::NaiveDateTime;

/// Value held by a cell; the variant is the cell's type tag.
///
/// Text lives once in the workbook's shared-string pool and cells refer to
/// it by index.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Blank,
    Numeric(f64),
    Text(StringIndex),
    Formula(Formula),
    Boolean(bool),
    Error(ErrorCode),
}

impl CellValue {
    pub fn cell_type(&self) -> CellType {
        match self {
            CellValue::Blank => CellType::Blank,
            CellValue::Numeric(_) => CellType::Numeric,
            CellValue::Text(_) => CellType::String,
            CellValue::Formula(_) => CellType::Formula,
            CellValue::Boolean(_) => CellType::Boolean,
            CellValue::Error(_) => CellType::Error,
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Numeric(n)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Numeric(n as f64)
    }
}

impl From<StringIndex> for CellValue {
    fn from(index: StringIndex) -> Self {
        CellValue::Text(index)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<ErrorCode> for CellValue {
    fn from(e: ErrorCode) -> Self {
        CellValue::Error(e)
    }
}

/// A cell inside a row
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    row: u32,
    column: u16,
    value: CellValue,
    style: StyleIndex,
    date_system: DateSystem,
}

impl Cell {
    pub(crate) fn new(row: u32, column: u16, date_system: DateSystem) -> Self {
        Cell {
            row,
            column,
            value: CellValue::Blank,
            style: StyleIndex(0),
            date_system,
        }
    }

    pub fn row_index(&self) -> u32 {
        self.row
    }

    pub fn column_index(&self) -> u16 {
        self.column
    }

    /// A1-style reference of this cell
    pub fn reference(&self) -> String {
        cell_reference(self.row, self.column)
    }

    pub fn cell_type(&self) -> CellType {
        self.value.cell_type()
    }

    pub fn value(&self) -> &CellValue {
        &self.value
    }

    /// Replace the value (and with it the type tag)
    pub fn set_value(&mut self, value: impl Into<CellValue>) {
        self.value = value.into();
    }

    pub fn set_numeric_value(&mut self, value: f64) {
        self.value = CellValue::Numeric(value);
    }

    /// Point the cell at an interned string, see `Workbook::intern_string`
    pub fn set_string_value(&mut self, value: StringIndex) {
        self.value = CellValue::Text(value);
    }

    /// Store a calendar instant as a serial day-count.
    ///
    /// The cell becomes NUMERIC; give it a date-shaped style for it to
    /// display as a date.
    pub fn set_date_value(&mut self, value: NaiveDateTime) -> Result<()> {
        let serial = date::to_serial(value, self.date_system)
            .ok_or_else(|| BiffError::InvalidDate(format!("{value} in {:?}", self.date_system)))?;
        self.value = CellValue::Numeric(serial);
        Ok(())
    }

    /// Store formula text; it is never evaluated
    pub fn set_cell_formula(&mut self, formula: &str) {
        self.value = CellValue::Formula(Formula::new(formula));
    }

    pub fn set_boolean_value(&mut self, value: bool) {
        self.value = CellValue::Boolean(value);
    }

    pub fn set_error_value(&mut self, value: ErrorCode) {
        self.value = CellValue::Error(value);
    }

    pub fn set_blank(&mut self) {
        self.value = CellValue::Blank;
    }

    fn mismatch(&self, expected: CellType) -> BiffError {
        BiffError::TypeMismatch {
            expected,
            actual: self.cell_type(),
        }
    }

    pub fn numeric_value(&self) -> Result<f64> {
        match &self.value {
            CellValue::Numeric(n) => Ok(*n),
            _ => Err(self.mismatch(CellType::Numeric)),
        }
    }

    /// Shared-string handle of a STRING cell; resolve it with
    /// `Workbook::string_value`
    pub fn string_index(&self) -> Result<StringIndex> {
        match &self.value {
            CellValue::Text(s) => Ok(*s),
            _ => Err(self.mismatch(CellType::String)),
        }
    }

    /// Read a NUMERIC cell as a calendar instant
    pub fn date_value(&self) -> Result<NaiveDateTime> {
        let serial = self.numeric_value()?;
        date::from_serial(serial, self.date_system)
            .ok_or_else(|| BiffError::InvalidDate(format!("serial {serial} in {:?}", self.date_system)))
    }

    pub fn cell_formula(&self) -> Result<&str> {
        match &self.value {
            CellValue::Formula(f) => Ok(f.text()),
            _ => Err(self.mismatch(CellType::Formula)),
        }
    }

    pub fn formula(&self) -> Option<&Formula> {
        match &self.value {
            CellValue::Formula(f) => Some(f),
            _ => None,
        }
    }

    pub(crate) fn formula_mut(&mut self) -> Option<&mut Formula> {
        match &mut self.value {
            CellValue::Formula(f) => Some(f),
            _ => None,
        }
    }

    pub fn boolean_value(&self) -> Result<bool> {
        match &self.value {
            CellValue::Boolean(b) => Ok(*b),
            _ => Err(self.mismatch(CellType::Boolean)),
        }
    }

    pub fn error_value(&self) -> Result<ErrorCode> {
        match &self.value {
            CellValue::Error(e) => Ok(*e),
            _ => Err(self.mismatch(CellType::Error)),
        }
    }

    pub fn style(&self) -> StyleIndex {
        self.style
    }

    pub fn set_style(&mut self, style: StyleIndex) {
        self.style = style;
    }

    pub fn date_system(&self) -> DateSystem {
        self.date_system
    }

    pub(crate) fn set_date_system(&mut self, system: DateSystem) {
        self.date_system = system;
    }
}
