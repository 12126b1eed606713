//! Sheets: sparse, index-ordered collections of rows

use super::cell::Cell;
use super::row::Row;
use crate::date::DateSystem;
use crate::error::{BiffError, Result};
use crate::types::{SheetVisibility, MAX_COLUMN, MAX_ROW};
use std::collections::BTreeMap;

/// Width and visibility of one column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Width in 1/256 of a character
    pub width: u16,
    pub hidden: bool,
}

/// Default column width in 1/256 of a character
pub const DEFAULT_COLUMN_WIDTH: u16 = 8 * 256;

const MAX_SHEET_NAME: usize = 31;
const RESERVED_NAME_CHARS: [char; 7] = [':', '\\', '/', '?', '*', '[', ']'];

/// Check that a sheet name can be stored
pub(crate) fn validate_sheet_name(name: &str) -> Result<()> {
    let invalid = |reason| BiffError::InvalidSheetName {
        name: name.to_string(),
        reason,
    };
    let len = name.chars().count();
    if len == 0 {
        return Err(invalid("name is empty"));
    }
    if len > MAX_SHEET_NAME {
        return Err(invalid("name is longer than 31 characters"));
    }
    if name.contains(RESERVED_NAME_CHARS) {
        return Err(invalid("name contains one of : \\ / ? * [ ]"));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(invalid("name starts or ends with an apostrophe"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    rows: BTreeMap<u32, Row>,
    columns: BTreeMap<u16, ColumnInfo>,
    visibility: SheetVisibility,
    date_system: DateSystem,
}

impl Sheet {
    pub(crate) fn new(name: &str, date_system: DateSystem) -> Self {
        Sheet {
            name: name.to_string(),
            rows: BTreeMap::new(),
            columns: BTreeMap::new(),
            visibility: SheetVisibility::Visible,
            date_system,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Create an empty row at `index`, replacing any row already there
    pub fn create_row(&mut self, index: u32) -> Result<&mut Row> {
        if index > MAX_ROW {
            return Err(BiffError::index("row", index as usize, MAX_ROW as usize));
        }
        self.rows.insert(index, Row::new(index, self.date_system));
        self.rows
            .get_mut(&index)
            .ok_or_else(|| BiffError::index("row", index as usize, MAX_ROW as usize))
    }

    pub fn row(&self, index: u32) -> Option<&Row> {
        self.rows.get(&index)
    }

    pub fn row_mut(&mut self, index: u32) -> Option<&mut Row> {
        self.rows.get_mut(&index)
    }

    /// Existing row at `index`, or a newly created one
    pub fn row_or_create(&mut self, index: u32) -> Result<&mut Row> {
        if self.rows.contains_key(&index) {
            return self
                .rows
                .get_mut(&index)
                .ok_or_else(|| BiffError::index("row", index as usize, MAX_ROW as usize));
        }
        self.create_row(index)
    }

    pub fn remove_row(&mut self, index: u32) -> Option<Row> {
        self.rows.remove(&index)
    }

    pub fn first_row_num(&self) -> Option<u32> {
        self.rows.keys().next().copied()
    }

    pub fn last_row_num(&self) -> Option<u32> {
        self.rows.keys().next_back().copied()
    }

    pub fn physical_number_of_rows(&self) -> usize {
        self.rows.len()
    }

    /// Rows in index order
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut Row> {
        self.rows.values_mut()
    }

    pub fn cell(&self, row: u32, column: u16) -> Option<&Cell> {
        self.rows.get(&row).and_then(|r| r.cell(column))
    }

    pub fn cell_mut(&mut self, row: u32, column: u16) -> Option<&mut Cell> {
        self.rows.get_mut(&row).and_then(|r| r.cell_mut(column))
    }

    /// Set a column width in 1/256 of a character
    pub fn set_column_width(&mut self, column: u16, width: u16) -> Result<()> {
        self.column_entry(column)?.width = width;
        Ok(())
    }

    pub fn column_width(&self, column: u16) -> u16 {
        self.columns
            .get(&column)
            .map(|c| c.width)
            .unwrap_or(DEFAULT_COLUMN_WIDTH)
    }

    pub fn set_column_hidden(&mut self, column: u16, hidden: bool) -> Result<()> {
        self.column_entry(column)?.hidden = hidden;
        Ok(())
    }

    pub fn is_column_hidden(&self, column: u16) -> bool {
        self.columns.get(&column).is_some_and(|c| c.hidden)
    }

    /// Columns with explicit width or visibility, in column order
    pub fn column_infos(&self) -> impl Iterator<Item = (u16, &ColumnInfo)> {
        self.columns.iter().map(|(col, info)| (*col, info))
    }

    fn column_entry(&mut self, column: u16) -> Result<&mut ColumnInfo> {
        if column > MAX_COLUMN {
            return Err(BiffError::index("column", column as usize, MAX_COLUMN as usize));
        }
        Ok(self.columns.entry(column).or_insert(ColumnInfo {
            width: DEFAULT_COLUMN_WIDTH,
            hidden: false,
        }))
    }

    pub(crate) fn insert_column_info(&mut self, column: u16, info: ColumnInfo) {
        self.columns.insert(column, info);
    }

    pub fn visibility(&self) -> SheetVisibility {
        self.visibility
    }

    pub fn set_visibility(&mut self, visibility: SheetVisibility) {
        self.visibility = visibility;
    }

    pub(crate) fn set_date_system(&mut self, system: DateSystem) {
        self.date_system = system;
        for row in self.rows.values_mut() {
            row.set_date_system(system);
        }
    }
}
