//! Rows: sparse, column-ordered collections of cells

use super::cell::Cell;
use crate::date::DateSystem;
use crate::error::{BiffError, Result};
use crate::types::MAX_COLUMN;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    index: u32,
    cells: BTreeMap<u16, Cell>,
    /// Custom height in twips
    height: Option<u16>,
    hidden: bool,
    date_system: DateSystem,
}

impl Row {
    pub(crate) fn new(index: u32, date_system: DateSystem) -> Self {
        Row {
            index,
            cells: BTreeMap::new(),
            height: None,
            hidden: false,
            date_system,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Create a blank cell at `column`, replacing any cell already there
    pub fn create_cell(&mut self, column: u16) -> Result<&mut Cell> {
        if column > MAX_COLUMN {
            return Err(BiffError::index("column", column as usize, MAX_COLUMN as usize));
        }
        let cell = Cell::new(self.index, column, self.date_system);
        self.cells.insert(column, cell);
        self.cells
            .get_mut(&column)
            .ok_or_else(|| BiffError::index("column", column as usize, MAX_COLUMN as usize))
    }

    pub fn cell(&self, column: u16) -> Option<&Cell> {
        self.cells.get(&column)
    }

    pub fn cell_mut(&mut self, column: u16) -> Option<&mut Cell> {
        self.cells.get_mut(&column)
    }

    pub fn remove_cell(&mut self, column: u16) -> Option<Cell> {
        self.cells.remove(&column)
    }

    /// Column of the first cell, if any
    pub fn first_cell_num(&self) -> Option<u16> {
        self.cells.keys().next().copied()
    }

    /// Column of the last cell, if any
    pub fn last_cell_num(&self) -> Option<u16> {
        self.cells.keys().next_back().copied()
    }

    pub fn physical_number_of_cells(&self) -> usize {
        self.cells.len()
    }

    /// Cells in column order
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.cells.values_mut()
    }

    pub fn height(&self) -> Option<u16> {
        self.height
    }

    /// Set a custom height in twips, `None` for the default height
    pub fn set_height(&mut self, height: Option<u16>) {
        self.height = height.map(|h| h & 0x7FFF);
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub(crate) fn set_date_system(&mut self, system: DateSystem) {
        self.date_system = system;
        for cell in self.cells.values_mut() {
            cell.set_date_system(system);
        }
    }
}
