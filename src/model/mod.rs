//! Workbook → sheet → row → cell object graph

pub mod cell;
pub mod row;
pub mod sheet;
pub mod workbook;

pub use cell::{Cell, CellValue};
pub use row::Row;
pub use sheet::{ColumnInfo, Sheet, DEFAULT_COLUMN_WIDTH};
pub use workbook::Workbook;
