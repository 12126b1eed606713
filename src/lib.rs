//! # biffbook
//!
//! An in-memory spreadsheet workbook model with a BIFF8 binary codec.
//!
//! ## Features
//!
//! - **Workbook model**: ordered sheets, sparse rows and cells, typed values
//! - **Shared pools**: strings, fonts, number formats and cell styles are
//!   interned once per workbook and referenced by index
//! - **Formulas**: formula text is stored verbatim and compiled to binary
//!   tokens when the workbook is written
//! - **Dates**: 1900 and 1904 date systems, including the 1900 leap-year quirk
//! - **Binary codec**: deterministic BIFF8 writer and a strict or lenient reader
//!
//! ## Quick Start
//!
//! ### Building and writing a workbook
//!
//! ```rust,no_run
//! use biffbook::{CellStyle, Font, Workbook};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut workbook = Workbook::new();
//! let bold = workbook.intern_font(Font::default().with_bold(true))?;
//! let header = workbook.intern_style(CellStyle::default().with_font(bold))?;
//! let total = workbook.intern_string("Total");
//!
//! let sheet = workbook.create_sheet("Sales")?;
//! let row = sheet.create_row(0)?;
//! let cell = row.create_cell(0)?;
//! cell.set_string_value(total);
//! cell.set_style(header);
//! row.create_cell(1)?.set_cell_formula("SUM(B2:B10)");
//!
//! workbook.save("sales.xls")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading a workbook
//!
//! ```rust,no_run
//! use biffbook::Workbook;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let workbook = Workbook::open("sales.xls")?;
//! for sheet in workbook.sheets() {
//!     for row in sheet.rows() {
//!         for cell in row.cells() {
//!             match workbook.string_value(cell) {
//!                 Ok(text) => println!("{} = {text}", cell.reference()),
//!                 Err(_) => println!("{} = {:?}", cell.reference(), cell.value()),
//!             }
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod biff;
pub mod date;
pub mod error;
pub mod formula;
pub mod model;
pub mod reader;
pub mod tables;
pub mod types;
pub mod writer;

pub use date::DateSystem;
pub use error::{BiffError, Result};
pub use formula::{CachedValue, Formula};
pub use model::{Cell, CellValue, ColumnInfo, Row, Sheet, Workbook};
pub use reader::{ReadOptions, Recovery, SkippedRecord, WorkbookReader};
pub use tables::{
    Border, Borders, CellStyle, Fill, Font, FontIndex, FormatIndex, StringIndex, StyleIndex,
};
pub use types::{
    BorderStyle, CellType, ErrorCode, FillPattern, HorizontalAlignment, SheetVisibility,
    Underline, VerticalAlignment,
};
pub use writer::{WorkbookWriter, WorkbookWriterBuilder, WriteOptions};
