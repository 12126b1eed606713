//! Workbook deserialization from BIFF8 streams

use crate::biff;
use crate::error::Result;
use crate::model::Workbook;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// How the reader treats corrupt records inside sheet bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recovery {
    /// Any corrupt record fails the whole read
    #[default]
    Strict,
    /// A corrupt record ends its sheet body; earlier cells are kept
    Lenient,
}

/// A sheet body cut short by a corrupt record in lenient mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub sheet: String,
    pub offset: usize,
    pub record_type: u16,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadOptions {
    pub recovery: Recovery,
}

/// Reads workbooks from BIFF8 streams
///
/// # Examples
///
/// ```
/// use biffbook::{Recovery, ReadOptions, Workbook, WorkbookReader};
///
/// let mut workbook = Workbook::new();
/// workbook.create_sheet("Sheet1").unwrap();
/// let bytes = workbook.to_bytes().unwrap();
///
/// let reader = WorkbookReader::with_options(ReadOptions { recovery: Recovery::Lenient });
/// let (copy, skipped) = reader.read_bytes(&bytes).unwrap();
/// assert_eq!(copy.number_of_sheets(), 1);
/// assert!(skipped.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct WorkbookReader {
    options: ReadOptions,
}

impl WorkbookReader {
    pub fn new() -> Self {
        WorkbookReader::default()
    }

    pub fn with_options(options: ReadOptions) -> Self {
        WorkbookReader { options }
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    /// Decode a complete stream held in memory
    ///
    /// The skipped list is always empty in strict mode.
    pub fn read_bytes(&self, bytes: &[u8]) -> Result<(Workbook, Vec<SkippedRecord>)> {
        biff::decode_workbook(bytes, self.options.recovery)
    }

    /// Read the whole source, then decode it
    pub fn read<R: Read>(&self, mut source: R) -> Result<(Workbook, Vec<SkippedRecord>)> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes)?;
        self.read_bytes(&bytes)
    }

    /// Open and decode the file at `path`
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<(Workbook, Vec<SkippedRecord>)> {
        let file = File::open(path)?;
        self.read(BufReader::new(file))
    }
}

impl Workbook {
    /// Decode a stream held in memory, failing on any corrupt record
    pub fn from_bytes(bytes: &[u8]) -> Result<Workbook> {
        WorkbookReader::new().read_bytes(bytes).map(|(workbook, _)| workbook)
    }

    /// Decode everything `source` yields, failing on any corrupt record
    pub fn read<R: Read>(source: R) -> Result<Workbook> {
        WorkbookReader::new().read(source).map(|(workbook, _)| workbook)
    }

    /// Open and decode the file at `path`
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use biffbook::Workbook;
    ///
    /// let workbook = Workbook::open("report.xls").unwrap();
    /// for sheet in workbook.sheets() {
    ///     println!("{}: {} rows", sheet.name(), sheet.physical_number_of_rows());
    /// }
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Workbook> {
        WorkbookReader::new().open(path).map(|(workbook, _)| workbook)
    }

    /// Decode `source`, keeping what precedes a corrupt record in each
    /// damaged sheet body
    pub fn read_lenient<R: Read>(source: R) -> Result<(Workbook, Vec<SkippedRecord>)> {
        WorkbookReader::with_options(ReadOptions {
            recovery: Recovery::Lenient,
        })
        .read(source)
    }
}
