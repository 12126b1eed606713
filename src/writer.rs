//! Workbook serialization to BIFF8 streams

use crate::biff::{self, records::CODEPAGE_UTF16};
use crate::error::Result;
use crate::model::Workbook;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Settings applied while encoding a workbook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Code page stored in the CODEPAGE record
    pub codepage: u16,
    /// Ask readers to recalculate formulas on load
    pub calc_on_load: bool,
    /// Encode sheet bodies on the rayon pool (needs the `parallel` feature)
    pub parallel: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            codepage: CODEPAGE_UTF16,
            calc_on_load: true,
            parallel: false,
        }
    }
}

/// Writes workbooks as BIFF8 streams
///
/// The whole stream is assembled in memory and handed to the sink only
/// after encoding succeeded, so a failed write leaves the sink untouched.
///
/// # Examples
///
/// ```
/// use biffbook::{Workbook, WorkbookWriter};
///
/// let mut workbook = Workbook::new();
/// workbook.create_sheet("Sheet1").unwrap();
///
/// let mut out = Vec::new();
/// WorkbookWriter::new().write(&workbook, &mut out).unwrap();
/// assert!(!out.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct WorkbookWriter {
    options: WriteOptions,
}

impl WorkbookWriter {
    /// Writer with default options
    pub fn new() -> Self {
        WorkbookWriter::default()
    }

    pub fn with_options(options: WriteOptions) -> Self {
        WorkbookWriter { options }
    }

    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    /// Encode the workbook into a byte vector
    pub fn to_bytes(&self, workbook: &Workbook) -> Result<Vec<u8>> {
        biff::encode_workbook(workbook, &self.options)
    }

    /// Encode the workbook and write it to `sink`
    pub fn write<W: Write>(&self, workbook: &Workbook, sink: &mut W) -> Result<()> {
        let bytes = self.to_bytes(workbook)?;
        sink.write_all(&bytes)?;
        sink.flush()?;
        Ok(())
    }

    /// Encode the workbook and save it at `path`
    ///
    /// The file is only created once encoding has succeeded.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use biffbook::{Workbook, WorkbookWriter};
    ///
    /// let mut workbook = Workbook::new();
    /// workbook.create_sheet("Report").unwrap();
    /// WorkbookWriter::new().save(&workbook, "report.xls").unwrap();
    /// ```
    pub fn save<P: AsRef<Path>>(&self, workbook: &Workbook, path: P) -> Result<()> {
        let bytes = self.to_bytes(workbook)?;
        let mut file = BufWriter::new(File::create(path)?);
        file.write_all(&bytes)?;
        file.flush()?;
        Ok(())
    }
}

/// Builder for creating configured workbook writers
#[derive(Debug, Clone, Default)]
pub struct WorkbookWriterBuilder {
    options: WriteOptions,
}

impl WorkbookWriterBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        WorkbookWriterBuilder::default()
    }

    /// Set the code page written to the CODEPAGE record
    pub fn with_codepage(mut self, codepage: u16) -> Self {
        self.options.codepage = codepage;
        self
    }

    /// Set whether formulas are flagged for recalculation on load
    pub fn with_calc_on_load(mut self, enabled: bool) -> Self {
        self.options.calc_on_load = enabled;
        self
    }

    /// Encode sheet bodies in parallel
    ///
    /// Output is identical to the sequential path. Without the `parallel`
    /// feature this setting is ignored.
    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.options.parallel = enabled;
        self
    }

    /// Build the writer
    pub fn build(self) -> WorkbookWriter {
        WorkbookWriter::with_options(self.options)
    }
}

impl Workbook {
    /// Encode with default options into a byte vector
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        WorkbookWriter::new().to_bytes(self)
    }

    /// Encode with default options and write to `sink`
    pub fn write<W: Write>(&self, sink: &mut W) -> Result<()> {
        WorkbookWriter::new().write(self, sink)
    }

    /// Encode with default options and save at `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        WorkbookWriter::new().save(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biff::records::{RecordReader, CODEPAGE, DATE1904, FORMULA};
    use crate::date::DateSystem;
    use crate::error::BiffError;
    use chrono::NaiveDate;
    use tempfile::NamedTempFile;

    fn record_payload(bytes: &[u8], record_type: u16) -> Vec<u8> {
        RecordReader::new(bytes)
            .map(|r| r.unwrap())
            .find(|r| r.record_type == record_type)
            .map(|r| r.data.to_vec())
            .unwrap()
    }

    #[test]
    fn test_builder() {
        let writer = WorkbookWriterBuilder::new()
            .with_codepage(1252)
            .with_calc_on_load(false)
            .with_parallel(true)
            .build();
        assert_eq!(writer.options().codepage, 1252);
        assert!(!writer.options().calc_on_load);
        assert!(writer.options().parallel);

        let mut workbook = Workbook::new();
        workbook.create_sheet("Sheet1").unwrap();
        let bytes = writer.to_bytes(&workbook).unwrap();
        assert_eq!(record_payload(&bytes, CODEPAGE), 1252u16.to_le_bytes());
        assert_eq!(record_payload(&bytes, DATE1904), 0u16.to_le_bytes());
    }

    #[test]
    fn test_date_flag_follows_the_workbook() {
        let mut workbook = Workbook::new();
        workbook.set_date_system(DateSystem::Excel1904);
        let sheet = workbook.create_sheet("Dates").unwrap();
        let when = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        sheet.create_row(0).unwrap().create_cell(0).unwrap().set_date_value(when).unwrap();

        let bytes = WorkbookWriterBuilder::new().with_parallel(true).build().to_bytes(&workbook).unwrap();
        assert_eq!(record_payload(&bytes, DATE1904), 1u16.to_le_bytes());

        let copy = Workbook::from_bytes(&bytes).unwrap();
        assert_eq!(copy.date_system(), DateSystem::Excel1904);
        let cell = copy.sheet_at(0).unwrap().cell(0, 0).unwrap();
        assert_eq!(cell.date_value().unwrap(), when);
    }

    #[test]
    fn test_calc_on_load_flag() {
        let mut workbook = Workbook::new();
        let sheet = workbook.create_sheet("F").unwrap();
        sheet.create_row(0).unwrap().create_cell(0).unwrap().set_cell_formula("1+1");

        let on = WorkbookWriter::new().to_bytes(&workbook).unwrap();
        let off = WorkbookWriterBuilder::new()
            .with_calc_on_load(false)
            .build()
            .to_bytes(&workbook)
            .unwrap();
        assert_eq!(record_payload(&on, FORMULA)[14], 0x02);
        assert_eq!(record_payload(&off, FORMULA)[14], 0x00);
    }

    #[test]
    fn test_failed_write_leaves_sink_empty() {
        let mut workbook = Workbook::new();
        let sheet = workbook.create_sheet("Bad").unwrap();
        sheet.create_row(3).unwrap().create_cell(1).unwrap().set_cell_formula("NOSUCHFN(1)");

        let mut sink = Vec::new();
        let err = workbook.write(&mut sink).unwrap_err();
        assert!(matches!(err, BiffError::FormulaEncoding { ref cell, .. } if cell == "B4"));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_save_to_file() {
        let temp = NamedTempFile::new().unwrap();
        let mut workbook = Workbook::new();
        workbook.create_sheet("Sheet1").unwrap();
        workbook.save(temp.path()).unwrap();

        let written = std::fs::read(temp.path()).unwrap();
        assert_eq!(written, workbook.to_bytes().unwrap());
    }
}
