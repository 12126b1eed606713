//! Record identifiers and record-level framing
//!
//! Every record is a little-endian `u16` type, a `u16` payload length and
//! the payload itself. Payloads never exceed [`MAX_RECORD_DATA`] bytes;
//! longer shared-string tables spill into CONTINUE records.

use crate::error::{BiffError, Result};

pub const FORMULA: u16 = 0x0006;
pub const EOF: u16 = 0x000A;
pub const DATE1904: u16 = 0x0022;
pub const FONT: u16 = 0x0031;
pub const CONTINUE: u16 = 0x003C;
pub const WINDOW1: u16 = 0x003D;
pub const CODEPAGE: u16 = 0x0042;
pub const COLINFO: u16 = 0x007D;
pub const BOUNDSHEET: u16 = 0x0085;
pub const MULRK: u16 = 0x00BD;
pub const MULBLANK: u16 = 0x00BE;
pub const XF: u16 = 0x00E0;
pub const SST: u16 = 0x00FC;
pub const LABELSST: u16 = 0x00FD;
pub const DIMENSIONS: u16 = 0x0200;
pub const BLANK: u16 = 0x0201;
pub const NUMBER: u16 = 0x0203;
pub const LABEL: u16 = 0x0204;
pub const BOOLERR: u16 = 0x0205;
pub const STRING: u16 = 0x0207;
pub const ROW: u16 = 0x0208;
pub const WINDOW2: u16 = 0x023E;
pub const RK: u16 = 0x027E;
pub const STYLE: u16 = 0x0293;
pub const FORMAT: u16 = 0x041E;
pub const SHRFMLA: u16 = 0x04BC;
pub const BOF: u16 = 0x0809;

pub const BIFF8_VERSION: u16 = 0x0600;
pub const BOF_WORKBOOK_GLOBALS: u16 = 0x0005;
pub const BOF_WORKSHEET: u16 = 0x0010;

/// UTF-16 code page id written to CODEPAGE
pub const CODEPAGE_UTF16: u16 = 1200;

/// Largest payload a single record may carry
pub const MAX_RECORD_DATA: usize = 8224;
pub const HEADER_LEN: usize = 4;

/// Number of style XFs written before the first cell XF
pub const STYLE_XF_COUNT: u16 = 15;

/// A record borrowed from the input stream
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    /// Byte offset of the record header in the stream
    pub offset: usize,
    pub record_type: u16,
    pub data: &'a [u8],
}

impl<'a> Record<'a> {
    pub fn corrupt(&self, reason: impl Into<String>) -> BiffError {
        BiffError::corrupt(self.offset, self.record_type, reason)
    }

    /// Fail unless the payload is exactly `len` bytes
    pub fn expect_len(&self, len: usize) -> Result<()> {
        if self.data.len() != len {
            return Err(self.corrupt(format!(
                "payload is {} bytes, expected {}",
                self.data.len(),
                len
            )));
        }
        Ok(())
    }

    /// Fail unless the payload is at least `len` bytes
    pub fn expect_min_len(&self, len: usize) -> Result<()> {
        if self.data.len() < len {
            return Err(self.corrupt(format!(
                "payload is {} bytes, expected at least {}",
                self.data.len(),
                len
            )));
        }
        Ok(())
    }

    pub fn u8_at(&self, at: usize) -> Result<u8> {
        self.data
            .get(at)
            .copied()
            .ok_or_else(|| self.corrupt(format!("read past end at byte {at}")))
    }

    pub fn u16_at(&self, at: usize) -> Result<u16> {
        match self.data.get(at..at + 2) {
            Some(b) => Ok(u16::from_le_bytes([b[0], b[1]])),
            None => Err(self.corrupt(format!("read past end at byte {at}"))),
        }
    }

    pub fn u32_at(&self, at: usize) -> Result<u32> {
        match self.data.get(at..at + 4) {
            Some(b) => Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            None => Err(self.corrupt(format!("read past end at byte {at}"))),
        }
    }

    pub fn f64_at(&self, at: usize) -> Result<f64> {
        match self.data.get(at..at + 8) {
            Some(b) => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(b);
                Ok(f64::from_le_bytes(raw))
            }
            None => Err(self.corrupt(format!("read past end at byte {at}"))),
        }
    }
}

/// Iterator over records in an in-memory stream
pub struct RecordReader<'a> {
    stream: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    pub fn new(stream: &'a [u8]) -> Self {
        RecordReader { stream, pos: 0 }
    }

    /// Reader positioned at `offset`
    pub fn at(stream: &'a [u8], offset: usize) -> Self {
        RecordReader { stream, pos: offset }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Look at the next record without consuming it
    pub fn peek(&self) -> Option<Result<Record<'a>>> {
        RecordReader::at(self.stream, self.pos).next()
    }
}

impl<'a> Iterator for RecordReader<'a> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.stream.len() {
            return None;
        }
        let offset = self.pos;
        let header = match self.stream.get(offset..offset + HEADER_LEN) {
            Some(h) => h,
            None => {
                self.pos = self.stream.len();
                return Some(Err(BiffError::corrupt(offset, 0, "truncated record header")));
            }
        };
        let record_type = u16::from_le_bytes([header[0], header[1]]);
        let len = u16::from_le_bytes([header[2], header[3]]) as usize;
        let start = offset + HEADER_LEN;
        let data = match self.stream.get(start..start + len) {
            Some(d) => d,
            None => {
                self.pos = self.stream.len();
                return Some(Err(BiffError::corrupt(
                    offset,
                    record_type,
                    format!("payload of {len} bytes runs past end of stream"),
                )));
            }
        };
        self.pos = start + len;
        Some(Ok(Record {
            offset,
            record_type,
            data,
        }))
    }
}

/// Parsed BOF record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bof {
    pub version: u16,
    pub substream: u16,
}

impl Bof {
    pub fn parse(record: &Record<'_>) -> Result<Self> {
        if record.record_type != BOF {
            return Err(record.corrupt("expected BOF record"));
        }
        record.expect_min_len(4)?;
        Ok(Bof {
            version: record.u16_at(0)?,
            substream: record.u16_at(2)?,
        })
    }
}
