//! Unicode string layouts and the shared string table (SST)
//!
//! Strings are stored as a character count in UTF-16 code units, an option
//! byte, then the characters: one byte each when every code unit fits in
//! Latin-1 ("compressed"), otherwise UTF-16LE.

use super::record_writer::{PutLe, RecordWriter};
use super::records::{Record, CONTINUE, MAX_RECORD_DATA, SST};
use crate::error::{BiffError, Result};

const FLAG_HIGH_BYTE: u8 = 0x01;
const FLAG_EXT: u8 = 0x04;
const FLAG_RICH: u8 = 0x08;

fn units_of(s: &str) -> (Vec<u16>, bool) {
    let units: Vec<u16> = s.encode_utf16().collect();
    let compressed = units.iter().all(|&u| u <= 0xFF);
    (units, compressed)
}

fn push_units(buf: &mut Vec<u8>, units: &[u16], compressed: bool) {
    if compressed {
        buf.extend(units.iter().map(|&u| u as u8));
    } else {
        for &u in units {
            buf.put_u16(u);
        }
    }
}

/// String with an 8-bit character count
pub fn push_short_string(buf: &mut Vec<u8>, s: &str) -> std::result::Result<(), String> {
    let (units, compressed) = units_of(s);
    if units.len() > u8::MAX as usize {
        return Err(format!("string of {} characters exceeds 255", units.len()));
    }
    buf.put_u8(units.len() as u8);
    buf.put_u8(if compressed { 0 } else { FLAG_HIGH_BYTE });
    push_units(buf, &units, compressed);
    Ok(())
}

/// String with a 16-bit character count
pub fn push_string(buf: &mut Vec<u8>, s: &str) -> std::result::Result<(), String> {
    let (units, compressed) = units_of(s);
    if units.len() > u16::MAX as usize {
        return Err(format!("string of {} characters exceeds 65535", units.len()));
    }
    buf.put_u16(units.len() as u16);
    buf.put_u8(if compressed { 0 } else { FLAG_HIGH_BYTE });
    push_units(buf, &units, compressed);
    Ok(())
}

fn read_chars(data: &[u8], pos: &mut usize, count: usize, flags: u8) -> Option<String> {
    let width = if flags & FLAG_HIGH_BYTE != 0 { 2 } else { 1 };
    let bytes = data.get(*pos..*pos + count * width)?;
    *pos += count * width;
    if width == 1 {
        Some(bytes.iter().map(|&b| b as char).collect())
    } else {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16(&units).ok()
    }
}

pub fn read_short_string(data: &[u8], pos: &mut usize) -> Option<String> {
    let count = *data.get(*pos)? as usize;
    let flags = *data.get(*pos + 1)?;
    *pos += 2;
    read_chars(data, pos, count, flags)
}

pub fn read_string(data: &[u8], pos: &mut usize) -> Option<String> {
    let raw = data.get(*pos..*pos + 2)?;
    let count = u16::from_le_bytes([raw[0], raw[1]]) as usize;
    let flags = *data.get(*pos + 2)?;
    *pos += 3;
    read_chars(data, pos, count, flags)
}

/// Write the SST record and any CONTINUE records it needs.
///
/// A string header never straddles two records; when characters do, the
/// continuation record starts with a fresh option byte.
pub fn write_sst<'s>(
    writer: &mut RecordWriter,
    strings: impl ExactSizeIterator<Item = &'s str>,
    total_refs: u32,
) -> Result<()> {
    let mut record_type = SST;
    let mut payload: Vec<u8> = Vec::with_capacity(MAX_RECORD_DATA);
    payload.put_u32(total_refs);
    payload.put_u32(strings.len() as u32);

    for s in strings {
        let (units, compressed) = units_of(s);
        if units.len() > u16::MAX as usize {
            return Err(BiffError::InvalidFormat(format!(
                "shared string of {} characters exceeds 65535",
                units.len()
            )));
        }
        let unit_size = if compressed { 1 } else { 2 };
        let flag = if compressed { 0 } else { FLAG_HIGH_BYTE };

        let needed = 3 + if units.is_empty() { 0 } else { unit_size };
        if MAX_RECORD_DATA - payload.len() < needed {
            writer.write_record(record_type, &payload)?;
            payload.clear();
            record_type = CONTINUE;
        }
        payload.put_u16(units.len() as u16);
        payload.put_u8(flag);

        let mut done = 0;
        while done < units.len() {
            let space = (MAX_RECORD_DATA - payload.len()) / unit_size;
            if space == 0 {
                writer.write_record(record_type, &payload)?;
                payload.clear();
                record_type = CONTINUE;
                payload.put_u8(flag);
                continue;
            }
            let take = space.min(units.len() - done);
            push_units(&mut payload, &units[done..done + take], compressed);
            done += take;
        }
    }

    writer.write_record(record_type, &payload)
}

/// Reads across an SST record and its CONTINUE records
struct SegmentCursor<'a> {
    segments: &'a [Record<'a>],
    seg: usize,
    pos: usize,
}

impl<'a> SegmentCursor<'a> {
    fn current(&mut self) -> Option<&'a [u8]> {
        while self.seg < self.segments.len() && self.pos >= self.segments[self.seg].data.len() {
            self.seg += 1;
            self.pos = 0;
        }
        self.segments.get(self.seg).map(|r| r.data)
    }

    fn byte(&mut self) -> Option<u8> {
        let data = self.current()?;
        let b = data[self.pos];
        self.pos += 1;
        Some(b)
    }

    fn u16(&mut self) -> Option<u16> {
        Some(u16::from_le_bytes([self.byte()?, self.byte()?]))
    }

    fn u32(&mut self) -> Option<u32> {
        Some(u32::from_le_bytes([
            self.byte()?,
            self.byte()?,
            self.byte()?,
            self.byte()?,
        ]))
    }

    fn skip(&mut self, mut n: usize) -> Option<()> {
        while n > 0 {
            let data = self.current()?;
            let step = n.min(data.len() - self.pos);
            self.pos += step;
            n -= step;
        }
        Some(())
    }

    fn chars(&mut self, count: usize, flags: u8) -> Option<String> {
        let mut high = flags & FLAG_HIGH_BYTE != 0;
        let mut units = Vec::with_capacity(count);
        while units.len() < count {
            let data = self.segments.get(self.seg)?.data;
            if self.pos >= data.len() {
                // characters continue in the next record behind a new option byte
                self.seg += 1;
                let next = self.segments.get(self.seg)?.data;
                high = *next.first()? & FLAG_HIGH_BYTE != 0;
                self.pos = 1;
                continue;
            }
            if high {
                let pair = data.get(self.pos..self.pos + 2)?;
                units.push(u16::from_le_bytes([pair[0], pair[1]]));
                self.pos += 2;
            } else {
                units.push(data[self.pos] as u16);
                self.pos += 1;
            }
        }
        String::from_utf16(&units).ok()
    }
}

/// Decode an SST record and its CONTINUE records into the string list
pub fn read_sst(segments: &[Record<'_>]) -> Result<Vec<String>> {
    let first = match segments.first() {
        Some(r) => *r,
        None => return Ok(Vec::new()),
    };
    let mut cur = SegmentCursor {
        segments,
        seg: 0,
        pos: 0,
    };
    let _total = cur.u32().ok_or_else(|| first.corrupt("truncated SST header"))?;
    let unique = cur.u32().ok_or_else(|| first.corrupt("truncated SST header"))? as usize;

    let mut strings = Vec::with_capacity(unique.min(1 << 16));
    for i in 0..unique {
        let truncated = || first.corrupt(format!("shared string {i} of {unique} is truncated"));
        let count = cur.u16().ok_or_else(truncated)? as usize;
        let flags = cur.byte().ok_or_else(truncated)?;
        let runs = if flags & FLAG_RICH != 0 {
            cur.u16().ok_or_else(truncated)? as usize
        } else {
            0
        };
        let ext = if flags & FLAG_EXT != 0 {
            cur.u32().ok_or_else(truncated)? as usize
        } else {
            0
        };
        let text = if count == 0 {
            String::new()
        } else {
            cur.chars(count, flags).ok_or_else(truncated)?
        };
        cur.skip(runs * 4 + ext).ok_or_else(truncated)?;
        strings.push(text);
    }
    Ok(strings)
}
