//! Workbook globals substream
//!
//! Encoding leaves every BOUNDSHEET stream offset as a placeholder; the
//! caller patches them once the sheet bodies have been sized.

use std::collections::HashMap;

use super::record_writer::{PutLe, RecordWriter};
use super::records::*;
use super::strings::{push_short_string, read_short_string, read_sst, write_sst};
use super::worksheet::write_bof;
use super::xf::{
    cell_xf_payload, font_payload, format_payload, parse_font, parse_format, parse_xf,
    style_xf_payload,
};
use crate::date::DateSystem;
use crate::error::{BiffError, Result};
use crate::model::Workbook;
use crate::tables::{Font, FontIndex, FormatIndex, SharedStrings, StringIndex, StyleIndex};
use crate::types::SheetVisibility;

/// Sheet type byte of a BOUNDSHEET for plain worksheets
pub const SHEET_TYPE_WORKSHEET: u8 = 0x00;
const STYLE_BUILTIN: u16 = 0x8000;

/// Settings that only affect the globals substream
pub struct GlobalsEncoder<'a> {
    pub strings: &'a SharedStrings,
    /// Number of LABELSST records across all sheet bodies
    pub total_refs: u32,
    pub codepage: u16,
    pub date_system: DateSystem,
}

impl<'a> GlobalsEncoder<'a> {
    /// Encode the globals; returns the writer and the position of each
    /// sheet's offset slot
    pub fn encode(&self, workbook: &Workbook) -> Result<(RecordWriter, Vec<usize>)> {
        let mut w = RecordWriter::new();
        write_bof(&mut w, BOF_WORKBOOK_GLOBALS)?;
        w.record_with(CODEPAGE, |p| {
            p.put_u16(self.codepage);
            Ok(())
        })?;
        w.record_with(DATE1904, |p| {
            p.put_u16(self.date_system.is_1904() as u16);
            Ok(())
        })?;

        let active = workbook.active_sheet_index() as u16;
        w.record_with(WINDOW1, |p| {
            p.put_u16(0x0168);
            p.put_u16(0x010E);
            p.put_u16(0x3A5C);
            p.put_u16(0x23BE);
            p.put_u16(0x0038);
            p.put_u16(active);
            p.put_u16(0);
            p.put_u16(1);
            p.put_u16(0x0258);
            Ok(())
        })?;

        for font in workbook.fonts().iter() {
            w.record_with(FONT, |p| font_payload(p, font))?;
        }
        for (code, pattern) in workbook.formats().custom_formats() {
            w.record_with(FORMAT, |p| format_payload(p, code, pattern))?;
        }

        for _ in 0..STYLE_XF_COUNT {
            w.record_with(XF, |p| {
                style_xf_payload(p);
                Ok(())
            })?;
        }
        for (i, style) in workbook.styles().iter().enumerate() {
            if workbook.font_at(style.font).is_none() {
                return Err(BiffError::UnknownFont(style.font.0));
            }
            if !workbook.formats().contains(style.format) {
                return Err(BiffError::UnknownFormat(format!(
                    "code {} used by style {i}",
                    style.format.0
                )));
            }
            w.record_with(XF, |p| cell_xf_payload(p, style))?;
        }

        // "Normal" built-in style on the first style XF
        w.record_with(STYLE, |p| {
            p.put_u16(STYLE_BUILTIN);
            p.put_u8(0);
            p.put_u8(0xFF);
            Ok(())
        })?;

        let mut slots = Vec::with_capacity(workbook.number_of_sheets());
        for sheet in workbook.sheets() {
            // offset slot sits right after the 4-byte header
            slots.push(w.position() + HEADER_LEN);
            w.record_with(BOUNDSHEET, |p| {
                p.put_u32(0);
                p.put_u8(sheet.visibility().code());
                p.put_u8(SHEET_TYPE_WORKSHEET);
                push_short_string(p, sheet.name()).map_err(|e| BiffError::InvalidFormat(format!("sheet name: {e}")))
            })?;
        }

        write_sst(&mut w, self.strings.iter(), self.total_refs)?;
        w.write_record(EOF, &[])?;
        Ok((w, slots))
    }
}

/// A BOUNDSHEET entry
#[derive(Debug, Clone)]
pub struct BoundSheet {
    /// Offset of the BOUNDSHEET record itself
    pub record_offset: usize,
    pub body_offset: usize,
    pub visibility: SheetVisibility,
    pub sheet_type: u8,
    pub name: String,
}

/// Everything the sheet bodies need from the globals
pub struct Globals {
    pub workbook: Workbook,
    /// Pool index of each SST entry
    pub strings: Vec<StringIndex>,
    pub xf_styles: Vec<StyleIndex>,
    pub sheets: Vec<BoundSheet>,
    pub active_tab: usize,
}

/// Check the leading BOF of a workbook stream
fn expect_workbook_bof(reader: &mut RecordReader<'_>) -> Result<()> {
    let record = match reader.next() {
        Some(Ok(record)) => record,
        Some(Err(_)) | None => {
            return Err(BiffError::InvalidFormat("stream does not start with a BOF record".to_string()))
        }
    };
    let bof = Bof::parse(&record)
        .map_err(|_| BiffError::InvalidFormat("stream does not start with a BOF record".to_string()))?;
    if bof.version != BIFF8_VERSION {
        return Err(BiffError::InvalidFormat(format!("unsupported BIFF version 0x{:04X}", bof.version)));
    }
    if bof.substream != BOF_WORKBOOK_GLOBALS {
        return Err(BiffError::InvalidFormat(format!(
            "first substream is 0x{:04X}, not workbook globals",
            bof.substream
        )));
    }
    Ok(())
}

fn parse_boundsheet(record: &Record<'_>) -> Result<BoundSheet> {
    record.expect_min_len(8)?;
    let state = record.u8_at(4)? & 0x03;
    let visibility = SheetVisibility::from_code(state)
        .ok_or_else(|| record.corrupt(format!("unknown sheet state {state}")))?;
    let mut pos = 6;
    let name = read_short_string(record.data, &mut pos).ok_or_else(|| record.corrupt("truncated sheet name"))?;
    Ok(BoundSheet {
        record_offset: record.offset,
        body_offset: record.u32_at(0)? as usize,
        visibility,
        sheet_type: record.u8_at(5)?,
        name,
    })
}

/// Parse the globals substream and rebuild the workbook tables
pub fn decode_globals(stream: &[u8]) -> Result<Globals> {
    let mut reader = RecordReader::new(stream);
    expect_workbook_bof(&mut reader)?;

    let mut date_system = DateSystem::Excel1900;
    let mut active_tab = 0usize;
    let mut fonts: Vec<Font> = Vec::new();
    let mut formats: Vec<(usize, u16, String)> = Vec::new();
    let mut xf_records: Vec<Record<'_>> = Vec::new();
    let mut sst: Vec<Record<'_>> = Vec::new();
    let mut sheets = Vec::new();
    let mut saw_eof = false;

    while let Some(record) = reader.next() {
        let record = record?;
        match record.record_type {
            EOF => {
                saw_eof = true;
                break;
            }
            DATE1904 => {
                record.expect_len(2)?;
                date_system = if record.u16_at(0)? == 1 {
                    DateSystem::Excel1904
                } else {
                    DateSystem::Excel1900
                };
            }
            WINDOW1 => {
                record.expect_len(18)?;
                active_tab = record.u16_at(10)? as usize;
            }
            FONT => fonts.push(parse_font(&record)?),
            FORMAT => {
                let (code, pattern) = parse_format(&record)?;
                formats.push((record.offset, code, pattern));
            }
            XF => xf_records.push(record),
            BOUNDSHEET => sheets.push(parse_boundsheet(&record)?),
            SST => {
                sst.push(record);
                while let Some(Ok(next)) = reader.peek() {
                    if next.record_type != CONTINUE {
                        break;
                    }
                    sst.push(next);
                    reader.next();
                }
            }
            BOF | CODEPAGE | STYLE | CONTINUE => {}
            other => log::debug!("skipping globals record 0x{other:04X} at offset {}", record.offset),
        }
    }
    if !saw_eof {
        return Err(BiffError::corrupt(reader.position(), EOF, "workbook globals end without EOF"));
    }

    let mut workbook = Workbook::for_decoding(date_system);

    if fonts.is_empty() {
        fonts.push(Font::default());
    }
    let font_map = fonts
        .into_iter()
        .map(|f| workbook.fonts_mut().intern(f))
        .collect::<Result<Vec<FontIndex>>>()?;

    let mut format_map: HashMap<u16, FormatIndex> = HashMap::new();
    for (offset, code, pattern) in &formats {
        let mapped = workbook
            .formats_mut()
            .insert_with_code(*code, pattern)
            .map_err(|e| BiffError::corrupt(*offset, FORMAT, e.to_string()))?;
        format_map.insert(*code, mapped);
    }

    let mut xf_styles = Vec::with_capacity(xf_records.len());
    for record in &xf_records {
        let mut parsed = parse_xf(record, font_map.len())?;
        if parsed.is_style {
            xf_styles.push(StyleIndex(0));
            continue;
        }
        parsed.style.font = font_map[parsed.style.font.index()];
        let code = parsed.style.format.0;
        parsed.style.format = match format_map.get(&code) {
            Some(&mapped) => mapped,
            None if workbook.formats().contains(FormatIndex(code)) => FormatIndex(code),
            None => return Err(record.corrupt(format!("number format {code} is not defined"))),
        };
        xf_styles.push(workbook.styles_mut().intern(parsed.style)?);
    }
    if workbook.number_of_styles() == 0 {
        workbook.styles_mut().intern(Default::default())?;
    }

    // SST position -> pool index; repeated entries share one pool slot
    let strings: Vec<StringIndex> = read_sst(&sst)?
        .iter()
        .map(|s| workbook.strings_mut().intern(s))
        .collect();

    log::debug!(
        "globals: {} fonts, {} XFs, {} strings, {} sheets",
        workbook.number_of_fonts(),
        xf_styles.len(),
        strings.len(),
        sheets.len()
    );

    Ok(Globals {
        workbook,
        strings,
        xf_styles,
        sheets,
        active_tab,
    })
}
