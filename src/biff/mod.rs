//! BIFF8 record codec
//!
//! A workbook stream is the globals substream followed by one substream per
//! sheet. The globals carry the font, format and XF tables, the shared
//! string table and a directory of absolute sheet offsets.
//!
//! Writing runs in two passes: sheet bodies are encoded first so their sizes
//! are known, then the globals are written with placeholder offsets that are
//! patched before the parts are joined.

pub mod globals;
pub mod record_writer;
pub mod records;
pub mod strings;
pub mod worksheet;
pub mod xf;

use globals::{decode_globals, GlobalsEncoder, SHEET_TYPE_WORKSHEET};
use records::{Bof, RecordReader, BOF_WORKSHEET, EOF};
use worksheet::{SheetBody, SheetDecoder, SheetEncoder};

use crate::error::{BiffError, Result};
use crate::model::{CellValue, Workbook};
use crate::reader::{Recovery, SkippedRecord};
use crate::writer::WriteOptions;

/// Encode `workbook` into a complete stream
pub fn encode_workbook(workbook: &Workbook, options: &WriteOptions) -> Result<Vec<u8>> {
    // the SST is the workbook pool itself, so cell indices carry over as is
    let strings = workbook.strings();
    let total_refs = workbook
        .sheets()
        .flat_map(|sheet| sheet.rows())
        .flat_map(|row| row.cells())
        .filter(|cell| matches!(cell.value(), CellValue::Text(_)))
        .count();
    let total_refs = u32::try_from(total_refs)
        .map_err(|_| BiffError::InvalidFormat(format!("{total_refs} string cells exceed the SST limit")))?;

    let encoder = SheetEncoder {
        strings,
        style_count: workbook.number_of_styles(),
        calc_on_load: options.calc_on_load,
    };
    let active = workbook.active_sheet_index();
    let bodies = encode_bodies(workbook, &encoder, active, options.parallel)?;

    let globals = GlobalsEncoder {
        strings,
        total_refs,
        codepage: options.codepage,
        date_system: workbook.date_system(),
    };
    let (mut writer, slots) = globals.encode(workbook)?;

    let mut offset = writer.position();
    for (slot, body) in slots.iter().zip(&bodies) {
        let at = u32::try_from(offset)
            .map_err(|_| BiffError::InvalidFormat(format!("sheet offset {offset} exceeds 4 GiB")))?;
        writer.patch_u32(*slot, at)?;
        offset += body.len();
    }
    for body in &bodies {
        writer.write_raw(body);
    }

    let bytes = writer.into_inner();
    log::debug!(
        "encoded {} sheets, {} shared strings, {} bytes",
        bodies.len(),
        strings.count(),
        bytes.len()
    );
    Ok(bytes)
}

#[cfg(feature = "parallel")]
fn encode_bodies(
    workbook: &Workbook,
    encoder: &SheetEncoder<'_>,
    active: usize,
    parallel: bool,
) -> Result<Vec<Vec<u8>>> {
    use rayon::prelude::*;

    let sheets: Vec<_> = workbook.sheets().collect();
    if parallel {
        return sheets
            .par_iter()
            .enumerate()
            .map(|(i, sheet)| encoder.encode(sheet, i == active))
            .collect();
    }
    sheets
        .iter()
        .enumerate()
        .map(|(i, sheet)| encoder.encode(sheet, i == active))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn encode_bodies(
    workbook: &Workbook,
    encoder: &SheetEncoder<'_>,
    active: usize,
    _parallel: bool,
) -> Result<Vec<Vec<u8>>> {
    workbook
        .sheets()
        .enumerate()
        .map(|(i, sheet)| encoder.encode(sheet, i == active))
        .collect()
}

/// Decode a complete stream into a new workbook
pub fn decode_workbook(stream: &[u8], recovery: Recovery) -> Result<(Workbook, Vec<SkippedRecord>)> {
    let globals = decode_globals(stream)?;
    let mut workbook = globals.workbook;
    let decoder = SheetDecoder {
        sst: &globals.strings,
        xf_styles: &globals.xf_styles,
    };
    let mut skipped = Vec::new();

    for bound in &globals.sheets {
        if bound.sheet_type != SHEET_TYPE_WORKSHEET {
            log::debug!("skipping non-worksheet sheet '{}' (type {})", bound.name, bound.sheet_type);
            continue;
        }
        let index = workbook.number_of_sheets();
        workbook
            .create_sheet(&bound.name)
            .map_err(|e| BiffError::corrupt(bound.record_offset, records::BOUNDSHEET, e.to_string()))?;
        let (sheet, strings) = match workbook.sheet_and_strings_mut(index) {
            Some(parts) => parts,
            None => return Err(BiffError::SheetNotFound(bound.name.clone())),
        };
        sheet.set_visibility(bound.visibility);

        let mut body = SheetBody::new(sheet, strings);
        if let Err(err) = decode_body(stream, bound, &decoder, &mut body) {
            match (recovery, err) {
                (Recovery::Lenient, BiffError::CorruptRecord { offset, record_type, reason }) => {
                    log::warn!(
                        "sheet '{}': dropping rest of body after corrupt record 0x{record_type:04X} at offset {offset}: {reason}",
                        bound.name
                    );
                    skipped.push(SkippedRecord {
                        sheet: bound.name.clone(),
                        offset,
                        record_type,
                        reason,
                    });
                }
                (_, err) => return Err(err),
            }
        }
    }

    if workbook.number_of_sheets() > 0 {
        let active = globals.active_tab.min(workbook.number_of_sheets() - 1);
        workbook.set_active_sheet(active)?;
    }
    Ok((workbook, skipped))
}

fn decode_body(
    stream: &[u8],
    bound: &globals::BoundSheet,
    decoder: &SheetDecoder<'_>,
    body: &mut SheetBody<'_>,
) -> Result<()> {
    if bound.body_offset >= stream.len() {
        return Err(BiffError::corrupt(
            bound.record_offset,
            records::BOUNDSHEET,
            format!("sheet offset {} is outside the stream ({} bytes)", bound.body_offset, stream.len()),
        ));
    }
    let mut reader = RecordReader::at(stream, bound.body_offset);
    let bof = match reader.next() {
        Some(record) => record?,
        None => return Err(BiffError::corrupt(bound.body_offset, records::BOF, "missing sheet BOF")),
    };
    let parsed = Bof::parse(&bof)?;
    if parsed.substream != BOF_WORKSHEET {
        return Err(bof.corrupt(format!("substream 0x{:04X} is not a worksheet", parsed.substream)));
    }

    for record in reader.by_ref() {
        if !decoder.apply(body, &record?)? {
            return Ok(());
        }
    }
    Err(BiffError::corrupt(reader.position(), EOF, "sheet body ends without EOF"))
}
