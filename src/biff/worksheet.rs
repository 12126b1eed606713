//! Worksheet substream: BOF, dimensions, column info, rows and their
//! cells, window settings, EOF

use std::collections::HashMap;

use super::record_writer::{PutLe, RecordWriter};
use super::records::*;
use super::strings::{push_string, read_string};
use super::xf::cell_xf_index;
use crate::error::{BiffError, Result};
use crate::formula::{ptg, CachedValue, Formula};
use crate::model::{Cell, CellValue, ColumnInfo, Row, Sheet};
use crate::tables::{SharedStrings, StringIndex, StyleIndex};
use crate::types::{ErrorCode, MAX_COLUMN};

const ROW_DEFAULT_HEIGHT: u16 = 0x00FF;
const ROW_FLAG_HIDDEN: u16 = 0x0020;
const ROW_FLAG_CUSTOM_HEIGHT: u16 = 0x0040;
const ROW_FLAG_BASE: u16 = 0x0100;

const WINDOW2_BASE: u16 = 0x00B6;
const WINDOW2_SELECTED: u16 = 0x0200;
const WINDOW2_PAGED: u16 = 0x0400;

const FORMULA_CALC_ON_LOAD: u16 = 0x0002;
const COLINFO_HIDDEN: u16 = 0x0001;

/// Shared state needed to encode any sheet body
pub struct SheetEncoder<'a> {
    /// Workbook string pool, written as the SST in pool order
    pub strings: &'a SharedStrings,
    pub style_count: usize,
    pub calc_on_load: bool,
}

/// The 8 cached-result bytes of a FORMULA record; 0.0 when nothing is cached
fn put_cached(p: &mut Vec<u8>, cached: Option<&CachedValue>) {
    let special = |kind: u8, data: u8| [kind, 0, data, 0, 0, 0, 0xFF, 0xFF];
    let bytes = match cached {
        None => 0f64.to_le_bytes(),
        Some(CachedValue::Number(n)) => n.to_le_bytes(),
        Some(CachedValue::Text(_)) => special(0, 0),
        Some(CachedValue::Boolean(b)) => special(1, *b as u8),
        Some(CachedValue::Error(e)) => special(2, e.code()),
        Some(CachedValue::Empty) => special(3, 0),
    };
    p.extend_from_slice(&bytes);
}

pub(crate) fn write_bof(writer: &mut RecordWriter, substream: u16) -> Result<()> {
    writer.record_with(BOF, |p| {
        p.put_u16(BIFF8_VERSION);
        p.put_u16(substream);
        p.put_u16(0x0DBB);
        p.put_u16(0x07CC);
        p.put_u32(0);
        p.put_u32(0x0006);
        Ok(())
    })
}

impl<'a> SheetEncoder<'a> {
    /// Encode one sheet into a standalone record stream
    pub fn encode(&self, sheet: &Sheet, active: bool) -> Result<Vec<u8>> {
        let mut w = RecordWriter::new();
        write_bof(&mut w, BOF_WORKSHEET)?;

        let first_row = sheet.first_row_num();
        let last_row = sheet.last_row_num();
        let first_col = sheet.rows().filter_map(Row::first_cell_num).min();
        let last_col = sheet.rows().filter_map(Row::last_cell_num).max();
        w.record_with(DIMENSIONS, |p| {
            p.put_u32(first_row.unwrap_or(0));
            p.put_u32(last_row.map_or(0, |r| r + 1));
            p.put_u16(first_col.unwrap_or(0));
            p.put_u16(last_col.map_or(0, |c| c + 1));
            p.put_u16(0);
            Ok(())
        })?;

        for (col, info) in sheet.column_infos() {
            w.record_with(COLINFO, |p| {
                p.put_u16(col);
                p.put_u16(col);
                p.put_u16(info.width);
                p.put_u16(STYLE_XF_COUNT);
                p.put_u16(if info.hidden { COLINFO_HIDDEN } else { 0 });
                p.put_u16(0);
                Ok(())
            })?;
        }

        for row in sheet.rows() {
            self.encode_row(&mut w, row)?;
        }

        let mut flags = WINDOW2_BASE;
        if active {
            flags |= WINDOW2_SELECTED | WINDOW2_PAGED;
        }
        w.record_with(WINDOW2, |p| {
            p.put_u16(flags);
            p.put_u16(0);
            p.put_u16(0);
            p.put_u16(0x0040);
            p.put_u16(0);
            p.put_u16(0);
            p.put_u16(0);
            p.put_u32(0);
            Ok(())
        })?;

        w.write_record(EOF, &[])?;
        Ok(w.into_inner())
    }

    fn encode_row(&self, w: &mut RecordWriter, row: &Row) -> Result<()> {
        let rw = row.index() as u16;
        let mut flags = ROW_FLAG_BASE;
        if row.height().is_some() {
            flags |= ROW_FLAG_CUSTOM_HEIGHT;
        }
        if row.is_hidden() {
            flags |= ROW_FLAG_HIDDEN;
        }
        w.record_with(ROW, |p| {
            p.put_u16(rw);
            p.put_u16(row.first_cell_num().unwrap_or(0));
            p.put_u16(row.last_cell_num().map_or(0, |c| c + 1));
            p.put_u16(row.height().unwrap_or(ROW_DEFAULT_HEIGHT));
            p.put_u16(0);
            p.put_u16(0);
            p.put_u16(flags);
            p.put_u16(STYLE_XF_COUNT);
            Ok(())
        })?;

        for cell in row.cells() {
            self.encode_cell(w, rw, cell)?;
        }
        Ok(())
    }

    fn encode_cell(&self, w: &mut RecordWriter, rw: u16, cell: &Cell) -> Result<()> {
        let style = cell.style();
        if style.index() >= self.style_count {
            return Err(BiffError::UnknownStyle(style.0));
        }
        let xf = cell_xf_index(style)?;
        let col = cell.column_index();
        let head = |p: &mut Vec<u8>| {
            p.put_u16(rw);
            p.put_u16(col);
            p.put_u16(xf);
        };

        match cell.value() {
            CellValue::Blank => w.record_with(BLANK, |p| {
                head(p);
                Ok(())
            }),
            CellValue::Numeric(n) => w.record_with(NUMBER, |p| {
                head(p);
                p.put_f64(*n);
                Ok(())
            }),
            CellValue::Text(index) => {
                if self.strings.get(*index).is_none() {
                    return Err(BiffError::index(
                        "shared string",
                        index.index(),
                        self.strings.count().saturating_sub(1),
                    ));
                }
                w.record_with(LABELSST, |p| {
                    head(p);
                    p.put_u32(index.0);
                    Ok(())
                })
            }
            CellValue::Boolean(b) => w.record_with(BOOLERR, |p| {
                head(p);
                p.put_u8(*b as u8);
                p.put_u8(0);
                Ok(())
            }),
            CellValue::Error(e) => w.record_with(BOOLERR, |p| {
                head(p);
                p.put_u8(e.code());
                p.put_u8(1);
                Ok(())
            }),
            CellValue::Formula(formula) => {
                let rgce = formula.encode().map_err(|reason| BiffError::FormulaEncoding {
                    cell: cell.reference(),
                    reason,
                })?;
                let grbit = if self.calc_on_load { FORMULA_CALC_ON_LOAD } else { 0 };
                let cached = formula.cached_value();
                w.record_with(FORMULA, |p| {
                    head(p);
                    put_cached(p, cached);
                    p.put_u16(grbit);
                    p.put_u32(0);
                    p.put_u16(rgce.len() as u16);
                    p.extend_from_slice(&rgce);
                    p.extend_from_slice(formula.trailing_data());
                    Ok(())
                })?;
                if let Some(CachedValue::Text(text)) = cached {
                    w.record_with(STRING, |p| {
                        push_string(p, text).map_err(|e| BiffError::FormulaEncoding {
                            cell: cell.reference(),
                            reason: format!("cached result: {e}"),
                        })
                    })?;
                }
                Ok(())
            }
        }
    }
}

/// Tables a sheet body refers to while it is decoded
pub struct SheetDecoder<'a> {
    /// SST position → string pool index
    pub sst: &'a [StringIndex],
    /// XF index → style
    pub xf_styles: &'a [StyleIndex],
}

/// A SHRFMLA body and the range it covers
struct SharedFormula {
    first_row: u16,
    last_row: u16,
    first_col: u16,
    last_col: u16,
    rgce: Vec<u8>,
}

/// Where one sheet body is replayed to, plus the state carried from record
/// to record
pub struct SheetBody<'w> {
    pub sheet: &'w mut Sheet,
    pub strings: &'w mut SharedStrings,
    /// Shared formulas by their top-left cell
    shared: HashMap<(u16, u16), SharedFormula>,
    /// Cells read before the shared formula they point at
    pending: HashMap<(u16, u16), Vec<(u16, u16)>>,
    /// Formula cell whose text result arrives in the next STRING record
    awaiting_string: Option<(u16, u16)>,
}

impl<'w> SheetBody<'w> {
    pub fn new(sheet: &'w mut Sheet, strings: &'w mut SharedStrings) -> Self {
        SheetBody {
            sheet,
            strings,
            shared: HashMap::new(),
            pending: HashMap::new(),
            awaiting_string: None,
        }
    }

    fn formula_mut(&mut self, rw: u16, col: u16) -> Option<&mut Formula> {
        self.sheet.cell_mut(rw as u32, col)?.formula_mut()
    }
}

fn rk_value(rk: u32) -> f64 {
    let value = if rk & 0x02 != 0 {
        ((rk as i32) >> 2) as f64
    } else {
        f64::from_bits(((rk & 0xFFFF_FFFC) as u64) << 32)
    };
    if rk & 0x01 != 0 {
        value / 100.0
    } else {
        value
    }
}

/// Cached result in the 8 bytes at `at`. A text result is a placeholder
/// until the STRING record that follows.
fn cached_value(record: &Record<'_>, at: usize) -> Result<CachedValue> {
    if record.u16_at(at + 6)? != 0xFFFF {
        return Ok(CachedValue::Number(record.f64_at(at)?));
    }
    let data = record.u8_at(at + 2)?;
    Ok(match record.u8_at(at)? {
        0 => CachedValue::Text(String::new()),
        1 => CachedValue::Boolean(data != 0),
        2 => CachedValue::Error(
            ErrorCode::from_code(data)
                .ok_or_else(|| record.corrupt(format!("unknown cached error code 0x{data:02X}")))?,
        ),
        3 => CachedValue::Empty,
        other => return Err(record.corrupt(format!("unknown cached result type {other}"))),
    })
}

/// Trailing last-column field of MULRK and MULBLANK
fn check_last_column(record: &Record<'_>, first: u16, count: usize) -> Result<()> {
    let last = record.u16_at(record.data.len() - 2)?;
    if first as usize + count - 1 != last as usize {
        return Err(record.corrupt(format!(
            "last column {last} does not match {count} cells from column {first}"
        )));
    }
    Ok(())
}

/// Shared formula body rewritten for one cell; `None` when the body holds
/// tokens that are not modelled
fn expand_shared(record: &Record<'_>, shared: &SharedFormula, rw: u16, col: u16) -> Result<Option<Formula>> {
    let rows = shared.first_row..=shared.last_row;
    let cols = shared.first_col..=shared.last_col;
    if !rows.contains(&rw) || !cols.contains(&col) {
        return Err(record.corrupt(format!(
            "cell {} lies outside its shared formula range",
            crate::types::cell_reference(rw as u32, col)
        )));
    }
    Formula::from_shared(&shared.rgce, (rw as u32, col)).map_err(|reason| record.corrupt(reason))
}

impl<'a> SheetDecoder<'a> {
    fn style(&self, record: &Record<'_>, xf: u16) -> Result<StyleIndex> {
        self.xf_styles
            .get(xf as usize)
            .copied()
            .ok_or_else(|| record.corrupt(format!("XF index {xf} out of range ({} XFs)", self.xf_styles.len())))
    }

    fn cell<'s>(&self, sheet: &'s mut Sheet, record: &Record<'_>, rw: u16, col: u16) -> Result<&'s mut Cell> {
        if col > MAX_COLUMN {
            return Err(record.corrupt(format!("column {col} out of range")));
        }
        sheet.row_or_create(rw as u32)?.create_cell(col)
    }

    fn place(&self, sheet: &mut Sheet, record: &Record<'_>, at: usize, value: CellValue) -> Result<()> {
        let rw = record.u16_at(at)?;
        let col = record.u16_at(at + 2)?;
        let style = self.style(record, record.u16_at(at + 4)?)?;
        let cell = self.cell(sheet, record, rw, col)?;
        cell.set_value(value);
        cell.set_style(style);
        Ok(())
    }

    fn formula(&self, body: &mut SheetBody<'_>, record: &Record<'_>) -> Result<()> {
        record.expect_min_len(22)?;
        let rw = record.u16_at(0)?;
        let col = record.u16_at(2)?;
        let cce = record.u16_at(20)? as usize;
        let rgce = record
            .data
            .get(22..22 + cce)
            .ok_or_else(|| record.corrupt(format!("formula of {cce} bytes runs past record")))?;
        let trailing = &record.data[22 + cce..];
        let cached = cached_value(record, 6)?;

        let mut formula = match ptg::range_anchor(rgce) {
            Some(anchor) => {
                let expanded = match body.shared.get(&anchor) {
                    Some(shared) => expand_shared(record, shared, rw, col)?,
                    None => {
                        body.pending.entry(anchor).or_default().push((rw, col));
                        None
                    }
                };
                expanded.unwrap_or_else(|| Formula::opaque(rgce, trailing))
            }
            None => Formula::from_rgce(rgce, trailing).map_err(|reason| record.corrupt(reason))?,
        };
        body.awaiting_string = matches!(cached, CachedValue::Text(_)).then_some((rw, col));
        formula.set_cached_value(Some(cached));
        self.place(body.sheet, record, 0, CellValue::Formula(formula))
    }

    fn shared_formula(&self, body: &mut SheetBody<'_>, record: &Record<'_>) -> Result<()> {
        record.expect_min_len(10)?;
        let cce = record.u16_at(8)? as usize;
        let rgce = record
            .data
            .get(10..10 + cce)
            .ok_or_else(|| record.corrupt(format!("shared formula of {cce} bytes runs past record")))?;
        let shared = SharedFormula {
            first_row: record.u16_at(0)?,
            last_row: record.u16_at(2)?,
            first_col: record.u8_at(4)? as u16,
            last_col: record.u8_at(5)? as u16,
            rgce: rgce.to_vec(),
        };
        let anchor = (shared.first_row, shared.first_col);

        for (rw, col) in body.pending.remove(&anchor).unwrap_or_default() {
            let Some(mut expanded) = expand_shared(record, &shared, rw, col)? else {
                continue;
            };
            if let Some(formula) = body.formula_mut(rw, col) {
                expanded.set_cached_value(formula.cached_value().cloned());
                *formula = expanded;
            }
        }
        body.shared.insert(anchor, shared);
        Ok(())
    }

    /// Replay one record into the sheet; returns false at the sheet's EOF
    pub fn apply(&self, body: &mut SheetBody<'_>, record: &Record<'_>) -> Result<bool> {
        match record.record_type {
            EOF => {
                let unresolved: usize = body.pending.values().map(Vec::len).sum();
                if unresolved > 0 {
                    log::warn!(
                        "{unresolved} formula cells point at array, table or shared formulas that are not kept"
                    );
                }
                return Ok(false);
            }
            ROW => {
                record.expect_len(16)?;
                let rw = record.u16_at(0)?;
                let height = record.u16_at(6)?;
                let flags = record.u16_at(12)?;
                let row = body.sheet.row_or_create(rw as u32)?;
                if flags & ROW_FLAG_CUSTOM_HEIGHT != 0 {
                    row.set_height(Some(height & 0x7FFF));
                }
                row.set_hidden(flags & ROW_FLAG_HIDDEN != 0);
            }
            BLANK => {
                record.expect_len(6)?;
                self.place(body.sheet, record, 0, CellValue::Blank)?;
            }
            NUMBER => {
                record.expect_len(14)?;
                self.place(body.sheet, record, 0, CellValue::Numeric(record.f64_at(6)?))?;
            }
            RK => {
                record.expect_len(10)?;
                self.place(body.sheet, record, 0, CellValue::Numeric(rk_value(record.u32_at(6)?)))?;
            }
            LABELSST => {
                record.expect_len(10)?;
                let isst = record.u32_at(6)? as usize;
                let index = self.sst.get(isst).copied().ok_or_else(|| {
                    record.corrupt(format!("string index {isst} out of range ({} strings)", self.sst.len()))
                })?;
                self.place(body.sheet, record, 0, CellValue::Text(index))?;
            }
            LABEL => {
                record.expect_min_len(9)?;
                let mut pos = 6;
                let text = read_string(record.data, &mut pos).ok_or_else(|| record.corrupt("truncated label"))?;
                let index = body.strings.intern(&text);
                self.place(body.sheet, record, 0, CellValue::Text(index))?;
            }
            BOOLERR => {
                record.expect_len(8)?;
                let raw = record.u8_at(6)?;
                let value = match record.u8_at(7)? {
                    0 => CellValue::Boolean(raw != 0),
                    _ => CellValue::Error(
                        ErrorCode::from_code(raw)
                            .ok_or_else(|| record.corrupt(format!("unknown error code 0x{raw:02X}")))?,
                    ),
                };
                self.place(body.sheet, record, 0, value)?;
            }
            FORMULA => self.formula(body, record)?,
            SHRFMLA => self.shared_formula(body, record)?,
            STRING => {
                if let Some((rw, col)) = body.awaiting_string.take() {
                    let mut pos = 0;
                    let text = read_string(record.data, &mut pos)
                        .ok_or_else(|| record.corrupt("truncated formula string result"))?;
                    if let Some(formula) = body.formula_mut(rw, col) {
                        formula.set_cached_value(Some(CachedValue::Text(text)));
                    }
                }
            }
            MULRK => {
                record.expect_min_len(12)?;
                let rw = record.u16_at(0)?;
                let first = record.u16_at(2)?;
                if (record.data.len() - 6) % 6 != 0 {
                    return Err(record.corrupt("MULRK length is not a whole number of cells"));
                }
                let count = (record.data.len() - 6) / 6;
                check_last_column(record, first, count)?;
                for i in 0..count {
                    let at = 4 + i * 6;
                    let style = self.style(record, record.u16_at(at)?)?;
                    let value = rk_value(record.u32_at(at + 2)?);
                    let cell = self.cell(body.sheet, record, rw, first.saturating_add(i as u16))?;
                    cell.set_numeric_value(value);
                    cell.set_style(style);
                }
            }
            MULBLANK => {
                record.expect_min_len(8)?;
                let rw = record.u16_at(0)?;
                let first = record.u16_at(2)?;
                if (record.data.len() - 6) % 2 != 0 {
                    return Err(record.corrupt("MULBLANK length is not a whole number of cells"));
                }
                let count = (record.data.len() - 6) / 2;
                check_last_column(record, first, count)?;
                for i in 0..count {
                    let style = self.style(record, record.u16_at(4 + i * 2)?)?;
                    let cell = self.cell(body.sheet, record, rw, first.saturating_add(i as u16))?;
                    cell.set_style(style);
                }
            }
            COLINFO => {
                record.expect_min_len(10)?;
                let first = record.u16_at(0)?;
                let last = record.u16_at(2)?.min(MAX_COLUMN);
                let width = record.u16_at(4)?;
                let hidden = record.u16_at(8)? & COLINFO_HIDDEN != 0;
                for col in first..=last {
                    body.sheet.insert_column_info(col, ColumnInfo { width, hidden });
                }
            }
            DIMENSIONS | WINDOW2 => {}
            other => log::debug!("skipping record 0x{other:04X} at offset {}", record.offset),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::DateSystem;

    fn record(record_type: u16, data: &[u8]) -> Record<'_> {
        Record {
            offset: 0,
            record_type,
            data,
        }
    }

    fn formula_record(rw: u16, col: u16, cached: [u8; 8], rgce: &[u8]) -> Vec<u8> {
        let mut data = vec![];
        data.put_u16(rw);
        data.put_u16(col);
        data.put_u16(15);
        data.extend_from_slice(&cached);
        data.put_u16(0);
        data.put_u32(0);
        data.put_u16(rgce.len() as u16);
        data.extend_from_slice(rgce);
        data
    }

    fn is_corrupt(result: Result<bool>) -> bool {
        matches!(result, Err(BiffError::CorruptRecord { .. }))
    }

    #[test]
    fn test_rk_values() {
        assert_eq!(rk_value((42 << 2) | 0x02), 42.0);
        assert_eq!(rk_value((1234 << 2) | 0x03), 12.34);
        let one = ((1.0f64.to_bits() >> 32) as u32) & 0xFFFF_FFFC;
        assert_eq!(rk_value(one), 1.0);
        assert_eq!(rk_value((-5i32 << 2) as u32 | 0x02), -5.0);
    }

    #[test]
    fn test_cell_records_restore_tags() {
        let mut strings = SharedStrings::new();
        let sst = vec![strings.intern("hello")];
        let xf_styles = vec![StyleIndex(0); 16];
        let decoder = SheetDecoder {
            sst: &sst,
            xf_styles: &xf_styles,
        };
        let mut sheet = Sheet::new("S", DateSystem::default());
        let mut body = SheetBody::new(&mut sheet, &mut strings);

        let mut number = vec![1, 0, 2, 0, 15, 0];
        number.extend_from_slice(&2.5f64.to_le_bytes());
        assert!(decoder.apply(&mut body, &record(NUMBER, &number)).unwrap());
        decoder
            .apply(&mut body, &record(LABELSST, &[1, 0, 3, 0, 15, 0, 0, 0, 0, 0]))
            .unwrap();
        decoder
            .apply(&mut body, &record(BOOLERR, &[1, 0, 4, 0, 15, 0, 0x07, 1]))
            .unwrap();
        // LABEL text joins the pool
        decoder
            .apply(&mut body, &record(LABEL, &[1, 0, 5, 0, 15, 0, 3, 0, 0, b'b', b'y', b'e']))
            .unwrap();
        assert!(!decoder.apply(&mut body, &record(EOF, &[])).unwrap());

        assert_eq!(sheet.cell(1, 2).unwrap().numeric_value().unwrap(), 2.5);
        assert_eq!(sheet.cell(1, 3).unwrap().string_index().unwrap(), sst[0]);
        assert_eq!(sheet.cell(1, 4).unwrap().error_value().unwrap(), ErrorCode::Div0);
        let bye = sheet.cell(1, 5).unwrap().string_index().unwrap();
        assert_eq!(strings.get(bye), Some("bye"));
        assert_eq!(strings.count(), 2);
    }

    #[test]
    fn test_out_of_range_indices_are_corrupt() {
        let mut strings = SharedStrings::new();
        let sst = vec![strings.intern("only")];
        let xf_styles = vec![StyleIndex(0); 16];
        let decoder = SheetDecoder {
            sst: &sst,
            xf_styles: &xf_styles,
        };
        let mut sheet = Sheet::new("S", DateSystem::default());
        let mut body = SheetBody::new(&mut sheet, &mut strings);

        let bad_sst = record(LABELSST, &[0, 0, 0, 0, 15, 0, 9, 0, 0, 0]);
        assert!(is_corrupt(decoder.apply(&mut body, &bad_sst)));
        let bad_xf = record(BLANK, &[0, 0, 0, 0, 99, 0]);
        assert!(is_corrupt(decoder.apply(&mut body, &bad_xf)));
        let bad_len = record(NUMBER, &[0, 0, 0, 0, 15, 0]);
        assert!(is_corrupt(decoder.apply(&mut body, &bad_len)));
        let bad_col = record(BLANK, &[0, 0, 0, 1, 15, 0]);
        assert!(is_corrupt(decoder.apply(&mut body, &bad_col)));
    }

    #[test]
    fn test_multi_cell_records_check_their_last_column() {
        let mut strings = SharedStrings::new();
        let xf_styles = vec![StyleIndex(0); 16];
        let decoder = SheetDecoder {
            sst: &[],
            xf_styles: &xf_styles,
        };
        let mut sheet = Sheet::new("S", DateSystem::default());
        let mut body = SheetBody::new(&mut sheet, &mut strings);

        let rk = ((7u32 << 2) | 0x02).to_le_bytes();
        let mut mulrk = vec![0, 0, 1, 0];
        for _ in 0..2 {
            mulrk.extend_from_slice(&[15, 0]);
            mulrk.extend_from_slice(&rk);
        }
        let mut wrong = mulrk.clone();
        wrong.extend_from_slice(&[5, 0]);
        assert!(is_corrupt(decoder.apply(&mut body, &record(MULRK, &wrong))));
        mulrk.extend_from_slice(&[2, 0]);
        decoder.apply(&mut body, &record(MULRK, &mulrk)).unwrap();

        // odd XF area
        let ragged = [1, 0, 0, 0, 15, 0, 15, 1, 0];
        assert!(is_corrupt(decoder.apply(&mut body, &record(MULBLANK, &ragged))));
        let short_last = [1, 0, 0, 0, 15, 0, 15, 0, 15, 0, 1, 0];
        assert!(is_corrupt(decoder.apply(&mut body, &record(MULBLANK, &short_last))));
        let blanks = [1, 0, 0, 0, 15, 0, 15, 0, 15, 0, 2, 0];
        decoder.apply(&mut body, &record(MULBLANK, &blanks)).unwrap();

        assert_eq!(sheet.cell(0, 1).unwrap().numeric_value().unwrap(), 7.0);
        assert_eq!(sheet.cell(0, 2).unwrap().numeric_value().unwrap(), 7.0);
        assert!(sheet.cell(0, 3).is_none());
        assert_eq!(sheet.row(1).unwrap().physical_number_of_cells(), 3);
    }

    #[test]
    fn test_formula_results_and_shared_bodies() {
        let mut strings = SharedStrings::new();
        let xf_styles = vec![StyleIndex(0); 16];
        let decoder = SheetDecoder {
            sst: &[],
            xf_styles: &xf_styles,
        };
        let mut sheet = Sheet::new("S", DateSystem::default());
        let mut body = SheetBody::new(&mut sheet, &mut strings);

        // A2 and A3 point at a shared body anchored at A2 that reads the cell above
        let pointer = [0x01, 1, 0, 0, 0];
        let text_result = [0, 0, 0, 0, 0, 0, 0xFF, 0xFF];
        decoder
            .apply(&mut body, &record(FORMULA, &formula_record(1, 0, text_result, &pointer)))
            .unwrap();
        decoder
            .apply(&mut body, &record(STRING, &[2, 0, 0, b'o', b'k']))
            .unwrap();
        let rgce = [0x2C, 0xFF, 0xFF, 0, 0xC0, 0x1E, 2, 0, 0x05];
        let mut shrfmla = vec![1, 0, 2, 0, 0, 0, 0, 2];
        shrfmla.put_u16(rgce.len() as u16);
        shrfmla.extend_from_slice(&rgce);
        decoder.apply(&mut body, &record(SHRFMLA, &shrfmla)).unwrap();
        let bool_result = [1, 0, 1, 0, 0, 0, 0xFF, 0xFF];
        decoder
            .apply(&mut body, &record(FORMULA, &formula_record(2, 0, bool_result, &pointer)))
            .unwrap();
        // outside the shared range
        assert!(is_corrupt(decoder.apply(
            &mut body,
            &record(FORMULA, &formula_record(3, 0, bool_result, &pointer))
        )));

        let a2 = sheet.cell(1, 0).unwrap().formula().unwrap();
        assert_eq!(a2.text(), "A1*2");
        assert_eq!(a2.cached_value(), Some(&CachedValue::Text("ok".to_string())));
        let a3 = sheet.cell(2, 0).unwrap().formula().unwrap();
        assert_eq!(a3.text(), "A2*2");
        assert_eq!(a3.cached_value(), Some(&CachedValue::Boolean(true)));
    }

    #[test]
    fn test_unmodelled_formulas_survive_a_rewrite() {
        let mut strings = SharedStrings::new();
        let xf_styles = vec![StyleIndex(0); 16];
        let decoder = SheetDecoder {
            sst: &[],
            xf_styles: &xf_styles,
        };
        let mut sheet = Sheet::new("S", DateSystem::default());
        // 3-D reference times 2
        let rgce = [0x3A, 1, 0, 0, 0, 0, 0xC0, 0x1E, 2, 0, 0x05];
        let data = formula_record(0, 0, 4.0f64.to_le_bytes(), &rgce);
        {
            let mut body = SheetBody::new(&mut sheet, &mut strings);
            decoder.apply(&mut body, &record(FORMULA, &data)).unwrap();
        }
        let formula = sheet.cell(0, 0).unwrap().formula().unwrap();
        assert!(formula.is_opaque());
        assert_eq!(formula.cached_value(), Some(&CachedValue::Number(4.0)));

        let encoder = SheetEncoder {
            strings: &strings,
            style_count: 1,
            calc_on_load: false,
        };
        let bytes = encoder.encode(&sheet, false).unwrap();
        assert!(bytes.windows(data.len()).any(|w| w == data.as_slice()));
    }

    #[test]
    fn test_encode_writes_pool_indices_and_cached_text() {
        let mut strings = SharedStrings::new();
        strings.intern("first");
        let second = strings.intern("second");
        let encoder = SheetEncoder {
            strings: &strings,
            style_count: 1,
            calc_on_load: false,
        };
        let mut sheet = Sheet::new("S", DateSystem::default());
        let row = sheet.create_row(0).unwrap();
        row.create_cell(0).unwrap().set_string_value(second);
        let mut formula = Formula::new("1+1");
        formula.set_cached_value(Some(CachedValue::Text("2".to_string())));
        row.create_cell(1).unwrap().set_value(CellValue::Formula(formula));
        let bytes = encoder.encode(&sheet, false).unwrap();

        let mut labelsst = LABELSST.to_le_bytes().to_vec();
        labelsst.extend_from_slice(&[10, 0, 0, 0, 0, 0, 15, 0, 1, 0, 0, 0]);
        assert!(bytes.windows(labelsst.len()).any(|w| w == labelsst.as_slice()));
        let mut string = STRING.to_le_bytes().to_vec();
        string.extend_from_slice(&[4, 0, 1, 0, 0, b'2']);
        assert!(bytes.windows(string.len()).any(|w| w == string.as_slice()));

        sheet
            .cell_mut(0, 0)
            .unwrap()
            .set_string_value(StringIndex(7));
        assert!(matches!(
            encoder.encode(&sheet, false),
            Err(BiffError::InvalidIndex { what: "shared string", .. })
        ));
    }

    #[test]
    fn test_encode_reports_formula_cell() {
        let strings = SharedStrings::new();
        let encoder = SheetEncoder {
            strings: &strings,
            style_count: 1,
            calc_on_load: true,
        };
        let mut sheet = Sheet::new("S", DateSystem::default());
        sheet
            .create_row(2)
            .unwrap()
            .create_cell(1)
            .unwrap()
            .set_cell_formula("NOPE(1)");
        let err = encoder.encode(&sheet, true).unwrap_err();
        assert!(matches!(err, BiffError::FormulaEncoding { cell, .. } if cell == "B3"));
    }

    #[test]
    fn test_encode_rejects_unknown_style() {
        let strings = SharedStrings::new();
        let encoder = SheetEncoder {
            strings: &strings,
            style_count: 1,
            calc_on_load: true,
        };
        let mut sheet = Sheet::new("S", DateSystem::default());
        sheet
            .create_row(0)
            .unwrap()
            .create_cell(0)
            .unwrap()
            .set_style(StyleIndex(3));
        assert!(matches!(encoder.encode(&sheet, false), Err(BiffError::UnknownStyle(3))));
    }
}
