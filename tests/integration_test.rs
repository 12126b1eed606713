//! Integration tests for biffbook

use biffbook::biff::records::{
    Bof, Record, RecordReader, BOF, BOF_WORKSHEET, BOUNDSHEET, CONTINUE, FORMULA, MULBLANK, MULRK, NUMBER,
    SHRFMLA, SST,
};
use biffbook::formula::MAX_NESTING;
use biffbook::tables::fonts::MAX_FONTS;
use biffbook::tables::styles::MAX_STYLES;
use biffbook::{
    BiffError, Border, BorderStyle, Borders, CachedValue, CellStyle, CellType, DateSystem, ErrorCode, Fill,
    Font, HorizontalAlignment, Recovery, ReadOptions, SheetVisibility, Underline,
    VerticalAlignment, Workbook, WorkbookReader, WorkbookWriterBuilder,
};
use chrono::{NaiveDate, NaiveDateTime};
use tempfile::NamedTempFile;

fn records(bytes: &[u8]) -> Vec<Record<'_>> {
    RecordReader::new(bytes).collect::<Result<Vec<_>, _>>().unwrap()
}

/// Absolute sheet offsets from the BOUNDSHEET directory, with the position
/// of each offset field
fn sheet_offsets(bytes: &[u8]) -> Vec<(usize, usize)> {
    records(bytes)
        .iter()
        .filter(|r| r.record_type == BOUNDSHEET)
        .map(|r| (r.offset + 4, r.u32_at(0).unwrap() as usize))
        .collect()
}

/// Text of a STRING cell, resolved through the workbook pool
fn text_at<'w>(workbook: &'w Workbook, sheet: &str, row: u32, col: u16) -> &'w str {
    let cell = workbook.sheet(sheet).unwrap().cell(row, col).unwrap();
    workbook.string_value(cell).unwrap()
}

/// A record with its 4-byte header
fn framed(record_type: u16, data: &[u8]) -> Vec<u8> {
    let mut out = record_type.to_le_bytes().to_vec();
    out.extend_from_slice(&(data.len() as u16).to_le_bytes());
    out.extend_from_slice(data);
    out
}

/// Replace the record at `offset` with `replacement` (any number of framed
/// records). Only safe behind the last sheet's BOF, where no stored offset
/// points past the edit.
fn splice(bytes: &[u8], record: &Record<'_>, replacement: &[u8]) -> Vec<u8> {
    let mut out = bytes[..record.offset].to_vec();
    out.extend_from_slice(replacement);
    out.extend_from_slice(&bytes[record.offset + 4 + record.data.len()..]);
    out
}

/// FORMULA payload with the head and cached result of `template` but new tokens
fn formula_with(template: &[u8], rgce: &[u8]) -> Vec<u8> {
    let mut data = template[..20].to_vec();
    data.extend_from_slice(&(rgce.len() as u16).to_le_bytes());
    data.extend_from_slice(rgce);
    data
}

fn datetime(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, mi, s)
        .unwrap()
}

fn sample_workbook() -> Workbook {
    let mut workbook = Workbook::new();
    let bold = workbook.intern_font(Font::new("Calibri", 11).with_bold(true)).unwrap();
    let header = workbook
        .intern_style(
            CellStyle::default()
                .with_font(bold)
                .with_alignment(HorizontalAlignment::Center, VerticalAlignment::Center)
                .with_borders(Borders::all(BorderStyle::Thin))
                .with_fill(Fill::solid(0x16)),
        )
        .unwrap();
    let money_format = workbook.intern_format("#,##0.00 \"EUR\"").unwrap();
    let money = workbook
        .intern_style(CellStyle::default().with_format(money_format))
        .unwrap();
    let titles: Vec<_> = ["Item", "Price", "Qty", "Total"]
        .iter()
        .map(|title| workbook.intern_string(title))
        .collect();
    let items: Vec<_> = (1..=5).map(|i| workbook.intern_string(&format!("Item {i}"))).collect();

    let sheet = workbook.create_sheet("Sales").unwrap();
    let row = sheet.create_row(0).unwrap();
    for (col, title) in titles.into_iter().enumerate() {
        let cell = row.create_cell(col as u16).unwrap();
        cell.set_string_value(title);
        cell.set_style(header);
    }
    for i in 1..=5u32 {
        let row = sheet.create_row(i).unwrap();
        row.create_cell(0).unwrap().set_string_value(items[i as usize - 1]);
        let price = row.create_cell(1).unwrap();
        price.set_numeric_value(i as f64 * 1.25);
        price.set_style(money);
        row.create_cell(2).unwrap().set_numeric_value(i as f64);
        row.create_cell(3)
            .unwrap()
            .set_cell_formula(&format!("B{}*C{}", i + 1, i + 1));
    }
    sheet.set_column_width(0, 4000).unwrap();

    let other = workbook.create_sheet("Flags").unwrap();
    let row = other.create_row(10).unwrap();
    row.create_cell(0).unwrap().set_boolean_value(false);
    row.create_cell(1).unwrap().set_error_value(ErrorCode::NA);
    row.create_cell(2).unwrap().set_blank();
    row.set_height(Some(600));
    other.create_row(300).unwrap().set_hidden(true);
    other.set_visibility(SheetVisibility::Hidden);
    workbook
}

#[test]
fn test_write_and_read_roundtrip() {
    let workbook = sample_workbook();
    let bytes = workbook.to_bytes().unwrap();
    let copy = Workbook::from_bytes(&bytes).unwrap();

    assert_eq!(copy.number_of_sheets(), 2);
    assert_eq!(copy.sheet_at(0).unwrap().name(), "Sales");
    assert_eq!(copy.sheet_at(1).unwrap().name(), "Flags");
    for (original, decoded) in workbook.sheets().zip(copy.sheets()) {
        assert_eq!(original, decoded);
    }
    assert_eq!(copy.fonts(), workbook.fonts());
    assert_eq!(copy.styles(), workbook.styles());
    assert_eq!(copy.formats(), workbook.formats());
    assert_eq!(copy.date_system(), workbook.date_system());
    assert_eq!(copy.strings(), workbook.strings());
}

#[test]
fn test_typed_cells() {
    let workbook = sample_workbook();
    let copy = Workbook::from_bytes(&workbook.to_bytes().unwrap()).unwrap();
    let sales = copy.sheet("Sales").unwrap();

    let title = sales.cell(0, 1).unwrap();
    assert_eq!(title.cell_type(), CellType::String);
    assert_eq!(copy.string_value(title).unwrap(), "Price");
    assert!(matches!(
        title.numeric_value(),
        Err(BiffError::TypeMismatch {
            expected: CellType::Numeric,
            actual: CellType::String
        })
    ));

    let price = sales.cell(2, 1).unwrap();
    assert_eq!(price.cell_type(), CellType::Numeric);
    assert_eq!(price.numeric_value().unwrap(), 2.5);

    let total = sales.cell(3, 3).unwrap();
    assert_eq!(total.cell_type(), CellType::Formula);
    assert_eq!(total.cell_formula().unwrap(), "B4*C4");

    let flags = copy.sheet("Flags").unwrap();
    assert!(!flags.cell(10, 0).unwrap().boolean_value().unwrap());
    assert_eq!(flags.cell(10, 1).unwrap().error_value().unwrap(), ErrorCode::NA);
    assert_eq!(flags.cell(10, 2).unwrap().cell_type(), CellType::Blank);
    assert_eq!(flags.row(10).unwrap().height(), Some(600));
    assert!(flags.row(300).unwrap().is_hidden());
    assert_eq!(flags.visibility(), SheetVisibility::Hidden);
}

#[test]
fn test_styles_are_shared_after_roundtrip() {
    let workbook = sample_workbook();
    let copy = Workbook::from_bytes(&workbook.to_bytes().unwrap()).unwrap();
    let sales = copy.sheet("Sales").unwrap();

    let header = sales.cell(0, 0).unwrap().style();
    assert!((1..4).all(|col| sales.cell(0, col).unwrap().style() == header));

    let style = copy.style_at(header).unwrap();
    let font = copy.font_at(style.font).unwrap();
    assert_eq!(font.name, "Calibri");
    assert!(font.is_bold());
    assert_eq!(style.borders.left.style, BorderStyle::Thin);

    let money = sales.cell(1, 1).unwrap().style();
    assert_eq!(copy.style_format_pattern(money), Some("#,##0.00 \"EUR\""));
}

#[test]
fn test_font_after_skipped_index() {
    let mut workbook = Workbook::new();
    let fonts: Vec<_> = (0..8)
        .map(|i| {
            workbook
                .intern_font(
                    Font::new("Verdana", 9 + i)
                        .with_underline(Underline::Double)
                        .with_color(0x0C),
                )
                .unwrap()
        })
        .collect();
    let styles: Vec<_> = fonts
        .iter()
        .map(|&f| workbook.intern_style(CellStyle::default().with_font(f)).unwrap())
        .collect();
    let sheet = workbook.create_sheet("Fonts").unwrap();
    let row = sheet.create_row(0).unwrap();
    for (col, style) in styles.iter().enumerate() {
        let cell = row.create_cell(col as u16).unwrap();
        cell.set_numeric_value(col as f64);
        cell.set_style(*style);
    }

    let copy = Workbook::from_bytes(&workbook.to_bytes().unwrap()).unwrap();
    assert_eq!(copy.number_of_fonts(), 9);
    for (col, &font) in fonts.iter().enumerate() {
        let style = copy.sheet("Fonts").unwrap().cell(0, col as u16).unwrap().style();
        assert_eq!(copy.style_at(style).unwrap().font, font);
        assert_eq!(copy.font_at(font), workbook.font_at(font));
    }
}

#[test]
fn test_dates_roundtrip_in_both_systems() {
    for system in [DateSystem::Excel1900, DateSystem::Excel1904] {
        let mut workbook = Workbook::new();
        workbook.set_date_system(system);
        let format = workbook.builtin_format("m/d/yy h:mm").unwrap();
        let style = workbook
            .intern_style(CellStyle::default().with_format(format))
            .unwrap();
        let instants = [
            datetime(1904, 1, 2, 0, 0, 0),
            datetime(1999, 12, 31, 23, 59, 59),
            datetime(2024, 2, 29, 12, 30, 15),
        ];
        let sheet = workbook.create_sheet("Dates").unwrap();
        for (i, instant) in instants.iter().enumerate() {
            let cell = sheet.create_row(i as u32).unwrap().create_cell(0).unwrap();
            cell.set_date_value(*instant).unwrap();
            cell.set_style(style);
        }

        let copy = Workbook::from_bytes(&workbook.to_bytes().unwrap()).unwrap();
        assert_eq!(copy.date_system(), system);
        let sheet = copy.sheet("Dates").unwrap();
        for (i, instant) in instants.iter().enumerate() {
            let cell = sheet.cell(i as u32, 0).unwrap();
            assert_eq!(cell.cell_type(), CellType::Numeric);
            assert_eq!(cell.date_value().unwrap(), *instant);
            assert_eq!(copy.style_format_pattern(cell.style()), Some("m/d/yy h:mm"));
        }
    }
}

#[test]
fn test_unicode_strings_and_names() {
    let texts = ["日本語テキスト", "naïve café", "emoji 🦀", ""];
    let mut workbook = Workbook::new();
    let handles: Vec<_> = texts.iter().map(|t| workbook.intern_string(t)).collect();
    let row = workbook.create_sheet("Données").unwrap().create_row(0).unwrap();
    for (col, handle) in handles.into_iter().enumerate() {
        row.create_cell(col as u16).unwrap().set_string_value(handle);
    }

    let copy = Workbook::from_bytes(&workbook.to_bytes().unwrap()).unwrap();
    for (col, text) in texts.iter().enumerate() {
        assert_eq!(text_at(&copy, "Données", 0, col as u16), *text);
    }
}

#[test]
fn test_large_shared_string_table_spans_continue_records() {
    let mut workbook = Workbook::new();
    let texts: Vec<String> = (0..400)
        .map(|i| format!("{i:04} {}", if i % 3 == 0 { "Ω".repeat(90) } else { "x".repeat(120) }))
        .collect();
    let handles: Vec<_> = texts.iter().map(|t| workbook.intern_string(t)).collect();
    let sheet = workbook.create_sheet("Strings").unwrap();
    for (i, handle) in handles.into_iter().enumerate() {
        sheet
            .create_row(i as u32)
            .unwrap()
            .create_cell(0)
            .unwrap()
            .set_string_value(handle);
    }

    let bytes = workbook.to_bytes().unwrap();
    let kinds: Vec<u16> = records(&bytes).iter().map(|r| r.record_type).collect();
    let sst_at = kinds.iter().position(|&t| t == SST).unwrap();
    assert_eq!(kinds[sst_at + 1], CONTINUE);

    let copy = Workbook::from_bytes(&bytes).unwrap();
    for (i, text) in texts.iter().enumerate() {
        assert_eq!(text_at(&copy, "Strings", i as u32, 0), text);
    }
}

#[test]
fn test_output_is_deterministic() {
    let workbook = sample_workbook();
    let first = workbook.to_bytes().unwrap();
    let second = workbook.to_bytes().unwrap();
    assert_eq!(first, second);

    let parallel = WorkbookWriterBuilder::new()
        .with_parallel(true)
        .build()
        .to_bytes(&workbook)
        .unwrap();
    assert_eq!(first, parallel);

    // a decoded workbook writes back to the same bytes
    let copy = Workbook::from_bytes(&first).unwrap();
    assert_eq!(copy.to_bytes().unwrap(), first);
}

#[test]
fn test_offset_directory_points_at_sheet_bof() {
    let bytes = sample_workbook().to_bytes().unwrap();
    let offsets = sheet_offsets(&bytes);
    assert_eq!(offsets.len(), 2);
    for (_, offset) in offsets {
        let record = RecordReader::at(&bytes, offset).next().unwrap().unwrap();
        assert_eq!(record.record_type, BOF);
        assert_eq!(Bof::parse(&record).unwrap().substream, BOF_WORKSHEET);
    }
}

#[test]
fn test_active_sheet_roundtrip() {
    let mut workbook = sample_workbook();
    workbook.set_active_sheet(1).unwrap();
    let copy = Workbook::from_bytes(&workbook.to_bytes().unwrap()).unwrap();
    assert_eq!(copy.active_sheet_index(), 1);
}

#[test]
fn test_scenario_two_sheets() {
    let mut workbook = Workbook::new();
    workbook.create_sheet("Sheet1").unwrap();
    workbook.create_sheet("Sheet2").unwrap();
    assert_eq!(workbook.number_of_sheets(), 2);

    let copy = Workbook::from_bytes(&workbook.to_bytes().unwrap()).unwrap();
    assert_eq!(copy.number_of_sheets(), 2);
}

#[test]
fn test_scenario_numeric_and_string_cells() {
    let mut workbook = Workbook::new();
    let ruby = workbook.intern_string("Ruby");
    let row = workbook.create_sheet("Sheet1").unwrap().create_row(0).unwrap();
    row.create_cell(0).unwrap().set_numeric_value(1.5);
    row.create_cell(1).unwrap().set_string_value(ruby);

    let copy = Workbook::from_bytes(&workbook.to_bytes().unwrap()).unwrap();
    let sheet = copy.sheet_at(0).unwrap();
    assert_eq!(sheet.cell(0, 0).unwrap().numeric_value().unwrap(), 1.5);
    assert_eq!(text_at(&copy, "Sheet1", 0, 1), "Ruby");
    assert!(sheet.cell(0, 1).unwrap().numeric_value().is_err());
}

#[test]
fn test_scenario_formula_text_is_verbatim() {
    let mut workbook = Workbook::new();
    let cell = workbook
        .create_sheet("Sheet1")
        .unwrap()
        .create_row(0)
        .unwrap()
        .create_cell(5)
        .unwrap();
    cell.set_cell_formula("A1*2");
    assert_eq!(cell.cell_formula().unwrap(), "A1*2");

    let copy = Workbook::from_bytes(&workbook.to_bytes().unwrap()).unwrap();
    let cell = copy.sheet_at(0).unwrap().cell(0, 5).unwrap();
    assert_eq!(cell.cell_type(), CellType::Formula);
    assert_eq!(cell.cell_formula().unwrap(), "A1*2");
}

#[test]
fn test_scenario_independent_workbooks() {
    let mut kept = Workbook::new();
    let stay = kept.intern_string("stay");
    kept.create_sheet("Kept")
        .unwrap()
        .create_row(0)
        .unwrap()
        .create_cell(0)
        .unwrap()
        .set_string_value(stay);

    for i in 0..50 {
        let mut scratch = Workbook::new();
        scratch.create_sheet(&format!("Tmp{i}")).unwrap();
        scratch.intern_string("noise");
        let bytes = scratch.to_bytes().unwrap();
        drop(Workbook::from_bytes(&bytes).unwrap());
    }

    assert_eq!(kept.number_of_sheets(), 1);
    assert_eq!(text_at(&kept, "Kept", 0, 0), "stay");
    assert_eq!(kept.strings().count(), 1);
}

#[test]
fn test_invalid_signature() {
    let err = Workbook::from_bytes(b"PK\x03\x04this is a zip archive").unwrap_err();
    assert!(matches!(err, BiffError::InvalidFormat(_)));
    assert!(matches!(Workbook::from_bytes(&[]), Err(BiffError::InvalidFormat(_))));
}

#[test]
fn test_truncated_stream_is_corrupt() {
    let bytes = sample_workbook().to_bytes().unwrap();
    let cut = &bytes[..bytes.len() - 3];
    assert!(matches!(Workbook::from_bytes(cut), Err(BiffError::CorruptRecord { .. })));
}

#[test]
fn test_sheet_offset_outside_stream() {
    let mut bytes = sample_workbook().to_bytes().unwrap();
    let (slot, _) = sheet_offsets(&bytes)[1];
    bytes[slot..slot + 4].copy_from_slice(&u32::MAX.to_le_bytes());

    let err = Workbook::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, BiffError::CorruptRecord { record_type: BOUNDSHEET, .. }));

    let (copy, skipped) = Workbook::read_lenient(bytes.as_slice()).unwrap();
    assert_eq!(copy.number_of_sheets(), 2);
    assert_eq!(copy.sheet("Flags").unwrap().physical_number_of_rows(), 0);
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].sheet, "Flags");
}

#[test]
fn test_lenient_read_keeps_cells_before_corruption() {
    let mut workbook = Workbook::new();
    let sheet = workbook.create_sheet("Numbers").unwrap();
    for i in 0..10u32 {
        sheet
            .create_row(i)
            .unwrap()
            .create_cell(0)
            .unwrap()
            .set_numeric_value(i as f64);
    }
    let mut bytes = workbook.to_bytes().unwrap();

    // shrink the sixth NUMBER record to a payload too short for a number
    let target = records(&bytes)
        .iter()
        .filter(|r| r.record_type == NUMBER)
        .nth(5)
        .map(|r| r.offset)
        .unwrap();
    bytes[target + 2..target + 4].copy_from_slice(&6u16.to_le_bytes());

    let err = Workbook::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, BiffError::CorruptRecord { offset, record_type: NUMBER, .. } if offset == target));

    let reader = WorkbookReader::with_options(ReadOptions {
        recovery: Recovery::Lenient,
    });
    let (copy, skipped) = reader.read_bytes(&bytes).unwrap();
    let sheet = copy.sheet("Numbers").unwrap();
    assert_eq!(sheet.physical_number_of_rows(), 6);
    assert_eq!(sheet.cell(4, 0).unwrap().numeric_value().unwrap(), 4.0);
    assert!(sheet.cell(5, 0).is_none());
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].offset, target);
    assert_eq!(skipped[0].record_type, NUMBER);
}

#[test]
fn test_unknown_records_are_skipped() {
    let mut workbook = Workbook::new();
    workbook
        .create_sheet("Only")
        .unwrap()
        .create_row(2)
        .unwrap()
        .create_cell(2)
        .unwrap()
        .set_numeric_value(7.0);
    let bytes = workbook.to_bytes().unwrap();

    // splice an unknown record in right after the sheet's BOF
    let (_, body) = sheet_offsets(&bytes)[0];
    let after_bof = body + 4 + 16;
    let mut patched = bytes[..after_bof].to_vec();
    patched.extend_from_slice(&[0x99, 0x08, 0x03, 0x00, 0xAA, 0xBB, 0xCC]);
    patched.extend_from_slice(&bytes[after_bof..]);

    let copy = Workbook::from_bytes(&patched).unwrap();
    assert_eq!(
        copy.sheet("Only").unwrap().cell(2, 2).unwrap().numeric_value().unwrap(),
        7.0
    );
}

#[test]
fn test_formula_errors_surface_at_write_time() {
    let mut workbook = Workbook::new();
    let row = workbook.create_sheet("Calc").unwrap().create_row(1).unwrap();
    let cell = row.create_cell(2).unwrap();
    cell.set_cell_formula("Other!A1+1");
    assert_eq!(cell.cell_formula().unwrap(), "Other!A1+1");

    let temp = NamedTempFile::new().unwrap();
    std::fs::remove_file(temp.path()).unwrap();
    let err = workbook.save(temp.path()).unwrap_err();
    match err {
        BiffError::FormulaEncoding { cell, .. } => assert_eq!(cell, "C2"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!temp.path().exists());
}

#[test]
fn test_file_save_and_open() {
    let temp = NamedTempFile::new().unwrap();
    let workbook = sample_workbook();
    workbook.save(temp.path()).unwrap();

    let copy = Workbook::open(temp.path()).unwrap();
    assert_eq!(copy.number_of_sheets(), 2);
    assert_eq!(text_at(&copy, "Sales", 5, 0), "Item 5");
}

#[test]
fn test_border_colors_roundtrip() {
    let mut workbook = Workbook::new();
    let style = workbook
        .intern_style(CellStyle::default().with_borders(Borders {
            left: Border {
                style: BorderStyle::Dashed,
                color: 0x0A,
            },
            right: Border::new(BorderStyle::Medium),
            top: Border::new(BorderStyle::Hair),
            bottom: Border {
                style: BorderStyle::Thick,
                color: 0x11,
            },
        }))
        .unwrap();
    let cell = workbook
        .create_sheet("B")
        .unwrap()
        .create_row(0)
        .unwrap()
        .create_cell(0)
        .unwrap();
    cell.set_blank();
    cell.set_style(style);

    let copy = Workbook::from_bytes(&workbook.to_bytes().unwrap()).unwrap();
    assert_eq!(copy.style_at(style), workbook.style_at(style));
}

#[test]
fn test_date_system_is_written_from_the_workbook() {
    let mut workbook = Workbook::new();
    let when = datetime(2024, 1, 1, 0, 0, 0);
    workbook
        .create_sheet("D")
        .unwrap()
        .create_row(0)
        .unwrap()
        .create_cell(0)
        .unwrap()
        .set_date_value(when)
        .unwrap();

    for system in [DateSystem::Excel1904, DateSystem::Excel1900] {
        workbook.set_date_system(system);
        workbook.sheet_mut("D").unwrap().cell_mut(0, 0).unwrap().set_date_value(when).unwrap();
        let bytes = WorkbookWriterBuilder::new().with_calc_on_load(false).build().to_bytes(&workbook).unwrap();
        let copy = Workbook::from_bytes(&bytes).unwrap();
        assert_eq!(copy.date_system(), system);
        assert_eq!(copy.sheet("D").unwrap().cell(0, 0).unwrap().date_value().unwrap(), when);
    }
}

#[test]
fn test_styles_differing_in_high_palette_entries_stay_apart() {
    let mut workbook = Workbook::new();
    let low = workbook.intern_style(CellStyle::default().with_fill(Fill::solid(0x08))).unwrap();
    let high = workbook.intern_style(CellStyle::default().with_fill(Fill::solid(0x7F))).unwrap();
    let row = workbook.create_sheet("Fills").unwrap().create_row(0).unwrap();
    row.create_cell(0).unwrap().set_style(low);
    row.create_cell(1).unwrap().set_style(high);

    let copy = Workbook::from_bytes(&workbook.to_bytes().unwrap()).unwrap();
    let sheet = copy.sheet("Fills").unwrap();
    assert_ne!(sheet.cell(0, 0).unwrap().style(), sheet.cell(0, 1).unwrap().style());
    assert_eq!(copy.style_at(high), workbook.style_at(high));

    // a colour the XF cannot hold is refused up front
    let before = workbook.number_of_styles();
    let err = workbook
        .intern_style(CellStyle::default().with_fill(Fill::solid(0x88)))
        .unwrap_err();
    assert!(matches!(err, BiffError::InvalidIndex { index: 0x88, .. }));
    assert_eq!(workbook.number_of_styles(), before);
}

#[test]
fn test_pools_stop_at_format_limits() {
    let mut workbook = Workbook::new();
    for points in 1..MAX_FONTS as u16 {
        workbook.intern_font(Font::new("Georgia", points)).unwrap();
    }
    assert!(matches!(
        workbook.intern_font(Font::new("Georgia", 999)),
        Err(BiffError::PoolFull { pool: "font", .. })
    ));

    for i in 1..MAX_STYLES {
        let format = workbook.intern_format(&format!("0.00\" u{i}\"")).unwrap();
        workbook.intern_style(CellStyle::default().with_format(format)).unwrap();
    }
    assert_eq!(workbook.number_of_styles(), MAX_STYLES);
    let format = workbook.intern_format("0.00\" spare\"").unwrap();
    assert!(matches!(
        workbook.intern_style(CellStyle::default().with_format(format)),
        Err(BiffError::PoolFull { pool: "style", .. })
    ));
}

#[test]
fn test_deep_nesting_is_kept_and_refused_at_save() {
    let text = format!("{}1{}", "(".repeat(20000), ")".repeat(20000));
    let mut workbook = Workbook::new();
    let cell = workbook.create_sheet("Deep").unwrap().create_row(0).unwrap().create_cell(0).unwrap();
    cell.set_cell_formula(&text);
    assert_eq!(cell.cell_formula().unwrap(), text);
    assert!(matches!(workbook.to_bytes(), Err(BiffError::FormulaEncoding { cell, .. }) if cell == "A1"));

    // the deepest accepted nesting still compiles and reads back
    let text = format!("{}1{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
    workbook.sheet_mut("Deep").unwrap().cell_mut(0, 0).unwrap().set_cell_formula(&text);
    let copy = Workbook::from_bytes(&workbook.to_bytes().unwrap()).unwrap();
    assert_eq!(copy.sheet("Deep").unwrap().cell(0, 0).unwrap().cell_formula().unwrap(), text);
}

#[test]
fn test_string_pool_survives_roundtrip() {
    let mut workbook = Workbook::new();
    let unused = workbook.intern_string("never placed");
    let shared = workbook.intern_string("twice");
    let row = workbook.create_sheet("S").unwrap().create_row(0).unwrap();
    row.create_cell(0).unwrap().set_string_value(shared);
    row.create_cell(1).unwrap().set_string_value(shared);
    assert_eq!(workbook.strings().count(), 2);

    let copy = Workbook::from_bytes(&workbook.to_bytes().unwrap()).unwrap();
    assert_eq!(copy.strings(), workbook.strings());
    assert_eq!(copy.string_at(unused), Some("never placed"));
    let sheet = copy.sheet("S").unwrap();
    assert_eq!(sheet.cell(0, 0).unwrap().string_index().unwrap(), shared);
    assert_eq!(sheet.cell(0, 1).unwrap().string_index().unwrap(), shared);
}

#[test]
fn test_cross_sheet_formula_bytes_are_kept() {
    let mut workbook = Workbook::new();
    workbook
        .create_sheet("Calc")
        .unwrap()
        .create_row(0)
        .unwrap()
        .create_cell(0)
        .unwrap()
        .set_cell_formula("1+1");
    let bytes = workbook.to_bytes().unwrap();
    let parsed = records(&bytes);
    let formula = parsed.iter().find(|r| r.record_type == FORMULA).unwrap();

    // first external sheet, A1, times 2
    let rgce = [0x3A, 0, 0, 0, 0, 0, 0xC0, 0x1E, 2, 0, 0x05];
    let replacement = framed(FORMULA, &formula_with(formula.data, &rgce));
    let patched = splice(&bytes, formula, &replacement);

    let copy = Workbook::from_bytes(&patched).unwrap();
    let kept = copy.sheet("Calc").unwrap().cell(0, 0).unwrap().formula().unwrap();
    assert!(kept.is_opaque());
    assert_eq!(kept.raw_tokens(), Some(&rgce[..]));

    let rewritten = WorkbookWriterBuilder::new().with_calc_on_load(true).build().to_bytes(&copy).unwrap();
    assert!(rewritten.windows(replacement.len()).any(|w| w == replacement.as_slice()));
}

#[test]
fn test_shared_formulas_expand_per_cell() {
    let mut workbook = Workbook::new();
    let sheet = workbook.create_sheet("Shared").unwrap();
    sheet.create_row(0).unwrap().create_cell(0).unwrap().set_numeric_value(3.0);
    for row in 1..=2 {
        sheet.create_row(row).unwrap().create_cell(0).unwrap().set_cell_formula("1+1");
    }
    let bytes = workbook.to_bytes().unwrap();
    let parsed = records(&bytes);
    let formulas: Vec<_> = parsed.iter().filter(|r| r.record_type == FORMULA).collect();

    // both cells point at a shared body anchored at A2 that doubles the cell above
    let pointer = [0x01, 1, 0, 0, 0];
    let body = [0x2C, 0xFF, 0xFF, 0x00, 0xC0, 0x1E, 2, 0, 0x05];
    let mut shrfmla = vec![1, 0, 2, 0, 0, 0, 0, 2];
    shrfmla.extend_from_slice(&(body.len() as u16).to_le_bytes());
    shrfmla.extend_from_slice(&body);

    let patched = splice(&bytes, formulas[1], &framed(FORMULA, &formula_with(formulas[1].data, &pointer)));
    let mut first = framed(FORMULA, &formula_with(formulas[0].data, &pointer));
    first.extend_from_slice(&framed(SHRFMLA, &shrfmla));
    let patched = splice(&patched, formulas[0], &first);

    let copy = Workbook::from_bytes(&patched).unwrap();
    let sheet = copy.sheet("Shared").unwrap();
    assert_eq!(sheet.cell(1, 0).unwrap().cell_formula().unwrap(), "A1*2");
    assert_eq!(sheet.cell(2, 0).unwrap().cell_formula().unwrap(), "A2*2");
    let cached = sheet.cell(2, 0).unwrap().formula().unwrap().cached_value();
    assert_eq!(cached, Some(&CachedValue::Number(0.0)));

    // expanded cells are ordinary formulas when written again
    let again = Workbook::from_bytes(&copy.to_bytes().unwrap()).unwrap();
    assert_eq!(again.sheet("Shared").unwrap().cell(2, 0).unwrap().cell_formula().unwrap(), "A2*2");
}

#[test]
fn test_array_formula_cells_are_read_but_not_written() {
    let mut workbook = Workbook::new();
    workbook
        .create_sheet("Array")
        .unwrap()
        .create_row(0)
        .unwrap()
        .create_cell(0)
        .unwrap()
        .set_cell_formula("1+1");
    let bytes = workbook.to_bytes().unwrap();
    let parsed = records(&bytes);
    let formula = parsed.iter().find(|r| r.record_type == FORMULA).unwrap();
    let patched = splice(&bytes, formula, &framed(FORMULA, &formula_with(formula.data, &[0x01, 0, 0, 0, 0])));

    let copy = Workbook::from_bytes(&patched).unwrap();
    let cell = copy.sheet("Array").unwrap().cell(0, 0).unwrap();
    assert!(cell.formula().unwrap().is_opaque());
    assert!(matches!(copy.to_bytes(), Err(BiffError::FormulaEncoding { cell, .. }) if cell == "A1"));
}

#[test]
fn test_multi_cell_records_with_bad_trailers_are_corrupt() {
    let mut workbook = Workbook::new();
    workbook
        .create_sheet("Multi")
        .unwrap()
        .create_row(0)
        .unwrap()
        .create_cell(0)
        .unwrap()
        .set_numeric_value(1.0);
    let bytes = workbook.to_bytes().unwrap();
    let parsed = records(&bytes);
    let number = parsed.iter().find(|r| r.record_type == NUMBER).unwrap();

    let rk = ((5u32 << 2) | 0x02).to_le_bytes();
    let mut mulrk = vec![0, 0, 0, 0, 15, 0];
    mulrk.extend_from_slice(&rk);
    mulrk.extend_from_slice(&[15, 0]);
    mulrk.extend_from_slice(&rk);
    mulrk.extend_from_slice(&[1, 0]);
    let good = splice(&bytes, number, &framed(MULRK, &mulrk));
    let copy = Workbook::from_bytes(&good).unwrap();
    assert_eq!(copy.sheet("Multi").unwrap().cell(0, 1).unwrap().numeric_value().unwrap(), 5.0);

    let bad_last = mulrk.len() - 2;
    mulrk[bad_last] = 4;
    let bad = splice(&bytes, number, &framed(MULRK, &mulrk));
    assert!(matches!(
        Workbook::from_bytes(&bad),
        Err(BiffError::CorruptRecord { record_type: MULRK, .. })
    ));

    // one XF plus a stray byte
    let ragged = splice(&bytes, number, &framed(MULBLANK, &[0, 0, 0, 0, 15, 0, 0, 0, 9]));
    assert!(matches!(
        Workbook::from_bytes(&ragged),
        Err(BiffError::CorruptRecord { record_type: MULBLANK, .. })
    ));
}
