//! Read a workbook and print every cell

use biffbook::{CellValue, Workbook};
use std::env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/output.xls".to_string());

    let (workbook, skipped) = Workbook::read_lenient(std::fs::File::open(&path)?)?;
    for note in &skipped {
        eprintln!(
            "warning: sheet '{}' truncated at record 0x{:04X} (offset {}): {}",
            note.sheet, note.record_type, note.offset, note.reason
        );
    }

    println!("{} ({:?} date system)", path, workbook.date_system());
    for sheet in workbook.sheets() {
        println!("== {} ({} rows)", sheet.name(), sheet.physical_number_of_rows());
        for row in sheet.rows() {
            for cell in row.cells() {
                let shown = match cell.value() {
                    CellValue::Numeric(_) if is_date(&workbook, cell.style()) => {
                        format!("{}", cell.date_value()?)
                    }
                    CellValue::Numeric(n) => n.to_string(),
                    CellValue::Text(_) => format!("{:?}", workbook.string_value(cell)?),
                    CellValue::Formula(f) if f.is_opaque() => "=<kept as read>".to_string(),
                    CellValue::Formula(f) => format!("={}", f.text()),
                    CellValue::Boolean(b) => b.to_string(),
                    CellValue::Error(e) => e.to_string(),
                    CellValue::Blank => continue,
                };
                println!("{:>6}  {}", cell.reference(), shown);
            }
        }
    }
    Ok(())
}

fn is_date(workbook: &Workbook, style: biffbook::StyleIndex) -> bool {
    match workbook.style_at(style) {
        Some(s) => workbook
            .style_format_pattern(style)
            .is_some_and(|pattern| biffbook::date::is_date_format(s.format.0, pattern)),
        None => false,
    }
}
