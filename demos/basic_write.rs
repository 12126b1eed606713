//! Basic example of building and saving a workbook

use biffbook::{BorderStyle, Borders, CellStyle, Fill, Font, HorizontalAlignment, VerticalAlignment, Workbook};
use chrono::NaiveDate;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut workbook = Workbook::new();

    // Header style: bold font, centered, thin borders, light fill
    let bold = workbook.intern_font(Font::default().with_bold(true))?;
    let header = workbook.intern_style(
        CellStyle::default()
            .with_font(bold)
            .with_alignment(HorizontalAlignment::Center, VerticalAlignment::Center)
            .with_borders(Borders::all(BorderStyle::Thin))
            .with_fill(Fill::solid(0x2C)),
    )?;
    let date_format = workbook.builtin_format("m/d/yy")?;
    let date_style = workbook.intern_style(CellStyle::default().with_format(date_format))?;
    let money_format = workbook.intern_format("#,##0.00")?;
    let money_style = workbook.intern_style(CellStyle::default().with_format(money_format))?;

    // Cell text lives in the workbook's string pool
    let titles: Vec<_> = ["ID", "Name", "Hired", "Salary"]
        .iter()
        .map(|title| workbook.intern_string(title))
        .collect();
    let people = [
        ("Alice Johnson", (2019, 3, 1), 75000.0),
        ("Bob Smith", (2021, 7, 15), 65000.0),
        ("Carol White", (2016, 11, 30), 85000.0),
    ];
    let names: Vec<_> = people.iter().map(|(name, ..)| workbook.intern_string(name)).collect();
    let total_label = workbook.intern_string("Total");

    let sheet = workbook.create_sheet("Employees")?;

    let row = sheet.create_row(0)?;
    for (col, title) in titles.into_iter().enumerate() {
        let cell = row.create_cell(col as u16)?;
        cell.set_string_value(title);
        cell.set_style(header);
    }

    for (i, ((_, (y, m, d), salary), name)) in people.iter().zip(names).enumerate() {
        let row = sheet.create_row(i as u32 + 1)?;
        row.create_cell(0)?.set_numeric_value(i as f64 + 1.0);
        row.create_cell(1)?.set_string_value(name);

        let hired = NaiveDate::from_ymd_opt(*y, *m, *d)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .ok_or("invalid date")?;
        let cell = row.create_cell(2)?;
        cell.set_date_value(hired)?;
        cell.set_style(date_style);

        let cell = row.create_cell(3)?;
        cell.set_numeric_value(*salary);
        cell.set_style(money_style);
    }

    let total = sheet.create_row(4)?;
    total.create_cell(2)?.set_string_value(total_label);
    total.create_cell(3)?.set_cell_formula("SUM(D2:D4)");

    // Widths are in 1/256 of a character
    sheet.set_column_width(1, 20 * 256)?;
    sheet.set_column_width(3, 12 * 256)?;

    workbook.save("demos/output.xls")?;

    println!("Workbook created successfully: demos/output.xls");
    Ok(())
}
