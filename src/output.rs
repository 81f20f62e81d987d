use crate::errors::Result;
use crate::reports::{Cell, Report, Sheet};
use rust_xlsxwriter::{Format, FormatBorder, Workbook, Worksheet};
use serde::Serialize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};
use tracing::info;

pub fn write_sheet_csv(path: &Path, sheet: &Sheet) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for record in sheet.to_records() {
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// One CSV per sheet, named after the sheet.
pub fn write_report_csv(dir: &Path, report: &Report) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    for sheet in &report.sheets {
        let file = format!("{}.csv", sheet.name.to_lowercase().replace(' ', "_"));
        write_sheet_csv(&dir.join(file), sheet)?;
    }
    info!("Wrote {} CSV sheets to {}", report.sheets.len(), dir.display());
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

fn write_sheet(worksheet: &mut Worksheet, sheet: &Sheet) -> Result<()> {
    worksheet.set_name(&sheet.name)?;

    let header_format = Format::new().set_bold().set_border(FormatBorder::Thin);
    let percent_format = Format::new().set_num_format("0.00%");
    let number_format = Format::new().set_num_format("#,##0.00");

    for (col, header) in sheet.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, header, &header_format)?;
    }

    for (idx, row) in sheet.rows.iter().enumerate() {
        let r = (idx + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let c = col as u16;
            match cell {
                Cell::Count(n) => {
                    worksheet.write_number(r, c, *n as f64)?;
                }
                Cell::Number(n) => {
                    worksheet.write_number_with_format(r, c, *n, &number_format)?;
                }
                Cell::Percent(Some(p)) => {
                    worksheet.write_number_with_format(r, c, *p, &percent_format)?;
                }
                Cell::Text(_) | Cell::Percent(None) | Cell::Status(_) => {
                    worksheet.write_string(r, c, cell.render())?;
                }
            }
        }
    }

    if !sheet.rows.is_empty() && !sheet.headers.is_empty() {
        worksheet.autofilter(0, 0, sheet.rows.len() as u32, (sheet.headers.len() - 1) as u16)?;
    }
    worksheet.set_freeze_panes(1, 0)?;
    Ok(())
}

fn build_workbook(report: &Report) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    for sheet in &report.sheets {
        let worksheet = workbook.add_worksheet();
        write_sheet(worksheet, sheet)?;
    }
    Ok(workbook)
}

/// The workbook as bytes, for callers that stream it instead of saving it.
pub fn report_to_xlsx_bytes(report: &Report) -> Result<Vec<u8>> {
    let mut workbook = build_workbook(report)?;
    Ok(workbook.save_to_buffer()?)
}

pub fn write_xlsx(path: &Path, report: &Report) -> Result<()> {
    let mut workbook = build_workbook(report)?;
    workbook.save(path)?;
    info!("Wrote {} sheets to {}", report.sheets.len(), path.display());
    Ok(())
}

pub fn preview_sheet(sheet: &Sheet, max_rows: usize) {
    println!("{}", sheet.name);
    if sheet.rows.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(sheet.headers.iter().cloned());
    for row in sheet.rows.iter().take(max_rows) {
        builder.push_record(row.iter().map(Cell::render));
    }
    let table_str = builder.build().with(Style::markdown()).to_string();
    println!("{}", table_str);
    if sheet.rows.len() > max_rows {
        println!("({} more rows)", sheet.rows.len() - max_rows);
    }
    println!();
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::Status;

    fn sheet() -> Sheet {
        Sheet {
            name: "Office Compliance".to_string(),
            headers: vec!["Office".to_string(), "Entries".to_string(), "Finger %".to_string(), "Finger Status".to_string()],
            rows: vec![
                vec![Cell::Text("Dayton".to_string()), Cell::Count(3), Cell::Percent(Some(0.5)), Cell::Status(Some(Status::Critical))],
                vec![Cell::Text("Empty".to_string()), Cell::Count(0), Cell::Percent(None), Cell::Status(None)],
            ],
        }
    }

    #[test]
    fn csv_sheet_has_header_and_rendered_cells() {
        let path = std::env::temp_dir().join(format!("bstt_sheet_test_{}.csv", std::process::id()));
        write_sheet_csv(&path, &sheet()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Office,Entries,Finger %,Finger Status");
        assert_eq!(lines[1], "Dayton,3,50.00%,Critical");
        assert_eq!(lines[2], "Empty,0,N/A,N/A");
    }

    #[test]
    fn workbook_serializes_to_zip_bytes() {
        let report = Report { sheets: vec![sheet()] };
        let bytes = report_to_xlsx_bytes(&report).unwrap();
        // xlsx files are zip archives.
        assert_eq!(&bytes[..2], b"PK");
    }
}
