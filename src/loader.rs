use crate::cell::CellValue;
use crate::error::{FlowError, Result};
use crate::spreadsheet::RawTable;
use calamine::{Data, Reader, open_workbook_auto, open_workbook_auto_from_rs};
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read, Seek};
use std::path::Path;

/// Load a table from a CSV file
///
/// The first `header_rows` lines are treated as header rows, the remaining
/// records as data. Quoted fields may contain commas, doubled quotes and
/// line breaks. A leading UTF-8 byte order mark is dropped.
///
/// # Examples
/// ```no_run
/// use sdwan_flow::loader::from_csv;
///
/// match from_csv("routes.csv", 1) {
///     Ok(table) => println!("Loaded {} rows", table.rows.len()),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn from_csv(filepath: impl AsRef<Path>, header_rows: usize) -> Result<RawTable> {
    let file = File::open(filepath)?;
    csv_from_reader(BufReader::new(file), header_rows)
}

fn csv_from_reader(reader: impl BufRead, header_rows: usize) -> Result<RawTable> {
    let mut lines: Vec<String> = reader.lines().collect::<std::result::Result<_, _>>()?;
    if let Some(first) = lines.first_mut() {
        if first.starts_with('\u{feff}') {
            first.remove(0);
        }
    }

    if lines.is_empty() {
        return Err(FlowError::load("CSV file is empty"));
    }

    let grid = csv_records(&lines)
        .iter()
        .map(|record| {
            parse_csv_row(record)
                .iter()
                .map(|field| CellValue::parse(field))
                .collect()
        })
        .collect();

    Ok(RawTable::from_grid(grid, header_rows))
}

// Join lines back together while a quoted field is still open
fn csv_records(lines: &[String]) -> Vec<String> {
    let mut records = Vec::new();
    let mut pending: Option<String> = None;

    for line in lines {
        let line = line.trim_end_matches('\r');
        let record = match pending.take() {
            Some(mut open) => {
                open.push('\n');
                open.push_str(line);
                open
            }
            None => line.to_string(),
        };
        if record.matches('"').count() % 2 == 1 {
            pending = Some(record);
        } else {
            records.push(record);
        }
    }
    records.extend(pending);
    records
}

/// Load a table from the first worksheet of an Excel workbook
///
/// # Examples
/// ```no_run
/// use sdwan_flow::loader::from_excel;
///
/// match from_excel("routes.xlsx", 2) {
///     Ok(table) => println!("Loaded {} columns", table.width()),
///     Err(e) => eprintln!("Error loading Excel: {}", e),
/// }
/// ```
pub fn from_excel(filepath: impl AsRef<Path>, header_rows: usize) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(filepath)?;
    first_sheet_table(&mut workbook, header_rows)
}

fn first_sheet_table<RS: Read + Seek>(
    workbook: &mut calamine::Sheets<RS>,
    header_rows: usize,
) -> Result<RawTable> {
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| FlowError::load("No sheets found in Excel file"))?;

    let range = workbook.worksheet_range(&sheet_name)?;
    if range.is_empty() {
        return Err(FlowError::load("Excel sheet is empty"));
    }
    debug!(
        "reading sheet '{}' ({} rows x {} cols)",
        sheet_name,
        range.height(),
        range.width()
    );

    // The range starts at the first used cell; pad back to A1 so column
    // positions match the sheet.
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut grid: Vec<Vec<CellValue>> = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; col_offset];
        cells.extend(row.iter().map(cell_from_excel));
        grid.push(cells);
    }

    Ok(RawTable::from_grid(grid, header_rows))
}

fn cell_from_excel(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::String(s) => CellValue::text(s.as_str()),
        Data::Error(_) => CellValue::Empty,
        other => CellValue::text(other.to_string()),
    }
}

// Parse a CSV row into a vector of strings
fn parse_csv_row(line: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    // Doubled quote inside a quoted field
                    current_field.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                result.push(std::mem::take(&mut current_field));
            }
            _ => current_field.push(c),
        }
    }

    result.push(current_field);
    result
}

/// Detect file type and load appropriate format
///
/// # Examples
/// ```no_run
/// use sdwan_flow::loader::load_spreadsheet;
///
/// match load_spreadsheet("routes.xlsx", 2) {
///     Ok(table) => println!("Successfully loaded {} rows", table.rows.len()),
///     Err(e) => eprintln!("Error loading file: {}", e),
/// }
/// ```
pub fn load_spreadsheet(filepath: impl AsRef<Path>, header_rows: usize) -> Result<RawTable> {
    let path = filepath.as_ref();
    check_header_rows(header_rows)?;

    match extension_of(path.to_str().unwrap_or_default()).as_deref() {
        Some("csv") => from_csv(path, header_rows),
        Some("xlsx") | Some("xlsm") | Some("xls") | Some("ods") => from_excel(path, header_rows),
        Some(ext) => Err(FlowError::load(format!("Unsupported file extension: {}", ext))),
        None => Err(FlowError::load("File has no extension")),
    }
}

/// Load an uploaded file held in memory; `filename` only selects the format
pub fn load_from_bytes(filename: &str, bytes: Vec<u8>, header_rows: usize) -> Result<RawTable> {
    check_header_rows(header_rows)?;

    match extension_of(filename).as_deref() {
        Some("csv") => csv_from_reader(Cursor::new(bytes), header_rows),
        Some("xlsx") | Some("xlsm") | Some("xls") | Some("ods") => {
            let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
            first_sheet_table(&mut workbook, header_rows)
        }
        Some(ext) => Err(FlowError::load(format!("Unsupported file extension: {}", ext))),
        None => Err(FlowError::load("File has no extension")),
    }
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

fn check_header_rows(header_rows: usize) -> Result<()> {
    if header_rows == 1 || header_rows == 2 {
        Ok(())
    } else {
        Err(FlowError::load(format!(
            "Header rows must be 1 or 2, got {}",
            header_rows
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn csv_row_quoting() {
        assert_eq!(parse_csv_row(r#"a,"b,c","d""e""#), vec!["a", "b,c", "d\"e"]);
        assert_eq!(parse_csv_row("a,,"), vec!["a", "", ""]);
    }

    #[test]
    fn loads_csv_file() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "Source,Destination\r\nAppA,AppZ\r\n,").unwrap();

        let table = load_spreadsheet(file.path(), 1).unwrap();
        assert_eq!(table.flattened_headers(), vec!["Source", "Destination"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][1], CellValue::Text("AppZ".into()));
    }

    #[test]
    fn rejects_unknown_extension_and_header_rows() {
        assert!(load_from_bytes("routes.txt", Vec::new(), 1).is_err());
        assert!(load_from_bytes("routes.csv", b"a\n1\n".to_vec(), 3).is_err());
        let table = load_from_bytes("ROUTES.CSV", b"a\n1\n".to_vec(), 1).unwrap();
        assert_eq!(table.rows[0][0], CellValue::Int(1));
    }

    #[test]
    fn quoted_field_spans_lines() {
        let bytes = b"Source,Notes\r\nAppA,\"first\r\nsecond\"\r\nAppB,plain\r\n".to_vec();
        let table = load_from_bytes("notes.csv", bytes, 1).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][1], CellValue::Text("first\nsecond".into()));
        assert_eq!(table.rows[1][0], CellValue::Text("AppB".into()));
    }

    #[test]
    fn strips_byte_order_mark() {
        let bytes = b"\xEF\xBB\xBFSource,Destination\nAppA,AppZ\n".to_vec();
        let table = load_from_bytes("export.csv", bytes, 1).unwrap();
        assert_eq!(table.flattened_headers(), vec!["Source", "Destination"]);
    }

    #[test]
    fn csv_ids_keep_their_text() {
        let table = load_from_bytes("ids.csv", b"Id\n007\n7\n0042\n".to_vec(), 1).unwrap();
        let ids: Vec<_> = table.rows.iter().map(|r| r[0].as_string()).collect();
        assert_eq!(ids, vec![Some("007".into()), Some("7".into()), Some("0042".into())]);
    }
}
