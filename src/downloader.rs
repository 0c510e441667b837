use crate::details::DetailView;
use crate::error::{FlowError, Result};
use std::path::Path;

/// Convert a detail view to CSV
///
/// The first row holds the match column names, each following row one field
/// (its source header first). Commas, quotes and newlines are escaped.
///
/// # Examples
/// ```
/// use sdwan_flow::details::DetailView;
/// use sdwan_flow::downloader::to_csv;
///
/// let csv = to_csv(&DetailView::default());
/// assert_eq!(csv, "Field\n");
/// ```
pub fn to_csv(view: &DetailView) -> String {
    let mut csv_content = String::new();

    csv_content.push_str("Field");
    for column in &view.columns {
        csv_content.push(',');
        csv_content.push_str(&csv_escape(column));
    }
    csv_content.push('\n');

    for line in &view.fields {
        csv_content.push_str(&csv_escape(&line.header));
        for value in &line.values {
            csv_content.push(',');
            csv_content.push_str(&csv_escape(value));
        }
        csv_content.push('\n');
    }

    csv_content
}

fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Convert a detail view to an XLSX workbook held in memory
pub fn to_xlsx(view: &DetailView) -> Result<Vec<u8>> {
    use rust_xlsxwriter::{Format, Workbook};

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Details")?;

    worksheet.write_string_with_format(0, 0, "Field", &bold)?;
    for (c, column) in view.columns.iter().enumerate() {
        worksheet.write_string_with_format(0, (c + 1) as u16, column, &bold)?;
    }

    for (r, line) in view.fields.iter().enumerate() {
        let row = (r + 1) as u32;
        worksheet.write_string_with_format(row, 0, &line.header, &bold)?;
        for (c, value) in line.values.iter().enumerate() {
            worksheet.write_string(row, (c + 1) as u16, value)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Write the detail view to `path`, choosing CSV or XLSX by extension
pub fn save_details(view: &DetailView, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("csv") => std::fs::write(path, to_csv(view))?,
        Some("xlsx") => std::fs::write(path, to_xlsx(view)?)?,
        Some(ext) => {
            return Err(FlowError::load(format!(
                "Unsupported details extension: {}",
                ext
            )));
        }
        None => return Err(FlowError::load("Details path has no extension")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::details::DetailLine;

    fn view() -> DetailView {
        DetailView {
            columns: vec!["Match 1".into(), "Match 2".into()],
            fields: vec![
                DetailLine {
                    field: "source".into(),
                    header: "Applications_Source".into(),
                    values: vec!["AppA".into(), "App, B".into()],
                },
                DetailLine {
                    field: "policy".into(),
                    header: "SDWAN_policy".into(),
                    values: vec!["say \"hi\"".into(), "".into()],
                },
            ],
        }
    }

    #[test]
    fn csv_escapes_fields() {
        assert_eq!(
            to_csv(&view()),
            "Field,Match 1,Match 2\nApplications_Source,AppA,\"App, B\"\nSDWAN_policy,\"say \"\"hi\"\"\",\n"
        );
    }

    #[test]
    fn xlsx_is_a_zip_archive() {
        let bytes = to_xlsx(&view()).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn save_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        save_details(&view(), dir.path().join("d.csv")).unwrap();
        save_details(&view(), dir.path().join("d.XLSX")).unwrap();
        assert!(save_details(&view(), dir.path().join("d.pdf")).is_err());
        assert!(dir.path().join("d.csv").exists());
    }
}
