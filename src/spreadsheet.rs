use crate::cell::CellValue;
use serde::{Deserialize, Serialize};

/// One column header: a part per header row, `None` where the cell was blank
pub type HeaderTuple = Vec<Option<String>>;

/// A table as it comes out of the spreadsheet, before any schema is applied
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<HeaderTuple>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    /// Splits a grid of cells into header rows and data rows
    ///
    /// With two header rows the headers are completed the way merged header
    /// groups read in a spreadsheet: a blank upper cell continues the group
    /// to its left, and a blank lower cell gets an `Unnamed: <col>_level_1`
    /// placeholder so every column keeps a unique flattened name.
    pub fn from_grid(grid: Vec<Vec<CellValue>>, header_rows: usize) -> Self {
        let width = grid.iter().map(|r| r.len()).max().unwrap_or(0);
        let mut grid = grid.into_iter();

        let header_grid: Vec<Vec<Option<String>>> = (0..header_rows)
            .map(|_| {
                let row = grid.next().unwrap_or_default();
                (0..width)
                    .map(|c| row.get(c).and_then(CellValue::as_string))
                    .collect()
            })
            .collect();

        let headers = if header_rows >= 2 {
            complete_multi_row_headers(&header_grid, width)
        } else {
            (0..width)
                .map(|c| header_grid.iter().map(|row| row[c].clone()).collect())
                .collect()
        };

        let rows = grid
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .map(|mut row| {
                row.resize(width, CellValue::Empty);
                row
            })
            .collect();

        RawTable { headers, rows }
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    /// Flattened header names, in column order
    pub fn flattened_headers(&self) -> Vec<String> {
        self.headers.iter().map(|h| flatten_header(h)).collect()
    }

    /// Index of the column whose flattened header equals `name` exactly
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| flatten_header(h) == name)
    }
}

/// Joins the non-null parts of a header tuple with `_`
///
/// Each part is trimmed and its embedded spaces become `_`.
pub fn flatten_header(parts: &[Option<String>]) -> String {
    parts
        .iter()
        .flatten()
        .map(|part| part.trim().replace(' ', "_"))
        .collect::<Vec<_>>()
        .join("_")
}

fn complete_multi_row_headers(header_grid: &[Vec<Option<String>>], width: usize) -> Vec<HeaderTuple> {
    let last = header_grid.len() - 1;
    let mut carried: Vec<Option<String>> = vec![None; last];
    let mut headers = Vec::with_capacity(width);

    for c in 0..width {
        let mut tuple = Vec::with_capacity(header_grid.len());
        for (level, row) in header_grid.iter().enumerate() {
            let part = match &row[c] {
                Some(value) => {
                    if level < last {
                        carried[level] = Some(value.clone());
                    }
                    value.clone()
                }
                None if level < last => carried[level]
                    .clone()
                    .unwrap_or_else(|| unnamed(c, level)),
                None => unnamed(c, level),
            };
            tuple.push(Some(part));
        }
        headers.push(tuple);
    }
    headers
}

fn unnamed(col: usize, level: usize) -> String {
    format!("Unnamed: {}_level_{}", col, level)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<CellValue> {
        cells.iter().map(|c| CellValue::text(*c)).collect()
    }

    #[test]
    fn flatten_joins_trimmed_parts() {
        let parts = vec![Some(" Overlay ID ".to_string()), None, Some("x".into())];
        assert_eq!(flatten_header(&parts), "Overlay_ID_x");
    }

    #[test]
    fn single_header_row() {
        let table = RawTable::from_grid(
            vec![row(&["Overlay ID", "Source"]), row(&["OV1", "AppA"])],
            1,
        );
        assert_eq!(table.flattened_headers(), vec!["Overlay_ID", "Source"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.column_index("Source"), Some(1));
    }

    #[test]
    fn two_header_rows_fill_groups_and_placeholders() {
        let table = RawTable::from_grid(
            vec![
                row(&["", "", "", "Overlay ID", "Applications", ""]),
                row(&["", "", "", "", "Source", "Destination"]),
                row(&["a", "b", "c", "OV1", "AppA", "AppZ"]),
            ],
            2,
        );
        let headers = table.flattened_headers();
        assert_eq!(headers[0], "Unnamed:_0_level_0_Unnamed:_0_level_1");
        assert_eq!(headers[3], "Overlay_ID_Unnamed:_3_level_1");
        assert_eq!(headers[4], "Applications_Source");
        assert_eq!(headers[5], "Applications_Destination");
    }

    #[test]
    fn short_and_blank_rows() {
        let table = RawTable::from_grid(
            vec![row(&["A", "B", "C"]), row(&["1"]), row(&["", "", ""])],
            1,
        );
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].len(), 3);
        assert!(table.rows[0][2].is_empty());
    }
}
