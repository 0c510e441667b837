use crate::schema::{CanonicalField, FlowRow, Priority, ResolvedTable};
use serde::Serialize;

/// Transposed view of the matched rows: one line per field, one column per match
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DetailView {
    pub columns: Vec<String>,
    pub fields: Vec<DetailLine>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetailLine {
    pub field: String,
    pub header: String,
    pub values: Vec<String>,
}

/// Key fields in display order, for a table with `slots` underlay slots
fn display_fields(slots: usize) -> Vec<CanonicalField> {
    let mut fields = vec![CanonicalField::Source, CanonicalField::Overlay];
    fields.extend((1..=slots).map(CanonicalField::Underlay));
    fields.extend(Priority::ALL.map(CanonicalField::NextHop));
    fields.extend([
        CanonicalField::Policy,
        CanonicalField::Criteria,
        CanonicalField::ForwardingProfile,
        CanonicalField::TransportPrimary,
        CanonicalField::TransportSecondary,
    ]);
    fields
}

impl DetailView {
    /// Builds the view for `rows`, keeping only fields the table has a column for
    pub fn new(table: &ResolvedTable, rows: &[&FlowRow]) -> Self {
        let columns = (1..=rows.len()).map(|i| format!("Match {}", i)).collect();

        let fields = display_fields(table.underlay_slots())
            .into_iter()
            .filter_map(|field| {
                let binding = table.bindings.iter().find(|b| b.field == field)?;
                Some(DetailLine {
                    field: field.to_string(),
                    header: binding.header.clone(),
                    values: rows
                        .iter()
                        .map(|row| row.get(field).unwrap_or_default().to_string())
                        .collect(),
                })
            })
            .collect();

        DetailView { columns, fields }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Plain-text rendering with padded columns, for terminals
    pub fn to_text(&self) -> String {
        let label_width = self
            .fields
            .iter()
            .map(|l| l.header.chars().count())
            .max()
            .unwrap_or(0);
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(c, name)| {
                self.fields
                    .iter()
                    .map(|l| l.values[c].chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        out.push_str(&format!("{:label_width$}", ""));
        for (name, width) in self.columns.iter().zip(&widths) {
            out.push_str(&format!("  {:width$}", name, width = *width));
        }
        out.push('\n');
        for line in &self.fields {
            out.push_str(&format!("{:label_width$}", line.header));
            for (value, width) in line.values.iter().zip(&widths) {
                out.push_str(&format!("  {:width$}", value, width = *width));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellValue;
    use crate::schema::{SchemaSpec, resolve};
    use crate::spreadsheet::RawTable;

    fn resolved() -> ResolvedTable {
        let headers = ["Source", "Destination", "Overlay ID", "Underlay CID", "Next Hop Primary", "Criteria"];
        let rows = [
            ["AppA", "AppZ", "OV1", "U1", "GW1", "dscp 46"],
            ["AppB", "AppZ", "OV2", "U2", "", ""],
        ];
        let raw = RawTable {
            headers: headers.iter().map(|h| vec![Some(h.to_string())]).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| CellValue::text(*c)).collect())
                .collect(),
        };
        resolve(&raw, &SchemaSpec::single_underlay()).unwrap()
    }

    #[test]
    fn transposes_bound_fields() {
        let table = resolved();
        let rows: Vec<&FlowRow> = table.rows.iter().collect();
        let view = DetailView::new(&table, &rows);

        assert_eq!(view.columns, vec!["Match 1", "Match 2"]);
        let headers: Vec<_> = view.fields.iter().map(|l| l.header.as_str()).collect();
        assert_eq!(
            headers,
            vec!["Source", "Overlay_ID", "Underlay_CID", "Next_Hop_Primary", "Criteria"]
        );
        assert_eq!(view.fields[3].values, vec!["GW1", ""]);
    }

    #[test]
    fn text_rendering_aligns_columns() {
        let table = resolved();
        let rows: Vec<&FlowRow> = table.rows.iter().take(1).collect();
        let text = DetailView::new(&table, &rows).to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[1].starts_with(&format!("{:16}  AppA", "Source")));
    }
}
