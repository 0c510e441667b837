use crate::schema::{FlowRow, ResolvedTable};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How a destination query is compared against each row
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// The destination equals the query (pick-list selection)
    #[default]
    Exact,
    /// The destination contains the query, ignoring case (free text)
    Contains,
}

/// Rows whose destination matches `query`, in table order
///
/// An empty result is a normal outcome, not an error.
pub fn filter_rows<'a>(table: &'a ResolvedTable, query: &str, mode: MatchMode) -> Vec<&'a FlowRow> {
    match mode {
        MatchMode::Exact => table
            .rows
            .iter()
            .filter(|row| row.destination.as_deref() == Some(query))
            .collect(),
        MatchMode::Contains => {
            // The escaped pattern is always valid
            let Ok(pattern) = RegexBuilder::new(&regex::escape(query))
                .case_insensitive(true)
                .build()
            else {
                return Vec::new();
            };
            table
                .rows
                .iter()
                .filter(|row| {
                    row.destination
                        .as_deref()
                        .is_some_and(|dest| pattern.is_match(dest))
                })
                .collect()
        }
    }
}

/// Distinct non-null destinations, sorted ascending
pub fn distinct_destinations(table: &ResolvedTable) -> Vec<String> {
    table
        .rows
        .iter()
        .filter_map(|row| row.destination.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
