//! Load → resolve → filter → build, as one call per step.

use crate::details::DetailView;
use crate::error::Result;
use crate::filter::{MatchMode, filter_rows};
use crate::flow::{BuildOptions, FlowGraph, build_graph};
use crate::loader;
use crate::schema::{ResolvedTable, SchemaSpec, resolve};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One destination query
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowQuery {
    pub value: String,
    #[serde(default)]
    pub mode: MatchMode,
}

impl FlowQuery {
    pub fn exact(value: impl Into<String>) -> Self {
        FlowQuery {
            value: value.into(),
            mode: MatchMode::Exact,
        }
    }

    pub fn contains(value: impl Into<String>) -> Self {
        FlowQuery {
            value: value.into(),
            mode: MatchMode::Contains,
        }
    }
}

/// Everything produced for a query that matched
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlowReport {
    pub query: FlowQuery,
    pub matched: usize,
    pub graph: FlowGraph,
    pub details: DetailView,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FlowOutcome {
    Rendered(FlowReport),
    /// Nothing matched; callers report this as a warning
    NoMatch { query: FlowQuery },
}

/// Loads `path` and resolves it against `schema`
///
/// `header_rows` overrides the schema's own header row count.
pub fn load_table(
    path: impl AsRef<Path>,
    schema: &SchemaSpec,
    header_rows: Option<usize>,
) -> Result<ResolvedTable> {
    let path = path.as_ref();
    let raw = loader::load_spreadsheet(path, header_rows.unwrap_or(schema.header_rows))?;
    let table = resolve(&raw, schema)?;
    info!(
        "loaded {} rows from {} using schema '{}'",
        table.rows.len(),
        path.display(),
        schema.name
    );
    Ok(table)
}

/// Same as [`load_table`] for an upload held in memory
pub fn load_table_from_bytes(
    filename: &str,
    bytes: Vec<u8>,
    schema: &SchemaSpec,
    header_rows: Option<usize>,
) -> Result<ResolvedTable> {
    let raw = loader::load_from_bytes(filename, bytes, header_rows.unwrap_or(schema.header_rows))?;
    resolve(&raw, schema)
}

/// Filters `table` by the query and builds the graph for the matches
pub fn run_query(table: &ResolvedTable, query: &FlowQuery, options: &BuildOptions) -> FlowOutcome {
    let rows = filter_rows(table, &query.value, query.mode);
    if rows.is_empty() {
        warn!("No matching destination found for '{}'", query.value);
        return FlowOutcome::NoMatch {
            query: query.clone(),
        };
    }

    let options = BuildOptions {
        destination_node: options.destination_node || table.schema.destination_node,
        ..options.clone()
    };
    let graph = build_graph(rows.iter().copied(), table.underlay_slots(), &options);
    info!(
        "'{}' matched {} rows: {} nodes, {} edges",
        query.value,
        rows.len(),
        graph.node_count(),
        graph.edge_count()
    );

    FlowOutcome::Rendered(FlowReport {
        query: query.clone(),
        matched: rows.len(),
        details: DetailView::new(table, &rows),
        graph,
    })
}
