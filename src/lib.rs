/*!
# SD-WAN Flow Visualizer

Turns a spreadsheet export of SD-WAN routing configuration into an
interactive directed graph of how traffic for one destination application
flows: source application → overlay tunnel → underlay circuit(s) → next hops.

## Pipeline

1. **Loader** - reads the first sheet of an `.xlsx`/`.xls`/`.csv` file with one
   or two stacked header rows into a [`RawTable`].
2. **Schema Resolver** - flattens the headers and maps them onto canonical
   fields using a [`SchemaSpec`]; reports every missing required field at once.
3. **Row Filter** - keeps the rows whose destination equals the query, or
   contains it ignoring case.
4. **Graph Builder** - walks the matches in order and builds a [`FlowGraph`]
   with one node per distinct entity string (first role wins).
5. **Render Sinks** - interactive vis-network HTML, JSON or Graphviz DOT.

## Schema presets

- `dual-underlay` - two header rows, two underlay circuits, the layout of the
  provisioning export
- `single-underlay` - one header row, one underlay circuit
- `destination-node` - single underlay, destination drawn as a node

Custom layouts are JSON files with the same structure as [`SchemaSpec`].

## Binaries

- `sdwan-flow` - command-line tool
- `sdwan-flow-web` - upload web app (feature `web`)

## Modules

- **cell**: typed cell values and their string form
- **spreadsheet**: raw table and header flattening
- **loader**: xlsx and csv reading
- **schema**: canonical fields, presets and resolution
- **filter**: destination matching
- **flow**: graph construction
- **render**: HTML, JSON and DOT sinks
- **details**: transposed detail view of the matches
- **downloader**: detail view export (CSV, XLSX)
- **pipeline**: load, query and build in one place
- **app**: web routes (feature `web`)
*/

#[cfg(feature = "web")]
pub mod app;
pub mod cell;
pub mod details;
pub mod downloader;
pub mod error;
pub mod filter;
pub mod flow;
pub mod loader;
pub mod pipeline;
pub mod render;
pub mod schema;
pub mod spreadsheet;

pub use cell::CellValue;
pub use details::DetailView;
pub use error::{FlowError, Result};
pub use filter::{MatchMode, distinct_destinations, filter_rows};
pub use flow::{BuildOptions, Edge, FlowGraph, MissingOverlay, Node, NodeRole, build_graph};
pub use pipeline::{FlowOutcome, FlowQuery, FlowReport, load_table, run_query};
pub use render::{HtmlSink, RenderFormat, RenderOptions, RenderSink, render_artifact};
pub use schema::{CanonicalField, FlowRow, Priority, ResolvedTable, SchemaSpec, resolve};
pub use spreadsheet::RawTable;
