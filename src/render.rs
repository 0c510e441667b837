//! Render sinks for a [`FlowGraph`]
//!
//! The interactive HTML page is the main artifact; JSON and Graphviz DOT are
//! offered for tooling. Every sink writes to a writer, and
//! [`render_artifact`] runs a sink through a scoped temporary file the way a
//! file-producing renderer is driven.

use crate::details::DetailView;
use crate::error::{FlowError, Result};
use crate::flow::FlowGraph;
use handlebars::Handlebars;
use lazy_static::lazy_static;
use log::debug;
use serde_json::{Value, json};
use std::io::Write;
use std::str::FromStr;

lazy_static! {
    static ref TEMPLATES: Handlebars<'static> = {
        let mut registry = Handlebars::new();
        registry
            .register_template_string("flow", include_str!("./static/flow.hbs"))
            .expect("flow template parses");
        registry
    };
}

/// Output formats supported by the command-line tool
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderFormat {
    /// Interactive vis-network page
    #[default]
    Html,
    Json,
    Dot,
}

impl FromStr for RenderFormat {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "html" => Ok(RenderFormat::Html),
            "json" => Ok(RenderFormat::Json),
            "dot" => Ok(RenderFormat::Dot),
            other => Err(FlowError::load(format!("Unknown output format: {}", other))),
        }
    }
}

/// Page settings for the HTML artifact
#[derive(Clone, Debug)]
pub struct RenderOptions {
    /// Title shown at the top of the page
    pub title: String,

    /// Fixed height of the scrollable graph viewport, in pixels
    pub height: u32,

    /// CSS width of the viewport
    pub width: String,

    /// Run the barnes-hut force simulation
    pub physics: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            title: "SD-WAN Flow".to_string(),
            height: 750,
            width: "100%".to_string(),
            physics: true,
        }
    }
}

/// Something that turns a graph into an artifact
pub trait RenderSink {
    /// File suffix of the artifact, including the dot
    fn extension(&self) -> &'static str;

    fn write(&self, graph: &FlowGraph, out: &mut dyn Write) -> Result<()>;

    fn render_to_string(&self, graph: &FlowGraph) -> Result<String> {
        let mut buffer = Vec::new();
        self.write(graph, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| FlowError::load(e.to_string()))
    }
}

/// Writes the artifact to a temporary file, reads it back and removes it
///
/// The file is deleted when this returns, on the error paths as well.
pub fn render_artifact(sink: &dyn RenderSink, graph: &FlowGraph) -> Result<String> {
    let mut file = tempfile::Builder::new()
        .prefix("sdwan-flow-")
        .suffix(sink.extension())
        .tempfile()?;
    debug!("rendering to {}", file.path().display());

    sink.write(graph, file.as_file_mut())?;
    file.as_file_mut().flush()?;
    let content = std::fs::read_to_string(file.path())?;
    file.close()?;
    Ok(content)
}

/// Builds the sink for `format`
pub fn sink_for(format: RenderFormat, options: RenderOptions, details: Option<DetailView>) -> Box<dyn RenderSink> {
    match format {
        RenderFormat::Html => Box::new(HtmlSink { options, details }),
        RenderFormat::Json => Box::new(JsonSink),
        RenderFormat::Dot => Box::new(DotSink),
    }
}

/// Interactive directed graph page, optionally followed by the detail table
#[derive(Clone, Debug, Default)]
pub struct HtmlSink {
    pub options: RenderOptions,
    pub details: Option<DetailView>,
}

impl HtmlSink {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            details: None,
        }
    }

    pub fn with_details(mut self, details: DetailView) -> Self {
        self.details = Some(details);
        self
    }

    fn network_options(&self) -> Value {
        json!({
            "edges": {
                "arrows": { "to": { "enabled": true } },
                "font": { "align": "middle", "size": 11 },
                "smooth": { "type": "dynamic" }
            },
            "nodes": { "shape": "dot", "size": 16 },
            "interaction": { "hover": true, "tooltipDelay": 150 },
            "physics": {
                "enabled": self.options.physics,
                "solver": "barnesHut",
                "barnesHut": {
                    "gravitationalConstant": -80000,
                    "centralGravity": 0.3,
                    "springLength": 250,
                    "springConstant": 0.001,
                    "damping": 0.09,
                    "avoidOverlap": 0
                },
                "stabilization": { "iterations": 1000 }
            }
        })
    }
}

impl RenderSink for HtmlSink {
    fn extension(&self) -> &'static str {
        ".html"
    }

    fn write(&self, graph: &FlowGraph, out: &mut dyn Write) -> Result<()> {
        let nodes: Vec<Value> = graph
            .nodes()
            .map(|node| {
                let mut value = json!({
                    "id": node.id,
                    "label": node.label,
                    "color": node.color,
                });
                if let Some(tooltip) = &node.tooltip {
                    value["title"] = json!(tooltip);
                }
                value
            })
            .collect();
        let edges: Vec<Value> = graph
            .edges()
            .iter()
            .map(|edge| {
                let mut value = json!({
                    "from": edge.from,
                    "to": edge.to,
                    "label": edge.label,
                    "arrows": "to",
                });
                if let Some(color) = &edge.color {
                    value["color"] = json!(color);
                }
                value
            })
            .collect();

        let data = json!({
            "title": self.options.title,
            "height": self.options.height,
            "width": self.options.width,
            "nodes_json": script_json(&Value::Array(nodes))?,
            "edges_json": script_json(&Value::Array(edges))?,
            "options_json": script_json(&self.network_options())?,
            "details": self.details,
            "node_count": graph.node_count(),
            "edge_count": graph.edge_count(),
            "generated_at": chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        });

        TEMPLATES.render_to_write("flow", &data, out)?;
        Ok(())
    }
}

// JSON embedded in a <script> block must not close the tag early
fn script_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

/// The graph as pretty-printed JSON
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSink;

impl RenderSink for JsonSink {
    fn extension(&self) -> &'static str {
        ".json"
    }

    fn write(&self, graph: &FlowGraph, out: &mut dyn Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, graph)?;
        out.write_all(b"\n")?;
        Ok(())
    }
}

/// Graphviz digraph, laid out left to right
#[derive(Clone, Copy, Debug, Default)]
pub struct DotSink;

impl RenderSink for DotSink {
    fn extension(&self) -> &'static str {
        ".dot"
    }

    fn write(&self, graph: &FlowGraph, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "digraph flow {{")?;
        writeln!(out, "  rankdir=LR;")?;
        writeln!(out, "  node [shape=box, style=filled, fontcolor=white];")?;
        for node in graph.nodes() {
            write!(
                out,
                "  {} [label={}, fillcolor={}",
                dot_quote(&node.id),
                dot_quote(&node.label),
                dot_quote(&node.color)
            )?;
            if let Some(tooltip) = &node.tooltip {
                write!(out, ", tooltip={}", dot_quote(tooltip))?;
            }
            writeln!(out, "];")?;
        }
        for edge in graph.edges() {
            write!(
                out,
                "  {} -> {} [label={}",
                dot_quote(&edge.from),
                dot_quote(&edge.to),
                dot_quote(&edge.label)
            )?;
            if let Some(color) = &edge.color {
                write!(out, ", color={}", dot_quote(color))?;
            }
            writeln!(out, "];")?;
        }
        writeln!(out, "}}")?;
        Ok(())
    }
}

fn dot_quote(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("\"{}\"", escaped)
}
