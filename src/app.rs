use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use indexmap::IndexMap;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::details::DetailView;
use crate::error::FlowError;
use crate::filter::{MatchMode, distinct_destinations};
use crate::flow::{BuildOptions, MissingOverlay};
use crate::pipeline::{FlowOutcome, FlowQuery, load_table_from_bytes, run_query};
use crate::render::{HtmlSink, RenderOptions, render_artifact};
use crate::schema::{ResolvedTable, SchemaSpec};

/// Bind address used when `SDWAN_FLOW_ADDR` is not set
pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";

/// Largest accepted request body; uploads are whole workbooks
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Number of uploaded tables kept before the oldest is dropped
pub const MAX_DATASETS: usize = 32;

/// Uploaded tables, oldest first
#[derive(Default)]
pub struct AppState {
    datasets: RwLock<IndexMap<Uuid, Arc<ResolvedTable>>>,
}

impl AppState {
    fn insert(&self, table: ResolvedTable) -> Uuid {
        let id = Uuid::new_v4();
        let mut datasets = self.datasets.write().unwrap_or_else(|e| e.into_inner());
        while datasets.len() >= MAX_DATASETS {
            if let Some((evicted, _)) = datasets.shift_remove_index(0) {
                info!("dropping dataset {}", evicted);
            }
        }
        datasets.insert(id, Arc::new(table));
        id
    }

    fn get(&self, id: &Uuid) -> Option<Arc<ResolvedTable>> {
        let datasets = self.datasets.read().unwrap_or_else(|e| e.into_inner());
        datasets.get(id).cloned()
    }
}

#[derive(Serialize)]
struct UploadResponse {
    status: &'static str,
    dataset: Uuid,
    schema: String,
    rows: usize,
    destinations: Vec<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    missing: Vec<String>,
}

#[derive(Deserialize)]
struct FlowRequest {
    dataset: Uuid,
    query: String,
    #[serde(default)]
    mode: MatchMode,
    #[serde(default)]
    dedup_edges: bool,
    #[serde(default)]
    placeholder_overlay: Option<String>,
}

#[derive(Serialize)]
struct FlowResponse {
    status: &'static str,
    matched: usize,
    nodes: usize,
    edges: usize,
    html: String,
    details: DetailView,
}

#[derive(Serialize)]
struct NoMatchResponse {
    status: &'static str,
    message: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_upload_page))
        .route("/api/upload", post(upload_table))
        .route("/api/destinations/:dataset", get(get_destinations))
        .route("/api/flow", post(generate_flow))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(Arc::new(AppState::default()));

    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_upload_page() -> Html<&'static str> {
    Html(include_str!("./static/upload.html"))
}

fn error_response(status: StatusCode, error: FlowError) -> Response {
    let missing = error.missing_fields().map(<[String]>::to_vec).unwrap_or_default();
    (
        status,
        Json(ErrorResponse {
            status: "error",
            message: error.to_string(),
            missing,
        }),
    )
        .into_response()
}

fn parse_header_rows(text: &str) -> Result<usize, FlowError> {
    text.trim()
        .parse()
        .map_err(|_| FlowError::load(format!("Header rows must be 1 or 2, got '{}'", text.trim())))
}

async fn upload_table(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut file_name = String::new();
    let mut file_data = Vec::new();
    let mut schema_name = "dual-underlay".to_string();
    let mut header_rows = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return error_response(StatusCode::BAD_REQUEST, FlowError::load(e.body_text()));
            }
        };
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                file_name = field.file_name().unwrap_or("upload.xlsx").to_string();
                match field.bytes().await {
                    Ok(bytes) => file_data = bytes.to_vec(),
                    Err(e) => {
                        return error_response(StatusCode::BAD_REQUEST, FlowError::load(e.body_text()));
                    }
                }
            }
            "schema" | "header_rows" => {
                let text = field.text().await.unwrap_or_default();
                if text.trim().is_empty() {
                    continue;
                }
                if name == "schema" {
                    schema_name = text.trim().to_string();
                } else {
                    match parse_header_rows(&text) {
                        Ok(rows) => header_rows = Some(rows),
                        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
                    }
                }
            }
            _ => {}
        }
    }

    if file_data.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, FlowError::load("No file data received"));
    }

    // Uploads may only pick a preset, never a server-side path
    let schema = match SchemaSpec::preset(&schema_name) {
        Ok(schema) => schema,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    match load_table_from_bytes(&file_name, file_data, &schema, header_rows) {
        Ok(table) => {
            let destinations = distinct_destinations(&table);
            let rows = table.rows.len();
            let dataset = state.insert(table);
            info!("dataset {} from '{}': {} rows", dataset, file_name, rows);
            Json(UploadResponse {
                status: "ok",
                dataset,
                schema: schema.name,
                rows,
                destinations,
            })
            .into_response()
        }
        Err(e) => {
            warn!("upload '{}' rejected: {}", file_name, e);
            let status = match e {
                FlowError::SchemaMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::BAD_REQUEST,
            };
            error_response(status, e)
        }
    }
}

async fn get_destinations(
    Path(dataset): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.get(&dataset) {
        Some(table) => Json(distinct_destinations(&table)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn generate_flow(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FlowRequest>,
) -> Response {
    let Some(table) = state.get(&request.dataset) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let query = FlowQuery {
        value: request.query,
        mode: request.mode,
    };
    let options = BuildOptions {
        dedup_edges: request.dedup_edges,
        missing_overlay: request
            .placeholder_overlay
            .map(MissingOverlay::Placeholder)
            .unwrap_or_default(),
        destination_node: false,
    };

    let report = match run_query(&table, &query, &options) {
        FlowOutcome::Rendered(report) => report,
        FlowOutcome::NoMatch { query } => {
            return Json(NoMatchResponse {
                status: "no_match",
                message: format!("No matching destination found for '{}'", query.value),
            })
            .into_response();
        }
    };

    let sink = HtmlSink::new(RenderOptions {
        title: format!("Flow for destination: {}", query.value),
        ..RenderOptions::default()
    });
    match render_artifact(&sink, &report.graph) {
        Ok(html) => Json(FlowResponse {
            status: "ok",
            matched: report.matched,
            nodes: report.graph.node_count(),
            edges: report.graph.edge_count(),
            html,
            details: report.details,
        })
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}
