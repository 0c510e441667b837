/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors raised while loading, resolving or rendering a routing table
///
/// A destination query that matches nothing is not an error; see
/// [`crate::pipeline::FlowOutcome::NoMatch`].
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// One or more required canonical fields have no matching column
    #[error("Missing columns in uploaded file: {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("Unknown schema preset: {name}")]
    UnknownSchema { name: String },

    #[error("Invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("Failed to load spreadsheet: {message}")]
    Load { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Excel error: {0}")]
    Excel(#[from] calamine::Error),

    #[error("XLSX export error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("Template error: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlowError {
    pub(crate) fn load(message: impl Into<String>) -> Self {
        FlowError::Load {
            message: message.into(),
        }
    }

    /// Names of the missing canonical fields, if this is a schema mismatch
    pub fn missing_fields(&self) -> Option<&[String]> {
        match self {
            FlowError::SchemaMismatch { missing } => Some(missing),
            _ => None,
        }
    }
}
