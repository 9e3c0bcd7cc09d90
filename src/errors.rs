// ABOUTME: Error types for the carousel pipeline
// ABOUTME: Separates per-job generation failures from crate-wide errors

use thiserror::Error;

/// Terminal failure of a single generation job.
///
/// The display text of each variant becomes the job's `error_message`, so
/// every variant must read differently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Generator request failed: {0}")]
    Transport(String),

    #[error("Generator returned an empty response")]
    EmptyResponse,

    #[error("Generator returned no results")]
    EmptyArray,

    #[error("Generator returned an invalid payload: {0}")]
    MalformedPayload(String),

    #[error("Template {template_id} is unavailable: {reason}")]
    TemplateUnavailable { template_id: String, reason: String },

    #[error("Slide rendering failed: {0}")]
    Render(String),

    #[error("Failed to store the result in the gallery: {0}")]
    Storage(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to access file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to fetch remote resource: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid resource location: {0}")]
    InvalidResource(String),

    #[error("Remote request failed: {0}")]
    Remote(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Entry {0} has no backend id and cannot be deleted")]
    NotDeletable(String),

    #[error("Entry {0} only has prerendered slides and cannot be edited")]
    NotEditable(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Unknown(err.to_string())
    }
}

impl From<url::ParseError> for PipelineError {
    fn from(err: url::ParseError) -> Self {
        PipelineError::InvalidResource(format!("URL parse failed: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
