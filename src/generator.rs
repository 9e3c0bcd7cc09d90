// ABOUTME: Content generator client for the carousel pipeline
// ABOUTME: Calls the remote generation backend and classifies its loosely typed responses

use crate::errors::{GenerationError, PipelineError, Result};
use crate::model::ContentPayload;
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde_json::{json, Map, Value};

/// Everything the generation backend needs for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    pub content_ref: String,
    pub template_id: String,
    pub auth_token: Option<String>,
    /// Id of the source record (feed post) the content came from.
    pub source_id: Option<u64>,
    /// Full source item for content the backend cannot look up by reference
    /// (news articles, website links, chat output).
    pub rich_payload: Option<Value>,
}

impl GenerationRequest {
    pub fn new(content_ref: impl Into<String>, template_id: impl Into<String>) -> Self {
        Self {
            content_ref: content_ref.into(),
            template_id: template_id.into(),
            ..Self::default()
        }
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    pub fn with_source_id(mut self, source_id: u64) -> Self {
        self.source_id = Some(source_id);
        self
    }

    pub fn with_rich_payload(mut self, payload: Value) -> Self {
        self.rich_payload = Some(payload);
        self
    }
}

/// The remote content-generation backend.
///
/// Resolves to the raw response body (`None` when the backend answered with
/// nothing), or fails with a transport-level error.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<Value>>;
}

/// A validated generator result.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedContent {
    pub content: ContentPayload,
    /// Backend record id, when the response carries one.
    pub backend_id: Option<u64>,
}

/// Classify a raw generator response.
///
/// A non-array value counts as a one-element result; only the first element
/// is used.
pub fn classify_response(
    response: Option<Value>,
) -> std::result::Result<GeneratedContent, GenerationError> {
    let first = match response {
        None | Some(Value::Null) => return Err(GenerationError::EmptyResponse),
        Some(Value::Array(items)) => match items.into_iter().next() {
            Some(item) => item,
            None => return Err(GenerationError::EmptyArray),
        },
        Some(other) => other,
    };

    let Value::Object(record) = first else {
        return Err(GenerationError::MalformedPayload(
            "result is not an object".to_string(),
        ));
    };

    let general_info = record
        .get("generalInfo")
        .or_else(|| record.get("dados_gerais"));
    match general_info {
        Some(Value::Object(info)) if has_template_id(info) => {}
        Some(Value::Object(_)) => {
            return Err(GenerationError::MalformedPayload(
                "general info has no template id".to_string(),
            ))
        }
        _ => {
            return Err(GenerationError::MalformedPayload(
                "missing general info".to_string(),
            ))
        }
    }

    let backend_id = extract_backend_id(&record);
    let content: ContentPayload = serde_json::from_value(Value::Object(record))
        .map_err(|e| GenerationError::MalformedPayload(e.to_string()))?;

    Ok(GeneratedContent {
        content,
        backend_id,
    })
}

fn has_template_id(info: &Map<String, Value>) -> bool {
    match info.get("template") {
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Number(_)) => true,
        _ => false,
    }
}

/// The backend names its record id differently depending on the endpoint.
fn extract_backend_id(record: &Map<String, Value>) -> Option<u64> {
    ["id", "content_id", "generated_content_id"]
        .iter()
        .filter_map(|key| record.get(*key))
        .find_map(|value| match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
}

/// Generator reached over HTTP: `POST {endpoint}` with a JSON body.
pub struct HttpContentGenerator {
    endpoint: String,
    client: Client,
}

impl HttpContentGenerator {
    /// No request timeout is set: a stalled backend leaves the job generating.
    pub fn new(endpoint: &str) -> Result<Self> {
        if endpoint.trim().is_empty() {
            return Err(PipelineError::Config(
                "generator endpoint is not configured".to_string(),
            ));
        }
        Ok(Self {
            endpoint: endpoint.to_string(),
            client: Client::builder().build()?,
        })
    }

    fn request_body(request: &GenerationRequest) -> Value {
        let mut body = json!({
            "code": request.content_ref,
            "templateId": request.template_id,
        });
        if let Some(source_id) = request.source_id {
            body["postId"] = json!(source_id);
        }
        if let Some(payload) = &request.rich_payload {
            body["newsData"] = payload.clone();
        }
        body
    }
}

#[async_trait]
impl ContentGenerator for HttpContentGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<Value>> {
        info!(
            "Requesting generation for {} with template {}",
            request.content_ref, request.template_id
        );

        let mut call = self
            .client
            .post(&self.endpoint)
            .json(&Self::request_body(request));
        if let Some(token) = &request.auth_token {
            call = call.bearer_auth(token);
        }

        let response = call.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Remote(format!(
                "generator answered HTTP {}",
                status
            )));
        }

        let body = response.text().await?;
        debug!("Generator response: {} bytes", body.len());
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&body)?))
    }
}
