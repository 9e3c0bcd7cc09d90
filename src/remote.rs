// ABOUTME: Remote gallery client for the carousel pipeline
// ABOUTME: Lists, fetches and deletes generated content on the authoritative backend

use crate::errors::{PipelineError, Result};
use crate::model::ContentPayload;
use async_trait::async_trait;
use chrono::DateTime;
use log::{info, warn};
use reqwest::{Client, RequestBuilder};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use url::Url;

const LIST_LIMIT: usize = 100;

/// One generated-content record as the backend lists it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteRecord {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: u64,
    #[serde(default, deserialize_with = "optional_id_from_string_or_number")]
    pub content_id: Option<u64>,
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub provider_type: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub result: Option<Value>,
}

/// The two result layouts the backend has stored over time.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteResult {
    /// Structured slide content, to be rendered locally.
    Structured(ContentPayload),
    /// Already-rendered slides with whatever metadata came along.
    Prerendered {
        slides: Vec<String>,
        content: ContentPayload,
    },
}

impl RemoteRecord {
    /// Gallery id of this record.
    pub fn entry_id(&self) -> String {
        format!("api-{}", self.id)
    }

    pub fn content_ref(&self) -> String {
        self.content_id.unwrap_or(self.id).to_string()
    }

    pub fn template_name(&self) -> String {
        format!("{} - {}", self.media_type, self.provider_type)
    }

    /// Creation time in epoch milliseconds; 0 when unparseable.
    pub fn created_at_millis(&self) -> i64 {
        DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.timestamp_millis())
            .unwrap_or_else(|e| {
                warn!("Record {} has invalid created_at {:?}: {}", self.id, self.created_at, e);
                0
            })
    }

    /// Interpret the record's result; `None` for empty or unknown layouts.
    pub fn decode_result(&self) -> Option<RemoteResult> {
        let Some(Value::Object(result)) = &self.result else {
            warn!("Record {} has no result", self.id);
            return None;
        };

        let structured = result
            .get("slideContents")
            .or_else(|| result.get("conteudos"))
            .is_some_and(Value::is_array);
        if structured {
            return match serde_json::from_value(Value::Object(result.clone())) {
                Ok(content) => Some(RemoteResult::Structured(content)),
                Err(e) => {
                    warn!("Record {} has unreadable content: {}", self.id, e);
                    None
                }
            };
        }

        if let Some(Value::Array(items)) = result.get("slides") {
            let slides: Vec<String> = items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect();
            if slides.is_empty() {
                return None;
            }
            let metadata = result
                .get("metadata")
                .cloned()
                .unwrap_or_else(|| Value::Object(result.clone()));
            let mut content: ContentPayload = serde_json::from_value(metadata).unwrap_or_default();
            content.slide_contents.clear();
            return Some(RemoteResult::Prerendered { slides, content });
        }

        warn!("Record {} has an unknown result layout", self.id);
        None
    }
}

/// The authoritative store of generated content.
#[async_trait]
pub trait GalleryRemote: Send + Sync {
    async fn list(&self) -> Result<Vec<RemoteRecord>>;

    /// Fetch one record; `None` when the backend reports no such record.
    async fn fetch(&self, backend_id: u64) -> Result<Option<RemoteRecord>>;

    async fn delete(&self, backend_id: u64) -> Result<()>;
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    data: Vec<Value>,
}

impl ListResponse {
    /// Decode each listed record on its own; unreadable records are skipped.
    fn into_records(self) -> Vec<RemoteRecord> {
        self.data
            .into_iter()
            .enumerate()
            .filter_map(|(position, item)| match serde_json::from_value(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping unreadable listing record at position {}: {}", position, e);
                    None
                }
            })
            .collect()
    }
}

/// Parse a listing body into records, skipping any that cannot be read.
pub fn parse_listing(body: &str) -> Result<Vec<RemoteRecord>> {
    let listing: ListResponse = serde_json::from_str(body)?;
    Ok(listing.into_records())
}

fn parse_id(value: Value) -> std::result::Result<Option<u64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| format!("id {} is not a positive integer", n)),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| format!("id {:?} is not numeric", s)),
        other => Err(format!("id has unexpected type: {}", other)),
    }
}

/// Backend ids arrive as numbers or as numeric strings.
fn id_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    parse_id(Value::deserialize(deserializer)?)
        .map_err(D::Error::custom)?
        .ok_or_else(|| D::Error::custom("id is null"))
}

fn optional_id_from_string_or_number<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    parse_id(Value::deserialize(deserializer)?).map_err(D::Error::custom)
}

#[derive(Deserialize)]
struct RecordResponse {
    #[serde(default)]
    success: bool,
    data: Option<RemoteRecord>,
}

/// Backend reached over HTTP under `{base}/generated-content`.
pub struct HttpGalleryRemote {
    base: Url,
    client: Client,
    auth_token: Option<String>,
}

impl HttpGalleryRemote {
    pub fn new(base_url: &str, auth_token: Option<String>) -> Result<Self> {
        let base = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{}/", base_url))?
        };
        Ok(Self {
            base,
            client: Client::builder().build()?,
            auth_token,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn record_url(&self, backend_id: u64) -> Result<Url> {
        Ok(self.base.join(&format!("generated-content/{}", backend_id))?)
    }
}

#[async_trait]
impl GalleryRemote for HttpGalleryRemote {
    async fn list(&self) -> Result<Vec<RemoteRecord>> {
        let mut url = self.base.join("generated-content")?;
        url.query_pairs_mut()
            .append_pair("page", "1")
            .append_pair("limit", &LIST_LIMIT.to_string());
        info!("Loading gallery listing from {}", url);

        let response = self.authorized(self.client.get(url)).send().await?;
        if !response.status().is_success() {
            return Err(PipelineError::Remote(format!(
                "listing answered HTTP {}",
                response.status()
            )));
        }
        parse_listing(&response.text().await?)
    }

    async fn fetch(&self, backend_id: u64) -> Result<Option<RemoteRecord>> {
        let url = self.record_url(backend_id)?;
        let response = self.authorized(self.client.get(url)).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(PipelineError::Remote(format!(
                "fetching record {} answered HTTP {}",
                backend_id,
                response.status()
            )));
        }

        let body = response.json::<RecordResponse>().await?;
        Ok(if body.success { body.data } else { None })
    }

    async fn delete(&self, backend_id: u64) -> Result<()> {
        let url = self.record_url(backend_id)?;
        info!("Deleting generated content {}", backend_id);
        let response = self.authorized(self.client.delete(url)).send().await?;
        if !response.status().is_success() {
            return Err(PipelineError::Remote(format!(
                "deleting record {} answered HTTP {}",
                backend_id,
                response.status()
            )));
        }
        Ok(())
    }
}
