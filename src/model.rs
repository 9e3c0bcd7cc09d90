// ABOUTME: Data model shared by the queue, renderer, gallery and editor
// ABOUTME: Serde shapes accept the generator's wire aliases and always write current names

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-slide style map. Scalar values are CSS properties of the slide root,
/// object values are property maps scoped to one named element.
pub type StyleMap = BTreeMap<String, Value>;

static JOB_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Metadata that applies to the whole carousel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralInfo {
    #[serde(default, deserialize_with = "string_or_number")]
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "lang", skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Content bound into one slide.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, alias = "imagem_fundo", skip_serializing_if = "Option::is_none")]
    pub background_url: Option<String>,
    #[serde(default, alias = "thumbnail_url", skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Structured generator output: general metadata plus ordered slide content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPayload {
    #[serde(default, alias = "dados_gerais")]
    pub general_info: GeneralInfo,
    #[serde(default, alias = "conteudos")]
    pub slide_contents: Vec<SlideContent>,
    #[serde(
        default,
        alias = "styles",
        deserialize_with = "lenient_style_overrides",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub style_overrides: BTreeMap<usize, StyleMap>,
}

impl ContentPayload {
    pub fn template_id(&self) -> &str {
        &self.general_info.template
    }
}

/// One slide layout of a template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlideTemplate {
    #[serde(alias = "html")]
    pub markup: String,
    #[serde(default, alias = "styles")]
    pub style: StyleMap,
}

/// A template definition as delivered by a template source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDefinition {
    #[serde(default, deserialize_with = "string_or_number")]
    pub template_id: String,
    pub slides: Vec<SlideTemplate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Generating,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Generating)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Generating => "generating",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }
}

/// One attempt to turn a content reference and template into slides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJob {
    pub id: String,
    pub content_ref: String,
    pub template_id: String,
    pub template_name: String,
    pub status: JobStatus,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_slides: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_data: Option<ContentPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_id: Option<u64>,
}

impl GenerationJob {
    /// Create a job in the `generating` state.
    ///
    /// The id combines the content reference, template id and creation time;
    /// a process-wide sequence number keeps identical requests issued within
    /// the same millisecond apart.
    pub fn new(content_ref: &str, template_id: &str, template_name: &str) -> Self {
        let created_at = now_millis();
        let seq = JOB_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("{}-{}-{}-{}", content_ref, template_id, created_at, seq),
            content_ref: content_ref.to_string(),
            template_id: template_id.to_string(),
            template_name: template_name.to_string(),
            status: JobStatus::Generating,
            created_at,
            completed_at: None,
            result_slides: None,
            result_data: None,
            error_message: None,
            backend_id: None,
        }
    }
}

/// Partial update applied to a queued job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub completed_at: Option<i64>,
    pub result_slides: Option<Vec<String>>,
    pub result_data: Option<ContentPayload>,
    pub error_message: Option<String>,
    pub backend_id: Option<u64>,
}

impl JobPatch {
    pub fn completed(slides: Vec<String>, content: ContentPayload, backend_id: Option<u64>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            completed_at: Some(now_millis()),
            result_slides: Some(slides),
            result_data: Some(content),
            backend_id,
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Error),
            completed_at: Some(now_millis()),
            error_message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// A persisted, completed generation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryEntry {
    pub id: String,
    #[serde(alias = "postCode")]
    pub content_ref: String,
    #[serde(default)]
    pub template_name: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub slides: Vec<String>,
    #[serde(alias = "carouselData")]
    pub content: ContentPayload,
    #[serde(default)]
    pub viewed: bool,
    #[serde(default, alias = "generatedContentId", skip_serializing_if = "Option::is_none")]
    pub backend_id: Option<u64>,
}

impl GalleryEntry {
    /// Build the gallery entry for a job that just finished rendering.
    pub fn from_job(job: &GenerationJob, slides: Vec<String>, content: ContentPayload) -> Self {
        Self {
            id: job.id.clone(),
            content_ref: job.content_ref.clone(),
            template_name: job.template_name.clone(),
            created_at: now_millis(),
            slides,
            content,
            viewed: false,
            backend_id: job.backend_id,
        }
    }
}

/// Accept a template id written either as a string or as a bare number.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Keep only overrides keyed by a slide index and holding an object patch.
fn lenient_style_overrides<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<usize, StyleMap>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        _ => return Ok(BTreeMap::new()),
    };

    let mut overrides = BTreeMap::new();
    for (key, value) in raw {
        let (Ok(index), Value::Object(patch)) = (key.parse::<usize>(), value) else {
            continue;
        };
        overrides.insert(index, patch.into_iter().collect());
    }
    Ok(overrides)
}
