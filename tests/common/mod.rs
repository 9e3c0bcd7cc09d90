// ABOUTME: Shared fakes for the integration tests
// ABOUTME: In-process generator, template source and remote gallery doubles

#![allow(dead_code)]

use async_trait::async_trait;
use carousel::errors::{PipelineError, Result};
use carousel::{
    Config, ContentGenerator, ContentPayload, GalleryEntry, GalleryRemote, GalleryStore,
    GeneralInfo, GenerationRequest, RemoteRecord, SlideContent, SlideTemplate, Studio,
    TemplateSource,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Template source that counts fetches and records requested ids.
pub struct CountingSource {
    slides: Vec<SlideTemplate>,
    delay: Duration,
    calls: AtomicUsize,
    failing: AtomicBool,
    requested: Mutex<Vec<String>>,
}

impl CountingSource {
    pub fn new(slides: Vec<SlideTemplate>) -> Self {
        Self {
            slides,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl TemplateSource for CountingSource {
    async fn fetch(&self, template_id: &str) -> Result<Vec<SlideTemplate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().push(template_id.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(PipelineError::Remote("template bucket offline".to_string()));
        }
        Ok(self.slides.clone())
    }
}

/// Generator that answers with a fixed response, optionally held until
/// `release` is called.
pub struct ScriptedGenerator {
    response: std::result::Result<Option<Value>, String>,
    gate: Option<Notify>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn answering(response: Option<Value>) -> Self {
        Self {
            response: Ok(response),
            gate: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            gate: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Notify::new());
        self
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<Value>> {
        self.requests.lock().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.response {
            Ok(response) => Ok(response.clone()),
            Err(message) => Err(PipelineError::Remote(message.clone())),
        }
    }
}

/// Remote gallery backed by a record list.
#[derive(Default)]
pub struct FakeRemote {
    records: Mutex<Vec<RemoteRecord>>,
    offline: AtomicBool,
    deleted: Mutex<Vec<u64>>,
}

impl FakeRemote {
    pub fn with_records(records: Vec<RemoteRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn deleted(&self) -> Vec<u64> {
        self.deleted.lock().clone()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PipelineError::Remote("gallery API unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl GalleryRemote for FakeRemote {
    async fn list(&self) -> Result<Vec<RemoteRecord>> {
        self.check_online()?;
        Ok(self.records.lock().clone())
    }

    async fn fetch(&self, backend_id: u64) -> Result<Option<RemoteRecord>> {
        self.check_online()?;
        Ok(self.records.lock().iter().find(|r| r.id == backend_id).cloned())
    }

    async fn delete(&self, backend_id: u64) -> Result<()> {
        self.check_online()?;
        self.records.lock().retain(|r| r.id != backend_id);
        self.deleted.lock().push(backend_id);
        Ok(())
    }
}

pub fn slide(title: &str) -> SlideContent {
    SlideContent {
        title: Some(title.to_string()),
        ..SlideContent::default()
    }
}

pub fn content(template_id: &str, titles: &[&str]) -> ContentPayload {
    ContentPayload {
        general_info: GeneralInfo {
            template: template_id.to_string(),
            ..GeneralInfo::default()
        },
        slide_contents: titles.iter().map(|t| slide(t)).collect(),
        ..ContentPayload::default()
    }
}

pub fn templates() -> Vec<SlideTemplate> {
    vec![
        SlideTemplate {
            markup: "<section class=\"cover\">{{title}}{{subtitle}}</section>".to_string(),
            ..SlideTemplate::default()
        },
        SlideTemplate {
            markup: "<section class=\"body\">{{title}}</section>".to_string(),
            ..SlideTemplate::default()
        },
    ]
}

/// A generator response in the backend's array shape.
pub fn response(template_id: &str, titles: &[&str], backend_id: u64) -> Value {
    let slides: Vec<Value> = titles.iter().map(|t| json!({ "title": t })).collect();
    json!([{
        "generalInfo": { "template": template_id },
        "slideContents": slides,
        "id": backend_id,
    }])
}

pub fn entry(id: &str, titles: &[&str], backend_id: Option<u64>) -> GalleryEntry {
    GalleryEntry {
        id: id.to_string(),
        content_ref: format!("ref-{}", id),
        template_name: "Template 2".to_string(),
        created_at: 1,
        slides: titles.iter().map(|t| format!("<p>{}</p>", t)).collect(),
        content: content("2", titles),
        viewed: false,
        backend_id,
    }
}

pub fn structured_record(id: u64, titles: &[&str]) -> RemoteRecord {
    let slides: Vec<Value> = titles.iter().map(|t| json!({ "title": t })).collect();
    RemoteRecord {
        id,
        content_id: Some(id + 100),
        media_type: "carousel".to_string(),
        provider_type: "instagram".to_string(),
        created_at: "2024-05-01T10:00:00Z".to_string(),
        result: Some(json!({
            "generalInfo": { "template": "2" },
            "slideContents": slides,
        })),
    }
}

pub fn prerendered_record(id: u64, slides: &[&str]) -> RemoteRecord {
    RemoteRecord {
        id,
        content_id: None,
        media_type: "carousel".to_string(),
        provider_type: "news".to_string(),
        created_at: "2024-05-02T10:00:00Z".to_string(),
        result: Some(json!({ "slides": slides })),
    }
}

pub fn studio(
    generator: Arc<dyn ContentGenerator>,
    source: Arc<dyn TemplateSource>,
    remote: Option<Arc<dyn GalleryRemote>>,
    gallery: GalleryStore,
) -> Studio {
    Studio::new(&Config::new(), generator, source, remote, gallery)
}
