// ABOUTME: Template sources for the carousel pipeline
// ABOUTME: Loads slide template definitions from remote object storage or a local directory

use crate::errors::{PipelineError, Result};
use crate::model::{SlideTemplate, TemplateDefinition};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Where template definitions are loaded from.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    /// Load the ordered slide templates of one template id.
    async fn fetch(&self, template_id: &str) -> Result<Vec<SlideTemplate>>;
}

/// A template location that can be either a local directory or a URL.
#[derive(Debug, Clone)]
pub struct TemplateLocation {
    pub path: String,
    pub is_remote: bool,
}

impl TemplateLocation {
    /// Create a location from a path string; URLs are treated as remote.
    pub fn new(path: &str) -> Self {
        let is_remote = path.starts_with("http://") || path.starts_with("https://");
        Self {
            path: path.to_string(),
            is_remote,
        }
    }

    /// Build the matching source for this location.
    pub fn into_source(self, timeout: Duration) -> Result<Arc<dyn TemplateSource>> {
        if self.is_remote {
            Ok(Arc::new(HttpTemplateSource::new(&self.path, timeout)?))
        } else {
            Ok(Arc::new(DirTemplateSource::new(&self.path)))
        }
    }
}

/// Wire shapes a template document may take.
#[derive(Deserialize)]
#[serde(untagged)]
enum TemplateDocument {
    Slides(Vec<SlideTemplate>),
    Definition(TemplateDefinition),
}

/// Parse a template document, accepting a bare slide array or a definition.
pub fn parse_template_document(body: &str) -> Result<Vec<SlideTemplate>> {
    let document: TemplateDocument = serde_json::from_str(body)?;
    Ok(match document {
        TemplateDocument::Slides(slides) => slides,
        TemplateDocument::Definition(definition) => definition.slides,
    })
}

fn validate_template_id(template_id: &str) -> Result<()> {
    let invalid = template_id.is_empty()
        || template_id.contains('/')
        || template_id.contains('\\')
        || template_id.contains("..");
    if invalid {
        return Err(PipelineError::InvalidResource(format!(
            "Invalid template id: {:?}",
            template_id
        )));
    }
    Ok(())
}

/// Fetches `{base}/{template_id}.json` over HTTP.
pub struct HttpTemplateSource {
    base: Url,
    client: Client,
}

impl HttpTemplateSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        // Url::join replaces the last segment unless the base ends with a slash
        let base = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{}/", base_url))?
        };

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { base, client })
    }
}

#[async_trait]
impl TemplateSource for HttpTemplateSource {
    async fn fetch(&self, template_id: &str) -> Result<Vec<SlideTemplate>> {
        validate_template_id(template_id)?;
        let url = self.base.join(&format!("{}.json", template_id))?;
        info!("Fetching remote template: {}", url);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Remote(format!(
                "HTTP error {} fetching {}",
                status, url
            )));
        }

        let body = response.text().await?;
        parse_template_document(&body)
    }
}

/// Reads templates from a local directory: either `{root}/{id}.json`, or
/// the `.html` files of `{root}/{id}/` taken in file name order.
pub struct DirTemplateSource {
    root: PathBuf,
}

impl DirTemplateSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn html_slide_paths(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let pattern = format!("{}/*.html", dir.to_string_lossy());
        let mut paths: Vec<PathBuf> = glob::glob(&pattern)
            .map_err(|e| PipelineError::InvalidResource(format!("Invalid glob pattern: {}", e)))?
            .flatten()
            .collect();
        paths.sort();
        Ok(paths)
    }
}

#[async_trait]
impl TemplateSource for DirTemplateSource {
    async fn fetch(&self, template_id: &str) -> Result<Vec<SlideTemplate>> {
        validate_template_id(template_id)?;

        let json_path = self.root.join(format!("{}.json", template_id));
        if json_path.is_file() {
            info!("Reading local template: {:?}", json_path);
            let body = tokio::fs::read_to_string(&json_path).await?;
            return parse_template_document(&body);
        }

        let dir = self.root.join(template_id);
        if !dir.is_dir() {
            return Err(PipelineError::NotFound(format!(
                "template {} under {:?}",
                template_id, self.root
            )));
        }

        let mut slides = Vec::new();
        for path in self.html_slide_paths(&dir)? {
            debug!("Reading slide template {:?}", path);
            slides.push(SlideTemplate {
                markup: tokio::fs::read_to_string(&path).await?,
                style: Default::default(),
            });
        }
        Ok(slides)
    }
}
