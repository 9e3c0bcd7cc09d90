// ABOUTME: Studio facade for the carousel pipeline
// ABOUTME: Owns the queue, gallery, template store and editor tabs and exposes user-level operations

use crate::config::Config;
use crate::editor::{EditorTab, EditorTabs};
use crate::errors::{PipelineError, Result};
use crate::gallery::GalleryStore;
use crate::generator::{ContentGenerator, GenerationRequest, HttpContentGenerator};
use crate::model::{ContentPayload, GalleryEntry, SlideContent, SlideTemplate};
use crate::pipeline::{JobOutcome, Pipeline};
use crate::queue::GenerationQueue;
use crate::remote::{GalleryRemote, HttpGalleryRemote, RemoteRecord, RemoteResult};
use crate::render;
use crate::resources::{TemplateLocation, TemplateSource};
use crate::templates::TemplateStore;
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};

/// One explicitly constructed application state shared by every view.
pub struct Studio {
    queue: Arc<GenerationQueue>,
    gallery: Arc<GalleryStore>,
    templates: Arc<TemplateStore>,
    pipeline: Arc<Pipeline>,
    remote: Option<Arc<dyn GalleryRemote>>,
    tabs: Mutex<EditorTabs>,
    auth_token: Option<String>,
    default_template_id: String,
}

impl Studio {
    pub fn new(
        config: &Config,
        generator: Arc<dyn ContentGenerator>,
        source: Arc<dyn TemplateSource>,
        remote: Option<Arc<dyn GalleryRemote>>,
        gallery: GalleryStore,
    ) -> Self {
        let queue = Arc::new(GenerationQueue::new());
        let gallery = Arc::new(gallery);
        let templates = Arc::new(TemplateStore::new(source, config.template_cache_ttl));
        let pipeline = Arc::new(Pipeline::new(
            Arc::clone(&queue),
            Arc::clone(&gallery),
            Arc::clone(&templates),
            generator,
            config.templates.clone(),
        ));

        Self {
            queue,
            gallery,
            templates,
            pipeline,
            remote,
            tabs: Mutex::new(EditorTabs::new()),
            auth_token: config.auth_token.clone(),
            default_template_id: config.default_template_id.clone(),
        }
    }

    /// Wire HTTP clients and the on-disk gallery from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let generator = Arc::new(HttpContentGenerator::new(&config.generator_url)?);
        let source =
            TemplateLocation::new(&config.template_source).into_source(config.template_timeout)?;
        let remote: Option<Arc<dyn GalleryRemote>> = match &config.gallery_api_url {
            Some(url) => Some(Arc::new(HttpGalleryRemote::new(url, config.auth_token.clone())?)),
            None => None,
        };
        let gallery = GalleryStore::open(&config.gallery_cache_path)?;

        Ok(Self::new(config, generator, source, remote, gallery))
    }

    pub fn queue(&self) -> &Arc<GenerationQueue> {
        &self.queue
    }

    pub fn gallery(&self) -> &Arc<GalleryStore> {
        &self.gallery
    }

    pub fn templates(&self) -> &Arc<TemplateStore> {
        &self.templates
    }

    /// Start a generation job; the job is queued before this returns.
    pub fn submit(&self, mut request: GenerationRequest) -> (String, JoinHandle<JobOutcome>) {
        if request.auth_token.is_none() {
            request.auth_token = self.auth_token.clone();
        }
        self.pipeline.submit(request)
    }

    /// Pull the remote listing and merge it into the local gallery.
    ///
    /// Any failure leaves the local cache as it was and is only logged.
    pub async fn sync_gallery(&self) -> Vec<GalleryEntry> {
        let remote_entries = match self.load_remote_entries().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Gallery sync failed, using local cache only: {}", e);
                return self.gallery.get_all();
            }
        };

        match self.gallery.reconcile_with(remote_entries) {
            Ok(entries) => {
                info!("Gallery synced: {} entries", entries.len());
                entries
            }
            Err(e) => {
                warn!("Failed to store synced gallery, using local cache only: {}", e);
                self.gallery.get_all()
            }
        }
    }

    async fn load_remote_entries(&self) -> Result<Vec<GalleryEntry>> {
        let remote = self.require_remote()?;
        let records = remote.list().await?;

        let mut tasks = JoinSet::new();
        for (position, record) in records.into_iter().enumerate() {
            let templates = Arc::clone(&self.templates);
            let default_template = self.default_template_id.clone();
            tasks.spawn(async move {
                let entry = record_to_entry(&templates, &default_template, &record).await;
                (position, entry)
            });
        }

        let mut converted = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, Some(entry))) => converted.push((position, entry)),
                Ok((_, None)) => {}
                Err(e) => warn!("Converting a remote record failed: {}", e),
            }
        }
        converted.sort_by_key(|(position, _)| *position);

        Ok(converted.into_iter().map(|(_, entry)| entry).collect())
    }

    /// Open a gallery entry in the editor.
    ///
    /// Entries backed by a remote record are refreshed first so the editor
    /// shows server-side edits; a failed refresh falls back to the cached
    /// copy.
    pub async fn open_in_editor(&self, entry_id: &str) -> Result<EditorTab> {
        let mut entry = self
            .gallery
            .get(entry_id)
            .ok_or_else(|| PipelineError::NotFound(format!("gallery entry {}", entry_id)))?;

        if let Some(fresh) = self.refresh_entry(&entry).await {
            entry = fresh;
            if let Err(e) = self.gallery.upsert(entry.clone()) {
                warn!("Failed to store refreshed entry {}: {}", entry_id, e);
            }
        }

        if let Err(e) = self.gallery.mark_viewed(entry_id) {
            warn!("Failed to mark {} as viewed: {}", entry_id, e);
        }
        entry.viewed = true;

        Ok(self.tabs.lock().open_tab(&entry))
    }

    async fn refresh_entry(&self, entry: &GalleryEntry) -> Option<GalleryEntry> {
        let backend_id = entry.backend_id?;
        let remote = self.remote.as_ref()?;

        let record = match remote.fetch(backend_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!("Record {} not found remotely, using cached copy", backend_id);
                return None;
            }
            Err(e) => {
                warn!("Refreshing record {} failed, using cached copy: {}", backend_id, e);
                return None;
            }
        };

        let Some(RemoteResult::Structured(content)) = record.decode_result() else {
            return None;
        };
        let slides = render_with_fallback(&self.templates, &self.default_template_id, &content).await;

        Some(GalleryEntry {
            slides,
            content,
            ..entry.clone()
        })
    }

    /// Apply `edit` to a tab's content and re-render its slides.
    ///
    /// Tabs holding only prerendered slides have no content to re-render
    /// from and are refused.
    pub async fn edit_content<F>(&self, tab_id: &str, edit: F) -> Result<EditorTab>
    where
        F: FnOnce(&mut ContentPayload),
    {
        let tab = self
            .tabs
            .lock()
            .get(tab_id)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(format!("editor tab {}", tab_id)))?;
        if !tab.is_editable() {
            return Err(PipelineError::NotEditable(tab.entry_id));
        }

        let mut content = tab.content;

        edit(&mut content);
        let slides = render_with_fallback(&self.templates, &self.default_template_id, &content).await;

        let mut tabs = self.tabs.lock();
        if !tabs.update_tab(tab_id, content, slides) {
            return Err(PipelineError::NotFound(format!("editor tab {}", tab_id)));
        }
        let tab = tabs.get(tab_id).cloned();
        tab.ok_or_else(|| PipelineError::NotFound(format!("editor tab {}", tab_id)))
    }

    /// Replace (or append, at the end) one slide's content.
    pub async fn edit_slide(&self, tab_id: &str, index: usize, slide: SlideContent) -> Result<EditorTab> {
        self.edit_content(tab_id, move |content| {
            if index < content.slide_contents.len() {
                content.slide_contents[index] = slide;
            } else {
                content.slide_contents.push(slide);
            }
        })
        .await
    }

    /// Write a tab's working state into its gallery entry.
    pub fn save_tab(&self, tab_id: &str) -> Result<()> {
        let mut tabs = self.tabs.lock();
        let tab = tabs
            .get(tab_id)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(format!("editor tab {}", tab_id)))?;

        if !self.gallery.update_entry(&tab.entry_id, tab.content, tab.slides)? {
            return Err(PipelineError::NotFound(format!("gallery entry {}", tab.entry_id)));
        }
        tabs.mark_saved(tab_id);
        Ok(())
    }

    /// Delete an entry remotely, then locally, and close its tab.
    pub async fn delete_entry(&self, entry_id: &str) -> Result<()> {
        let entry = self
            .gallery
            .get(entry_id)
            .ok_or_else(|| PipelineError::NotFound(format!("gallery entry {}", entry_id)))?;
        let backend_id = entry
            .backend_id
            .ok_or_else(|| PipelineError::NotDeletable(entry_id.to_string()))?;

        self.require_remote()?.delete(backend_id).await?;
        self.gallery.remove(entry_id)?;
        self.tabs.lock().close_tab(&EditorTab::id_for(entry_id));
        info!("Deleted gallery entry {}", entry_id);
        Ok(())
    }

    /// Empty the local gallery and close every tab that pointed into it.
    pub fn clear_gallery(&self) -> Result<()> {
        self.gallery.clear()?;
        self.tabs.lock().retain_entries(&[]);
        Ok(())
    }

    pub fn editor_tabs(&self) -> Vec<EditorTab> {
        self.tabs.lock().tabs().to_vec()
    }

    pub fn active_tab(&self) -> Option<EditorTab> {
        self.tabs.lock().active().cloned()
    }

    /// Close one tab; returns whether any editor is still visible.
    pub fn close_tab(&self, tab_id: &str) -> bool {
        self.tabs.lock().close_tab(tab_id)
    }

    pub fn close_all_tabs(&self) {
        self.tabs.lock().close_all();
    }

    fn require_remote(&self) -> Result<&Arc<dyn GalleryRemote>> {
        self.remote
            .as_ref()
            .ok_or_else(|| PipelineError::Config("no gallery API configured".to_string()))
    }
}

/// Render `content` with its own template, or with the built-in slide when
/// that template cannot be loaded.
pub async fn render_with_fallback(
    templates: &TemplateStore,
    default_template_id: &str,
    content: &ContentPayload,
) -> Vec<String> {
    let template_id = match content.template_id() {
        "" => default_template_id,
        id => id,
    };

    let rendered = match templates.fetch_template(template_id).await {
        Ok(slides) => render::render_all_slides(&slides, content),
        Err(e) => Err(e),
    };

    rendered.unwrap_or_else(|e| {
        warn!("Rendering with template {} failed, using built-in slide: {}", template_id, e);
        render::render_all_slides(&[SlideTemplate::builtin()], content).unwrap_or_default()
    })
}

async fn record_to_entry(
    templates: &TemplateStore,
    default_template_id: &str,
    record: &RemoteRecord,
) -> Option<GalleryEntry> {
    let (slides, content) = match record.decode_result()? {
        RemoteResult::Structured(content) => {
            let slides = render_with_fallback(templates, default_template_id, &content).await;
            (slides, content)
        }
        RemoteResult::Prerendered { slides, content } => (slides, content),
    };

    if slides.is_empty() {
        warn!("Record {} has no slides", record.id);
        return None;
    }

    Some(GalleryEntry {
        id: record.entry_id(),
        content_ref: record.content_ref(),
        template_name: record.template_name(),
        created_at: record.created_at_millis(),
        slides,
        content,
        viewed: false,
        backend_id: Some(record.id),
    })
}
