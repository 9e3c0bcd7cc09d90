// ABOUTME: Generation pipeline for the carousel application
// ABOUTME: Runs generate, fetch template, render and store for one job, tracking it in the queue

use crate::config::TemplateCatalog;
use crate::errors::GenerationError;
use crate::gallery::GalleryStore;
use crate::generator::{classify_response, ContentGenerator, GenerationRequest};
use crate::model::{GalleryEntry, GenerationJob, JobPatch};
use crate::queue::GenerationQueue;
use crate::render;
use crate::templates::TemplateStore;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub type JobOutcome = Result<GalleryEntry, GenerationError>;

/// The single orchestration routine shared by every entry point
/// (feed posts, news items, links, chat output).
pub struct Pipeline {
    queue: Arc<GenerationQueue>,
    gallery: Arc<GalleryStore>,
    templates: Arc<TemplateStore>,
    generator: Arc<dyn ContentGenerator>,
    catalog: TemplateCatalog,
}

impl Pipeline {
    pub fn new(
        queue: Arc<GenerationQueue>,
        gallery: Arc<GalleryStore>,
        templates: Arc<TemplateStore>,
        generator: Arc<dyn ContentGenerator>,
        catalog: TemplateCatalog,
    ) -> Self {
        Self {
            queue,
            gallery,
            templates,
            generator,
            catalog,
        }
    }

    /// Create and enqueue the job for `request`. The job is visible in the
    /// queue as soon as this returns.
    pub fn enqueue(&self, request: &GenerationRequest) -> GenerationJob {
        let template_name = self.catalog.display_name(&request.template_id);
        let job = GenerationJob::new(&request.content_ref, &request.template_id, &template_name);
        self.queue.enqueue(job.clone());
        job
    }

    /// Enqueue synchronously, then run the job on the runtime.
    ///
    /// If the job's task dies before recording a terminal status, the job is
    /// removed from the queue instead of being left generating.
    pub fn submit(self: &Arc<Self>, request: GenerationRequest) -> (String, JoinHandle<JobOutcome>) {
        let job = self.enqueue(&request);
        let job_id = job.id.clone();

        let pipeline = Arc::clone(self);
        let worker = tokio::spawn(async move { pipeline.execute(job, request).await });

        let queue = Arc::clone(&self.queue);
        let supervised_id = job_id.clone();
        let handle = tokio::spawn(async move {
            match worker.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Generation task for {} died: {}", supervised_id, e);
                    queue.remove(&supervised_id);
                    Err(GenerationError::Render(format!("generation task aborted: {}", e)))
                }
            }
        });

        (job_id, handle)
    }

    /// Enqueue and run in the caller's task.
    pub async fn run(&self, request: GenerationRequest) -> JobOutcome {
        let job = self.enqueue(&request);
        self.execute(job, request).await
    }

    /// Drive an enqueued job to a terminal status.
    pub async fn execute(&self, job: GenerationJob, request: GenerationRequest) -> JobOutcome {
        match self.produce(&job, &request).await {
            Ok(entry) => {
                let patch = JobPatch::completed(
                    entry.slides.clone(),
                    entry.content.clone(),
                    entry.backend_id,
                );
                self.queue.update_status(&job.id, patch);
                info!("Job {} completed with {} slides", job.id, entry.slides.len());
                Ok(entry)
            }
            Err(e) => {
                error!("Job {} failed: {}", job.id, e);
                self.queue.update_status(&job.id, JobPatch::failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn produce(&self, job: &GenerationJob, request: &GenerationRequest) -> JobOutcome {
        info!(
            "Generating {} with template {}",
            request.content_ref, request.template_id
        );
        let response = self
            .generator
            .generate(request)
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let generated = classify_response(response)?;
        let content = generated.content;

        // The backend may normalise the template; render with the one it used
        let template_id = content.template_id().to_string();
        if template_id != request.template_id {
            info!(
                "Job {} requested template {} but content uses {}",
                job.id, request.template_id, template_id
            );
        }

        let templates = self.templates.fetch_template(&template_id).await?;
        let slides = render::render_all_slides(&templates, &content)?;
        if slides.len() != content.slide_contents.len() {
            return Err(GenerationError::Render(format!(
                "rendered {} slides for {} content entries",
                slides.len(),
                content.slide_contents.len()
            )));
        }

        let mut finished = job.clone();
        finished.backend_id = generated.backend_id;
        let entry = GalleryEntry::from_job(&finished, slides, content);

        self.gallery
            .insert_completed(entry.clone())
            .map_err(|e| GenerationError::Storage(e.to_string()))?;

        Ok(entry)
    }
}
