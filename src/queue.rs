// ABOUTME: Generation queue for the carousel pipeline
// ABOUTME: Ordered, observable collection of in-flight and finished generation jobs

use crate::model::{GenerationJob, JobPatch, JobStatus};
use log::{debug, warn};
use tokio::sync::watch;

/// Process-local queue of generation jobs.
///
/// The job list lives inside a `watch` channel: every mutation runs inside
/// `send_modify`, touches exactly one job, and wakes every subscriber.
pub struct GenerationQueue {
    jobs: watch::Sender<Vec<GenerationJob>>,
}

impl GenerationQueue {
    pub fn new() -> Self {
        let (jobs, _) = watch::channel(Vec::new());
        Self { jobs }
    }

    /// Insert a job as `generating`. Visible to subscribers on return.
    pub fn enqueue(&self, mut job: GenerationJob) {
        job.status = JobStatus::Generating;
        debug!("Queued job {}", job.id);
        self.jobs.send_modify(|jobs| jobs.push(job));
    }

    /// Merge `patch` into the job with `id`.
    ///
    /// Returns false when nothing was applied: unknown ids and jobs that
    /// already reached a terminal status are left alone.
    pub fn update_status(&self, id: &str, patch: JobPatch) -> bool {
        let mut applied = false;
        self.jobs.send_if_modified(|jobs| {
            let Some(job) = jobs.iter_mut().find(|job| job.id == id) else {
                warn!("Ignoring update for unknown job {}", id);
                return false;
            };
            if job.status.is_terminal() {
                warn!(
                    "Ignoring update for job {} already {}",
                    id,
                    job.status.as_str()
                );
                return false;
            }

            apply_patch(job, patch);
            applied = true;
            true
        });
        applied
    }

    /// Delete a job outright.
    pub fn remove(&self, id: &str) -> bool {
        self.jobs.send_if_modified(|jobs| {
            let before = jobs.len();
            jobs.retain(|job| job.id != id);
            jobs.len() != before
        })
    }

    /// Drop every job that reached a terminal status.
    pub fn discard_finished(&self) -> usize {
        let mut removed = 0;
        self.jobs.send_if_modified(|jobs| {
            let before = jobs.len();
            jobs.retain(|job| !job.status.is_terminal());
            removed = before - jobs.len();
            removed > 0
        });
        removed
    }

    pub fn get(&self, id: &str) -> Option<GenerationJob> {
        self.jobs.borrow().iter().find(|job| job.id == id).cloned()
    }

    /// All jobs in insertion order.
    pub fn snapshot(&self) -> Vec<GenerationJob> {
        self.jobs.borrow().clone()
    }

    /// Number of jobs still generating.
    pub fn in_progress(&self) -> usize {
        self.jobs
            .borrow()
            .iter()
            .filter(|job| job.status == JobStatus::Generating)
            .count()
    }

    pub fn len(&self) -> usize {
        self.jobs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.borrow().is_empty()
    }

    /// Receive the job list after every change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<GenerationJob>> {
        self.jobs.subscribe()
    }
}

impl Default for GenerationQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_patch(job: &mut GenerationJob, patch: JobPatch) {
    if let Some(status) = patch.status {
        job.status = status;
    }
    if let Some(completed_at) = patch.completed_at {
        job.completed_at = Some(completed_at);
    }
    if let Some(slides) = patch.result_slides {
        job.result_slides = Some(slides);
    }
    if let Some(data) = patch.result_data {
        job.result_data = Some(data);
    }
    if let Some(message) = patch.error_message {
        job.error_message = Some(message);
    }
    if let Some(backend_id) = patch.backend_id {
        job.backend_id = Some(backend_id);
    }
}
