// ABOUTME: Template store for the carousel pipeline
// ABOUTME: Caches template definitions by id and collapses concurrent fetches into one

use crate::errors::GenerationError;
use crate::model::SlideTemplate;
use crate::resources::TemplateSource;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

type Fetched = (Arc<[SlideTemplate]>, Instant);

/// Cache-backed template lookup.
///
/// Each template id owns one `OnceCell`. Callers that arrive while the cell
/// is being filled wait on the same initialisation, so N concurrent requests
/// for an uncached id cost one remote fetch. Failed or empty fetches leave
/// the cell empty and the next caller tries again.
pub struct TemplateStore {
    source: Arc<dyn TemplateSource>,
    ttl: Duration,
    slots: Mutex<HashMap<String, Arc<OnceCell<Fetched>>>>,
}

impl TemplateStore {
    pub fn new(source: Arc<dyn TemplateSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the slide templates of `template_id`, from cache when fresh.
    pub async fn fetch_template(
        &self,
        template_id: &str,
    ) -> Result<Arc<[SlideTemplate]>, GenerationError> {
        let cell = self.slot(template_id);

        let (slides, _) = cell
            .get_or_try_init(|| async {
                info!("Loading template {}", template_id);
                let slides = self.source.fetch(template_id).await.map_err(|e| {
                    warn!("Template {} fetch failed: {}", template_id, e);
                    GenerationError::TemplateUnavailable {
                        template_id: template_id.to_string(),
                        reason: e.to_string(),
                    }
                })?;

                if slides.is_empty() {
                    return Err(GenerationError::TemplateUnavailable {
                        template_id: template_id.to_string(),
                        reason: "template defines no slides".to_string(),
                    });
                }

                info!("Template {} loaded: {} slides", template_id, slides.len());
                Ok((Arc::from(slides), Instant::now()))
            })
            .await?;

        Ok(Arc::clone(slides))
    }

    /// Drop the cached definition of one template.
    pub fn invalidate(&self, template_id: &str) {
        self.slots.lock().remove(template_id);
    }

    /// Drop every cached definition.
    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    /// Ids whose definitions are currently cached and fresh.
    pub fn cached_ids(&self) -> Vec<String> {
        let slots = self.slots.lock();
        let mut ids: Vec<String> = slots
            .iter()
            .filter(|(_, cell)| cell.get().is_some_and(|(_, at)| at.elapsed() < self.ttl))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// The cell for `template_id`, replaced by a fresh one once expired.
    fn slot(&self, template_id: &str) -> Arc<OnceCell<Fetched>> {
        let mut slots = self.slots.lock();
        let slot = slots
            .entry(template_id.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()));

        let expired = slot
            .get()
            .is_some_and(|(_, fetched_at)| fetched_at.elapsed() >= self.ttl);
        if expired {
            debug!("Template {} cache expired", template_id);
            *slot = Arc::new(OnceCell::new());
        } else if slot.initialized() {
            debug!("Template {} served from cache", template_id);
        }

        Arc::clone(slot)
    }
}
