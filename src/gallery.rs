// ABOUTME: Gallery store for the carousel pipeline
// ABOUTME: Persists completed results, reconciles with the remote listing and notifies subscribers

use crate::errors::Result;
use crate::model::{ContentPayload, GalleryEntry, SlideContent, SlideTemplate};
use crate::render;
use crate::utils;
use log::{info, warn};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

/// What caused a gallery update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryEventKind {
    Completed,
    Updated,
    Deleted,
    Replaced,
    Cleared,
}

/// Broadcast after every successful change, carrying the whole collection.
#[derive(Debug, Clone)]
pub struct GalleryEvent {
    pub kind: GalleryEventKind,
    pub entry_id: Option<String>,
    pub entries: Arc<Vec<GalleryEntry>>,
}

/// Persisted, id-keyed collection of completed results.
///
/// Every mutation runs against a copy of the collection inside one critical
/// section: the copy is written to disk first and only then becomes the
/// current state, so a failed write leaves both memory and disk untouched.
pub struct GalleryStore {
    path: Option<PathBuf>,
    entries: Mutex<Vec<GalleryEntry>>,
    events: broadcast::Sender<GalleryEvent>,
}

impl GalleryStore {
    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::with_entries(None, Vec::new())
    }

    /// Open the store persisted at `path`, migrating legacy entries.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            info!("No gallery cache at {:?}, starting empty", path);
            return Ok(Self::with_entries(Some(path), Vec::new()));
        }

        let raw = fs::read_to_string(&path)?;
        Ok(Self::from_cache(path, &raw))
    }

    /// Build the store from the raw cache file body. Legacy entries are
    /// migrated and written back; a failed write-back keeps the migrated
    /// entries in memory and only warns.
    pub(crate) fn from_cache(path: PathBuf, raw: &str) -> Self {
        let (entries, migrated) = match serde_json::from_str::<Vec<Value>>(raw) {
            Ok(values) => decode_entries(values),
            Err(e) => {
                warn!("Gallery cache {:?} is unreadable, starting empty: {}", path, e);
                (Vec::new(), 0)
            }
        };

        let store = Self::with_entries(Some(path), entries);
        if migrated > 0 {
            info!("Migrated {} legacy gallery entries", migrated);
            if let Err(e) = store.persist(&store.entries.lock()) {
                warn!("Failed to write migrated gallery back, keeping it in memory: {}", e);
            }
        }
        store
    }

    fn with_entries(path: Option<PathBuf>, entries: Vec<GalleryEntry>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            path,
            entries: Mutex::new(entries),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GalleryEvent> {
        self.events.subscribe()
    }

    pub fn get_all(&self) -> Vec<GalleryEntry> {
        self.entries.lock().clone()
    }

    pub fn get(&self, id: &str) -> Option<GalleryEntry> {
        self.entries.lock().iter().find(|e| e.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn unviewed_count(&self) -> usize {
        self.entries.lock().iter().filter(|e| !e.viewed).count()
    }

    /// Replace the whole collection, keeping the first entry of each id.
    pub fn replace_all(&self, entries: Vec<GalleryEntry>) -> Result<()> {
        self.commit(GalleryEventKind::Replaced, None, |current| {
            *current = dedup_by_id(entries);
            true
        })?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.commit(GalleryEventKind::Cleared, None, |current| {
            current.clear();
            true
        })?;
        Ok(())
    }

    /// Put a freshly completed result at the front of the gallery.
    pub fn insert_completed(&self, entry: GalleryEntry) -> Result<()> {
        let id = entry.id.clone();
        self.commit(GalleryEventKind::Completed, Some(id.clone()), |current| {
            current.retain(|e| e.id != id);
            current.insert(0, entry);
            true
        })?;
        Ok(())
    }

    /// Replace the entry with the same id in place, or add it at the front.
    pub fn upsert(&self, entry: GalleryEntry) -> Result<()> {
        let id = entry.id.clone();
        self.commit(GalleryEventKind::Updated, Some(id.clone()), |current| {
            match current.iter_mut().find(|e| e.id == id) {
                Some(existing) => *existing = entry,
                None => current.insert(0, entry),
            }
            true
        })?;
        Ok(())
    }

    /// Store edited content and its re-rendered slides.
    pub fn update_entry(
        &self,
        id: &str,
        content: ContentPayload,
        slides: Vec<String>,
    ) -> Result<bool> {
        self.commit(GalleryEventKind::Updated, Some(id.to_string()), |current| {
            match current.iter_mut().find(|e| e.id == id) {
                Some(entry) => {
                    entry.content = content;
                    entry.slides = slides;
                    true
                }
                None => false,
            }
        })
    }

    pub fn mark_viewed(&self, id: &str) -> Result<bool> {
        self.commit(GalleryEventKind::Updated, Some(id.to_string()), |current| {
            match current.iter_mut().find(|e| e.id == id && !e.viewed) {
                Some(entry) => {
                    entry.viewed = true;
                    true
                }
                None => false,
            }
        })
    }

    /// Local removal; only reachable through a remote delete.
    pub(crate) fn remove(&self, id: &str) -> Result<bool> {
        self.commit(GalleryEventKind::Deleted, Some(id.to_string()), |current| {
            let before = current.len();
            current.retain(|e| e.id != id);
            current.len() != before
        })
    }

    /// Merge the authoritative remote listing into the local collection.
    pub fn reconcile_with(&self, remote: Vec<GalleryEntry>) -> Result<Vec<GalleryEntry>> {
        let mut merged = Vec::new();
        self.commit(GalleryEventKind::Replaced, None, |current| {
            *current = reconcile(remote, std::mem::take(current));
            merged = current.clone();
            true
        })?;
        Ok(merged)
    }

    /// Apply `mutate` to a copy; persist, swap in and notify when it reports
    /// a change.
    fn commit<F>(&self, kind: GalleryEventKind, entry_id: Option<String>, mutate: F) -> Result<bool>
    where
        F: FnOnce(&mut Vec<GalleryEntry>) -> bool,
    {
        let event = {
            let mut entries = self.entries.lock();
            let mut next = entries.clone();
            if !mutate(&mut next) {
                return Ok(false);
            }
            self.persist(&next)?;
            *entries = next;

            GalleryEvent {
                kind,
                entry_id,
                entries: Arc::new(entries.clone()),
            }
        };

        // Nobody listening is fine
        let _ = self.events.send(event);
        Ok(true)
    }

    fn persist(&self, entries: &[GalleryEntry]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let body = serde_json::to_string_pretty(entries)?;
        utils::write_file_atomic(path, &body)
    }
}

/// Union of both listings by id. Remote entries come first in remote order
/// and win on shared ids; local-only entries follow in local order.
pub fn reconcile(remote: Vec<GalleryEntry>, local: Vec<GalleryEntry>) -> Vec<GalleryEntry> {
    dedup_by_id(remote.into_iter().chain(local).collect())
}

fn dedup_by_id(entries: Vec<GalleryEntry>) -> Vec<GalleryEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert(entry.id.clone()))
        .collect()
}

/// Decode persisted entries, migrating legacy ones. Returns the entries and
/// how many were migrated.
fn decode_entries(values: Vec<Value>) -> (Vec<GalleryEntry>, usize) {
    let mut migrated = 0;
    let mut entries = Vec::with_capacity(values.len());

    for mut value in values {
        if migrate_legacy_entry(&mut value) {
            migrated += 1;
        }
        match serde_json::from_value::<GalleryEntry>(value) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!("Skipping unreadable gallery entry: {}", e),
        }
    }

    (dedup_by_id(entries), migrated)
}

/// Rewrite a legacy entry in place into the current shape.
///
/// Legacy entries keep their content as a flat `slides` list of serialized
/// slide objects. Each item is parsed back into a slide content and
/// re-rendered with the built-in template; an item that is not JSON is
/// already markup and stays the slide as is, with its text kept as the
/// title. Returns false for entries already current.
pub fn migrate_legacy_entry(entry: &mut Value) -> bool {
    let Value::Object(fields) = entry else {
        return false;
    };

    let content = fields
        .remove("content")
        .or_else(|| fields.remove("carouselData"));
    let mut content = match content {
        Some(Value::Object(content)) => content,
        Some(other) => {
            fields.insert("content".to_string(), other);
            return false;
        }
        None => return false,
    };

    let is_legacy = matches!(content.get("slides"), Some(Value::Array(_)))
        && !content.contains_key("slideContents")
        && !content.contains_key("conteudos");
    if !is_legacy {
        fields.insert("content".to_string(), Value::Object(content));
        return false;
    }

    let legacy_slides = match content.remove("slides") {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    let parsed: Vec<LegacySlide> = legacy_slides.into_iter().map(parse_legacy_slide).collect();

    let mut payload: ContentPayload =
        serde_json::from_value(Value::Object(content)).unwrap_or_default();
    payload.slide_contents = parsed
        .iter()
        .map(|slide| match slide {
            LegacySlide::Structured(content) => content.clone(),
            LegacySlide::Markup(markup) => SlideContent {
                title: Some(markup.clone()),
                ..SlideContent::default()
            },
        })
        .collect();

    let builtin = SlideTemplate::builtin();
    let slides: Vec<String> = parsed
        .into_iter()
        .enumerate()
        .map(|(index, slide)| match slide {
            LegacySlide::Structured(content) => render::render_slide(
                &builtin,
                &content,
                payload.style_overrides.get(&index),
                index,
            ),
            LegacySlide::Markup(markup) => markup,
        })
        .collect();

    fields.insert("slides".to_string(), serde_json::json!(slides));
    fields.insert(
        "content".to_string(),
        serde_json::to_value(&payload).unwrap_or(Value::Object(Map::new())),
    );
    true
}

/// One item of a legacy slide list.
enum LegacySlide {
    /// Serialized slide content, re-rendered on migration.
    Structured(SlideContent),
    /// Already-rendered markup, kept as the slide verbatim.
    Markup(String),
}

fn parse_legacy_slide(item: Value) -> LegacySlide {
    let value = match item {
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(parsed @ Value::Object(_)) => parsed,
            _ => return LegacySlide::Markup(text),
        },
        other => other,
    };
    LegacySlide::Structured(serde_json::from_value(value).unwrap_or_default())
}
