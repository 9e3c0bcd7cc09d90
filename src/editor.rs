// ABOUTME: Editor tab manager for the carousel pipeline
// ABOUTME: Keeps one editable tab per gallery entry and tracks unsaved changes

use crate::gallery::GalleryEvent;
use crate::model::{ContentPayload, GalleryEntry};
use log::debug;

/// An open, editable gallery entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorTab {
    pub id: String,
    pub entry_id: String,
    pub title: String,
    pub slides: Vec<String>,
    pub content: ContentPayload,
    pub backend_id: Option<u64>,
    saved_slides: Vec<String>,
    saved_content: ContentPayload,
}

impl EditorTab {
    /// Tab id for a gallery entry id.
    pub fn id_for(entry_id: &str) -> String {
        format!("gallery-{}", entry_id)
    }

    fn from_entry(entry: &GalleryEntry) -> Self {
        Self {
            id: Self::id_for(&entry.id),
            entry_id: entry.id.clone(),
            title: entry.template_name.clone(),
            slides: entry.slides.clone(),
            content: entry.content.clone(),
            backend_id: entry.backend_id,
            saved_slides: entry.slides.clone(),
            saved_content: entry.content.clone(),
        }
    }

    /// Whether the slides can be re-rendered from structured content.
    /// Prerendered entries carry slides without slide contents.
    pub fn is_editable(&self) -> bool {
        self.slides.is_empty() || !self.content.slide_contents.is_empty()
    }

    /// Whether the tab differs from what was last loaded or saved.
    ///
    /// Rendering is deterministic, so equal content always renders to equal
    /// slides and a plain comparison is enough.
    pub fn is_dirty(&self) -> bool {
        self.slides != self.saved_slides || self.content != self.saved_content
    }
}

/// Ordered set of editor tabs with one active tab.
#[derive(Debug, Default)]
pub struct EditorTabs {
    tabs: Vec<EditorTab>,
    active: Option<String>,
}

impl EditorTabs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `entry`, reusing its tab when one exists.
    ///
    /// A reused tab without unsaved changes picks up the entry's current
    /// content; a dirty tab keeps its edits.
    pub fn open_tab(&mut self, entry: &GalleryEntry) -> EditorTab {
        let id = EditorTab::id_for(&entry.id);

        let tab = match self.tabs.iter_mut().find(|tab| tab.id == id) {
            Some(existing) => {
                debug!("Bringing tab {} to front", id);
                if !existing.is_dirty() {
                    *existing = EditorTab::from_entry(entry);
                }
                existing.clone()
            }
            None => {
                debug!("Opening tab {}", id);
                let tab = EditorTab::from_entry(entry);
                self.tabs.push(tab.clone());
                tab
            }
        };

        self.active = Some(id);
        tab
    }

    /// Close one tab. Returns whether any editor is still visible.
    pub fn close_tab(&mut self, id: &str) -> bool {
        let Some(position) = self.tabs.iter().position(|tab| tab.id == id) else {
            return self.is_visible();
        };
        self.tabs.remove(position);

        if self.active.as_deref() == Some(id) {
            // Activate the neighbour that slid into place, or the new last tab
            self.active = self
                .tabs
                .get(position)
                .or_else(|| self.tabs.last())
                .map(|tab| tab.id.clone());
        }
        self.is_visible()
    }

    pub fn close_all(&mut self) {
        self.tabs.clear();
        self.active = None;
    }

    /// Keep only tabs whose entries are in `entry_ids`.
    pub fn retain_entries(&mut self, entry_ids: &[String]) {
        let closed: Vec<String> = self
            .tabs
            .iter()
            .filter(|tab| !entry_ids.contains(&tab.entry_id))
            .map(|tab| tab.id.clone())
            .collect();
        for id in closed {
            self.close_tab(&id);
        }
    }

    /// Follow a gallery change: tabs whose entries are gone get closed.
    /// Returns whether any editor is still visible.
    pub fn handle_gallery_event(&mut self, event: &GalleryEvent) -> bool {
        let ids: Vec<String> = event.entries.iter().map(|e| e.id.clone()).collect();
        self.retain_entries(&ids);
        self.is_visible()
    }

    pub fn is_visible(&self) -> bool {
        !self.tabs.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&EditorTab> {
        self.tabs.iter().find(|tab| tab.id == id)
    }

    pub fn active(&self) -> Option<&EditorTab> {
        self.active.as_deref().and_then(|id| self.get(id))
    }

    pub fn tabs(&self) -> &[EditorTab] {
        &self.tabs
    }

    /// Replace a tab's working content and slides.
    pub fn update_tab(&mut self, id: &str, content: ContentPayload, slides: Vec<String>) -> bool {
        match self.tabs.iter_mut().find(|tab| tab.id == id) {
            Some(tab) => {
                tab.content = content;
                tab.slides = slides;
                true
            }
            None => false,
        }
    }

    /// Record the tab's working state as saved.
    pub fn mark_saved(&mut self, id: &str) -> bool {
        match self.tabs.iter_mut().find(|tab| tab.id == id) {
            Some(tab) => {
                tab.saved_slides = tab.slides.clone();
                tab.saved_content = tab.content.clone();
                true
            }
            None => false,
        }
    }
}
