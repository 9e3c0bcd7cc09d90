mod common;

use carousel::{render_all_slides, GalleryEntry, GalleryEventKind, GalleryStore, SlideTemplate};
use common::{content, entry};
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

fn cache_files(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir.path())
        .expect("Failed to list cache dir")
        .map(|e| e.expect("Bad dir entry").file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn test_entries_survive_reopen() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("gallery.json");

    let store = GalleryStore::open(&path).expect("Failed to open gallery");
    assert!(store.is_empty());
    store
        .insert_completed(entry("a", &["One"], Some(1)))
        .expect("Insert failed");
    store
        .insert_completed(entry("b", &["Two"], None))
        .expect("Insert failed");
    store.mark_viewed("a").expect("Mark failed");

    let reopened = GalleryStore::open(&path).expect("Failed to reopen gallery");
    let ids: Vec<String> = reopened.get_all().into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(reopened.get("a").map(|e| e.viewed), Some(true));
    assert_eq!(reopened.get("a").and_then(|e| e.backend_id), Some(1));

    // Only the cache itself; temporary files were renamed away
    assert_eq!(cache_files(&temp_dir), vec!["gallery.json"]);
}

#[test]
fn test_cache_is_written_in_current_shape() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("gallery.json");

    let store = GalleryStore::open(&path).expect("Failed to open gallery");
    store
        .insert_completed(entry("a", &["One"], Some(5)))
        .expect("Insert failed");

    let written: Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("Failed to read cache"))
            .expect("Cache is not JSON");
    let first = &written[0];
    assert_eq!(first["contentRef"], json!("ref-a"));
    assert_eq!(first["backendId"], json!(5));
    assert!(first["content"]["slideContents"].is_array());
    assert!(first.get("carouselData").is_none());
}

#[test]
fn test_legacy_cache_is_migrated_on_open() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("gallery.json");
    let legacy = json!([
        {
            "id": "old-1",
            "postCode": "CxYz",
            "templateName": "Template 2",
            "createdAt": 1690000000000i64,
            "slides": ["<div>stale</div>"],
            "carouselData": {
                "dados_gerais": { "template": "2" },
                "slides": [
                    "{\"title\":\"Cover\",\"imagem_fundo\":\"https://example.com/a.mp4\"}",
                    "{\"title\":\"Body\",\"subtitle\":\"Details\"}"
                ]
            },
            "generatedContentId": 77
        },
        {
            "id": "new-1",
            "contentRef": "post",
            "templateName": "Template 2",
            "createdAt": 1,
            "slides": ["<p>ok</p>"],
            "content": { "generalInfo": { "template": "2" }, "slideContents": [{ "title": "ok" }] }
        }
    ]);
    fs::write(&path, legacy.to_string()).expect("Failed to write legacy cache");

    let store = GalleryStore::open(&path).expect("Failed to open gallery");

    let migrated = store.get("old-1").expect("Legacy entry lost");
    assert_eq!(migrated.content_ref, "CxYz");
    assert_eq!(migrated.backend_id, Some(77));
    assert_eq!(migrated.content.slide_contents.len(), 2);
    assert_eq!(migrated.content.slide_contents[1].subtitle.as_deref(), Some("Details"));

    let direct = render_all_slides(&[SlideTemplate::builtin()], &migrated.content)
        .expect("Render failed");
    assert_eq!(migrated.slides, direct);
    assert!(migrated.slides[0].contains("<video"));

    let untouched = store.get("new-1").expect("Current entry lost");
    assert_eq!(untouched.slides, vec!["<p>ok</p>"]);

    // The file now holds the current shape only
    let rewritten = fs::read_to_string(&path).expect("Failed to read cache");
    assert!(!rewritten.contains("carouselData"));
    let reread: Vec<GalleryEntry> = serde_json::from_str(&rewritten).expect("Rewritten cache unreadable");
    assert_eq!(reread.len(), 2);
    assert_eq!(reread[0], migrated);
}

#[test]
fn test_unreadable_cache_starts_empty() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("gallery.json");
    fs::write(&path, "{ not json").expect("Failed to write cache");

    let store = GalleryStore::open(&path).expect("Failed to open gallery");

    assert!(store.is_empty());
}

#[test]
fn test_duplicate_ids_on_disk_are_collapsed() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("gallery.json");
    let mut second = entry("a", &["Second"], None);
    second.template_name = "Other".to_string();
    let entries = vec![entry("a", &["First"], None), second, entry("b", &["B"], None)];
    fs::write(&path, serde_json::to_string(&entries).expect("Serialize failed"))
        .expect("Failed to write cache");

    let store = GalleryStore::open(&path).expect("Failed to open gallery");

    assert_eq!(store.len(), 2);
    assert_eq!(store.get("a").map(|e| e.template_name), Some("Template 2".to_string()));
}

#[test]
fn test_reconcile_with_persists_and_notifies() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("gallery.json");
    let store = GalleryStore::open(&path).expect("Failed to open gallery");
    store
        .replace_all(vec![entry("local", &["L"], None), entry("api-1", &["Stale"], Some(1))])
        .expect("Replace failed");
    let mut events = store.subscribe();

    let merged = store
        .reconcile_with(vec![entry("api-1", &["Fresh"], Some(1)), entry("api-2", &["New"], Some(2))])
        .expect("Reconcile failed");

    let ids: Vec<&str> = merged.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["api-1", "api-2", "local"]);
    assert_eq!(merged[0].content, content("2", &["Fresh"]));

    let event = events.try_recv().expect("Missing event");
    assert_eq!(event.kind, GalleryEventKind::Replaced);
    assert_eq!(event.entries.len(), 3);

    let reopened = GalleryStore::open(&path).expect("Failed to reopen gallery");
    assert_eq!(reopened.get_all(), merged);
}

#[test]
fn test_update_entry_and_clear() {
    let store = GalleryStore::in_memory();
    store
        .insert_completed(entry("a", &["One"], None))
        .expect("Insert failed");
    let mut events = store.subscribe();

    let edited = content("2", &["Edited"]);
    assert!(store
        .update_entry("a", edited.clone(), vec!["<p>Edited</p>".to_string()])
        .expect("Update failed"));
    assert!(!store
        .update_entry("missing", edited.clone(), Vec::new())
        .expect("Update failed"));
    assert_eq!(store.get("a").map(|e| e.content), Some(edited));

    store.clear().expect("Clear failed");
    assert!(store.is_empty());

    let kinds: Vec<GalleryEventKind> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|event| event.kind)
        .collect();
    assert_eq!(kinds, vec![GalleryEventKind::Updated, GalleryEventKind::Cleared]);
}
