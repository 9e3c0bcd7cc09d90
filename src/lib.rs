// ABOUTME: Library module for the carousel pipeline.
// ABOUTME: Generation queue, template store, slide renderer, gallery and editor tabs.

// Reexport modules
pub mod config;
pub mod editor;
pub mod errors;
pub mod gallery;
pub mod generator;
pub mod model;
pub mod pipeline;
pub mod queue;
pub mod remote;
pub mod render;
pub mod resources;
pub mod studio;
pub mod templates;
pub mod utils;

// Reexport common types and functions
pub use config::{Config, TemplateCatalog};
pub use editor::{EditorTab, EditorTabs};
pub use errors::{GenerationError, PipelineError, Result};
pub use gallery::{reconcile, GalleryEvent, GalleryEventKind, GalleryStore};
pub use generator::{classify_response, ContentGenerator, GenerationRequest, HttpContentGenerator};
pub use model::{
    ContentPayload, GalleryEntry, GeneralInfo, GenerationJob, JobPatch, JobStatus, SlideContent,
    SlideTemplate, StyleMap,
};
pub use pipeline::Pipeline;
pub use queue::GenerationQueue;
pub use remote::{parse_listing, GalleryRemote, HttpGalleryRemote, RemoteRecord};
pub use render::render_all_slides;
pub use resources::{DirTemplateSource, HttpTemplateSource, TemplateLocation, TemplateSource};
pub use studio::Studio;
pub use templates::TemplateStore;
