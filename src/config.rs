// ABOUTME: Configuration module for the carousel pipeline
// ABOUTME: Provides configuration settings and environment variable handling

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TEMPLATE_ID: &str = "2";
const DEFAULT_TEMPLATE_TTL_SECS: u64 = 3600;
const DEFAULT_TEMPLATE_TIMEOUT_MS: u64 = 10000;

/// Display names of the known templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateCatalog {
    names: BTreeMap<String, String>,
}

impl TemplateCatalog {
    /// Parse `id=Name` pairs separated by commas. Malformed pairs are skipped.
    pub fn parse(pairs: &str) -> Self {
        let names = pairs
            .split(',')
            .filter_map(|pair| pair.split_once('='))
            .map(|(id, name)| (id.trim().to_string(), name.trim().to_string()))
            .filter(|(id, name)| !id.is_empty() && !name.is_empty())
            .collect();
        Self { names }
    }

    pub fn with_name(mut self, id: &str, name: &str) -> Self {
        self.names.insert(id.to_string(), name.to_string());
        self
    }

    /// Name shown for a template; unknown ids read `Template {id}`.
    pub fn display_name(&self, template_id: &str) -> String {
        self.names
            .get(template_id)
            .cloned()
            .unwrap_or_else(|| format!("Template {}", template_id))
    }
}

/// Global configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub generator_url: String,
    pub template_source: String,
    pub gallery_api_url: Option<String>,
    pub gallery_cache_path: PathBuf,
    pub template_cache_ttl: Duration,
    pub template_timeout: Duration,
    pub auth_token: Option<String>,
    pub default_template_id: String,
    pub templates: TemplateCatalog,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generator_url: String::new(),
            template_source: "templates".to_string(),
            gallery_api_url: None,
            gallery_cache_path: default_cache_path(),
            template_cache_ttl: Duration::from_secs(DEFAULT_TEMPLATE_TTL_SECS),
            template_timeout: Duration::from_millis(DEFAULT_TEMPLATE_TIMEOUT_MS),
            auth_token: None,
            default_template_id: DEFAULT_TEMPLATE_ID.to_string(),
            templates: TemplateCatalog::default(),
        }
    }
}

impl Config {
    /// Create a new configuration instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let template_cache_ttl = env::var("TEMPLATE_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.template_cache_ttl);
        let template_timeout = env::var("TEMPLATE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.template_timeout);

        Self {
            generator_url: env::var("GENERATOR_URL").unwrap_or(defaults.generator_url),
            template_source: env::var("TEMPLATE_SOURCE").unwrap_or(defaults.template_source),
            gallery_api_url: non_empty_var("GALLERY_API_URL"),
            gallery_cache_path: env::var("GALLERY_CACHE_PATH")
                .ok()
                .map(PathBuf::from)
                .unwrap_or(defaults.gallery_cache_path),
            template_cache_ttl,
            template_timeout,
            auth_token: non_empty_var("AUTH_TOKEN"),
            default_template_id: non_empty_var("DEFAULT_TEMPLATE_ID")
                .unwrap_or(defaults.default_template_id),
            templates: env::var("TEMPLATE_NAMES")
                .map(|pairs| TemplateCatalog::parse(&pairs))
                .unwrap_or_default(),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// `{data_dir}/carousel/gallery.json`, or a relative path when the platform
/// has no data directory.
fn default_cache_path() -> PathBuf {
    let base = dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("carousel").join("gallery.json")
}
