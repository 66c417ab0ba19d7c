//! Application configuration loaded from TOML.
//!
//! ```toml
//! [engine]
//! worker_pool_size = 4
//! fast_phase_deadline_secs = 15
//!
//! [fetch]
//! render_endpoint = "http://localhost:3000"
//!
//! [sink]
//! path = "/var/lib/flixscout/results.jsonl"
//!
//! [[sources]]
//! id = "filmhub"
//! label = "FilmHub"
//! base_url = "https://filmhub.example"
//! priority = 1
//!
//! [sources.selectors]
//! item = "article.movie"
//! title = "h2"
//! ```

use std::path::{Path, PathBuf};

use flixscout_search::{ContentType, EngineConfig, Source};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Top-level configuration for the host application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub fetch: FetchSettings,
    pub sink: SinkSettings,
    pub sources: Vec<SourceEntry>,
}

/// HTTP fetching behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Fixed User-Agent. When unset a browser User-Agent is picked at random
    /// for every request.
    pub user_agent: Option<String>,
    /// Base address of a headless browser service exposing `POST /content`.
    /// Fallback fetches go through it when set.
    pub render_endpoint: Option<String>,
    /// Token appended to render requests as `?token=`.
    pub render_token: Option<String>,
    /// Maximum redirects followed per request.
    pub max_redirects: usize,
    /// Extra body substrings (case-insensitive) that identify a challenge
    /// page, on top of the built-in list.
    pub challenge_markers: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: None,
            render_endpoint: None,
            render_token: None,
            max_redirects: 10,
            challenge_markers: Vec::new(),
        }
    }
}

/// Where discovered items are persisted, if anywhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkSettings {
    /// Append every non-empty batch as JSON lines to this file.
    pub path: Option<PathBuf>,
}

/// One `[[sources]]` table: the source itself plus how to read its pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    #[serde(flatten)]
    pub source: Source,
    #[serde(default)]
    pub selectors: Selectors,
}

/// CSS selectors used to pull result items out of a search page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    /// One match per result.
    pub item: String,
    /// Title text, relative to the item.
    pub title: String,
    /// Element whose `href` is the detail page. The item itself is tried
    /// when nothing inside it matches.
    pub link: String,
    /// Element whose `src` (or `data-src`) is the poster.
    pub poster: Option<String>,
    /// Element whose text contains the release year.
    pub year: Option<String>,
    /// Any match inside the item marks it as a series.
    pub series_marker: Option<String>,
    /// Content type when no series marker is configured or matched.
    pub default_content_type: ContentType,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            item: "article".into(),
            title: "h2, h3".into(),
            link: "a[href]".into(),
            poster: Some("img".into()),
            year: None,
            series_marker: None,
            default_content_type: ContentType::Film,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/flixscout/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| std::env::temp_dir().join("flixscout-config"))
            .join("flixscout")
            .join("config.toml")
    }

    /// Check cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] for an invalid engine section or a render
    /// endpoint that is not an absolute http(s) address.
    pub fn validate(&self) -> Result<()> {
        self.engine
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        if let Some(endpoint) = &self.fetch.render_endpoint {
            let parsed = url::Url::parse(endpoint)
                .map_err(|e| AppError::Config(format!("invalid render_endpoint: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(AppError::Config(format!(
                    "render_endpoint must be http or https, got {}",
                    parsed.scheme()
                )));
            }
        }
        Ok(())
    }

    /// The bare source definitions, in file order.
    pub fn source_definitions(&self) -> Vec<Source> {
        self.sources.iter().map(|e| e.source.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[engine]
worker_pool_size = 2
strict_timeout_secs = 5

[fetch]
render_endpoint = "http://localhost:3000"
challenge_markers = ["please wait"]

[sink]
path = "/tmp/results.jsonl"

[[sources]]
id = "filmhub"
label = "FilmHub"
base_url = "https://filmhub.example"
priority = 1

[sources.selectors]
item = "div.card"
title = ".name"
year = ".year"

[[sources]]
id = "serieshub"
label = "SeriesHub"
base_url = "https://serieshub.example"
requires_automation = true

[[sources.sub_queries]]
label = "series"
template = "{base}/series?q={query}"
content_type = "series"
"#;

    #[test]
    fn parses_full_sample() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).expect("write sample");

        let config = AppConfig::from_file(&path).expect("parse sample");

        assert_eq!(config.engine.worker_pool_size, 2);
        assert_eq!(config.engine.fast_phase_deadline_secs, 15);
        assert_eq!(config.fetch.max_redirects, 10);
        assert_eq!(config.sink.path, Some(PathBuf::from("/tmp/results.jsonl")));
        assert_eq!(config.sources.len(), 2);

        let filmhub = &config.sources[0];
        assert_eq!(filmhub.source.priority, 1);
        assert!(filmhub.source.enabled);
        assert_eq!(filmhub.selectors.item, "div.card");
        assert_eq!(filmhub.selectors.link, "a[href]");
        assert_eq!(filmhub.selectors.year.as_deref(), Some(".year"));

        let serieshub = &config.sources[1];
        assert!(serieshub.source.requires_automation);
        assert_eq!(serieshub.source.sub_queries.len(), 1);
        assert_eq!(
            serieshub.source.sub_queries[0].content_type,
            Some(ContentType::Series)
        );
        assert_eq!(serieshub.selectors, Selectors::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_file_is_default() {
        let config: AppConfig = toml::from_str("").expect("parse empty");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn save_then_load_keeps_sources() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let mut config = AppConfig::default();
        config.sources.push(SourceEntry {
            source: Source::new("one", "One", "https://one.example"),
            selectors: Selectors::default(),
        });

        config.save_to_file(&path).expect("save");
        let loaded = AppConfig::from_file(&path).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = AppConfig::from_file(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(AppError::Io(_))));
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").expect("write");

        assert!(matches!(AppConfig::from_file(&path), Err(AppError::Config(_))));
    }

    #[test]
    fn validate_rejects_bad_engine_and_endpoint() {
        let mut config = AppConfig::default();
        config.engine.strict_timeout_secs = config.engine.fast_phase_deadline_secs;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.fetch.render_endpoint = Some("ftp://render.local".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = AppConfig::default_config_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.ends_with("config.toml"));
        assert!(path_str.contains("flixscout"));
    }
}
