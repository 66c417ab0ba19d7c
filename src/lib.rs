//! FlixScout: multi-source film and series search.
//!
//! This crate supplies the concrete pieces around the
//! [`flixscout_search`] engine:
//!
//! - **Fetching**: [`fetch::HttpFetcher`] over `reqwest`, with challenge
//!   detection and an optional headless render service for fallback mode
//! - **Extraction**: [`extract::SelectorExtractor`], per-source CSS selectors
//! - **Persistence**: [`sink::JsonlResultSink`], append-only JSON lines
//! - **Host bridge**: newline-delimited JSON over stdin/stdout in [`host`]
//!
//! Everything is wired together from an [`AppConfig`] by [`app::App`].

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod host;
pub mod sink;

pub use app::{App, SourceOverrides};
pub use config::AppConfig;
pub use error::{AppError, Result};
