//! HTTP fetcher for source pages.
//!
//! Strict mode is a plain `reqwest` GET with a short timeout. Fallback mode
//! goes through a headless browser service (`POST /content`) when one is
//! configured, and otherwise repeats the plain GET with the longer fallback
//! timeout.
//!
//! Responses are classified into the engine's [`FetchError`] taxonomy. An
//! anti-bot interstitial is recognised by markers in the body, both on
//! blocking status codes and on pages served with 200.

use std::time::Duration;

use async_trait::async_trait;
use flixscout_search::{EngineConfig, FetchError, FetchMode, Fetcher, Source};
use rand::seq::SliceRandom;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};

use crate::config::FetchSettings;
use crate::error::{AppError, Result};

/// Realistic browser User-Agent strings, rotated per request.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Lowercase body fragments of common anti-bot interstitials.
const CHALLENGE_MARKERS: &[&str] = &[
    "cf-browser-verification",
    "cf-chl-",
    "/cdn-cgi/challenge-platform/",
    "cf-turnstile",
    "just a moment...",
    "checking your browser before accessing",
    "attention required! | cloudflare",
    "ddos-guard",
];

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        // USER_AGENTS is a non-empty const array; choose only returns None on empty slices.
        .unwrap_or(USER_AGENTS[0])
}

/// Headless browser service returning rendered HTML for an address.
#[derive(Debug, Clone)]
struct RenderService {
    endpoint: String,
}

impl RenderService {
    fn new(base: &str, token: Option<&str>) -> Self {
        let mut endpoint = format!("{}/content", base.trim_end_matches('/'));
        if let Some(token) = token {
            endpoint.push_str("?token=");
            endpoint.push_str(&urlencode(token));
        }
        Self { endpoint }
    }
}

fn urlencode(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

/// [`Fetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    strict: reqwest::Client,
    fallback: reqwest::Client,
    render: Option<RenderService>,
    user_agent: Option<String>,
    markers: Vec<String>,
}

impl HttpFetcher {
    /// Build a fetcher using the engine's strict and fallback timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if an HTTP client cannot be constructed.
    pub fn new(settings: &FetchSettings, engine: &EngineConfig) -> Result<Self> {
        Self::with_timeouts(settings, engine.strict_timeout(), engine.fallback_timeout())
    }

    /// Build a fetcher with explicit per-mode timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if an HTTP client cannot be constructed.
    pub fn with_timeouts(
        settings: &FetchSettings,
        strict_timeout: Duration,
        fallback_timeout: Duration,
    ) -> Result<Self> {
        let markers = CHALLENGE_MARKERS
            .iter()
            .map(|m| (*m).to_owned())
            .chain(settings.challenge_markers.iter().map(|m| m.to_lowercase()))
            .collect();

        Ok(Self {
            strict: build_client(strict_timeout, settings.max_redirects)?,
            fallback: build_client(fallback_timeout, settings.max_redirects)?,
            render: settings
                .render_endpoint
                .as_deref()
                .map(|base| RenderService::new(base, settings.render_token.as_deref())),
            user_agent: settings.user_agent.clone(),
            markers,
        })
    }

    fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or_else(|| random_user_agent())
    }

    fn has_challenge(&self, body: &str) -> bool {
        let lower = body.to_lowercase();
        self.markers.iter().any(|m| lower.contains(m.as_str()))
    }

    async fn get(&self, client: &reqwest::Client, address: &str) -> std::result::Result<String, FetchError> {
        let response = client
            .get(address)
            .header(USER_AGENT, self.user_agent())
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_transport)?;
        tracing::trace!(address, status = status.as_u16(), bytes = body.len(), "response received");
        self.classify(status, body)
    }

    async fn render(&self, render: &RenderService, address: &str) -> std::result::Result<String, FetchError> {
        let response = self
            .fallback
            .post(&render.endpoint)
            .json(&serde_json::json!({ "url": address }))
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::NetworkError(format!(
                "render service returned HTTP {}",
                status.as_u16()
            )));
        }
        let body = response.text().await.map_err(classify_transport)?;
        if self.has_challenge(&body) {
            return Err(FetchError::BotProtectionDetected);
        }
        Ok(body)
    }

    fn classify(&self, status: StatusCode, body: String) -> std::result::Result<String, FetchError> {
        match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(FetchError::NotFound),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
                if self.has_challenge(&body) =>
            {
                Err(FetchError::BotProtectionDetected)
            }
            s if s.is_success() => {
                if self.has_challenge(&body) {
                    Err(FetchError::BotProtectionDetected)
                } else {
                    Ok(body)
                }
            }
            s => Err(FetchError::NetworkError(format!("HTTP {}", s.as_u16()))),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        source: &Source,
        address: &str,
        mode: FetchMode,
    ) -> std::result::Result<String, FetchError> {
        match mode {
            FetchMode::Strict if source.requires_automation => {
                tracing::debug!(source = %source.id, "source needs automation; skipping strict fetch");
                Err(FetchError::BotProtectionDetected)
            }
            FetchMode::Strict => self.get(&self.strict, address).await,
            FetchMode::Fallback => match &self.render {
                Some(render) => self.render(render, address).await,
                None => self.get(&self.fallback, address).await,
            },
        }
    }
}

fn build_client(timeout: Duration, max_redirects: usize) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .cookie_store(true)
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(max_redirects))
        .build()
        .map_err(|e| AppError::Config(format!("failed to build HTTP client: {e}")))
}

fn classify_transport(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::NetworkError(err.to_string())
    }
}
