//! Command routing from host envelopes to the search service.

use flixscout_search::Enrichment;
use serde::Deserialize;

use crate::app::App;
use crate::error::{AppError, Result};
use crate::host::contract::{
    CommandEnvelope, CommandName, ContractError, ContractErrorKind, EVENT_VERSION,
    ResponseEnvelope,
};

#[derive(Debug, Deserialize)]
struct SearchStartPayload {
    query: String,
    #[serde(default)]
    enrichment: Option<Enrichment>,
}

/// Dispatches validated command envelopes to an [`App`].
#[derive(Debug, Clone)]
pub struct HostRouter {
    app: App,
}

impl HostRouter {
    pub fn new(app: App) -> Self {
        Self { app }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    /// Handle one command. Failures become error responses carrying the
    /// command's request id.
    pub async fn route(&self, envelope: &CommandEnvelope) -> ResponseEnvelope {
        if let Err(e) = envelope.validate() {
            return ResponseEnvelope::error(envelope.request_id.clone(), e.to_string());
        }

        tracing::debug!(
            request_id = %envelope.request_id,
            command = envelope.command.as_str(),
            "routing host command"
        );

        match self.dispatch(envelope).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    request_id = %envelope.request_id,
                    command = envelope.command.as_str(),
                    error = %e,
                    "host command failed"
                );
                ResponseEnvelope::error(envelope.request_id.clone(), e.to_string())
            }
        }
    }

    async fn dispatch(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let request_id = envelope.request_id.clone();
        let service = self.app.service();

        let payload = match envelope.command {
            CommandName::HostPing => serde_json::json!({"pong": true}),
            CommandName::HostVersion => serde_json::json!({
                "contract_version": EVENT_VERSION,
                "package_version": env!("CARGO_PKG_VERSION"),
            }),
            CommandName::SearchStart => {
                let start = parse_search_start(&envelope.payload)?;
                service.search(start.query, start.enrichment).await?;
                serde_json::json!({"accepted": true, "state": service.state()})
            }
            CommandName::SearchLoadMore => {
                let started = service.load_more().await?;
                serde_json::json!({"started": started})
            }
            CommandName::SearchClear => {
                service.clear().await?;
                serde_json::json!({"accepted": true})
            }
            CommandName::SearchState => to_value(&service.state())?,
            CommandName::SourcesList => serde_json::json!({"sources": self.app.sources()}),
            CommandName::RuntimeStop => {
                self.app.shutdown();
                serde_json::json!({"stopping": true})
            }
        };

        Ok(ResponseEnvelope::ok(request_id, payload))
    }
}

fn parse_search_start(payload: &serde_json::Value) -> Result<SearchStartPayload> {
    serde_json::from_value(payload.clone()).map_err(|e| {
        AppError::Bridge(
            ContractError::new(
                ContractErrorKind::InvalidPayload,
                format!("search.start payload: {e}"),
            )
            .to_string(),
        )
    })
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| AppError::Bridge(format!("failed to encode payload: {e}")))
}
