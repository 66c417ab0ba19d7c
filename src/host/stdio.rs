//! Stdin/stdout JSON bridge for the host command channel.
//!
//! Reads newline-delimited JSON `CommandEnvelope` messages, dispatches them
//! through [`HostRouter`], and writes `ResponseEnvelope` and
//! `EventEnvelope` messages as newline-delimited JSON.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use std::sync::Arc;

use flixscout_search::SearchState;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{Mutex, broadcast};

use crate::error::{AppError, Result};
use crate::host::contract::{
    CommandEnvelope, CommandName, EventEnvelope, ResponseEnvelope, SEARCH_STATE_EVENT,
};
use crate::host::router::HostRouter;

type SharedWriter<W> = Arc<Mutex<BufWriter<W>>>;

/// Run the bridge on the process's stdin and stdout.
pub async fn run_stdio_bridge(router: HostRouter) -> Result<()> {
    run_bridge(
        router,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

/// Run the bridge until `input` closes or a `runtime.stop` command is
/// received.
///
/// Two tasks operate concurrently:
///
/// 1. **Reader** -- reads newline-delimited JSON from `input`, routes each
///    `CommandEnvelope`, and writes the resulting `ResponseEnvelope`.
/// 2. **Event forwarder** -- writes every search state transition as a
///    `search.state` event.
///
/// The search service is stopped when the bridge exits.
pub async fn run_bridge<R, W>(router: HostRouter, input: R, output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer = Arc::new(Mutex::new(BufWriter::new(output)));

    let events = router.app().service().subscribe();
    let event_handle = tokio::spawn(forward_events(events, Arc::clone(&writer)));

    let reader_result = run_reader(&router, input, &writer).await;

    router.app().shutdown();
    event_handle.abort();
    let _ = event_handle.await;

    reader_result
}

async fn forward_events<W>(mut events: broadcast::Receiver<SearchState>, writer: SharedWriter<W>)
where
    W: AsyncWrite + Unpin,
{
    loop {
        match events.recv().await {
            Ok(state) => {
                let event = match serde_json::to_value(&state) {
                    Ok(payload) => EventEnvelope::new(SEARCH_STATE_EVENT, payload),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize search state; skipping");
                        continue;
                    }
                };
                if let Err(e) = write_json(&writer, &event).await {
                    tracing::warn!(
                        error = %e,
                        "failed to write event envelope; stopping event forwarder"
                    );
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(lagged = n, "event forwarder lagged; some states were dropped");
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::info!("state channel closed; stopping event forwarder");
                break;
            }
        }
    }
}

/// Read line-by-line, dispatch each command, and write responses.
async fn run_reader<R, W>(router: &HostRouter, mut input: R, writer: &SharedWriter<W>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = input
            .read_line(&mut line)
            .await
            .map_err(|e| AppError::Channel(format!("failed to read command: {e}")))?;

        if bytes_read == 0 {
            tracing::info!("input closed (EOF); shutting down bridge");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let envelope: CommandEnvelope = match serde_json::from_str(trimmed) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse command envelope");
                let response = ResponseEnvelope::error(
                    "parse-error",
                    format!("failed to parse command envelope: {e}"),
                );
                write_json(writer, &response).await?;
                continue;
            }
        };

        let is_stop = envelope.command == CommandName::RuntimeStop;
        let response = router.route(&envelope).await;
        write_json(writer, &response).await?;

        if is_stop && response.ok {
            tracing::info!("runtime.stop received; shutting down bridge");
            break;
        }
    }

    Ok(())
}

/// Serialize `value` as a single line and flush.
async fn write_json<W, T>(writer: &SharedWriter<W>, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let json = serde_json::to_string(value)
        .map_err(|e| AppError::Bridge(format!("failed to serialize envelope: {e}")))?;

    let mut w = writer.lock().await;
    w.write_all(json.as_bytes())
        .await
        .map_err(|e| AppError::Channel(format!("failed to write output: {e}")))?;
    w.write_all(b"\n")
        .await
        .map_err(|e| AppError::Channel(format!("failed to write newline: {e}")))?;
    w.flush()
        .await
        .map_err(|e| AppError::Channel(format!("failed to flush output: {e}")))?;
    Ok(())
}
