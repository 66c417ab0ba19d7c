//! Headless host bridge binary for stdin/stdout JSON communication.
//!
//! Reads `CommandEnvelope` messages as newline-delimited JSON from stdin,
//! routes them to the search service, and writes `ResponseEnvelope` and
//! `EventEnvelope` messages to stdout.
//!
//! All tracing/diagnostic output goes to stderr so that stdout remains a
//! clean JSON protocol channel.

use std::path::PathBuf;

use clap::Parser;
use flixscout::host::{HostRouter, run_stdio_bridge};
use flixscout::{App, AppConfig};

#[derive(Debug, Parser)]
#[command(name = "flixscout-host", version, about = "FlixScout search host bridge")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("flixscout=info,flixscout_search=info")
            }),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    tracing::info!(sources = config.sources.len(), "flixscout-host starting");

    let app = App::start(&config)?;
    run_stdio_bridge(HostRouter::new(app)).await.map_err(|e| {
        tracing::error!(error = %e, "flixscout-host exited with error");
        anyhow::anyhow!("flixscout-host failed: {e}")
    })?;

    tracing::info!("flixscout-host shut down cleanly");
    Ok(())
}

/// An explicit path must exist; the default path falls back to defaults.
fn load_config(explicit: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    match explicit {
        Some(path) => Ok(AppConfig::from_file(&path)?),
        None => {
            let path = AppConfig::default_config_path();
            if path.exists() {
                Ok(AppConfig::from_file(&path)?)
            } else {
                tracing::warn!(path = %path.display(), "no config file; starting with no sources");
                Ok(AppConfig::default())
            }
        }
    }
}
