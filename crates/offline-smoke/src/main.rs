//! Smoke harness for the offline worker.
//!
//! Registers a worker against a live origin, then drives events through it
//! and prints one JSON line per result.
//!
//! ## Usage
//!
//! ```bash
//! # Install, activate, then fetch pages through the worker
//! offline-smoke --scope http://localhost:8080/ run / /contact.html
//!
//! # Deliver a push message
//! offline-smoke push '{"message":"New post"}'
//!
//! # Fire the background sync
//! offline-smoke --config worker.json sync
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use offline_common::{init_logging, LogConfig, LogFormat};
use offline_net::{LoaderConfig, Request, ResourceLoader, Url};
use offline_worker::{
    CacheStorage, LogNotifier, NotificationSink, PushMessage, RecordingNotifier,
    ServiceWorkerContainer, SyncEvent, WorkerConfig,
};
use serde_json::json;
use tracing::info;

#[derive(Parser)]
#[command(name = "offline-smoke")]
#[command(about = "Drive the offline worker against a live origin")]
struct Cli {
    /// Worker configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scope URL, overriding the configuration
    #[arg(long)]
    scope: Option<Url>,

    /// Log output format: pretty, compact or json
    #[arg(long, default_value = "pretty")]
    log_format: LogFormat,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Log notifications instead of printing them as JSON lines
    #[arg(long)]
    log_notifications: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch paths through the worker (defaults to the manifest)
    Run {
        /// Paths relative to the scope
        paths: Vec<String>,
    },

    /// Deliver a push message
    Push {
        /// Raw payload; JSON with a `message` field or plain text
        payload: Option<String>,
    },

    /// Fire a background sync
    Sync {
        /// Sync tag (defaults to the configured tag)
        tag: Option<String>,
    },
}

/// Where notifications go: the log, or `recorder` for printing at exit.
fn notification_sink(
    log_notifications: bool,
    recorder: &Arc<RecordingNotifier>,
) -> Arc<dyn NotificationSink> {
    if log_notifications {
        Arc::new(LogNotifier)
    } else {
        recorder.clone()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::debug()
    } else {
        LogConfig::default()
    };
    init_logging(log_config.with_format(cli.log_format));

    let mut config = match cli.config {
        Some(ref path) => WorkerConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => WorkerConfig::default(),
    };
    if let Some(scope) = cli.scope {
        config = config.with_scope(scope);
    }

    let loader = ResourceLoader::new(LoaderConfig::default())?;
    let recorder = Arc::new(RecordingNotifier::new());
    let (container, _events) = ServiceWorkerContainer::new(
        config.scope.clone(),
        Arc::new(CacheStorage::new()),
        Arc::new(loader),
        notification_sink(cli.log_notifications, &recorder),
    );

    let script = config.resolve("/service-worker.js")?;
    let worker = container
        .register(config.clone(), script)
        .await
        .context("registering worker")?;
    info!(worker = worker.raw(), scope = %config.scope, "Worker ready");

    match cli.command {
        Commands::Run { paths } => {
            let paths = if paths.is_empty() {
                config.manifest.clone()
            } else {
                paths
            };

            for path in paths {
                let url = config.resolve(&path)?;
                let outcome = container.handle_fetch(Request::get(url)).await?;
                let response = outcome.response();
                println!(
                    "{}",
                    json!({
                        "path": path,
                        "state": format!("{:?}", outcome.state()),
                        "status": response.status.as_u16(),
                        "bytes": response.bytes().len(),
                    })
                );
            }
        }
        Commands::Push { payload } => {
            let message = payload.map(PushMessage::new).unwrap_or_else(PushMessage::empty);
            container.push(message).await?;
        }
        Commands::Sync { tag } => {
            let tag = tag.unwrap_or_else(|| config.sync_tag.clone());
            match container.sync(SyncEvent::new(tag.clone())).await? {
                Some(outcome) => info!(tag = %tag, delivered = outcome.delivered(), "Sync finished"),
                None => info!(tag = %tag, "No handler for sync tag"),
            }
        }
    }

    for notification in recorder.drain().await {
        println!("{}", serde_json::to_string(&notification)?);
    }

    Ok(())
}
