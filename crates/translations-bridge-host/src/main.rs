//! Translations Bridge Host
//!
//! Main entry point for the stdio host. Content frames talk to the host as
//! JSON lines on stdin and stdout; the background translation context runs
//! as a child process. See [`protocol`] for the line formats.

mod config;
mod process;
mod protocol;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Stdout};
use tokio::signal;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use translations_bridge_core::FrameId;
use translations_bridge_router::{
    EngineRouter, FrameHandle, FrameRegistry, OrderedDispatcher, Origin, Reply, ReplyChannel,
};
use translations_bridge_service::{
    DownloadConfig, FileManifestSource, HttpAttachmentFetcher, ManifestSource,
    ModelDownloadCoordinator, ModelManager, ModelManifest, StaticManifestSource,
};
use translations_bridge_store::JsonFileCacheStore;
use url::Url;

use crate::config::BridgeConfig;
use crate::process::{BackgroundRequest, ProcessContext};
use crate::protocol::{FrameLine, FrameOutput, LineSink, StdioFrame};

type StdoutSink = Arc<LineSink<Stdout>>;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration directory
    #[arg(short, long, env = "CONFIG_DIR", default_value = "config")]
    config_dir: String,

    /// Environment (development, production, etc.)
    #[arg(short, long, env = "ENVIRONMENT", default_value = "development")]
    environment: String,

    /// Directory for downloaded model files
    #[arg(long, env = "TRANSLATIONS_MODELS_DIR")]
    models_dir: Option<PathBuf>,

    /// Manifest file with the model records
    #[arg(long, env = "TRANSLATIONS_MANIFEST")]
    manifest: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Delete every cached model and downloaded file, then exit
    #[arg(long)]
    purge: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = BridgeConfig::load_or_default(&args.config_dir, &args.environment);

    // Override with command-line arguments
    if let Some(models_dir) = args.models_dir {
        config.models.directory = Some(models_dir);
    }
    if let Some(manifest) = args.manifest {
        config.manifest.path = Some(manifest);
    }
    if let Some(log_level) = args.log_level {
        config.logging.level = log_level;
    }

    let telemetry_config = telemetry::TelemetryConfig::new()
        .with_log_level(config.logging.level.clone())
        .with_json_format(config.logging.json_format)
        .with_thread_ids(config.logging.include_thread_ids)
        .with_target(config.logging.include_target);

    telemetry::init_with_config(telemetry_config);

    info!("Starting Translations Bridge Host");
    info!("Environment: {}", args.environment);
    info!("Models directory: {}", config.models.models_dir().display());

    let models = Arc::new(build_model_manager(&config).await?);

    if args.purge {
        models
            .purge_all_data()
            .await
            .context("Failed to purge translation models")?;
        info!("Purged all translation model data");
        return Ok(());
    }

    let (context, background_requests) = ProcessContext::new(config.engine.clone());
    let context = Arc::new(context);
    let frames = Arc::new(FrameRegistry::new());
    let router = EngineRouter::new(context.clone(), models, frames);
    router.start().await;

    let out: StdoutSink = Arc::new(LineSink::new(tokio::io::stdout()));
    run(OrderedDispatcher::new(router), context.clone(), background_requests, out).await;

    context.shutdown().await;
    info!("Host shutdown complete");
    Ok(())
}

/// Wire the cache, manifest and downloader into a model manager
async fn build_model_manager(config: &BridgeConfig) -> Result<ModelManager> {
    let store_path = config.models.store_path();
    let cache = JsonFileCacheStore::open(&store_path)
        .await
        .with_context(|| format!("Failed to open model cache at {}", store_path.display()))?;

    let source: Arc<dyn ManifestSource> = match &config.manifest.path {
        Some(path) => Arc::new(FileManifestSource::new(path)),
        None => {
            warn!("No manifest configured; model requests will fail");
            Arc::new(StaticManifestSource::new(Vec::new()))
        }
    };
    let manifest = Arc::new(ModelManifest::new(source));
    if config.manifest.preload {
        match manifest.preload().await {
            Ok(count) => info!("Loaded {} model records", count),
            Err(e) => warn!("Manifest preload failed, will retry on demand: {}", e),
        }
    }

    let base_url = Url::parse(&config.models.base_url).context("Invalid attachments base URL")?;
    let fetcher = HttpAttachmentFetcher::new(Duration::from_secs(
        config.models.request_timeout_seconds,
    ))
    .context("Failed to build HTTP client")?;
    let download_config = DownloadConfig::new(base_url, config.models.models_dir())
        .with_verify_integrity(config.models.verify_integrity);
    let downloader = Arc::new(ModelDownloadCoordinator::new(download_config, Arc::new(fetcher)));

    Ok(
        ModelManager::new(manifest, Arc::new(cache), downloader)
            .with_policy(config.models.revision_policy)
            .with_default_version(config.models.default_version.clone()),
    )
}

/// Serve frame lines and background requests until input ends or a signal arrives
async fn run(
    dispatcher: OrderedDispatcher,
    context: Arc<ProcessContext>,
    mut background_requests: mpsc::Receiver<BackgroundRequest>,
    out: StdoutSink,
) {
    // Strong references; the registry only holds weak ones
    let mut surfaces: HashMap<String, FrameHandle> = HashMap::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    handle_frame_line(&dispatcher, &mut surfaces, &out, &line).await;
                }
                Ok(None) => {
                    info!("Input closed, shutting down");
                    break;
                }
                Err(e) => {
                    error!("Failed to read input: {}", e);
                    break;
                }
            },
            Some(request) = background_requests.recv() => {
                submit_background_request(&dispatcher, context.clone(), request);
            },
            _ = &mut shutdown => break,
        }
    }
}

async fn handle_frame_line(
    dispatcher: &OrderedDispatcher,
    surfaces: &mut HashMap<String, FrameHandle>,
    out: &StdoutSink,
    line: &str,
) {
    if line.trim().is_empty() {
        return;
    }

    let frame_line: FrameLine = match serde_json::from_str(line) {
        Ok(frame_line) => frame_line,
        Err(e) => {
            warn!("Ignoring malformed input line: {}", e);
            return;
        }
    };

    if frame_line.closed {
        surfaces.remove(&frame_line.frame);
        dispatcher
            .router()
            .frames()
            .unregister(&FrameId::from(frame_line.frame.as_str()))
            .await;
        debug!(frame = %frame_line.frame, "Frame closed");
        return;
    }

    let Some(envelope) = frame_line.message else {
        return;
    };

    let frame = surfaces
        .entry(frame_line.frame.clone())
        .or_insert_with(|| {
            Arc::new(StdioFrame::new(frame_line.frame.clone(), out.clone())) as FrameHandle
        })
        .clone();

    let (channel, receiver) = ReplyChannel::new();
    dispatcher.submit(Origin::Frame(frame), envelope, channel);

    let out = out.clone();
    let surface = frame_line.frame;
    tokio::spawn(async move {
        let Some(reply) = serialize_reply(receiver).await else {
            return;
        };
        let line = FrameOutput {
            frame: &surface,
            reply: Some(reply),
            eval: None,
        };
        if let Err(e) = out.send(&line).await {
            error!("Failed to write reply: {}", e);
        }
    });
}

fn submit_background_request(
    dispatcher: &OrderedDispatcher,
    context: Arc<ProcessContext>,
    request: BackgroundRequest,
) {
    let (channel, receiver) = ReplyChannel::new();
    dispatcher.submit(Origin::Background, request.envelope, channel);

    tokio::spawn(async move {
        let Ok(reply) = receiver.await else {
            return;
        };
        if let Err(e) = context.reply(request.id, &reply).await {
            warn!("{}", e);
        }
    });
}

/// Wait for a reply and serialize it
async fn serialize_reply(receiver: oneshot::Receiver<Reply>) -> Option<Value> {
    let reply = receiver.await.ok()?;
    match reply.to_value() {
        Ok(value) => Some(value),
        Err(e) => {
            error!("Failed to serialize reply: {}", e);
            None
        }
    }
}

/// Shutdown signal handler
///
/// Waits for SIGTERM or SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        },
    }
}
