//! vettriage-ai - Multimodal Triage Orchestrator
//!
//! **Module Identity:**
//! - Name: vettriage-ai
//! - Port: 5002 (default)
//!
//! Fronts the text, audio and image model services, fans each request out
//! to the models that have input, and fuses their answers into one triage
//! report.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vettriage_ai::coordinator::Coordinator;
use vettriage_ai::predictors::{HttpPredictor, Predictor};
use vettriage_ai::registry::ModelRegistry;
use vettriage_ai::types::Modality;
use vettriage_ai::AppState;
use vettriage_common::config::{
    load_toml_config, resolve_config_path, write_toml_config, ConfigSource, PredictorEndpoint,
    TomlConfig, CONFIG_ENV_VAR,
};

/// Command-line arguments for vettriage-ai
#[derive(Parser, Debug)]
#[command(name = "vettriage-ai")]
#[command(about = "Multimodal veterinary triage orchestrator")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "VETTRIAGE_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides config file)
    #[arg(short, long, env = "VETTRIAGE_BIND_ADDR")]
    bind: Option<String>,

    /// Write the default configuration to this path and exit
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.write_default_config {
        write_toml_config(&TomlConfig::default(), path)
            .with_context(|| format!("Failed to write default config to {}", path.display()))?;
        println!("Default configuration written to {}", path.display());
        return Ok(());
    }

    // Configuration is read first so its log level can seed the filter
    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let (mut config, config_source) =
        load_toml_config(config_path.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting vettriage-ai (Multimodal Triage Orchestrator)");
    let build = vettriage_ai::api::health::BuildInfo::current();
    info!(
        "Version: {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        build.git_hash,
        build.timestamp,
        build.profile
    );
    match &config_source {
        ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
        ConfigSource::Missing(path) => {
            warn!("Config file {} not found, using compiled defaults", path.display())
        }
        ConfigSource::Defaults => info!("No config file found, using compiled defaults"),
    }

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    // Step 1: Build and load the models
    let predict_timeout = Duration::from_millis(config.predict_timeout_ms);
    let registry = Arc::new(build_registry(&config, predict_timeout)?);
    registry
        .initialize()
        .await
        .context("Failed to load models")?;
    info!("Models loaded: {:?}", registry.loaded_modalities());

    // Step 2: Application state and router
    let coordinator = Arc::new(Coordinator::new(Arc::clone(&registry), predict_timeout));
    let state = AppState::new(coordinator).with_max_upload_bytes(config.max_upload_bytes);
    let app = vettriage_ai::build_router(state);

    // Step 3: Serve
    let listener = tokio::net::TcpListener::bind((config.bind_addr.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind to {}:{}", config.bind_addr, config.port))?;
    let addr: SocketAddr = listener.local_addr().context("Failed to read bound address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    registry.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Build one HTTP predictor per modality from configuration
fn build_registry(config: &TomlConfig, predict_timeout: Duration) -> Result<ModelRegistry> {
    let endpoints = [
        (Modality::Text, &config.predictors.text),
        (Modality::Audio, &config.predictors.audio),
        (Modality::Image, &config.predictors.image),
    ];

    let mut builder = ModelRegistry::builder();
    for (modality, endpoint) in endpoints {
        let predictor = build_predictor(modality, endpoint, predict_timeout)?;
        info!(
            modality = %modality,
            url = %endpoint.url,
            serialize = endpoint.serialize,
            "Registering predictor"
        );
        builder = if endpoint.serialize {
            builder.register_serialized(predictor)
        } else {
            builder.register(predictor)
        };
    }
    Ok(builder.build())
}

fn build_predictor(
    modality: Modality,
    endpoint: &PredictorEndpoint,
    predict_timeout: Duration,
) -> Result<Arc<dyn Predictor>> {
    let predictor = HttpPredictor::new(
        modality,
        endpoint.url.clone(),
        endpoint.health_url.clone(),
        predict_timeout,
    )
    .with_context(|| format!("Failed to create {} predictor", modality))?;
    Ok(Arc::new(predictor))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
