//! Chainprobe Binary Entry Point
//!
//! Runs the complete latency exporter: collectors, metrics endpoint, and
//! optional push forwarding. Core functionality is provided by the
//! `chainprobe` library crate.

use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chainprobe::{
    chains,
    config::{AppConfig, ProvidersConfig, Secrets},
    orchestrator::Orchestrator,
    push,
    server::{AppState, create_router},
};

/// Chainprobe - Blockchain RPC Latency Exporter
#[derive(Parser, Debug)]
#[command(name = "chainprobe", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/config.yaml",
        env = "CHAINPROBE_CONFIG"
    )]
    config: String,

    /// Server bind address (overrides config file)
    #[arg(long, env = "CHAINPROBE_SERVER_BIND")]
    server_bind: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, env = "CHAINPROBE_SERVER_PORT")]
    server_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chainprobe=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Chainprobe - Blockchain RPC Latency Exporter");

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration from file
    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = AppConfig::load(&cli.config)?;

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(bind) = cli.server_bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.server_port {
        config.server.port = port;
    }
    config.validate()?;

    // Load provider inventory and secrets
    tracing::info!("Loading providers from: {}", config.providers_path);
    let providers = ProvidersConfig::load(&config.providers_path)?;
    let secrets = match &config.secrets_path {
        Some(path) => {
            tracing::info!("Loading secrets from: {}", path);
            Secrets::load(path)?
        }
        None => Secrets::default(),
    };

    // Start collectors
    let registry = chains::builtin_registry()?;
    tracing::info!(
        blockchains = ?registry.blockchains(),
        providers = providers.providers.len(),
        "starting collectors"
    );

    let mut orchestrator = Orchestrator::new(registry);
    orchestrator.start_providers(&providers.providers, &config.defaults, &secrets);
    tracing::info!("{} collectors running", orchestrator.collector_count());

    let handles = orchestrator.handles();

    // Optional push forwarding
    let mut push_task = None;
    if let Some(push_settings) = config.push.clone() {
        push_task = Some(tokio::spawn(push::run(
            push_settings,
            handles.clone(),
            orchestrator.shutdown_token(),
        )));
    }

    // Build Axum router
    let app = create_router(AppState {
        collectors: handles,
    });

    // Parse bind address
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;

    tracing::info!("Metrics server listening on: http://{}/metrics", addr);
    tracing::info!("Press Ctrl+C to shutdown");

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down collectors...");
    orchestrator.shutdown().await;
    if let Some(task) = push_task {
        let _ = task.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
