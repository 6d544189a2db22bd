use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use sttbridge_backend::{BackendRegistry, SpeechBackend};
use sttbridge_bridge::SessionSettings;
use sttbridge_server::{create_router, serve, AppState};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sttbridge", about = "WebSocket to streaming speech recognition bridge")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = sttbridge_core::AppConfig::load_from_file(&cli.config)
        .with_context(|| format!("failed to load config from {:?}", cli.config))?;

    let env_filter = EnvFilter::try_new(&config.general.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false),
    );

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    tracing::info!("sttbridge starting");

    let registry = BackendRegistry::new();
    tracing::debug!(available = ?registry.list_backends(), "speech backends");
    let plugin_config = config
        .backend
        .plugin_config()
        .context("failed to read backend config")?;
    let backend: Arc<dyn SpeechBackend> = Arc::from(
        registry
            .build(&config.backend.name, plugin_config)
            .await
            .with_context(|| format!("failed to start backend '{}'", config.backend.name))?,
    );

    let state = AppState::new(backend, SessionSettings::from_config(&config));
    let app = create_router(state, &config.server);

    let addr = config.server.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        addr = %addr,
        ws_path = %config.server.ws_path,
        backend = %config.backend.name,
        "listening"
    );

    serve(listener, app, shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("sttbridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
