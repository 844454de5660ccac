use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use odin_jobs_core::{
    load_config, resolve_secret, validate_config, BatchRouter, DispatchRunner, Dispatcher,
    HttpJobQueue, HttpOdinApi, JobAddressEncoder, JobQueue, OdinApi, SqliteWatermarkStore,
    WatermarkStore,
};
use odin_jobs_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("ODIN_JOBS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );
    info!("Odin API root: {}", config.odin.api_root);
    info!("Database path: {:?}", config.database.path);

    // Resolve the secret before anything talks to the network
    let encoder = match &config.secret {
        Some(secret_config) => {
            let secret = resolve_secret(secret_config).context("Failed to resolve secret")?;
            let encoder = JobAddressEncoder::new(&secret, &config.odin.api_root)
                .context("Secret is not a usable key")?;
            info!("Job address encoder initialized");
            Some(encoder)
        }
        None => {
            info!("No secret configured");
            None
        }
    };

    // Create SQLite watermark store
    let store: Arc<dyn WatermarkStore> = Arc::new(
        SqliteWatermarkStore::new(&config.database.path)
            .context("Failed to create watermark store")?,
    );
    info!("Watermark store initialized");

    // Create batch router
    let batch = BatchRouter::new(&config.batch, encoder.clone())
        .context("Failed to create batch router")?;
    info!(
        "Batch router initialized ({} categories, target: {:?})",
        batch.categories().len(),
        config.batch.target
    );

    // Create dispatch runner if any project is configured
    let runner = if config.projects.is_empty() {
        info!("No projects configured, dispatch disabled");
        None
    } else {
        let (Some(encoder), Some(queue_config)) = (encoder, &config.queue) else {
            bail!("Projects are configured but secret or queue is missing");
        };

        let api: Arc<dyn OdinApi> =
            Arc::new(HttpOdinApi::new(&config.odin).context("Failed to create Odin client")?);
        let queue: Arc<dyn JobQueue> =
            Arc::new(HttpJobQueue::new(queue_config).context("Failed to create queue client")?);
        info!("Queue service at {}", queue_config.url);

        let dispatcher = Dispatcher::new(queue, Arc::clone(&store), encoder);
        let runner = DispatchRunner::new(
            api,
            Arc::clone(&store),
            dispatcher,
            config.projects.clone(),
            config.odin.period_step_days,
        );
        info!(
            "Dispatch runner initialized for {} (project, freqmode) pairs",
            runner.targets().len()
        );
        Some(runner)
    };

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), store, batch, runner));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
}
