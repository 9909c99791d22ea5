use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use csv_agent::{
    api,
    config::{Config, StorageBackend},
    engine::{OpenAiEngine, ReasoningEngine},
    storage::{Database, FileStore, SqliteStore},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "csv-agent starting");

    // Load configuration
    let config = Config::load()?;

    // Initialize the file store backend
    let store: Arc<dyn FileStore> = match config.storage.backend {
        StorageBackend::Redb => {
            let db = Database::open(&config.storage.data_dir)?;
            info!(
                "Using redb file store in: {}",
                config.storage.data_dir.display()
            );
            Arc::new(db)
        }
        StorageBackend::Sqlite => {
            let path = config.sqlite_path();
            let store = SqliteStore::open(&path).await?;
            info!("Using SQLite file store at: {}", path.display());
            Arc::new(store)
        }
    };

    // Initialize the reasoning engine
    let engine = OpenAiEngine::new(&config.engine)?;
    if engine.is_configured() {
        info!(model = %config.engine.model, "Reasoning engine configured");
    } else {
        tracing::warn!("OPENAI_API_KEY is not set. Queries will fail until it is.");
    }

    // Create shared state
    let state = Arc::new(AppState::new(config.clone(), store, Arc::new(engine))?);

    let materializer = state.dispatcher.materializer();
    let swept = materializer.sweep_stale();
    info!(
        swept,
        "Scratch directory: {}",
        materializer.scratch_dir().display()
    );

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    info!("Listening on: {}", config.server.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
