use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidgen_api::config::ServerConfig;
use vidgen_api::engine::{Orchestrator, ProgressBackend};
use vidgen_api::router::build_app_router;
use vidgen_api::state::AppState;
use vidgen_api::store::JobStore;
use vidgen_provider::{ProviderApi, VideoProvider};

/// How long to wait for the eviction task to stop after shutdown.
const BACKGROUND_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    init_tracing();

    // --- Configuration ---
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    tracing::info!(
        host = %config.host,
        port = config.port,
        mode = config.engine.mode.as_str(),
        lookup = config.engine.lookup.as_str(),
        "Loaded server configuration",
    );
    if config.provider.api_key.is_none() {
        tracing::warn!("PROVIDER_API_KEY is not set; upstream calls will fail");
    }

    // --- Engine ---
    let cancel = CancellationToken::new();
    let store = Arc::new(JobStore::new());
    let provider: Arc<dyn VideoProvider> = Arc::new(ProviderApi::new(config.provider.clone()));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&store),
        ProgressBackend::from_config(&config.engine, provider),
        config.engine.lookup,
        cancel.child_token(),
    ));

    // --- Eviction ---
    let eviction_cancel = cancel.child_token();
    let eviction_handle = tokio::spawn(vidgen_api::background::eviction::run(
        Arc::clone(&store),
        config.retention.clone(),
        eviction_cancel,
    ));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator: Arc::clone(&orchestrator),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(config.host.parse()?, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    orchestrator
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;

    cancel.cancel();
    let _ = tokio::time::timeout(BACKGROUND_STOP_TIMEOUT, eviction_handle).await;
    tracing::info!("Job eviction stopped");

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` controls filtering; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vidgen_api=debug,vidgen_provider=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
