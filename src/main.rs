//! Courtroom Back binary entrypoint wiring the WebSocket game server, REST routes, the
//! oracle client and the statistics store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use courtroom_back::{
    config::AppConfig,
    dao::stats_store::memory::MemoryStatsStore,
    oracle::{ChatCompletionsClient, ScoringOracle},
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    if config.oracle.api_key.is_empty() {
        warn!("ORACLE_API_KEY is not set; oracle requests will be sent without credentials");
    }
    let client =
        ChatCompletionsClient::new(config.oracle_client()).context("building oracle client")?;
    let oracle = ScoringOracle::new(Arc::new(client));

    let app_state = AppState::new(config, oracle);
    start_stats_store(app_state.clone()).await?;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    app_state.rooms().shutdown().await;
    info!("server stopped");
    Ok(())
}

/// Install the statistics backend selected by `STATS_BACKEND` (`memory`, `mongo`, `couch`).
///
/// Database backends are supervised in the background; the server runs in degraded mode
/// until they are reachable.
async fn start_stats_store(state: SharedState) -> anyhow::Result<()> {
    let backend = env::var("STATS_BACKEND").unwrap_or_else(|_| "memory".into());
    match backend.trim().to_ascii_lowercase().as_str() {
        "memory" => {
            info!("using in-memory statistics store");
            state
                .install_stats_store(Arc::new(MemoryStatsStore::new()))
                .await;
        }
        #[cfg(feature = "mongo-store")]
        "mongo" | "mongodb" => {
            use courtroom_back::dao::stats_store::mongodb::{MongoConfig, MongoStatsStore};
            use courtroom_back::dao::{stats_store::StatsStore, storage::StorageError};
            use courtroom_back::services::storage_supervisor;

            let config = MongoConfig::from_env()
                .await
                .context("reading MongoDB configuration")?;
            info!(database = %config.database_name, "using MongoDB statistics store");
            tokio::spawn(storage_supervisor::run(state, move || {
                let config = config.clone();
                async move {
                    let store = MongoStatsStore::connect(config).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn StatsStore>)
                }
            }));
        }
        #[cfg(feature = "couch-store")]
        "couch" | "couchdb" => {
            use courtroom_back::dao::{stats_store::StatsStore, storage::StorageError};
            use courtroom_back::dao::stats_store::couchdb::{CouchConfig, CouchStatsStore};
            use courtroom_back::services::storage_supervisor;

            let config = CouchConfig::from_env().context("reading CouchDB configuration")?;
            info!(database = %config.database, "using CouchDB statistics store");
            tokio::spawn(storage_supervisor::run(state, move || {
                let config = config.clone();
                async move {
                    let store = CouchStatsStore::connect(config).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn StatsStore>)
                }
            }));
        }
        other => bail!("unsupported STATS_BACKEND `{other}` for this build"),
    }
    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
