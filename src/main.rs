//! Theater Back binary entrypoint wiring REST, WebSocket, SSE, the periodic jobs and storage.

use std::{env, net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use theater_back::{
    clock::SystemClock,
    config::AppConfig,
    dao::theater_store::{
        MemoryTheaterStore,
        seed::{MemorySeed, SEED_PATH_ENV},
    },
    routes,
    services::{lifecycle_service, theater_events, view_credit_service},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let state_broadcast = config.state_broadcast();
    let app_state = AppState::new(config, Arc::new(SystemClock));

    install_storage(&app_state).await?;

    tokio::spawn(lifecycle_service::run(app_state.clone()));
    tokio::spawn(view_credit_service::run(app_state.clone()));
    tokio::spawn(theater_events::run(app_state.clone(), state_broadcast));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

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

    Ok(())
}

/// Select the storage backend from the environment.
///
/// With `MONGO_URI` set, MongoDB is connected by the storage supervisor in the background and
/// the server starts in degraded mode. Without it, an in-memory store is installed right away,
/// filled from the fixture named by `THEATER_BACK_SEED_PATH` when there is one.
async fn install_storage(state: &SharedState) -> anyhow::Result<()> {
    #[cfg(feature = "mongo-store")]
    if let Ok(uri) = env::var("MONGO_URI") {
        let db_name = env::var("MONGO_DB").ok();
        tokio::spawn(theater_back::services::storage_supervisor::run(
            state.clone(),
            move || mongo_connector(uri.clone(), db_name.clone()),
        ));
        return Ok(());
    }

    warn!("MONGO_URI not set; using the in-memory store, data is lost on restart");
    let store = MemoryTheaterStore::new();
    match env::var_os(SEED_PATH_ENV).filter(|path| !path.is_empty()) {
        Some(path) => {
            let path = PathBuf::from(path);
            let seed = MemorySeed::from_path(&path).context("loading in-memory seed")?;
            let (contents, subscriptions) = (seed.contents.len(), seed.subscriptions.len());
            seed.apply(&store);
            info!(path = %path.display(), contents, subscriptions, "seeded in-memory store");
        }
        None => warn!(
            "{SEED_PATH_ENV} not set; the in-memory store has no contents or subscriptions"
        ),
    }
    state.set_store(Arc::new(store)).await;
    Ok(())
}

#[cfg(feature = "mongo-store")]
async fn mongo_connector(
    uri: String,
    db_name: Option<String>,
) -> Result<
    Arc<dyn theater_back::dao::theater_store::TheaterStore>,
    theater_back::dao::storage::StorageError,
> {
    use theater_back::dao::theater_store::mongodb::{MongoConfig, MongoTheaterStore};

    let config = MongoConfig::from_uri(&uri, db_name.as_deref()).await?;
    let store = MongoTheaterStore::connect(config).await?;
    info!(database = %db_name.as_deref().unwrap_or("theater"), "connected to MongoDB");
    Ok(Arc::new(store))
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
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
