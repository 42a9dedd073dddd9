mod api;
mod backend_client;
mod config;
mod domain;
mod store;
mod sync;

use std::{path::Path, sync::Arc, time::Duration};

use anyhow::Context;
use backend_client::{BackendClient, SyncTransport};
use config::Config;
use migration::MigratorTrait;
use poem::{
    EndpointExt, Route, Server,
    listener::TcpListener,
    middleware::{Cors, Tracing as PoemTracing},
};
use poem_openapi::OpenApiService;
use sea_orm::Database;
use store::LocalStore;
use sync::SyncEngine;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder, prelude::*};

type VidSyncResult<T> = anyhow::Result<T>;

#[tokio::main]
async fn main() -> VidSyncResult<()> {
    // Initialize tracing (logs). Respect RUST_LOG if set, default to info for our crate and warn for deps.
    let default_filter = format!(
        "{}=info,poem=info,reqwest=warn,h2=warn",
        env!("CARGO_PKG_NAME")
    );
    let env_filter = std::env::var("RUST_LOG").unwrap_or(default_filter);
    SubscriberBuilder::default()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .with_level(true)
        .pretty()
        .finish()
        .with(ErrorLayer::default())
        .init();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting vidsync");
    // Load environment variables from .env files
    if Path::new(".env.local").exists() {
        dotenvy::from_filename(".env.local")?;
    } else if Path::new(".env").exists() {
        dotenvy::from_filename(".env")?;
    };
    let config = Config::load()?;
    match config.validate() {
        Ok(_) => {}
        Err(e) => {
            return Err(anyhow::anyhow!(e));
        }
    }

    let db_conn = Database::connect(&config.db_connection_string)
        .await
        .with_context(|| "Failed to connect to database")?;

    migration::Migrator::up(&db_conn, None)
        .await
        .with_context(|| "Failed to run database migrations")?;

    let engine = Arc::new(SyncEngine::new(LocalStore::new(db_conn)));

    let transport: Option<Arc<dyn SyncTransport>> = match &config.backend_url {
        Some(url) => Some(Arc::new(BackendClient::new(
            url.as_str(),
            Duration::from_millis(config.http_timeout_ms),
        )?)),
        None => None,
    };
    tracing::info!(
        backend_configured = transport.is_some(),
        sync_interval_ms = config.sync_interval_ms,
        "configured sync scheduler"
    );
    tokio::spawn(sync::run_scheduler(
        engine.clone(),
        transport,
        Duration::from_millis(config.sync_interval_ms),
    ));

    run_poem(engine, Arc::new(config)).await?;
    Ok(())
}

pub async fn run_poem(engine: Arc<SyncEngine>, config: Arc<Config>) -> VidSyncResult<()> {
    let version = env!("CARGO_PKG_VERSION");
    let bind_addr = config.bind_addr.clone();
    let api = api::VidSyncApi { engine, config };
    let api_service = OpenApiService::new(api, "VidSync API", version)
        .server(format!("http://{}", bind_addr));
    let ui = api_service.rapidoc();
    let spec = api_service.spec();
    let route = Route::new()
        .nest("/", api_service)
        .nest("/ui", ui)
        .nest("/spec", poem::endpoint::make_sync(move |_| spec.clone()))
        .with(Cors::new())
        .with(PoemTracing);

    tracing::info!(%bind_addr, "starting HTTP server");
    Server::new(TcpListener::bind(bind_addr)).run(route).await?;
    Ok(())
}
