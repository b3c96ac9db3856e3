mod auth;
mod config;
mod middleware;

mod db;
mod error;
mod lifecycle;
mod models;
mod policy;
mod routes;
mod scheduling;

use std::sync::Arc;

use crate::{
    config::Config,
    db::{MemoryStore, PgStore, Store},
    models::AppState,
};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;

    let store: Arc<dyn Store> = match &cfg.database_url {
        Some(url) => {
            let pool = db::connect_pg(url).await?;
            tracing::info!("using postgres store");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store (data is lost on exit)");
            Arc::new(MemoryStore::new())
        }
    };

    if cfg.seed_demo_data {
        db::seed::seed_demo_data(store.as_ref()).await?;
    }
    if let Some(admin) = &cfg.admin {
        db::seed::ensure_admin(store.as_ref(), admin).await?;
    }

    let state = AppState {
        store,
        session_ttl_hours: cfg.session_ttl_hours,
    };

    // The React front-end is served from a different origin during development.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
