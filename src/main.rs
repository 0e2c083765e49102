//! GlowCart - skincare storefront service

use anyhow::Result;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use glowcart::api::{self, AppState};
use glowcart::services::NatsPublisher;
use glowcart::store::{DocumentStore, FileCartStorage, MemoryStore, PgDocumentStore};
use glowcart::Config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => Arc::new(PgDocumentStore::connect(url, config.max_connections).await?),
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };
    tokio::fs::create_dir_all(&config.cart_dir).await?;
    let carts = Arc::new(FileCartStorage::new(config.cart_dir.clone()));
    let publisher = Arc::new(NatsPublisher::connect(config.nats_url.as_deref()).await);
    let state = AppState::new(&config, store, carts, publisher);

    let app = api::router(state).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());

    tracing::info!(port = config.port, currency = %config.currency, "GlowCart listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?, app).await?;
    Ok(())
}
