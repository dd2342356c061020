mod config;
mod push;

use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_api::AppStateInner;
use parley_core::notify::{LogNotifier, Notifier};
use parley_core::{ConversationService, MemoryStore};
use parley_db::Database;

use crate::config::Config;
use crate::push::WebhookNotifier;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let notifier: Arc<dyn Notifier> = match &config.push_webhook_url {
        Some(url) => {
            info!("Relaying push notifications to {}", url);
            Arc::new(WebhookNotifier::new(url.clone()))
        }
        None => Arc::new(LogNotifier),
    };

    let service = if config.in_memory() {
        info!("Using in-memory store; data is lost on exit");
        ConversationService::new(Arc::new(MemoryStore::new()), notifier, config.phone_region)
    } else {
        let db = Database::open(&PathBuf::from(&config.db_path))?;
        ConversationService::new(Arc::new(db), notifier, config.phone_region)
    };

    let app = parley_api::router(AppStateInner::new(service, config.jwt_secret.clone()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!("Parley server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
