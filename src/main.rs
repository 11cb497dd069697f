use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rad_enrichment_api::config::Config;
use rad_enrichment_api::db::Database;
use rad_enrichment_api::handlers::{build_router, AppState};
use rad_enrichment_api::pipeline::EnrichmentPipeline;
use rad_enrichment_api::store::{MemoryProfileStore, PgProfileStore, ProfileStore};

/// Starts the enrichment service.
///
/// Without `DATABASE_URL` the service keeps everything in process memory.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rad_enrichment_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let store: Arc<dyn ProfileStore> = match &config.database_url {
        Some(url) => {
            let db = Database::new(url).await?;
            tracing::info!("Database connection pool established");
            Arc::new(PgProfileStore::new(db.pool))
        }
        None => {
            tracing::warn!("⚠ DATABASE_URL not set, using in-memory storage");
            Arc::new(MemoryProfileStore::new())
        }
    };

    let pipeline = EnrichmentPipeline::from_config(&config, store)?;
    let state = Arc::new(AppState::new(Arc::new(pipeline)));
    let app = build_router(state, true)?;

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
