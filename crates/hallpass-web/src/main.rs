mod auth;
mod error;
mod routes;

use std::sync::Arc;

use anyhow::Result;
use hallpass_core::config::HallpassConfig;
use hallpass_core::llm::LlmService;
use hallpass_core::service::ReservationService;
use hallpass_core::storage::SqliteStorage;

pub struct AppState {
    pub service: ReservationService<SqliteStorage>,
    pub config: HallpassConfig,
    pub jwt_secret: String,
    pub llm: Option<LlmService>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hallpass_web=info".parse().unwrap()),
        )
        .init();

    let config = HallpassConfig::load(None).unwrap_or_else(|_| HallpassConfig::default_config());

    let db_path = config.database_path()?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let storage = SqliteStorage::open(&db_path)?;
    tracing::info!("database at {}", db_path.display());

    let llm = if config.llm.enabled {
        match LlmService::from_config(&config.llm) {
            Ok(llm) => Some(llm),
            Err(e) => {
                tracing::warn!("assistant disabled: {e}");
                None
            }
        }
    } else {
        None
    };

    let jwt_secret = config.auth.resolve_secret();

    let state = Arc::new(AppState {
        service: ReservationService::new(storage),
        config: config.clone(),
        jwt_secret,
        llm,
    });

    let app = routes::router()
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("hallpass-web listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
