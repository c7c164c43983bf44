use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::Json,
    routing::get,
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};

use snapgate::channel::HttpChannel;
use snapgate::config::Config;
use snapgate::engine::Engine;
use snapgate::status::StatusData;
use snapgate::store::SqliteStore;
use snapgate::types::ChatId;
use snapgate::webhook::webhook_router;
use snapgate::AppState;

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "snapgate"
    }))
}

async fn status_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusData>, axum::http::StatusCode> {
    let counts = state.store.status_counts().await.map_err(|e| {
        warn!(error = %e, "failed to collect status counts");
        axum::http::StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let pending = state.store.pending_posts().await.map_err(|e| {
        warn!(error = %e, "failed to collect pending posts");
        axum::http::StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let open_sessions = state.engine.open_sessions().await;
    Ok(Json(StatusData::from_parts(
        &counts,
        &pending,
        open_sessions,
        snapgate::get_service_version(),
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting photo submission engine");

    let config = Config::from_env().context("Failed to load configuration")?;

    let db_path = config.state_dir.join("snapgate-state.db");
    info!("Using state database: {}", db_path.display());
    let store = Arc::new(SqliteStore::new(&db_path).context("Failed to initialize database")?);

    let channel = Arc::new(
        HttpChannel::new(config.gateway_url.clone())
            .context("Failed to initialize gateway client")?,
    );

    let engine = Arc::new(Engine::new(
        store.clone(),
        channel,
        ChatId(config.moderation_chat_id),
        ChatId(config.output_chat_id),
        config.bot_link.clone(),
    ));

    let app_state = Arc::new(AppState {
        engine: engine.clone(),
        store,
    });

    // Periodic idle-session eviction.
    let sweep_engine = engine.clone();
    let idle_timeout = config.session_idle_timeout;
    let sweep_interval = config.session_sweep_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            sweep_engine.evict_idle_sessions(idle_timeout).await;
        }
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status_handler))
        .merge(webhook_router())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .await
        .context("Server terminated")?;
    Ok(())
}
