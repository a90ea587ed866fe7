//! Query API.
//!
//! The external HTTP surface for the document explorer query engine: `list_papers`/`get_paper`,
//! `stats`, `health`, enrichment-catalog introspection, and the Prometheus `/metrics` endpoint.

mod executor;
mod handlers;
mod planner;

use axum::{routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use paperforge_common::{
    cache::EmbeddingCache,
    config::AppConfig,
    db::DbPool,
    embeddings::{create_embedder, Embedder},
    metrics,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, Level};

use crate::planner::PlannerOptions;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub executor: executor::ExecutorContext,
    pub metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt().with_max_level(Level::INFO).with_target(true).json().init();

    info!("starting query-api v{}", paperforge_common::VERSION);

    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "failed to load configuration");
        e
    })?;
    let config = Arc::new(config);

    let metrics_handle = PrometheusBuilder::new().install_recorder()?;
    metrics::register_metrics();

    info!("connecting to database");
    let db = DbPool::new(&config.database).await?;

    let embedder: Arc<dyn Embedder> = create_embedder(
        config.embedding.service_url.clone(),
        config.embedding.api_key.clone(),
        config.embedding.model.clone(),
        config.embedding.dimension,
    );
    let cache = Arc::new(EmbeddingCache::new(config.embedding_cache_ttl()));

    let executor_ctx = executor::ExecutorContext {
        db: db.clone(),
        embedder,
        cache,
        options: PlannerOptions {
            enabled_sources: config.query.enabled_sources.clone(),
            max_limit: config.query.max_limit,
        },
        count_timeout: config.count_timeout(),
        main_query_timeout: config.main_query_timeout(),
    };

    let state = AppState {
        config: config.clone(),
        db,
        executor: executor_ctx,
        metrics_handle,
    };

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("server shutdown complete");
    Ok(())
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/papers", get(handlers::papers::list_papers))
        .route("/papers/{id}", get(handlers::papers::get_paper))
        .route("/stats", get(handlers::stats::stats))
        .route("/sources/{source}/enrichment-fields", get(handlers::enrichment::enrichment_fields))
        .route("/enrichment/data", get(handlers::enrichment::enrichment_data))
        .route("/metrics", get(metrics_endpoint));

    Router::new()
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

async fn metrics_endpoint(axum::extract::State(state): axum::extract::State<AppState>) -> String {
    state.metrics_handle.render()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, starting shutdown"),
        _ = terminate => info!("received SIGTERM, starting shutdown"),
    }
}
