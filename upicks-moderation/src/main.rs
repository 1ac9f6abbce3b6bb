use axum::routing::{delete, get, post, put};
use axum::{middleware, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod audit;
mod config;
mod routes;

use config::AppConfig;
use upicks_shared::clients::db::{create_pool, DbPool};
use upicks_shared::clients::redis::RedisClient;

pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub redis: RedisClient,
    pub metrics: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    upicks_shared::middleware::init_tracing("upicks-moderation");

    let config = AppConfig::load()?;
    let port = config.port;

    let db = create_pool(&config.database_url, config.db_pool_size)?;
    let redis = RedisClient::connect(&config.redis_url).await?;
    let metrics = upicks_shared::middleware::init_metrics()?;

    let state = Arc::new(AppState { db, config, redis, metrics });

    let admin_routes = Router::new()
        .route("/queues/:queue", get(routes::queue_routes::list_queue))
        .route("/queues/:queue/approve", post(routes::queue_routes::approve_batch))
        .route("/queues/:queue/reject", post(routes::queue_routes::reject_batch))
        .route("/queues/:queue/:id/approve", put(routes::queue_routes::approve_one))
        .route("/queues/:queue/:id", delete(routes::queue_routes::reject_one))
        .route("/reports", get(routes::admin_routes::list_reports))
        .route("/reports/:id", put(routes::admin_routes::review_report))
        .route("/ratings/:kind/:id", delete(routes::admin_routes::take_down_rating))
        .route("/replies/:id", delete(routes::admin_routes::take_down_reply))
        .route("/users", get(routes::admin_routes::list_users))
        .route("/users/:id/role", put(routes::admin_routes::change_role))
        .route("/stats", get(routes::admin_routes::get_stats))
        .route("/audit-log", get(routes::admin_routes::get_audit_log));

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/reports", post(routes::user_routes::create_report))
        .nest("/admin", admin_routes)
        .layer(middleware::from_fn(upicks_shared::middleware::metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "upicks-moderation starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
