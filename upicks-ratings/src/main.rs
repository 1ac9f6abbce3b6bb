use axum::routing::{delete, get, post};
use axum::{middleware, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod routes;
mod services;

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
    upicks_shared::middleware::init_tracing("upicks-ratings");

    let config = AppConfig::load()?;
    let port = config.port;

    let db = create_pool(&config.database_url, config.db_pool_size)?;
    let redis = RedisClient::connect(&config.redis_url).await?;
    let metrics = upicks_shared::middleware::init_metrics()?;

    let state = Arc::new(AppState { db, config, redis, metrics });

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/me", get(routes::profile::get_profile).patch(routes::profile::update_profile))
        .route("/me/votes", get(routes::votes::list_my_votes))
        // catalog
        .route("/campuses", get(routes::catalog::list_campuses))
        .route("/campuses/:id", get(routes::catalog::get_campus))
        .route("/campuses/:id/departments", get(routes::catalog::list_departments))
        .route("/departments", post(routes::catalog::submit_department))
        .route("/departments/:id/courses", get(routes::catalog::list_courses))
        .route("/courses", post(routes::catalog::submit_course))
        .route("/professors", get(routes::catalog::search_professors).post(routes::catalog::submit_professor))
        .route("/professors/:id", get(routes::catalog::get_professor))
        // ratings
        .route(
            "/professors/:id/ratings",
            get(routes::ratings::list_professor_ratings).post(routes::ratings::submit_professor_rating),
        )
        .route(
            "/campuses/:id/ratings",
            get(routes::ratings::list_campus_ratings).post(routes::ratings::submit_campus_rating),
        )
        .route("/professors/:id/tags", get(routes::ratings::list_professor_tags))
        .route("/campuses/:id/tags", get(routes::ratings::list_campus_tags))
        .route("/professors/:id/summary", get(routes::ratings::professor_summary))
        .route("/campuses/:id/summary", get(routes::ratings::campus_summary))
        // helpful votes
        .route(
            "/ratings/:kind/:id/votes",
            post(routes::votes::add_vote).delete(routes::votes::remove_vote),
        )
        .route("/ratings/:kind/:id/helpful", post(routes::votes::change_helpful_count))
        // replies
        .route(
            "/ratings/:kind/:id/replies",
            get(routes::replies::list_replies).post(routes::replies::add_reply),
        )
        .route("/replies/:id", delete(routes::replies::delete_reply))
        .layer(middleware::from_fn(upicks_shared::middleware::metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "upicks-ratings starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
