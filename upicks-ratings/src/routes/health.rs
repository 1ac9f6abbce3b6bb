use axum::extract::State;
use axum::Json;
use diesel::prelude::*;
use std::sync::Arc;

use upicks_shared::types::api::{HealthCheck, HealthResponse};

use crate::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = state
        .db
        .get()
        .map_err(|e| e.to_string())
        .and_then(|mut conn| {
            diesel::sql_query("SELECT 1")
                .execute(&mut conn)
                .map(|_| ())
                .map_err(|e| e.to_string())
        });
    let redis = state.redis.ping().await;

    Json(
        HealthResponse::healthy("upicks-ratings", env!("CARGO_PKG_VERSION")).with_checks(vec![
            HealthCheck::from_result("database", database),
            HealthCheck::from_result("redis", redis),
        ]),
    )
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics.render()
}
