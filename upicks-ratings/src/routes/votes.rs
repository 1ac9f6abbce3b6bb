use axum::extract::{Path, State};
use axum::Json;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use upicks_shared::clients::db;
use upicks_shared::errors::{is_unique_violation, AppError, AppResult, ErrorCode};
use upicks_shared::middleware::{record_event, OptionalAuthUser};
use upicks_shared::models::NewHelpfulVote;
use upicks_shared::schema::{campus_ratings, helpful_votes, professor_ratings};
use upicks_shared::types::auth::AuthUser;
use upicks_shared::types::{ApiResponse, HelpfulCount, HelpfulDelta, RatingKind, VoteRef};

use crate::routes::parse_kind;
use crate::services::rating_service;
use crate::AppState;

// --- Vote rows ---

pub async fn list_my_votes(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<VoteRef>>>> {
    let mut conn = db::conn(&state.db)?;
    let votes = helpful_votes::table
        .filter(helpful_votes::user_id.eq(user.id))
        .order(helpful_votes::created_at.desc())
        .select((helpful_votes::rating_kind, helpful_votes::rating_id))
        .load::<(RatingKind, Uuid)>(&mut conn)?
        .into_iter()
        .map(|(rating_kind, rating_id)| VoteRef { rating_kind, rating_id })
        .collect();
    Ok(Json(ApiResponse::ok(votes)))
}

pub async fn add_vote(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path((kind, rating_id)): Path<(String, Uuid)>,
) -> AppResult<Json<ApiResponse<VoteRef>>> {
    let kind = parse_kind(&kind)?;
    let mut conn = db::conn(&state.db)?;
    rating_service::rating_target(&mut conn, kind, rating_id, false)?;

    diesel::insert_into(helpful_votes::table)
        .values(&NewHelpfulVote {
            rating_kind: kind,
            rating_id,
            user_id: user.id,
        })
        .execute(&mut conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::new(ErrorCode::VoteAlreadyExists, "you already marked this rating helpful")
            } else {
                AppError::Database(e)
            }
        })?;

    tracing::debug!(user_id = %user.id, rating_id = %rating_id, kind = %kind, "helpful vote added");
    Ok(Json(ApiResponse::ok(VoteRef { rating_kind: kind, rating_id })))
}

pub async fn remove_vote(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path((kind, rating_id)): Path<(String, Uuid)>,
) -> AppResult<Json<ApiResponse<VoteRef>>> {
    let kind = parse_kind(&kind)?;
    let mut conn = db::conn(&state.db)?;

    let deleted = diesel::delete(
        helpful_votes::table
            .filter(helpful_votes::rating_kind.eq(kind))
            .filter(helpful_votes::rating_id.eq(rating_id))
            .filter(helpful_votes::user_id.eq(user.id)),
    )
    .execute(&mut conn)?;

    if deleted == 0 {
        return Err(AppError::new(ErrorCode::VoteNotFound, "vote not found"));
    }

    tracing::debug!(user_id = %user.id, rating_id = %rating_id, kind = %kind, "helpful vote removed");
    Ok(Json(ApiResponse::ok(VoteRef { rating_kind: kind, rating_id })))
}

// --- Counter ---

/// Adjust a rating's helpful counter by one. The counter never drops below
/// zero. Calls without a session are rate limited per rating.
pub async fn change_helpful_count(
    OptionalAuthUser(user): OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Path((kind, rating_id)): Path<(String, Uuid)>,
    Json(req): Json<HelpfulDelta>,
) -> AppResult<Json<ApiResponse<HelpfulCount>>> {
    let kind = parse_kind(&kind)?;
    let step = validate_delta(req.delta)?;

    if user.is_none() {
        let key = format!("helpful:anon:{kind}:{rating_id}");
        match state
            .redis
            .rate_limit_check(&key, state.config.anon_helpful_per_minute, 60)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                return Err(AppError::new(ErrorCode::RateLimited, "too many helpful votes, try again later"));
            }
            Err(e) => tracing::warn!(key = %key, error = %e, "rate limit check failed, allowing request"),
        }
    }

    let mut conn = db::conn(&state.db)?;
    let helpful_count = apply_delta(&mut conn, kind, rating_id, step)?;

    record_event("helpful_votes_total", if step > 0 { "up" } else { "down" });
    Ok(Json(ApiResponse::ok(HelpfulCount { rating_id, helpful_count })))
}

fn validate_delta(delta: i32) -> AppResult<i32> {
    match delta {
        1 | -1 => Ok(delta),
        _ => Err(AppError::new(ErrorCode::BadRequest, "delta must be 1 or -1")),
    }
}

fn apply_delta(conn: &mut PgConnection, kind: RatingKind, rating_id: Uuid, step: i32) -> AppResult<i32> {
    // a decrement only touches counters that are still positive
    let floor = if step < 0 { 1 } else { 0 };
    let updated: Option<i32> = match kind {
        RatingKind::Professor => {
            let target = professor_ratings::table
                .filter(professor_ratings::id.eq(rating_id))
                .filter(professor_ratings::helpful_count.ge(floor));
            diesel::update(target)
                .set(professor_ratings::helpful_count.eq(professor_ratings::helpful_count + step))
                .returning(professor_ratings::helpful_count)
                .get_result(conn)
                .optional()?
        }
        RatingKind::Campus => {
            let target = campus_ratings::table
                .filter(campus_ratings::id.eq(rating_id))
                .filter(campus_ratings::helpful_count.ge(floor));
            diesel::update(target)
                .set(campus_ratings::helpful_count.eq(campus_ratings::helpful_count + step))
                .returning(campus_ratings::helpful_count)
                .get_result(conn)
                .optional()?
        }
    };

    if let Some(count) = updated {
        return Ok(count);
    }

    // nothing updated: either the rating is gone or the counter is already 0
    let current = match kind {
        RatingKind::Professor => professor_ratings::table
            .find(rating_id)
            .select(professor_ratings::helpful_count)
            .first::<i32>(conn)
            .optional()?,
        RatingKind::Campus => campus_ratings::table
            .find(rating_id)
            .select(campus_ratings::helpful_count)
            .first::<i32>(conn)
            .optional()?,
    };
    current.ok_or_else(|| AppError::new(ErrorCode::RatingNotFound, "rating not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unit_deltas_are_accepted() {
        assert_eq!(validate_delta(1).unwrap(), 1);
        assert_eq!(validate_delta(-1).unwrap(), -1);
        assert_eq!(validate_delta(0).unwrap_err().code(), ErrorCode::BadRequest);
        assert_eq!(validate_delta(5).unwrap_err().code(), ErrorCode::BadRequest);
    }
}
