use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use upicks_shared::clients::db;
use upicks_shared::errors::{AppError, AppResult, ErrorCode};
use upicks_shared::middleware::record_event;
use upicks_shared::models::{NewReply, Reply, ReplyView};
use upicks_shared::schema::replies;
use upicks_shared::types::auth::AuthUser;
use upicks_shared::types::{normalize_reply_content, AddReplyRequest, ApiResponse, Deleted};

use crate::routes::parse_kind;
use crate::services::rating_service;
use crate::AppState;

pub async fn list_replies(
    State(state): State<Arc<AppState>>,
    Path((kind, rating_id)): Path<(String, Uuid)>,
) -> AppResult<Json<ApiResponse<Vec<ReplyView>>>> {
    let kind = parse_kind(&kind)?;
    let mut conn = db::conn(&state.db)?;
    rating_service::rating_target(&mut conn, kind, rating_id, false)?;

    let rows = replies::table
        .filter(replies::rating_kind.eq(kind))
        .filter(replies::rating_id.eq(rating_id))
        .order(replies::created_at.asc())
        .select(Reply::as_select())
        .load(&mut conn)?;

    Ok(Json(ApiResponse::ok(rows.into_iter().map(ReplyView::from).collect())))
}

/// Post a reply under a rating.
///
/// The rating row is locked while replies are counted so two concurrent
/// posts cannot both pass the quota check.
pub async fn add_reply(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path((kind, rating_id)): Path<(String, Uuid)>,
    Json(req): Json<AddReplyRequest>,
) -> AppResult<Json<ApiResponse<ReplyView>>> {
    let kind = parse_kind(&kind)?;
    let content = normalize_reply_content(&req.content).map_err(AppError::Validation)?;
    let quota = state.config.reply_quota_per_rating;

    let mut conn = db::conn(&state.db)?;
    let reply = conn.transaction::<Reply, AppError, _>(|conn| {
        rating_service::rating_target(conn, kind, rating_id, true)?;

        let existing: i64 = replies::table
            .filter(replies::rating_kind.eq(kind))
            .filter(replies::rating_id.eq(rating_id))
            .count()
            .get_result(conn)?;
        check_quota(existing, quota)?;

        let reply = diesel::insert_into(replies::table)
            .values(&NewReply {
                rating_kind: kind,
                rating_id,
                user_id: user.id,
                content,
                is_anonymous: req.is_anonymous,
            })
            .get_result::<Reply>(conn)?;
        Ok(reply)
    })?;

    record_event("replies_posted_total", kind.as_str());
    tracing::info!(reply_id = %reply.id, rating_id = %rating_id, "reply posted");
    Ok(Json(ApiResponse::ok(ReplyView::from(reply))))
}

pub async fn delete_reply(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(reply_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Deleted>>> {
    let mut conn = db::conn(&state.db)?;

    let reply = replies::table
        .find(reply_id)
        .select(Reply::as_select())
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::ReplyNotFound, "reply not found"))?;

    if reply.user_id != user.id {
        return Err(AppError::new(ErrorCode::NotReplyAuthor, "only the author can delete this reply"));
    }

    let window_hours = state.config.reply_delete_window_hours;
    if !within_delete_window(reply.created_at, Utc::now(), window_hours) {
        return Err(AppError::new(
            ErrorCode::ReplyDeleteWindowExpired,
            format!("replies can only be deleted within {window_hours} hours of posting"),
        ));
    }

    diesel::delete(replies::table.find(reply_id)).execute(&mut conn)?;

    tracing::info!(reply_id = %reply_id, user_id = %user.id, "reply deleted");
    Ok(Json(ApiResponse::ok(Deleted { id: reply_id })))
}

fn check_quota(existing: i64, quota: i64) -> AppResult<()> {
    if existing >= quota {
        return Err(AppError::with_details(
            ErrorCode::ReplyQuotaExceeded,
            format!("This rating already has {quota} replies, the maximum allowed"),
            serde_json::json!({ "quota": quota }),
        ));
    }
    Ok(())
}

fn within_delete_window(created_at: DateTime<Utc>, now: DateTime<Utc>, window_hours: i64) -> bool {
    now - created_at <= Duration::hours(window_hours)
}
