use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use upicks_shared::clients::db;
use upicks_shared::clients::redis::RedisClient;
use upicks_shared::errors::{AppError, AppResult, ErrorCode};
use upicks_shared::middleware::ModeratorUser;
use upicks_shared::models::{ModerationAction, Profile, Report};
use upicks_shared::schema::{
    campus_ratings, courses, departments, helpful_votes, moderation_actions, professor_ratings,
    professors, profiles, rating_tags, replies, reports,
};
use upicks_shared::types::{
    ApiResponse, ChangeRoleRequest, Deleted, ModerationStats, Paginated, PaginationParams,
    RatingKind, RatingSummary, ReportFilterParams, ReportStatus, ReportTargetKind, ReviewReportRequest,
    UserFilterParams, UserRole,
};

use crate::audit;
use crate::AppState;

// --- Reports ---

pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    _moderator: ModeratorUser,
    Query(params): Query<ReportFilterParams>,
) -> AppResult<Json<ApiResponse<Paginated<Report>>>> {
    let mut conn = db::conn(&state.db)?;
    let pagination = params.pagination();

    let filtered = || -> reports::BoxedQuery<'static, Pg> {
        let mut query = reports::table.into_boxed();
        if let Some(status) = params.status {
            query = query.filter(reports::status.eq(status.as_str()));
        }
        query
    };

    let total: i64 = filtered().count().get_result(&mut conn)?;
    let items = filtered()
        .order(reports::created_at.desc())
        .offset(pagination.sql_offset())
        .limit(pagination.sql_limit())
        .select(Report::as_select())
        .load(&mut conn)?;

    Ok(Json(ApiResponse::ok(Paginated::new(items, total as u64, &pagination))))
}

pub async fn review_report(
    State(state): State<Arc<AppState>>,
    moderator: ModeratorUser,
    Path(report_id): Path<Uuid>,
    Json(body): Json<ReviewReportRequest>,
) -> AppResult<Json<ApiResponse<Report>>> {
    if body.status == ReportStatus::Pending {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            "status must be 'resolved' or 'dismissed'",
        ));
    }

    let mut conn = db::conn(&state.db)?;

    let report = reports::table
        .find(report_id)
        .select(Report::as_select())
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::ReportNotFound, "report not found"))?;

    if report.status != ReportStatus::Pending.as_str() {
        return Err(AppError::new(
            ErrorCode::ReportAlreadyReviewed,
            "this report has already been reviewed",
        ));
    }

    let updated: Report = diesel::update(reports::table.find(report_id))
        .set((
            reports::status.eq(body.status.as_str()),
            reports::reviewed_by.eq(moderator.0.id),
            reports::reviewed_at.eq(Utc::now()),
        ))
        .get_result(&mut conn)?;

    audit::log_action(
        &mut conn,
        moderator.0.id,
        format!("review_report_{}", body.status.as_str()),
        Some(report.target_id),
        serde_json::json!({ "report_id": report_id, "target_kind": report.target_kind }),
    )?;

    Ok(Json(ApiResponse::ok(updated)))
}

// --- Takedowns ---

/// Remove a rating along with its tags, votes and replies, resolve
/// pending reports against it and drop the cached summary of its target.
pub async fn take_down_rating(
    State(state): State<Arc<AppState>>,
    moderator: ModeratorUser,
    Path((kind, rating_id)): Path<(String, Uuid)>,
) -> AppResult<Json<ApiResponse<Deleted>>> {
    let kind: RatingKind = kind
        .parse()
        .map_err(|e: String| AppError::new(ErrorCode::BadRequest, e))?;
    let moderator_id = moderator.0.id;
    let mut conn = db::conn(&state.db)?;

    let target_id = conn.transaction::<Uuid, AppError, _>(|conn| {
        let target_id: Option<Uuid> = match kind {
            RatingKind::Professor => diesel::delete(professor_ratings::table.find(rating_id))
                .returning(professor_ratings::professor_id)
                .get_result(conn)
                .optional()?,
            RatingKind::Campus => diesel::delete(campus_ratings::table.find(rating_id))
                .returning(campus_ratings::campus_id)
                .get_result(conn)
                .optional()?,
        };
        let target_id =
            target_id.ok_or_else(|| AppError::new(ErrorCode::RatingNotFound, "rating not found"))?;

        diesel::delete(
            rating_tags::table
                .filter(rating_tags::rating_kind.eq(kind))
                .filter(rating_tags::rating_id.eq(rating_id)),
        )
        .execute(conn)?;
        diesel::delete(
            helpful_votes::table
                .filter(helpful_votes::rating_kind.eq(kind))
                .filter(helpful_votes::rating_id.eq(rating_id)),
        )
        .execute(conn)?;
        let reply_ids: Vec<Uuid> = diesel::delete(
            replies::table
                .filter(replies::rating_kind.eq(kind))
                .filter(replies::rating_id.eq(rating_id)),
        )
        .returning(replies::id)
        .get_results(conn)?;

        let target_kind = match kind {
            RatingKind::Professor => ReportTargetKind::ProfessorRating,
            RatingKind::Campus => ReportTargetKind::CampusRating,
        };
        resolve_reports(conn, moderator_id, target_kind, &[rating_id])?;
        resolve_reports(conn, moderator_id, ReportTargetKind::Reply, &reply_ids)?;

        audit::log_action(
            conn,
            moderator_id,
            "take_down_rating",
            Some(rating_id),
            serde_json::json!({ "kind": kind, "replies_removed": reply_ids.len() }),
        )?;
        Ok(target_id)
    })?;

    forget_summary(&state.redis, kind, target_id).await;

    Ok(Json(ApiResponse::ok(Deleted { id: rating_id })))
}

pub async fn take_down_reply(
    State(state): State<Arc<AppState>>,
    moderator: ModeratorUser,
    Path(reply_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Deleted>>> {
    let moderator_id = moderator.0.id;
    let mut conn = db::conn(&state.db)?;

    conn.transaction::<(), AppError, _>(|conn| {
        let deleted = diesel::delete(replies::table.find(reply_id)).execute(conn)?;
        if deleted == 0 {
            return Err(AppError::new(ErrorCode::ReplyNotFound, "reply not found"));
        }
        resolve_reports(conn, moderator_id, ReportTargetKind::Reply, &[reply_id])?;
        audit::log_action(conn, moderator_id, "take_down_reply", Some(reply_id), serde_json::json!({}))
    })?;

    Ok(Json(ApiResponse::ok(Deleted { id: reply_id })))
}

fn resolve_reports(
    conn: &mut PgConnection,
    moderator_id: Uuid,
    target_kind: ReportTargetKind,
    target_ids: &[Uuid],
) -> AppResult<usize> {
    if target_ids.is_empty() {
        return Ok(0);
    }
    let resolved = diesel::update(
        reports::table
            .filter(reports::target_kind.eq(target_kind.as_str()))
            .filter(reports::target_id.eq_any(target_ids))
            .filter(reports::status.eq(ReportStatus::Pending.as_str())),
    )
    .set((
        reports::status.eq(ReportStatus::Resolved.as_str()),
        reports::reviewed_by.eq(moderator_id),
        reports::reviewed_at.eq(Utc::now()),
    ))
    .execute(conn)?;
    Ok(resolved)
}

/// The ratings service rebuilds it on the next read.
async fn forget_summary(redis: &RedisClient, kind: RatingKind, target_id: Uuid) {
    let key = RatingSummary::cache_key(kind, target_id);
    if let Err(e) = redis.del(&key).await {
        tracing::warn!(key = %key, error = %e, "summary cache invalidation failed");
    }
}

// --- Users ---

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _moderator: ModeratorUser,
    Query(params): Query<UserFilterParams>,
) -> AppResult<Json<ApiResponse<Paginated<Profile>>>> {
    let mut conn = db::conn(&state.db)?;
    let pagination = params.pagination();

    let filtered = || -> profiles::BoxedQuery<'static, Pg> {
        let mut query = profiles::table.into_boxed();
        if let Some(role) = params.role {
            query = query.filter(profiles::role.eq(role.as_str()));
        }
        query
    };

    let total: i64 = filtered().count().get_result(&mut conn)?;
    let items = filtered()
        .order(profiles::created_at.desc())
        .offset(pagination.sql_offset())
        .limit(pagination.sql_limit())
        .select(Profile::as_select())
        .load(&mut conn)?;

    Ok(Json(ApiResponse::ok(Paginated::new(items, total as u64, &pagination))))
}

pub async fn change_role(
    State(state): State<Arc<AppState>>,
    moderator: ModeratorUser,
    Path(user_id): Path<Uuid>,
    Json(body): Json<ChangeRoleRequest>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    check_role_change(moderator.0.id, user_id)?;
    let mut conn = db::conn(&state.db)?;

    let updated: Profile = diesel::update(profiles::table.find(user_id))
        .set(profiles::role.eq(body.role.as_str()))
        .get_result(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;

    audit::log_action(
        &mut conn,
        moderator.0.id,
        match body.role {
            UserRole::Moderator => "promote_user",
            UserRole::User => "demote_user",
        },
        Some(user_id),
        serde_json::json!({ "role": body.role }),
    )?;

    Ok(Json(ApiResponse::ok(updated)))
}

fn check_role_change(moderator_id: Uuid, user_id: Uuid) -> AppResult<()> {
    if moderator_id == user_id {
        return Err(AppError::new(ErrorCode::CannotChangeOwnRole, "you cannot change your own role"));
    }
    Ok(())
}

// --- Dashboard ---

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    _moderator: ModeratorUser,
) -> AppResult<Json<ApiResponse<ModerationStats>>> {
    let mut conn = db::conn(&state.db)?;

    let pending_professors: i64 = professors::table
        .filter(professors::is_verified.eq(false))
        .count()
        .get_result(&mut conn)?;
    let pending_departments: i64 = departments::table
        .filter(departments::is_verified.eq(false))
        .count()
        .get_result(&mut conn)?;
    let pending_courses: i64 = courses::table
        .filter(courses::is_verified.eq(false))
        .count()
        .get_result(&mut conn)?;
    let pending_reports: i64 = reports::table
        .filter(reports::status.eq(ReportStatus::Pending.as_str()))
        .count()
        .get_result(&mut conn)?;
    let moderators: i64 = profiles::table
        .filter(profiles::role.eq(UserRole::Moderator.as_str()))
        .count()
        .get_result(&mut conn)?;

    Ok(Json(ApiResponse::ok(ModerationStats {
        pending_professors,
        pending_departments,
        pending_courses,
        pending_reports,
        moderators,
    })))
}

pub async fn get_audit_log(
    State(state): State<Arc<AppState>>,
    _moderator: ModeratorUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<ModerationAction>>>> {
    let mut conn = db::conn(&state.db)?;

    let items = moderation_actions::table
        .order(moderation_actions::created_at.desc())
        .offset(params.sql_offset())
        .limit(params.sql_limit())
        .select(ModerationAction::as_select())
        .load(&mut conn)?;

    let total: i64 = moderation_actions::table.count().get_result(&mut conn)?;

    Ok(Json(ApiResponse::ok(Paginated::new(items, total as u64, &params))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moderators_cannot_change_their_own_role() {
        let me = Uuid::new_v4();
        assert_eq!(check_role_change(me, me).unwrap_err().code(), ErrorCode::CannotChangeOwnRole);
        assert!(check_role_change(me, Uuid::new_v4()).is_ok());
    }
}
