//! Verification queues for user-submitted professors, departments and
//! courses. Approving flips `is_verified`; rejecting deletes the row.
//! Batches run as one statement each and are not wrapped in a transaction.

use axum::extract::{Path, Query, State};
use axum::Json;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use upicks_shared::clients::db;
use upicks_shared::errors::{AppError, AppResult, ErrorCode};
use upicks_shared::middleware::ModeratorUser;
use upicks_shared::models::{Course, Department, Professor};
use upicks_shared::schema::{campuses, courses, departments, professors};
use upicks_shared::types::{
    ApiResponse, BatchResult, IdsRequest, Paginated, PendingEntry, QueueKind, QueueParams,
};

use crate::audit;
use crate::AppState;

fn parse_queue(raw: &str) -> AppResult<QueueKind> {
    raw.parse()
        .map_err(|e: String| AppError::new(ErrorCode::UnknownQueue, e))
}

// --- Listing ---

pub async fn list_queue(
    State(state): State<Arc<AppState>>,
    _moderator: ModeratorUser,
    Path(queue): Path<String>,
    Query(params): Query<QueueParams>,
) -> AppResult<Json<ApiResponse<Paginated<PendingEntry>>>> {
    let queue = parse_queue(&queue)?;
    let mut conn = db::conn(&state.db)?;

    let entries = pending_entries(&mut conn, queue)?;
    let filtered: Vec<PendingEntry> = match params.q.as_deref() {
        Some(q) => entries.into_iter().filter(|e| e.matches(q)).collect(),
        None => entries,
    };

    Ok(Json(ApiResponse::ok(params.pagination().slice(&filtered))))
}

fn pending_entries(conn: &mut PgConnection, queue: QueueKind) -> AppResult<Vec<PendingEntry>> {
    let entries = match queue {
        QueueKind::Professors => professors::table
            .inner_join(campuses::table)
            .filter(professors::is_verified.eq(false))
            .order(professors::created_at.asc())
            .select((Professor::as_select(), campuses::name))
            .load::<(Professor, String)>(conn)?
            .into_iter()
            .map(|(p, campus)| PendingEntry {
                id: p.id,
                queue,
                label: p.full_name(),
                detail: Some(campus),
                submitted_by: p.submitted_by,
                created_at: p.created_at,
            })
            .collect(),
        QueueKind::Departments => departments::table
            .inner_join(campuses::table)
            .filter(departments::is_verified.eq(false))
            .order(departments::created_at.asc())
            .select((Department::as_select(), campuses::name))
            .load::<(Department, String)>(conn)?
            .into_iter()
            .map(|(d, campus)| PendingEntry {
                id: d.id,
                queue,
                label: d.name,
                detail: Some(campus),
                submitted_by: d.submitted_by,
                created_at: d.created_at,
            })
            .collect(),
        QueueKind::Courses => courses::table
            .filter(courses::is_verified.eq(false))
            .order(courses::created_at.asc())
            .select(Course::as_select())
            .load::<Course>(conn)?
            .into_iter()
            .map(|c| PendingEntry {
                id: c.id,
                queue,
                label: c.code,
                detail: c.title,
                submitted_by: c.submitted_by,
                created_at: c.created_at,
            })
            .collect(),
    };
    Ok(entries)
}

// --- Batches ---

pub async fn approve_batch(
    State(state): State<Arc<AppState>>,
    moderator: ModeratorUser,
    Path(queue): Path<String>,
    Json(body): Json<IdsRequest>,
) -> AppResult<Json<ApiResponse<BatchResult>>> {
    let queue = parse_queue(&queue)?;
    let ids = checked_ids(body.ids, state.config.max_batch_size)?;

    let mut conn = db::conn(&state.db)?;
    let affected = approve(&mut conn, queue, &ids)?;

    audit::log_action(
        &mut conn,
        moderator.0.id,
        format!("approve_{}", queue.as_str()),
        None,
        serde_json::json!({ "ids": ids, "affected": affected }),
    )?;

    Ok(Json(ApiResponse::ok(BatchResult { requested: ids.len(), affected })))
}

pub async fn reject_batch(
    State(state): State<Arc<AppState>>,
    moderator: ModeratorUser,
    Path(queue): Path<String>,
    Json(body): Json<IdsRequest>,
) -> AppResult<Json<ApiResponse<BatchResult>>> {
    let queue = parse_queue(&queue)?;
    let ids = checked_ids(body.ids, state.config.max_batch_size)?;

    let mut conn = db::conn(&state.db)?;
    let affected = reject(&mut conn, queue, &ids)?;

    audit::log_action(
        &mut conn,
        moderator.0.id,
        format!("reject_{}", queue.as_str()),
        None,
        serde_json::json!({ "ids": ids, "affected": affected }),
    )?;

    Ok(Json(ApiResponse::ok(BatchResult { requested: ids.len(), affected })))
}

// --- Single rows ---

pub async fn approve_one(
    State(state): State<Arc<AppState>>,
    moderator: ModeratorUser,
    Path((queue, id)): Path<(String, Uuid)>,
) -> AppResult<Json<ApiResponse<BatchResult>>> {
    let queue = parse_queue(&queue)?;
    let mut conn = db::conn(&state.db)?;

    let affected = approve(&mut conn, queue, &[id])?;
    if affected == 0 {
        return Err(AppError::not_found("no pending entry with that id"));
    }

    audit::log_action(
        &mut conn,
        moderator.0.id,
        format!("approve_{}", queue.as_str()),
        Some(id),
        serde_json::json!({ "queue": queue }),
    )?;

    Ok(Json(ApiResponse::ok(BatchResult { requested: 1, affected })))
}

pub async fn reject_one(
    State(state): State<Arc<AppState>>,
    moderator: ModeratorUser,
    Path((queue, id)): Path<(String, Uuid)>,
) -> AppResult<Json<ApiResponse<BatchResult>>> {
    let queue = parse_queue(&queue)?;
    let mut conn = db::conn(&state.db)?;

    let affected = reject(&mut conn, queue, &[id])?;
    if affected == 0 {
        return Err(AppError::not_found("no pending entry with that id"));
    }

    audit::log_action(
        &mut conn,
        moderator.0.id,
        format!("reject_{}", queue.as_str()),
        Some(id),
        serde_json::json!({ "queue": queue }),
    )?;

    Ok(Json(ApiResponse::ok(BatchResult { requested: 1, affected })))
}

// --- Statements ---

fn approve(conn: &mut PgConnection, queue: QueueKind, ids: &[Uuid]) -> AppResult<usize> {
    let affected = match queue {
        QueueKind::Professors => diesel::update(
            professors::table
                .filter(professors::id.eq_any(ids))
                .filter(professors::is_verified.eq(false)),
        )
        .set(professors::is_verified.eq(true))
        .execute(conn)?,
        QueueKind::Departments => diesel::update(
            departments::table
                .filter(departments::id.eq_any(ids))
                .filter(departments::is_verified.eq(false)),
        )
        .set(departments::is_verified.eq(true))
        .execute(conn)?,
        QueueKind::Courses => diesel::update(
            courses::table
                .filter(courses::id.eq_any(ids))
                .filter(courses::is_verified.eq(false)),
        )
        .set(courses::is_verified.eq(true))
        .execute(conn)?,
    };
    Ok(affected)
}

/// Only unverified rows are deleted; approved entities go through takedown.
fn reject(conn: &mut PgConnection, queue: QueueKind, ids: &[Uuid]) -> AppResult<usize> {
    let affected = match queue {
        QueueKind::Professors => diesel::delete(
            professors::table
                .filter(professors::id.eq_any(ids))
                .filter(professors::is_verified.eq(false)),
        )
        .execute(conn)?,
        QueueKind::Departments => diesel::delete(
            departments::table
                .filter(departments::id.eq_any(ids))
                .filter(departments::is_verified.eq(false)),
        )
        .execute(conn)?,
        QueueKind::Courses => diesel::delete(
            courses::table
                .filter(courses::id.eq_any(ids))
                .filter(courses::is_verified.eq(false)),
        )
        .execute(conn)?,
    };
    Ok(affected)
}

fn checked_ids(mut ids: Vec<Uuid>, max: usize) -> AppResult<Vec<Uuid>> {
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "no ids given"));
    }
    if ids.len() > max {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            format!("at most {max} ids per batch"),
        ));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_names() {
        assert_eq!(parse_queue("courses").unwrap(), QueueKind::Courses);
        assert_eq!(parse_queue("campuses").unwrap_err().code(), ErrorCode::UnknownQueue);
    }

    #[test]
    fn batch_ids_are_deduplicated_and_bounded() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(checked_ids(vec![a, b, a], 10).unwrap().len(), 2);
        assert_eq!(checked_ids(vec![], 10).unwrap_err().code(), ErrorCode::ValidationError);
        assert!(checked_ids(vec![a, b], 1).is_err());
    }
}
