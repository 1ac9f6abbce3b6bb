use axum::extract::{Path, Query, State};
use axum::Json;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use upicks_shared::aggregate;
use upicks_shared::clients::db;
use upicks_shared::errors::{is_unique_violation, AppError, AppResult, ErrorCode};
use upicks_shared::middleware::{record_event, OptionalAuthUser};
use upicks_shared::models::{
    CampusRating, NewCampusRating, NewProfessorRating, ProfessorRating, RatingTag,
};
use upicks_shared::schema::{campus_ratings, courses, professor_ratings};
use upicks_shared::types::auth::AuthUser;
use upicks_shared::types::{
    normalize_tags, ApiResponse, Paginated, RatingKind, RatingListParams, RatingSummary,
    SubmitCampusRating, SubmitProfessorRating,
};

use crate::routes::catalog::{verified_campus, verified_professor};
use crate::services::rating_service;
use crate::AppState;

// --- Listing ---

pub async fn list_professor_ratings(
    State(state): State<Arc<AppState>>,
    Path(professor_id): Path<Uuid>,
    Query(params): Query<RatingListParams>,
) -> AppResult<Json<ApiResponse<Paginated<ProfessorRating>>>> {
    let mut conn = db::conn(&state.db)?;
    verified_professor(&mut conn, professor_id)?;

    let mut rows = rating_service::professor_ratings_for(&mut conn, professor_id)?;
    aggregate::sort_ratings(&mut rows, params.sort);
    let page = params.pagination().slice(&rows);

    Ok(Json(ApiResponse::ok(redact_page(page, ProfessorRating::redacted))))
}

pub async fn list_campus_ratings(
    State(state): State<Arc<AppState>>,
    Path(campus_id): Path<Uuid>,
    Query(params): Query<RatingListParams>,
) -> AppResult<Json<ApiResponse<Paginated<CampusRating>>>> {
    let mut conn = db::conn(&state.db)?;
    verified_campus(&mut conn, campus_id)?;

    let mut rows = rating_service::campus_ratings_for(&mut conn, campus_id)?;
    aggregate::sort_ratings(&mut rows, params.sort);
    let page = params.pagination().slice(&rows);

    Ok(Json(ApiResponse::ok(redact_page(page, CampusRating::redacted))))
}

fn redact_page<T>(page: Paginated<T>, redact: fn(T) -> T) -> Paginated<T> {
    Paginated {
        items: page.items.into_iter().map(redact).collect(),
        ..page
    }
}

// --- Submission ---

pub async fn submit_professor_rating(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(professor_id): Path<Uuid>,
    Json(req): Json<SubmitProfessorRating>,
) -> AppResult<Json<ApiResponse<ProfessorRating>>> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;
    let tags = normalize_tags(&req.tags).map_err(AppError::Validation)?;

    let mut conn = db::conn(&state.db)?;
    verified_professor(&mut conn, professor_id)?;

    if let Some(course_id) = req.course_id {
        let course_count: i64 = courses::table
            .filter(courses::id.eq(course_id))
            .filter(courses::is_verified.eq(true))
            .count()
            .get_result(&mut conn)?;
        if course_count == 0 {
            return Err(AppError::new(ErrorCode::CourseNotFound, "course not found"));
        }
    }

    let new_rating = NewProfessorRating {
        professor_id,
        user_id: Some(user.id),
        course_id: req.course_id,
        overall: req.overall,
        difficulty: req.difficulty,
        clarity: req.clarity,
        helpfulness: req.helpfulness,
        would_take_again: req.would_take_again,
        review: clean_review(req.review),
        is_anonymous: req.is_anonymous,
    };

    let rating = conn.transaction::<ProfessorRating, AppError, _>(|conn| {
        let rating: ProfessorRating = diesel::insert_into(professor_ratings::table)
            .values(&new_rating)
            .get_result(conn)
            .map_err(duplicate_rating)?;
        rating_service::insert_tags(conn, RatingKind::Professor, rating.id, &tags)?;
        Ok(rating)
    })?;

    rating_service::invalidate_summary(&state.redis, RatingKind::Professor, professor_id).await;
    record_event("ratings_submitted_total", "professor");
    tracing::info!(rating_id = %rating.id, professor_id = %professor_id, "professor rating submitted");

    Ok(Json(ApiResponse::ok(rating.redacted())))
}

/// Campus ratings may be posted without signing in; those are always
/// anonymous and carry no author.
pub async fn submit_campus_rating(
    OptionalAuthUser(user): OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Path(campus_id): Path<Uuid>,
    Json(req): Json<SubmitCampusRating>,
) -> AppResult<Json<ApiResponse<CampusRating>>> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;
    let tags = normalize_tags(&req.tags).map_err(AppError::Validation)?;

    let mut conn = db::conn(&state.db)?;
    verified_campus(&mut conn, campus_id)?;

    let new_rating = NewCampusRating {
        campus_id,
        user_id: user.as_ref().map(|u| u.id),
        overall: req.overall,
        facilities: req.facilities,
        safety: req.safety,
        location: req.location,
        opportunities: req.opportunities,
        internet: req.internet,
        food: req.food,
        clubs: req.clubs,
        review: clean_review(req.review),
        is_anonymous: req.is_anonymous || user.is_none(),
    };

    let rating = conn.transaction::<CampusRating, AppError, _>(|conn| {
        let rating: CampusRating = diesel::insert_into(campus_ratings::table)
            .values(&new_rating)
            .get_result(conn)
            .map_err(duplicate_rating)?;
        rating_service::insert_tags(conn, RatingKind::Campus, rating.id, &tags)?;
        Ok(rating)
    })?;

    rating_service::invalidate_summary(&state.redis, RatingKind::Campus, campus_id).await;
    record_event("ratings_submitted_total", "campus");
    tracing::info!(rating_id = %rating.id, campus_id = %campus_id, signed_in = user.is_some(), "campus rating submitted");

    Ok(Json(ApiResponse::ok(rating.redacted())))
}

fn clean_review(review: Option<String>) -> Option<String> {
    review.map(|r| r.trim().to_string()).filter(|r| !r.is_empty())
}

fn duplicate_rating(e: diesel::result::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::new(ErrorCode::DuplicateRating, "you have already rated this")
    } else {
        AppError::Database(e)
    }
}

// --- Tags ---

pub async fn list_professor_tags(
    State(state): State<Arc<AppState>>,
    Path(professor_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<RatingTag>>>> {
    let mut conn = db::conn(&state.db)?;
    verified_professor(&mut conn, professor_id)?;
    let tags = rating_service::tags_for(&mut conn, RatingKind::Professor, professor_id)?;
    Ok(Json(ApiResponse::ok(tags)))
}

pub async fn list_campus_tags(
    State(state): State<Arc<AppState>>,
    Path(campus_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<RatingTag>>>> {
    let mut conn = db::conn(&state.db)?;
    verified_campus(&mut conn, campus_id)?;
    let tags = rating_service::tags_for(&mut conn, RatingKind::Campus, campus_id)?;
    Ok(Json(ApiResponse::ok(tags)))
}

// --- Summaries ---

pub async fn professor_summary(
    State(state): State<Arc<AppState>>,
    Path(professor_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<RatingSummary>>> {
    if let Some(summary) = rating_service::cached_summary(&state.redis, RatingKind::Professor, professor_id).await {
        return Ok(Json(ApiResponse::ok(summary)));
    }

    let summary = {
        let mut conn = db::conn(&state.db)?;
        verified_professor(&mut conn, professor_id)?;
        let rows = rating_service::professor_ratings_for(&mut conn, professor_id)?;
        let tags = rating_service::tags_for(&mut conn, RatingKind::Professor, professor_id)?;
        aggregate::summarize(&rows, tags.iter().map(|t| t.tag.as_str()))
    };

    rating_service::store_summary(
        &state.redis,
        RatingKind::Professor,
        professor_id,
        &summary,
        state.config.summary_cache_ttl_secs,
    )
    .await;
    Ok(Json(ApiResponse::ok(summary)))
}

pub async fn campus_summary(
    State(state): State<Arc<AppState>>,
    Path(campus_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<RatingSummary>>> {
    if let Some(summary) = rating_service::cached_summary(&state.redis, RatingKind::Campus, campus_id).await {
        return Ok(Json(ApiResponse::ok(summary)));
    }

    let summary = {
        let mut conn = db::conn(&state.db)?;
        verified_campus(&mut conn, campus_id)?;
        let rows = rating_service::campus_ratings_for(&mut conn, campus_id)?;
        let tags = rating_service::tags_for(&mut conn, RatingKind::Campus, campus_id)?;
        aggregate::summarize(&rows, tags.iter().map(|t| t.tag.as_str()))
    };

    rating_service::store_summary(
        &state.redis,
        RatingKind::Campus,
        campus_id,
        &summary,
        state.config.summary_cache_ttl_secs,
    )
    .await;
    Ok(Json(ApiResponse::ok(summary)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use upicks_shared::types::PaginationParams;

    #[test]
    fn blank_review_is_dropped() {
        assert_eq!(clean_review(Some("   ".into())), None);
        assert_eq!(clean_review(Some(" Fair exams. ".into())).as_deref(), Some("Fair exams."));
        assert_eq!(clean_review(None), None);
    }

    #[test]
    fn duplicate_rating_code() {
        let err = diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            Box::new("professor_ratings_user_id_professor_id_key".to_string()),
        );
        assert_eq!(duplicate_rating(err).code(), ErrorCode::DuplicateRating);
    }

    #[test]
    fn redact_page_keeps_pagination() {
        let page = PaginationParams::new(2, 1).slice(&[1, 2, 3]);
        let redacted = redact_page(page, |n| n * 10);
        assert_eq!(redacted.items, vec![20]);
        assert_eq!(redacted.total, 3);
        assert_eq!(redacted.page, 2);
        assert_eq!(redacted.total_pages, 3);
    }
}
