use diesel::prelude::*;
use uuid::Uuid;

use upicks_shared::clients::redis::RedisClient;
use upicks_shared::errors::{AppError, AppResult, ErrorCode};
use upicks_shared::models::{CampusRating, NewRatingTag, ProfessorRating, RatingTag};
use upicks_shared::schema::{campus_ratings, professor_ratings, rating_tags};
use upicks_shared::types::{RatingKind, RatingSummary};

pub fn professor_ratings_for(conn: &mut PgConnection, professor_id: Uuid) -> AppResult<Vec<ProfessorRating>> {
    let rows = professor_ratings::table
        .filter(professor_ratings::professor_id.eq(professor_id))
        .order(professor_ratings::created_at.desc())
        .select(ProfessorRating::as_select())
        .load(conn)?;
    Ok(rows)
}

pub fn campus_ratings_for(conn: &mut PgConnection, campus_id: Uuid) -> AppResult<Vec<CampusRating>> {
    let rows = campus_ratings::table
        .filter(campus_ratings::campus_id.eq(campus_id))
        .order(campus_ratings::created_at.desc())
        .select(CampusRating::as_select())
        .load(conn)?;
    Ok(rows)
}

/// Tag rows of every rating of one target, oldest first.
pub fn tags_for(conn: &mut PgConnection, kind: RatingKind, target_id: Uuid) -> AppResult<Vec<RatingTag>> {
    let query = rating_tags::table
        .filter(rating_tags::rating_kind.eq(kind))
        .order((rating_tags::created_at.asc(), rating_tags::id.asc()))
        .select(RatingTag::as_select());

    let rows = match kind {
        RatingKind::Professor => query
            .filter(
                rating_tags::rating_id.eq_any(
                    professor_ratings::table
                        .filter(professor_ratings::professor_id.eq(target_id))
                        .select(professor_ratings::id),
                ),
            )
            .load(conn)?,
        RatingKind::Campus => query
            .filter(
                rating_tags::rating_id.eq_any(
                    campus_ratings::table
                        .filter(campus_ratings::campus_id.eq(target_id))
                        .select(campus_ratings::id),
                ),
            )
            .load(conn)?,
    };
    Ok(rows)
}

pub fn insert_tags(conn: &mut PgConnection, kind: RatingKind, rating_id: Uuid, tags: &[String]) -> AppResult<()> {
    if tags.is_empty() {
        return Ok(());
    }
    let rows: Vec<NewRatingTag> = tags
        .iter()
        .map(|tag| NewRatingTag {
            rating_kind: kind,
            rating_id,
            tag: tag.clone(),
        })
        .collect();
    diesel::insert_into(rating_tags::table).values(&rows).execute(conn)?;
    Ok(())
}

/// The rated target of a rating, taking a row lock when `lock` is set.
pub fn rating_target(conn: &mut PgConnection, kind: RatingKind, rating_id: Uuid, lock: bool) -> AppResult<Uuid> {
    let target = match (kind, lock) {
        (RatingKind::Professor, false) => professor_ratings::table
            .find(rating_id)
            .select(professor_ratings::professor_id)
            .first::<Uuid>(conn)
            .optional()?,
        (RatingKind::Professor, true) => professor_ratings::table
            .find(rating_id)
            .select(professor_ratings::professor_id)
            .for_update()
            .first::<Uuid>(conn)
            .optional()?,
        (RatingKind::Campus, false) => campus_ratings::table
            .find(rating_id)
            .select(campus_ratings::campus_id)
            .first::<Uuid>(conn)
            .optional()?,
        (RatingKind::Campus, true) => campus_ratings::table
            .find(rating_id)
            .select(campus_ratings::campus_id)
            .for_update()
            .first::<Uuid>(conn)
            .optional()?,
    };
    target.ok_or_else(|| AppError::new(ErrorCode::RatingNotFound, "rating not found"))
}

// --- Summary cache ---

/// Cache failures are logged and treated as a miss.
pub async fn cached_summary(redis: &RedisClient, kind: RatingKind, target_id: Uuid) -> Option<RatingSummary> {
    let key = RatingSummary::cache_key(kind, target_id);
    match redis.get(&key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "discarding unreadable cached summary");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "summary cache read failed");
            None
        }
    }
}

pub async fn store_summary(
    redis: &RedisClient,
    kind: RatingKind,
    target_id: Uuid,
    summary: &RatingSummary,
    ttl_secs: u64,
) {
    let key = RatingSummary::cache_key(kind, target_id);
    let raw = match serde_json::to_string(summary) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "failed to encode summary");
            return;
        }
    };
    if let Err(e) = redis.set(&key, &raw, ttl_secs).await {
        tracing::warn!(key = %key, error = %e, "summary cache write failed");
    }
}

pub async fn invalidate_summary(redis: &RedisClient, kind: RatingKind, target_id: Uuid) {
    let key = RatingSummary::cache_key(kind, target_id);
    if let Err(e) = redis.del(&key).await {
        tracing::warn!(key = %key, error = %e, "summary cache invalidation failed");
    }
}
