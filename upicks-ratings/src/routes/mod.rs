pub mod catalog;
pub mod health;
pub mod profile;
pub mod ratings;
pub mod replies;
pub mod votes;

use upicks_shared::errors::{AppError, ErrorCode};
use upicks_shared::types::RatingKind;

/// Parse the `:kind` path segment of `/ratings/:kind/...` routes.
pub(crate) fn parse_kind(raw: &str) -> Result<RatingKind, AppError> {
    raw.parse()
        .map_err(|e: String| AppError::new(ErrorCode::BadRequest, e))
}
