use axum::extract::State;
use axum::Json;
use diesel::prelude::*;
use std::sync::Arc;

use upicks_shared::clients::db;
use upicks_shared::errors::{is_unique_violation, AppError, AppResult, ErrorCode};
use upicks_shared::models::{Profile, ProfileChanges};
use upicks_shared::schema::profiles;
use upicks_shared::types::auth::AuthUser;
use upicks_shared::types::{ApiResponse, UpdateProfileRequest};

use crate::services::profile_service;
use crate::AppState;

// --- GET /me ---

pub async fn get_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let mut conn = db::conn(&state.db)?;
    let profile = profile_service::ensure_profile(&mut conn, user.id)?;
    Ok(Json(ApiResponse::ok(profile)))
}

// --- PATCH /me ---

pub async fn update_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let changes = validate_changes(payload)?;

    let mut conn = db::conn(&state.db)?;
    profile_service::ensure_profile(&mut conn, user.id)?;

    let updated = diesel::update(profiles::table.find(user.id))
        .set(&changes)
        .get_result::<Profile>(&mut conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::new(ErrorCode::NicknameTaken, "nickname is already taken")
            } else {
                AppError::Database(e)
            }
        })?;

    tracing::info!(user_id = %user.id, "profile updated");
    Ok(Json(ApiResponse::ok(updated)))
}

fn validate_changes(req: UpdateProfileRequest) -> AppResult<ProfileChanges> {
    let nickname = match req.nickname {
        Some(nickname) => Some(validate_nickname(&nickname)?),
        None => None,
    };

    if let Some(year) = req.year_level {
        if !(1..=7).contains(&year) {
            return Err(AppError::new(ErrorCode::ValidationError, "year level must be between 1 and 7"));
        }
    }

    let program = req
        .program
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());
    if program.as_ref().is_some_and(|p| p.chars().count() > 120) {
        return Err(AppError::new(ErrorCode::ValidationError, "program must be at most 120 characters"));
    }

    Ok(ProfileChanges {
        nickname,
        campus_id: req.campus_id,
        program,
        year_level: req.year_level,
    })
}

/// Nicknames: 3-30 characters, letters, digits, `_` and `.`.
fn validate_nickname(raw: &str) -> AppResult<String> {
    let nickname = raw.trim();
    let len = nickname.chars().count();
    if !(3..=30).contains(&len) {
        return Err(AppError::new(
            ErrorCode::InvalidNickname,
            "nickname must be between 3 and 30 characters",
        ));
    }
    if !nickname.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
        return Err(AppError::new(
            ErrorCode::InvalidNickname,
            "nickname can only contain letters, numbers, underscores and dots",
        ));
    }
    Ok(nickname.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nickname_rules() {
        assert_eq!(validate_nickname("  iskolar_ng.bayan ").unwrap(), "iskolar_ng.bayan");
        assert_eq!(validate_nickname("ab").unwrap_err().code(), ErrorCode::InvalidNickname);
        assert_eq!(validate_nickname("no spaces").unwrap_err().code(), ErrorCode::InvalidNickname);
    }

    #[test]
    fn year_level_is_bounded() {
        let req = UpdateProfileRequest {
            year_level: Some(9),
            ..Default::default()
        };
        assert_eq!(validate_changes(req).unwrap_err().code(), ErrorCode::ValidationError);
    }

    #[test]
    fn blank_program_is_dropped() {
        let req = UpdateProfileRequest {
            program: Some("   ".into()),
            year_level: Some(2),
            ..Default::default()
        };
        let changes = validate_changes(req).unwrap();
        assert_eq!(changes.program, None);
        assert_eq!(changes.year_level, Some(2));
    }
}
