use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::errors::{AppError, ErrorCode};
use crate::types::auth::{AuthUser, Claims, UserRole};

const DEV_SECRET: &str = "development-secret-change-in-production";

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?
            .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "missing authorization header"))?;
        authenticate(&token)
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<Option<String>, AppError> {
    let Some(value) = headers.get("Authorization") else {
        return Ok(None);
    };
    let auth_header = value
        .to_str()
        .map_err(|_| AppError::new(ErrorCode::Unauthorized, "invalid authorization header"))?;

    match auth_header.strip_prefix("Bearer ") {
        Some(token) => Ok(Some(token.to_string())),
        None => Err(AppError::new(
            ErrorCode::Unauthorized,
            "authorization header must use Bearer scheme",
        )),
    }
}

fn jwt_secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| DEV_SECRET.to_string())
}

/// Verify an access token issued by the hosted auth provider.
pub fn authenticate(token: &str) -> Result<AuthUser, AppError> {
    let claims = validate_jwt(token, &jwt_secret())?;
    if claims.is_expired() {
        return Err(AppError::new(ErrorCode::TokenExpired, "token has expired"));
    }
    Ok(AuthUser::from(claims))
}

fn validate_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    // provider tokens carry an audience we do not pin
    validation.validate_aud = false;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::new(ErrorCode::TokenExpired, "token has expired")
        }
        _ => AppError::new(ErrorCode::TokenInvalid, format!("invalid token: {e}")),
    })?;

    Ok(token_data.claims)
}

/// Signed-in viewer when an Authorization header is present.
///
/// A missing header yields `None`; a header carrying a bad or expired token
/// is still rejected so a stale session is not silently treated as anonymous.
pub struct OptionalAuthUser(pub Option<AuthUser>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match extract_bearer_token(&parts.headers)? {
            Some(token) => Ok(Self(Some(authenticate(&token)?))),
            None => Ok(Self(None)),
        }
    }
}

/// Require the moderator role
pub struct ModeratorUser(pub AuthUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for ModeratorUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != UserRole::Moderator {
            return Err(AppError::new(ErrorCode::Forbidden, "moderator access required"));
        }
        Ok(Self(user))
    }
}
