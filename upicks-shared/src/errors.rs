use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Catalog and rating errors
/// - E2xxx: Helpful-vote errors
/// - E3xxx: Reply errors
/// - E4xxx: Moderation errors
///
/// The string form travels in every error envelope, so clients branch on
/// the variant rather than on the wording of the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    RateLimited,
    ServiceUnavailable,
    BadRequest,
    TokenExpired,
    TokenInvalid,

    // Catalog / ratings (E1xxx)
    ProfessorNotFound,
    CampusNotFound,
    RatingNotFound,
    DuplicateRating,
    EntityAlreadyExists,
    InvalidNickname,
    NicknameTaken,
    DepartmentNotFound,
    CourseNotFound,

    // Votes (E2xxx)
    VoteAlreadyExists,
    VoteNotFound,

    // Replies (E3xxx)
    ReplyNotFound,
    ReplyQuotaExceeded,
    NotReplyAuthor,
    ReplyDeleteWindowExpired,

    // Moderation (E4xxx)
    ReportNotFound,
    ReportAlreadyReviewed,
    DuplicateReport,
    UnknownQueue,
    UserNotFound,
    CannotChangeOwnRole,
}

impl ErrorCode {
    pub const ALL: &'static [ErrorCode] = &[
        Self::InternalError,
        Self::ValidationError,
        Self::NotFound,
        Self::Unauthorized,
        Self::Forbidden,
        Self::RateLimited,
        Self::ServiceUnavailable,
        Self::BadRequest,
        Self::TokenExpired,
        Self::TokenInvalid,
        Self::ProfessorNotFound,
        Self::CampusNotFound,
        Self::RatingNotFound,
        Self::DuplicateRating,
        Self::EntityAlreadyExists,
        Self::InvalidNickname,
        Self::NicknameTaken,
        Self::DepartmentNotFound,
        Self::CourseNotFound,
        Self::VoteAlreadyExists,
        Self::VoteNotFound,
        Self::ReplyNotFound,
        Self::ReplyQuotaExceeded,
        Self::NotReplyAuthor,
        Self::ReplyDeleteWindowExpired,
        Self::ReportNotFound,
        Self::ReportAlreadyReviewed,
        Self::DuplicateReport,
        Self::UnknownQueue,
        Self::UserNotFound,
        Self::CannotChangeOwnRole,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::RateLimited => "E0006",
            Self::ServiceUnavailable => "E0007",
            Self::BadRequest => "E0008",
            Self::TokenExpired => "E0009",
            Self::TokenInvalid => "E0010",

            // Catalog / ratings
            Self::ProfessorNotFound => "E1001",
            Self::CampusNotFound => "E1002",
            Self::RatingNotFound => "E1003",
            Self::DuplicateRating => "E1004",
            Self::EntityAlreadyExists => "E1005",
            Self::InvalidNickname => "E1006",
            Self::NicknameTaken => "E1007",
            Self::DepartmentNotFound => "E1008",
            Self::CourseNotFound => "E1009",

            // Votes
            Self::VoteAlreadyExists => "E2001",
            Self::VoteNotFound => "E2002",

            // Replies
            Self::ReplyNotFound => "E3001",
            Self::ReplyQuotaExceeded => "E3002",
            Self::NotReplyAuthor => "E3003",
            Self::ReplyDeleteWindowExpired => "E3004",

            // Moderation
            Self::ReportNotFound => "E4001",
            Self::ReportAlreadyReviewed => "E4002",
            Self::DuplicateReport => "E4003",
            Self::UnknownQueue => "E4004",
            Self::UserNotFound => "E4005",
            Self::CannotChangeOwnRole => "E4006",
        }
    }

    /// Parse the `E{area}{sequence}` form carried in error envelopes.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::ValidationError | Self::BadRequest | Self::InvalidNickname
            | Self::UnknownQueue => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::ProfessorNotFound | Self::CampusNotFound
            | Self::RatingNotFound | Self::DepartmentNotFound | Self::CourseNotFound
            | Self::VoteNotFound | Self::ReplyNotFound | Self::ReportNotFound
            | Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::TokenExpired | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::NotReplyAuthor | Self::ReplyDeleteWindowExpired
            | Self::CannotChangeOwnRole => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::DuplicateRating | Self::EntityAlreadyExists | Self::NicknameTaken
            | Self::VoteAlreadyExists | Self::ReplyQuotaExceeded | Self::ReportAlreadyReviewed
            | Self::DuplicateReport => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The structured code this error will be reported with.
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Known { code, .. } => *code,
            AppError::Database(diesel::result::Error::NotFound) => ErrorCode::NotFound,
            AppError::Internal(_) | AppError::Database(_) => ErrorCode::InternalError,
            AppError::Validation(_) => ErrorCode::ValidationError,
        }
    }
}

/// True when a diesel error is a unique-constraint violation.
pub fn is_unique_violation(err: &diesel::result::Error) -> bool {
    matches!(
        err,
        diesel::result::Error::DatabaseError(diesel::result::DatabaseErrorKind::UniqueViolation, _)
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new(ErrorCode::InternalError.code(), "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new(ErrorCode::NotFound.code(), "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new(ErrorCode::InternalError.code(), "database error"),
                    ),
                }
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new(ErrorCode::ValidationError.code(), msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::collections::HashSet;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn codes_are_unique_and_parse_back() {
        let mut seen = HashSet::new();
        for code in ErrorCode::ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
            assert_eq!(ErrorCode::from_code(code.code()), Some(*code));
        }
        assert_eq!(ErrorCode::from_code("E9999"), None);
    }

    #[tokio::test]
    async fn known_error_envelope() {
        let (status, value) = body_json(AppError::new(
            ErrorCode::ReplyQuotaExceeded,
            "a review can only have 3 replies",
        ))
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "E3002");
        assert_eq!(value["error"]["message"], "a review can only have 3 replies");
        assert!(value["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn details_are_included() {
        let (_, value) = body_json(AppError::with_details(
            ErrorCode::ValidationError,
            "bad ids",
            serde_json::json!({ "missing": 2 }),
        ))
        .await;

        assert_eq!(value["error"]["details"]["missing"], 2);
    }

    #[tokio::test]
    async fn diesel_not_found_maps_to_404() {
        let (status, value) = body_json(AppError::Database(diesel::result::Error::NotFound)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(value["error"]["code"], "E0003");
    }

    #[test]
    fn validation_error_code() {
        assert_eq!(AppError::Validation("x".into()).code(), ErrorCode::ValidationError);
        assert_eq!(
            AppError::new(ErrorCode::DuplicateReport, "dup").code().status_code(),
            StatusCode::CONFLICT
        );
    }
}
