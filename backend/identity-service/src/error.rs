use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use jwt_security::JwtError;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IdentityError>;

/// Coarse failure class, used by callers to decide how to message the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Authorization,
    Validation,
    Conflict,
    NotFound,
    Expired,
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Missing credentials")]
    MissingCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Mission revoked")]
    MissionRevoked,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid invite code")]
    InvalidInviteCode,

    #[error("Invite already used")]
    InviteAlreadyUsed,

    #[error("Identity already exists")]
    IdentityAlreadyExists,

    #[error("Invite not found")]
    InviteNotFound,

    #[error("Mission not found")]
    MissionNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Invite expired")]
    InviteExpired,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IdentityError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            IdentityError::MissingCredentials
            | IdentityError::InvalidToken
            | IdentityError::TokenExpired
            | IdentityError::TokenRevoked
            | IdentityError::InvalidRefreshToken
            | IdentityError::MissionRevoked => ErrorCategory::Authentication,
            IdentityError::Forbidden(_) => ErrorCategory::Authorization,
            IdentityError::Validation(_) | IdentityError::InvalidInviteCode => {
                ErrorCategory::Validation
            }
            IdentityError::InviteAlreadyUsed | IdentityError::IdentityAlreadyExists => {
                ErrorCategory::Conflict
            }
            IdentityError::InviteNotFound
            | IdentityError::MissionNotFound
            | IdentityError::UserNotFound => ErrorCategory::NotFound,
            IdentityError::InviteExpired => ErrorCategory::Expired,
            IdentityError::Database(_)
            | IdentityError::Redis(_)
            | IdentityError::JwtError(_)
            | IdentityError::Internal(_) => ErrorCategory::Infrastructure,
        }
    }

    /// Stable machine-readable code for API consumers
    pub fn code(&self) -> &'static str {
        match self {
            IdentityError::MissingCredentials => "MISSING_CREDENTIALS",
            IdentityError::InvalidToken => "INVALID_TOKEN",
            IdentityError::TokenExpired => "TOKEN_EXPIRED",
            IdentityError::TokenRevoked => "TOKEN_REVOKED",
            IdentityError::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            IdentityError::MissionRevoked => "MISSION_REVOKED",
            IdentityError::Forbidden(_) => "FORBIDDEN",
            IdentityError::Validation(_) => "VALIDATION_ERROR",
            IdentityError::InvalidInviteCode => "INVALID_CODE",
            IdentityError::InviteAlreadyUsed => "ALREADY_USED",
            IdentityError::IdentityAlreadyExists => "IDENTITY_EXISTS",
            IdentityError::InviteNotFound => "INVITE_NOT_FOUND",
            IdentityError::MissionNotFound => "MISSION_NOT_FOUND",
            IdentityError::UserNotFound => "USER_NOT_FOUND",
            IdentityError::InviteExpired => "INVITE_EXPIRED",
            IdentityError::Database(_)
            | IdentityError::Redis(_)
            | IdentityError::JwtError(_)
            | IdentityError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.category() {
            ErrorCategory::Authentication => StatusCode::UNAUTHORIZED,
            ErrorCategory::Authorization => StatusCode::FORBIDDEN,
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::Conflict => StatusCode::CONFLICT,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Expired => StatusCode::GONE,
            ErrorCategory::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to callers
    pub fn public_message(&self) -> String {
        match self.category() {
            // Don't leak internal details in production
            ErrorCategory::Infrastructure => "Internal server error".to_string(),
            // Never distinguish bad signature from expiry/revocation for bearer tokens
            ErrorCategory::Authentication => match self {
                IdentityError::InvalidToken
                | IdentityError::TokenExpired
                | IdentityError::TokenRevoked => "Invalid, expired, or revoked token".to_string(),
                other => other.to_string(),
            },
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        if self.category() == ErrorCategory::Infrastructure {
            tracing::error!(error = %self, "Request failed with internal error");
        }

        let body = Json(json!({
            "error": self.code(),
            "message": self.public_message(),
        }));

        (self.status_code(), body).into_response()
    }
}

// Conversions from external error types
impl From<sqlx::Error> for IdentityError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        IdentityError::Database(err.to_string())
    }
}

impl From<redis::RedisError> for IdentityError {
    fn from(err: redis::RedisError) -> Self {
        tracing::error!("Redis error: {}", err);
        IdentityError::Redis(err.to_string())
    }
}

impl From<JwtError> for IdentityError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => IdentityError::TokenExpired,
            JwtError::InvalidSignature
            | JwtError::InvalidIssuer
            | JwtError::InvalidAudience
            | JwtError::Malformed(_)
            | JwtError::MissingClaim(_) => IdentityError::InvalidToken,
            JwtError::InvalidKey(msg) | JwtError::Signing(msg) => {
                tracing::error!("JWT error: {}", msg);
                IdentityError::JwtError(msg)
            }
        }
    }
}

impl From<anyhow::Error> for IdentityError {
    fn from(err: anyhow::Error) -> Self {
        IdentityError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for IdentityError {
    fn from(err: validator::ValidationErrors) -> Self {
        IdentityError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for IdentityError {
    fn from(err: serde_json::Error) -> Self {
        IdentityError::Internal(format!("serialization failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infrastructure_errors_hide_detail() {
        let err = IdentityError::Database("connection refused to 10.0.0.4".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Internal server error");
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_invite_conflict_codes() {
        assert_eq!(IdentityError::InviteAlreadyUsed.code(), "ALREADY_USED");
        assert_eq!(
            IdentityError::InviteAlreadyUsed.category(),
            ErrorCategory::Conflict
        );
        assert_eq!(IdentityError::InvalidInviteCode.code(), "INVALID_CODE");
        assert_eq!(
            IdentityError::InvalidInviteCode.status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_expired_distinct_from_not_found() {
        assert_eq!(IdentityError::InviteExpired.status_code(), StatusCode::GONE);
        assert_eq!(
            IdentityError::InviteNotFound.status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_jwt_error_mapping() {
        assert!(matches!(
            IdentityError::from(JwtError::Expired),
            IdentityError::TokenExpired
        ));
        assert!(matches!(
            IdentityError::from(JwtError::InvalidSignature),
            IdentityError::InvalidToken
        ));
        assert!(matches!(
            IdentityError::from(JwtError::InvalidKey("bad pem".into())),
            IdentityError::JwtError(_)
        ));
    }

    #[test]
    fn test_token_failures_share_public_message() {
        assert_eq!(
            IdentityError::TokenRevoked.public_message(),
            IdentityError::InvalidToken.public_message()
        );
    }
}
