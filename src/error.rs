use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    TooManyRequests { message: String, retry_after_secs: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Store(StoreError::DuplicateSlug(_)) => StatusCode::CONFLICT,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Token details stay in the log
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        tracing::debug!(error = %err, "Authentication failed");
        let message = match err {
            AuthError::MissingToken => "Authentication required",
            AuthError::InvalidToken(_) | AuthError::UnknownUser => "Invalid or expired token",
        };
        ApiError::Unauthorized(message.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details stay in the log
        let error = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let retry_after_seconds = match &self {
            ApiError::TooManyRequests { retry_after_secs, .. } => Some(*retry_after_secs),
            _ => None,
        };

        (
            status,
            Json(ErrorResponse {
                error,
                retry_after_seconds,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn too_many_requests_carries_retry_hint() {
        let (status, json) = body_json(ApiError::TooManyRequests {
            message: "slow down".into(),
            retry_after_secs: 42,
        })
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json["error"], "slow down");
        assert_eq!(json["retryAfterSeconds"], 42);
    }

    #[tokio::test]
    async fn internal_errors_are_masked() {
        let (status, json) = body_json(ApiError::Internal("secret detail".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Internal server error");
        assert!(json.get("retryAfterSeconds").is_none());
    }

    #[tokio::test]
    async fn auth_failures_use_fixed_messages() {
        let bad_token = jsonwebtoken::decode::<serde_json::Value>(
            "not-a-jwt",
            &jsonwebtoken::DecodingKey::from_secret(b"k"),
            &jsonwebtoken::Validation::default(),
        )
        .unwrap_err();

        let (status, json) = body_json(AuthError::InvalidToken(bad_token).into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "Invalid or expired token");

        let (_, json) = body_json(AuthError::UnknownUser.into()).await;
        assert_eq!(json["error"], "Invalid or expired token");

        let (_, json) = body_json(AuthError::MissingToken.into()).await;
        assert_eq!(json["error"], "Authentication required");
    }

    #[tokio::test]
    async fn duplicate_slug_is_a_conflict() {
        let (status, json) = body_json(StoreError::DuplicateSlug("hello".into()).into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(json["error"].as_str().unwrap().contains("hello"));
    }
}
