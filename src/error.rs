use std::collections::BTreeMap;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::repository::RepositoryError;

/// FieldErrors
///
/// Field name to list of human readable messages. Serialized as a flat JSON
/// object, e.g. `{"email": ["Enter a valid email address."]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(pub BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// Builds an error map holding a single message for `field`.
    pub fn single(field: &str, message: &str) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        Self(errors)
    }

    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.0.get(field)
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut map = BTreeMap::new();
        for (field, field_errors) in errors.field_errors() {
            let messages = field_errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            map.insert(field.to_string(), messages);
        }
        Self(map)
    }
}

pub const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";
pub const INVALID_TOKEN: &str = "Invalid token.";
pub const PERMISSION_DENIED: &str = "You do not have permission to perform this action.";
pub const INVALID_CREDENTIALS: &str = "Unable to log in with provided credentials.";
pub const DUPLICATE_EMAIL: &str = "user profile with this email already exists.";
pub const UNKNOWN_OWNER: &str = "Invalid pk - object does not exist.";

/// ApiError
///
/// Every failure a request can end in. Each variant maps to one status code and a
/// structured JSON body; none of them is fatal to the process.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("invalid token")]
    InvalidToken,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors.into())
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DuplicateEmail => {
                ApiError::Validation(FieldErrors::single("email", DUPLICATE_EMAIL))
            }
            RepositoryError::UnknownOwner => {
                ApiError::Validation(FieldErrors::single("user_profile", UNKNOWN_OWNER))
            }
            RepositoryError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail }))).into_response()
            }
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "non_field_errors": [INVALID_CREDENTIALS] })),
            )
                .into_response(),
            ApiError::NotAuthenticated => {
                let mut response = (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "detail": NOT_AUTHENTICATED })),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Token"));
                response
            }
            ApiError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": INVALID_TOKEN })),
            )
                .into_response(),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({ "detail": PERMISSION_DENIED })),
            )
                .into_response(),
            ApiError::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))).into_response()
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "A server error occurred." })),
                )
                    .into_response()
            }
        }
    }
}
