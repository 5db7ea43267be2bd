use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ApiError;

/// Payload
///
/// JSON body extractor whose rejections are `ApiError`s instead of axum's plain-text
/// ones. An empty body parses as `{}`, so missing fields surface as field errors.
/// Validation is a separate step ([`Payload::validated`]). Mutating handlers take
/// `Result<Payload<T>, ApiError>` and only look at it after the existence and
/// ownership checks, so a malformed body never masks a 404 or 403.
#[derive(Debug, Clone)]
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &bytes
        };

        serde_json::from_slice(body)
            .map(Payload)
            .map_err(|e| ApiError::BadRequest(format!("JSON parse error - {}", e)))
    }
}

impl<T: Validate> Payload<T> {
    /// Runs the `validator` rules and hands back the inner value.
    pub fn validated(self) -> Result<T, ApiError> {
        self.0.validate()?;
        Ok(self.0)
    }
}
