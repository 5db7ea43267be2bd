use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use rand::RngCore;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::UserProfile,
    repository::RepositoryState,
};

/// Length in bytes of the random material behind a token key (hex-encoded to 40 chars).
const TOKEN_BYTES: usize = 20;

/// AuthUser
///
/// The resolved identity of an authenticated request. Handlers use it as the
/// `user` half of the ownership predicates and as the owner of new feed items.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub is_staff: bool,
}

impl From<&UserProfile> for AuthUser {
    fn from(profile: &UserProfile) -> Self {
        Self {
            id: profile.id,
            email: profile.email.clone(),
            is_staff: profile.is_staff,
        }
    }
}

/// AuthUser Extractor Implementation
///
/// Resolves `Authorization: Token <key>` (or `Bearer <key>`) against the token table.
///
/// 1. Dependency Resolution: the repository is pulled from the application state.
/// 2. Header Extraction: the raw `Authorization` value must be present and ASCII.
/// 3. Scheme Parsing: `Token`/`Bearer` followed by exactly one key.
/// 4. DB Lookup: the key must resolve to a profile that is still active.
///
/// Rejection:
/// - no header, or another scheme: `ApiError::NotAuthenticated`
/// - malformed header, unknown key, inactive owner: `ApiError::InvalidToken`
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // 1. Dependency Resolution
        let repo = RepositoryState::from_ref(state);

        // 2. Header Extraction
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(ApiError::NotAuthenticated)?
            .to_str()
            .map_err(|_| ApiError::InvalidToken)?;

        // 3. Scheme Parsing
        let key = parse_authorization(header_value)?;

        // 4. Token Lookup (Final Verification)
        let profile = repo
            .get_token_user(key)
            .await?
            .ok_or(ApiError::InvalidToken)?;

        if !profile.is_active {
            tracing::warn!(user_id = %profile.id, "token presented for inactive profile");
            return Err(ApiError::InvalidToken);
        }

        Ok(AuthUser::from(&profile))
    }
}

/// parse_authorization
///
/// Splits an `Authorization` header into scheme and key. The scheme match is
/// case-insensitive; exactly one non-empty credential must follow it.
pub fn parse_authorization(value: &str) -> Result<&str, ApiError> {
    let mut parts = value.split_whitespace();
    let scheme = parts.next().ok_or(ApiError::NotAuthenticated)?;
    if !scheme.eq_ignore_ascii_case("token") && !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ApiError::NotAuthenticated);
    }
    match (parts.next(), parts.next()) {
        (Some(key), None) => Ok(key),
        _ => Err(ApiError::InvalidToken),
    }
}

/// generate_token_key
///
/// 20 random bytes rendered as 40 lowercase hex characters.
pub fn generate_token_key() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// hash_password
///
/// Runs bcrypt on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))
}

/// verify_password
///
/// A stored hash that bcrypt cannot parse never verifies.
pub async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    let outcome = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("verification task failed: {}", e)))?;

    match outcome {
        Ok(matches) => Ok(matches),
        Err(e) => {
            tracing::warn!("stored password hash is unreadable: {}", e);
            Ok(false)
        }
    }
}
