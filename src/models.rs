use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::auth::AuthUser;

const REQUIRED: &str = "This field is required.";

// --- Core Application Schemas (Mapped to Database) ---

/// UserProfile
///
/// The identity record stored in the `user_profiles` table. The email is the login
/// identifier and is unique. Only `id`, `email` and `name` are ever serialized.
#[derive(Debug, Clone, Serialize, TS, ToSchema, FromRow, PartialEq)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,

    #[serde(skip_serializing)]
    #[ts(skip)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    #[ts(skip)]
    pub is_active: bool,
    #[serde(skip_serializing)]
    #[ts(skip)]
    pub is_staff: bool,
}

/// ProfileFeedItem
///
/// A status update from the `profile_feed_items` table. `user_profile` is the owning
/// profile and is always the identity that created the item.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[ts(export)]
pub struct ProfileFeedItem {
    pub id: Uuid,
    pub user_profile: Uuid,
    pub status_text: String,
    #[ts(type = "string")]
    pub created_on: DateTime<Utc>,
}

/// AuthToken
///
/// Opaque login credential, one per profile, from the `auth_tokens` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct AuthToken {
    pub key: String,
    pub user_id: Uuid,
    pub created: DateTime<Utc>,
}

// --- Store Inputs ---

/// NewUserProfile
///
/// A fully validated profile ready for insertion. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUserProfile {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub is_staff: bool,
}

/// ProfileChanges
///
/// Column updates for an existing profile; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password_hash: Option<String>,
}

/// NewFeedItem
///
/// Insert payload for a feed item. Can only be built through [`NewFeedItem::owned_by`],
/// so the owner always comes from the authenticated identity.
#[derive(Debug, Clone)]
pub struct NewFeedItem {
    user_profile: Uuid,
    status_text: String,
}

impl NewFeedItem {
    /// Binds `status_text` to the requester. Any owner the client put in the body was
    /// never deserialized, so the authenticated identity is the only source.
    pub fn owned_by(owner: &AuthUser, status_text: String) -> Self {
        Self {
            user_profile: owner.id,
            status_text: status_text.trim().to_string(),
        }
    }

    pub fn user_profile(&self) -> Uuid {
        self.user_profile
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }
}

// --- Request Payloads (Input Schemas) ---

/// CreateProfileRequest
///
/// Registration payload (POST /profile/). Every field is required.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateProfileRequest {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "This field is required."),
        email(message = "Enter a valid email address."),
        length(max = 255, message = "Ensure this field has no more than 255 characters.")
    )]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "This field is required."),
        custom(function = "not_blank"),
        length(max = 255, message = "Ensure this field has no more than 255 characters.")
    )]
    pub name: Option<String>,
    #[validate(required(message = "This field is required."), custom(function = "not_blank"))]
    pub password: Option<String>,
}

/// UpdateProfileRequest
///
/// Body for PUT (all fields required) and PATCH (any subset) on /profile/{id}/.
/// Which rule applies is decided by [`UpdateProfileRequest::check`].
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(
        default,
        deserialize_with = "trimmed",
        skip_serializing_if = "Option::is_none"
    )]
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 255, message = "Ensure this field has no more than 255 characters.")
    )]
    pub email: Option<String>,
    #[serde(
        default,
        deserialize_with = "trimmed",
        skip_serializing_if = "Option::is_none"
    )]
    #[validate(
        custom(function = "not_blank"),
        length(max = 255, message = "Ensure this field has no more than 255 characters.")
    )]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "not_blank"))]
    pub password: Option<String>,
}

impl UpdateProfileRequest {
    /// Runs field validation; for a full update also demands every field.
    pub fn check(&self, partial: bool) -> Result<(), crate::error::FieldErrors> {
        let mut errors = match self.validate() {
            Ok(()) => crate::error::FieldErrors::default(),
            Err(e) => e.into(),
        };
        if !partial {
            for (field, present) in [
                ("email", self.email.is_some()),
                ("name", self.name.is_some()),
                ("password", self.password.is_some()),
            ] {
                if !present {
                    errors
                        .0
                        .entry(field.to_string())
                        .or_default()
                        .push(REQUIRED.to_string());
                }
            }
        }
        if errors.0.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// FeedItemRequest
///
/// Body for creating or fully updating a feed item. There is no
/// `user_profile` field: the owner is never taken from the payload.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
pub struct FeedItemRequest {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "This field is required."),
        custom(function = "not_blank"),
        length(max = 255, message = "Ensure this field has no more than 255 characters.")
    )]
    pub status_text: Option<String>,
}

/// PartialFeedItemRequest
///
/// Body for PATCH /feed-item/{id}/.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
pub struct PartialFeedItemRequest {
    #[serde(
        default,
        deserialize_with = "trimmed",
        skip_serializing_if = "Option::is_none"
    )]
    #[validate(
        custom(function = "not_blank"),
        length(max = 255, message = "Ensure this field has no more than 255 characters.")
    )]
    pub status_text: Option<String>,
}

/// LoginRequest
///
/// Credential exchange payload (POST /login/). `username` is accepted as an alias.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[serde(alias = "username", default, deserialize_with = "trimmed")]
    #[validate(required(message = "This field is required."), custom(function = "not_blank"))]
    pub email: Option<String>,
    #[validate(required(message = "This field is required."), custom(function = "not_blank"))]
    pub password: Option<String>,
}

/// TokenResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

/// ProfileSearch
///
/// Query parameters for GET /profile/.
#[derive(Debug, Clone, Deserialize, Default, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProfileSearch {
    /// Case-insensitive substring matched against name and email.
    pub search: Option<String>,
}

// --- Demo Payloads ---

/// HelloRequest
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
pub struct HelloRequest {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "This field is required."),
        custom(function = "not_blank"),
        length(max = 10, message = "Ensure this field has no more than 10 characters.")
    )]
    pub name: Option<String>,
}

/// MessageResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn hello(name: &str) -> Self {
        Self {
            message: format!("Hello {}", name),
        }
    }
}

/// HelloApiViewResponse
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HelloApiViewResponse {
    pub message: String,
    pub an_apiview: Vec<String>,
}

/// HelloViewsetResponse
///
/// Keys are capitalised and spaced on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HelloViewsetResponse {
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "A Viewset")]
    pub a_viewset: Vec<String>,
}

/// MethodResponse
///
/// Echo of the verb used on /hello-view/.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MethodResponse {
    pub method: String,
}

/// HttpMethodResponse
///
/// Echo of the verb used on /hello-viewset/{id}/.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HttpMethodResponse {
    pub http_method: String,
}

// --- Helpers ---

/// not_blank
///
/// Rejects strings that are empty once surrounding whitespace is removed.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some(Cow::Borrowed("This field may not be blank."));
        return Err(error);
    }
    Ok(())
}

/// trimmed
///
/// Deserializes an optional string with surrounding whitespace removed, so length and
/// format rules see the value that will be stored or echoed. Passwords keep their
/// whitespace and never go through this.
fn trimmed<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.map(|s| s.trim().to_string()))
}

/// normalize_email
///
/// Lower-cases the domain part and trims whitespace; the local part is kept as typed.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}
