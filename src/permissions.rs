//! Ownership rules for profile and feed mutations.
//!
//! Both predicates are pure: the answer depends only on the authenticated identity,
//! the target record and the HTTP verb.

use axum::http::Method;

use crate::{
    auth::AuthUser,
    models::{ProfileFeedItem, UserProfile},
};

/// GET, HEAD and OPTIONS never modify a record and are always allowed.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// update_own_profile
///
/// A profile may only be modified or deleted by the identity it belongs to.
pub fn update_own_profile(user: &AuthUser, profile: &UserProfile, method: &Method) -> bool {
    is_safe_method(method) || profile.id == user.id
}

/// post_own_status
///
/// A feed item may only be modified or deleted by its owning profile.
pub fn post_own_status(user: &AuthUser, item: &ProfileFeedItem, method: &Method) -> bool {
    is_safe_method(method) || item.user_profile == user.id
}
