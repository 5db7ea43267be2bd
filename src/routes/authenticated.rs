use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Authenticated Router Module
///
/// Routes that require a valid token. The `auth_middleware` layer applied in
/// `create_router` rejects anonymous requests before they reach a handler; each
/// handler additionally receives the resolved `AuthUser` for its ownership checks.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // PUT/PATCH/DELETE /profile/{id}/
        // Only the profile's owner may modify or delete it.
        .route(
            "/profile/{id}/",
            put(handlers::update_profile)
                .patch(handlers::partial_update_profile)
                .delete(handlers::delete_profile),
        )
        // GET/POST /feed-item/
        // New items are always owned by the caller.
        .route(
            "/feed-item/",
            get(handlers::list_feed_items).post(handlers::create_feed_item),
        )
        // GET/PUT/PATCH/DELETE /feed-item/{id}/
        // Reads are open to any authenticated user; changes only to the owner.
        .route(
            "/feed-item/{id}/",
            get(handlers::retrieve_feed_item)
                .put(handlers::update_feed_item)
                .patch(handlers::partial_update_feed_item)
                .delete(handlers::delete_feed_item),
        )
}
