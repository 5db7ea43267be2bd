use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token: the resource index, the demo views,
/// registration, profile reads and the credential exchange.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Index of the registered resources.
        .route("/", get(handlers::api_root))
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // /hello-view/
        // Demo APIView: every verb is mapped by hand.
        .route(
            "/hello-view/",
            get(handlers::hello_view_get)
                .post(handlers::hello_view_post)
                .put(handlers::hello_view_put)
                .patch(handlers::hello_view_patch)
                .delete(handlers::hello_view_delete),
        )
        // /hello-viewset/ and /hello-viewset/{id}/
        // Demo ViewSet: list/create on the collection, the rest on an item.
        .route(
            "/hello-viewset/",
            get(handlers::hello_viewset_list).post(handlers::hello_viewset_create),
        )
        .route(
            "/hello-viewset/{id}/",
            get(handlers::hello_viewset_retrieve)
                .put(handlers::hello_viewset_update)
                .patch(handlers::hello_viewset_partial_update)
                .delete(handlers::hello_viewset_destroy),
        )
        // GET /profile/?search=...  POST /profile/
        // Profile listing (with search) and registration.
        .route(
            "/profile/",
            get(handlers::list_profiles).post(handlers::create_profile),
        )
        // GET /profile/{id}/
        .route("/profile/{id}/", get(handlers::retrieve_profile))
        // POST /login/
        // Exchanges credentials for the profile's token.
        .route("/login/", post(handlers::login))
}
