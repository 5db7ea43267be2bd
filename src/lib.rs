use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod payload;
pub mod permissions;
pub mod repository;

// Routing segregation (Public, Authenticated).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the OpenAPI
/// document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::api_root,
        handlers::hello_view_get, handlers::hello_view_post, handlers::hello_view_put,
        handlers::hello_view_patch, handlers::hello_view_delete,
        handlers::hello_viewset_list, handlers::hello_viewset_create,
        handlers::hello_viewset_retrieve, handlers::hello_viewset_update,
        handlers::hello_viewset_partial_update, handlers::hello_viewset_destroy,
        handlers::login,
        handlers::list_profiles, handlers::retrieve_profile, handlers::create_profile,
        handlers::update_profile, handlers::partial_update_profile, handlers::delete_profile,
        handlers::list_feed_items, handlers::retrieve_feed_item, handlers::create_feed_item,
        handlers::update_feed_item, handlers::partial_update_feed_item,
        handlers::delete_feed_item
    ),
    components(
        schemas(
            handlers::ApiRoot,
            models::UserProfile, models::ProfileFeedItem,
            models::CreateProfileRequest, models::UpdateProfileRequest,
            models::FeedItemRequest, models::PartialFeedItemRequest,
            models::LoginRequest, models::TokenResponse,
            models::HelloRequest, models::MessageResponse, models::HelloApiViewResponse,
            models::HelloViewsetResponse, models::MethodResponse, models::HttpMethodResponse,
        )
    ),
    tags(
        (name = "profiles-api", description = "User profiles, tokens and status feed")
    )
)]
struct ApiDoc;

/// AppState
///
/// The shared, cheaply clonable container handed to every request.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: Postgres or in-memory behind one trait object.
    pub repo: RepositoryState,
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Guards the authenticated router. Extracting `AuthUser` rejects the request with
/// the appropriate 401 before any handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly (docs, public routes, token-guarded routes)
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    // 3. Observability and Correlation Layers
    // Request id first so the trace span can record it; propagation echoes it back.
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer (outermost)
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span with method, uri and the `x-request-id` header so every
/// log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
