use crate::{
    AppState,
    auth::{self, AuthUser},
    error::{ApiError, ApiResult, FieldErrors},
    models::{
        CreateProfileRequest, FeedItemRequest, HelloApiViewResponse, HelloRequest,
        HelloViewsetResponse, HttpMethodResponse, LoginRequest, MessageResponse, MethodResponse,
        NewFeedItem, NewUserProfile, PartialFeedItemRequest, ProfileChanges, ProfileFeedItem,
        ProfileSearch, TokenResponse, UpdateProfileRequest, UserProfile, normalize_email,
    },
    payload::Payload,
    permissions,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
};
use serde::Serialize;
use uuid::Uuid;

const AN_APIVIEW: [&str; 4] = [
    "uses HTTP methods as functions (get, post, put, delete)",
    "It is similar to a traditional Django view",
    "Gives you the most control over you logic",
    "Is mapped manually to URLs",
];

const A_VIEWSET: [&str; 3] = [
    "Uses actions (list,create,retrieve, update, partial update)",
    "Automatically maps to URLS using Routers",
    "Provides more functionality with less code",
];

/// ApiRoot
///
/// Index of the resources registered on the router.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ApiRoot {
    #[serde(rename = "hello-viewset")]
    pub hello_viewset: String,
    pub profile: String,
    pub login: String,
    #[serde(rename = "feed-item")]
    pub feed_item: String,
}

// --- Helpers ---

/// Unknown or malformed identifiers are both reported as a missing record.
fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)
}

fn require(value: Option<String>, field: &str) -> ApiResult<String> {
    value.ok_or_else(|| {
        ApiError::Validation(FieldErrors::single(field, "This field is required."))
    })
}

// --- Root ---

/// api_root
///
/// [Public Route] Lists the router-registered resources.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Resource index", body = ApiRoot))
)]
pub async fn api_root() -> Json<ApiRoot> {
    Json(ApiRoot {
        hello_viewset: "/hello-viewset/".to_string(),
        profile: "/profile/".to_string(),
        login: "/login/".to_string(),
        feed_item: "/feed-item/".to_string(),
    })
}

// --- Demo: HelloApiView ---

/// hello_view_get
///
/// [Public Route] Returns a list of APIView features.
#[utoipa::path(
    get,
    path = "/hello-view/",
    responses((status = 200, description = "APIView features", body = HelloApiViewResponse))
)]
pub async fn hello_view_get() -> Json<HelloApiViewResponse> {
    Json(HelloApiViewResponse {
        message: "Hello".to_string(),
        an_apiview: AN_APIVIEW.iter().map(|s| s.to_string()).collect(),
    })
}

/// hello_view_post
///
/// [Public Route] Creates a hello message from `name`.
#[utoipa::path(
    post,
    path = "/hello-view/",
    request_body = HelloRequest,
    responses(
        (status = 200, description = "Greeting", body = MessageResponse),
        (status = 400, description = "Field errors")
    )
)]
pub async fn hello_view_post(payload: Payload<HelloRequest>) -> ApiResult<Json<MessageResponse>> {
    let name = require(payload.validated()?.name, "name")?;
    Ok(Json(MessageResponse::hello(&name)))
}

#[utoipa::path(
    put,
    path = "/hello-view/",
    responses((status = 200, description = "Echo", body = MethodResponse))
)]
pub async fn hello_view_put() -> Json<MethodResponse> {
    Json(MethodResponse {
        method: "put".to_string(),
    })
}

#[utoipa::path(
    patch,
    path = "/hello-view/",
    responses((status = 200, description = "Echo", body = MethodResponse))
)]
pub async fn hello_view_patch() -> Json<MethodResponse> {
    Json(MethodResponse {
        method: "patch".to_string(),
    })
}

#[utoipa::path(
    delete,
    path = "/hello-view/",
    responses((status = 200, description = "Echo", body = MethodResponse))
)]
pub async fn hello_view_delete() -> Json<MethodResponse> {
    Json(MethodResponse {
        method: "delete".to_string(),
    })
}

// --- Demo: HelloViewset ---

/// hello_viewset_list
///
/// [Public Route] Returns a hello message and the list of ViewSet features.
#[utoipa::path(
    get,
    path = "/hello-viewset/",
    responses((status = 200, description = "ViewSet features", body = HelloViewsetResponse))
)]
pub async fn hello_viewset_list() -> Json<HelloViewsetResponse> {
    Json(HelloViewsetResponse {
        message: "Hello".to_string(),
        a_viewset: A_VIEWSET.iter().map(|s| s.to_string()).collect(),
    })
}

/// hello_viewset_create
///
/// [Public Route] Creates a hello message from `name`.
#[utoipa::path(
    post,
    path = "/hello-viewset/",
    request_body = HelloRequest,
    responses(
        (status = 200, description = "Greeting", body = MessageResponse),
        (status = 400, description = "Field errors")
    )
)]
pub async fn hello_viewset_create(
    payload: Payload<HelloRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let name = require(payload.validated()?.name, "name")?;
    Ok(Json(MessageResponse::hello(&name)))
}

fn http_method(verb: &str) -> Json<HttpMethodResponse> {
    Json(HttpMethodResponse {
        http_method: verb.to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/hello-viewset/{id}/",
    params(("id" = String, Path, description = "Any identifier")),
    responses((status = 200, description = "Echo", body = HttpMethodResponse))
)]
pub async fn hello_viewset_retrieve(Path(_id): Path<String>) -> Json<HttpMethodResponse> {
    http_method("get")
}

#[utoipa::path(
    put,
    path = "/hello-viewset/{id}/",
    params(("id" = String, Path, description = "Any identifier")),
    responses((status = 200, description = "Echo", body = HttpMethodResponse))
)]
pub async fn hello_viewset_update(Path(_id): Path<String>) -> Json<HttpMethodResponse> {
    http_method("put")
}

#[utoipa::path(
    patch,
    path = "/hello-viewset/{id}/",
    params(("id" = String, Path, description = "Any identifier")),
    responses((status = 200, description = "Echo", body = HttpMethodResponse))
)]
pub async fn hello_viewset_partial_update(Path(_id): Path<String>) -> Json<HttpMethodResponse> {
    http_method("patch")
}

#[utoipa::path(
    delete,
    path = "/hello-viewset/{id}/",
    params(("id" = String, Path, description = "Any identifier")),
    responses((status = 200, description = "Echo", body = HttpMethodResponse))
)]
pub async fn hello_viewset_destroy(Path(_id): Path<String>) -> Json<HttpMethodResponse> {
    http_method("delete")
}

// --- Auth Gate ---

/// login
///
/// [Public Route] Exchanges `{email, password}` for the profile's token, creating the
/// token on first use. Unknown emails, wrong passwords and inactive profiles are
/// indistinguishable to the caller.
#[utoipa::path(
    post,
    path = "/login/",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Field errors"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Payload<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    // 1. Payload Validation
    let req = payload.validated()?;
    let email = normalize_email(&require(req.email, "email")?);
    let password = require(req.password, "password")?;

    // 2. Credential Check
    // An unknown email still pays for one bcrypt run so response time does not
    // reveal which accounts exist.
    let Some(profile) = state.repo.get_profile_by_email(&email).await? else {
        auth::hash_password(password, state.config.password_hash_cost).await?;
        tracing::info!("login rejected: unknown email");
        return Err(ApiError::InvalidCredentials);
    };

    let verified = auth::verify_password(password, profile.password_hash.clone()).await?;
    if !verified || !profile.is_active {
        tracing::info!(user_id = %profile.id, "login rejected");
        return Err(ApiError::InvalidCredentials);
    }

    // 3. Token Issuance (get-or-create)
    let token = state
        .repo
        .get_or_create_token(profile.id, auth::generate_token_key())
        .await?;
    tracing::info!(user_id = %profile.id, "token issued");

    Ok(Json(TokenResponse { token: token.key }))
}

// --- Profiles ---

/// list_profiles
///
/// [Public Route] Lists profiles, optionally filtered by `?search=` against name and email.
#[utoipa::path(
    get,
    path = "/profile/",
    params(ProfileSearch),
    responses((status = 200, description = "Profiles", body = [UserProfile]))
)]
pub async fn list_profiles(
    State(state): State<AppState>,
    Query(filter): Query<ProfileSearch>,
) -> ApiResult<Json<Vec<UserProfile>>> {
    let search = filter.search.as_deref().map(str::trim);
    Ok(Json(state.repo.list_profiles(search).await?))
}

/// retrieve_profile
///
/// [Public Route] Fetches a single profile.
#[utoipa::path(
    get,
    path = "/profile/{id}/",
    params(("id" = Uuid, Path, description = "Profile ID")),
    responses(
        (status = 200, description = "Found", body = UserProfile),
        (status = 404, description = "Not Found")
    )
)]
pub async fn retrieve_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserProfile>> {
    let id = parse_id(&id)?;
    state
        .repo
        .get_profile(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// create_profile
///
/// [Public Route] Registers a new profile. The password is stored only as a bcrypt hash.
#[utoipa::path(
    post,
    path = "/profile/",
    request_body = CreateProfileRequest,
    responses(
        (status = 201, description = "Created", body = UserProfile),
        (status = 400, description = "Field errors")
    )
)]
pub async fn create_profile(
    State(state): State<AppState>,
    payload: Payload<CreateProfileRequest>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    let req = payload.validated()?;
    let email = normalize_email(&require(req.email, "email")?);
    let name = require(req.name, "name")?.trim().to_string();
    let password = require(req.password, "password")?;

    let password_hash = auth::hash_password(password, state.config.password_hash_cost).await?;
    let profile = state
        .repo
        .create_profile(NewUserProfile {
            email,
            name,
            password_hash,
            is_staff: false,
        })
        .await?;
    tracing::info!(user_id = %profile.id, "profile created");

    Ok((StatusCode::CREATED, Json(profile)))
}

/// Loads a profile and applies `update_own_profile` for `method`.
async fn load_profile_for(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    method: &Method,
) -> ApiResult<UserProfile> {
    let profile = state.repo.get_profile(id).await?.ok_or(ApiError::NotFound)?;
    if !permissions::update_own_profile(user, &profile, method) {
        tracing::warn!(user_id = %user.id, profile_id = %id, %method, "profile change denied");
        return Err(ApiError::Forbidden);
    }
    Ok(profile)
}

async fn apply_profile_update(
    state: &AppState,
    id: Uuid,
    req: UpdateProfileRequest,
    partial: bool,
) -> ApiResult<UserProfile> {
    req.check(partial).map_err(ApiError::Validation)?;

    let password_hash = match req.password {
        Some(password) => {
            Some(auth::hash_password(password, state.config.password_hash_cost).await?)
        }
        None => None,
    };
    let changes = ProfileChanges {
        email: req.email.as_deref().map(normalize_email),
        name: req.name.map(|n| n.trim().to_string()),
        password_hash,
    };

    state
        .repo
        .update_profile(id, changes)
        .await?
        .ok_or(ApiError::NotFound)
}

/// update_profile
///
/// [Authenticated Route] Full update of the caller's own profile; every field is required.
#[utoipa::path(
    put,
    path = "/profile/{id}/",
    params(("id" = Uuid, Path, description = "Profile ID")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 400, description = "Field errors"),
        (status = 401, description = "Not Authenticated"),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_profile(
    user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Payload<UpdateProfileRequest>, ApiError>,
) -> ApiResult<Json<UserProfile>> {
    let id = parse_id(&id)?;
    load_profile_for(&state, &user, id, &method).await?;
    let req = payload?.0;
    Ok(Json(apply_profile_update(&state, id, req, false).await?))
}

/// partial_update_profile
///
/// [Authenticated Route] Updates only the supplied fields of the caller's own profile.
#[utoipa::path(
    patch,
    path = "/profile/{id}/",
    params(("id" = Uuid, Path, description = "Profile ID")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 400, description = "Field errors"),
        (status = 401, description = "Not Authenticated"),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn partial_update_profile(
    user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Payload<UpdateProfileRequest>, ApiError>,
) -> ApiResult<Json<UserProfile>> {
    let id = parse_id(&id)?;
    load_profile_for(&state, &user, id, &method).await?;
    let req = payload?.0;
    Ok(Json(apply_profile_update(&state, id, req, true).await?))
}

/// delete_profile
///
/// [Authenticated Route] Deletes the caller's own profile along with its feed and token.
#[utoipa::path(
    delete,
    path = "/profile/{id}/",
    params(("id" = Uuid, Path, description = "Profile ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Not Authenticated"),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_profile(
    user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    load_profile_for(&state, &user, id, &method).await?;
    if state.repo.delete_profile(id).await? {
        tracing::info!(user_id = %id, "profile deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

// --- Feed ---

/// list_feed_items
///
/// [Authenticated Route] Lists every feed item.
#[utoipa::path(
    get,
    path = "/feed-item/",
    responses(
        (status = 200, description = "Feed", body = [ProfileFeedItem]),
        (status = 401, description = "Not Authenticated")
    )
)]
pub async fn list_feed_items(
    _user: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ProfileFeedItem>>> {
    Ok(Json(state.repo.list_feed_items().await?))
}

/// Loads a feed item and applies `post_own_status` for `method`.
async fn load_feed_item_for(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    method: &Method,
) -> ApiResult<ProfileFeedItem> {
    let item = state.repo.get_feed_item(id).await?.ok_or(ApiError::NotFound)?;
    if !permissions::post_own_status(user, &item, method) {
        tracing::warn!(user_id = %user.id, item_id = %id, %method, "feed item change denied");
        return Err(ApiError::Forbidden);
    }
    Ok(item)
}

/// retrieve_feed_item
///
/// [Authenticated Route] Fetches a single feed item.
#[utoipa::path(
    get,
    path = "/feed-item/{id}/",
    params(("id" = Uuid, Path, description = "Feed item ID")),
    responses(
        (status = 200, description = "Found", body = ProfileFeedItem),
        (status = 404, description = "Not Found")
    )
)]
pub async fn retrieve_feed_item(
    user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProfileFeedItem>> {
    let id = parse_id(&id)?;
    Ok(Json(load_feed_item_for(&state, &user, id, &method).await?))
}

/// create_feed_item
///
/// [Authenticated Route] Posts a status update. The owner is always the caller; a
/// `user_profile` value in the body is ignored.
#[utoipa::path(
    post,
    path = "/feed-item/",
    request_body = FeedItemRequest,
    responses(
        (status = 201, description = "Created", body = ProfileFeedItem),
        (status = 400, description = "Field errors"),
        (status = 401, description = "Not Authenticated")
    )
)]
pub async fn create_feed_item(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Payload<FeedItemRequest>,
) -> ApiResult<(StatusCode, Json<ProfileFeedItem>)> {
    let status_text = require(payload.validated()?.status_text, "status_text")?;
    let item = state
        .repo
        .create_feed_item(NewFeedItem::owned_by(&user, status_text))
        .await?;
    tracing::info!(user_id = %user.id, item_id = %item.id, "feed item created");
    Ok((StatusCode::CREATED, Json(item)))
}

/// update_feed_item
///
/// [Authenticated Route] Replaces the status text of the caller's own feed item.
#[utoipa::path(
    put,
    path = "/feed-item/{id}/",
    params(("id" = Uuid, Path, description = "Feed item ID")),
    request_body = FeedItemRequest,
    responses(
        (status = 200, description = "Updated", body = ProfileFeedItem),
        (status = 400, description = "Field errors"),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_feed_item(
    user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Payload<FeedItemRequest>, ApiError>,
) -> ApiResult<Json<ProfileFeedItem>> {
    let id = parse_id(&id)?;
    load_feed_item_for(&state, &user, id, &method).await?;
    let status_text = require(payload?.validated()?.status_text, "status_text")?;
    state
        .repo
        .update_feed_item(id, status_text.trim().to_string())
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// partial_update_feed_item
///
/// [Authenticated Route] Same as `update_feed_item` but the status text may be omitted.
#[utoipa::path(
    patch,
    path = "/feed-item/{id}/",
    params(("id" = Uuid, Path, description = "Feed item ID")),
    request_body = PartialFeedItemRequest,
    responses(
        (status = 200, description = "Updated", body = ProfileFeedItem),
        (status = 400, description = "Field errors"),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn partial_update_feed_item(
    user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Payload<PartialFeedItemRequest>, ApiError>,
) -> ApiResult<Json<ProfileFeedItem>> {
    let id = parse_id(&id)?;
    let item = load_feed_item_for(&state, &user, id, &method).await?;
    match payload?.validated()?.status_text {
        Some(status_text) => state
            .repo
            .update_feed_item(id, status_text.trim().to_string())
            .await?
            .map(Json)
            .ok_or(ApiError::NotFound),
        None => Ok(Json(item)),
    }
}

/// delete_feed_item
///
/// [Authenticated Route] Deletes the caller's own feed item.
#[utoipa::path(
    delete,
    path = "/feed-item/{id}/",
    params(("id" = Uuid, Path, description = "Feed item ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_feed_item(
    user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    load_feed_item_for(&state, &user, id, &method).await?;
    if state.repo.delete_feed_item(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}
