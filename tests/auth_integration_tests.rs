use axum::{
    extract::FromRequestParts,
    http::{Request, StatusCode, header, request::Parts},
    response::IntoResponse,
};
use profiles_api::{
    ApiError, AppConfig, AppState, InMemoryRepository,
    auth::AuthUser,
    models::{NewUserProfile, UserProfile},
    repository::Repository,
};
use std::sync::Arc;

// --- Helper Functions ---

struct Fixture {
    repo: Arc<InMemoryRepository>,
    state: AppState,
}

fn fixture() -> Fixture {
    let repo = Arc::new(InMemoryRepository::new());
    let state = AppState {
        repo: repo.clone(),
        config: AppConfig::default(),
    };
    Fixture { repo, state }
}

async fn seed_profile(repo: &InMemoryRepository, email: &str) -> UserProfile {
    repo.create_profile(NewUserProfile {
        email: email.to_string(),
        name: "Ada".to_string(),
        password_hash: "unused".to_string(),
        is_staff: false,
    })
    .await
    .unwrap()
}

fn parts_with_authorization(value: Option<&str>) -> Parts {
    let mut builder = Request::builder().uri("/feed-item/");
    if let Some(value) = value {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(()).unwrap().into_parts().0
}

async fn extract(state: &AppState, authorization: Option<&str>) -> Result<AuthUser, ApiError> {
    let mut parts = parts_with_authorization(authorization);
    AuthUser::from_request_parts(&mut parts, state).await
}

// --- Tests ---

#[tokio::test]
async fn test_auth_valid_token_resolves_identity() {
    let fx = fixture();
    let profile = seed_profile(&fx.repo, "ada@example.com").await;
    let token = fx
        .repo
        .get_or_create_token(profile.id, "a".repeat(40))
        .await
        .unwrap();

    let user = extract(&fx.state, Some(&format!("Token {}", token.key)))
        .await
        .expect("valid token should authenticate");

    assert_eq!(user.id, profile.id);
    assert_eq!(user.email, "ada@example.com");
    assert!(!user.is_staff);
}

#[tokio::test]
async fn test_auth_bearer_scheme_is_accepted() {
    let fx = fixture();
    let profile = seed_profile(&fx.repo, "ada@example.com").await;
    let token = fx
        .repo
        .get_or_create_token(profile.id, "b".repeat(40))
        .await
        .unwrap();

    let user = extract(&fx.state, Some(&format!("Bearer {}", token.key)))
        .await
        .unwrap();
    assert_eq!(user.id, profile.id);
}

#[tokio::test]
async fn test_auth_missing_header_is_not_authenticated() {
    let fx = fixture();

    let err = extract(&fx.state, None).await.unwrap_err();
    assert!(matches!(err, ApiError::NotAuthenticated));

    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Token"
    );
}

#[tokio::test]
async fn test_auth_other_scheme_is_not_authenticated() {
    let fx = fixture();
    let err = extract(&fx.state, Some("Basic dXNlcjpwYXNz"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotAuthenticated));
}

#[tokio::test]
async fn test_auth_unknown_token_is_invalid() {
    let fx = fixture();
    seed_profile(&fx.repo, "ada@example.com").await;

    let err = extract(&fx.state, Some("Token does-not-exist"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidToken));
    assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_malformed_header_is_invalid() {
    let fx = fixture();
    let err = extract(&fx.state, Some("Token")).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidToken));

    let err = extract(&fx.state, Some("Token one two")).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidToken));
}

#[tokio::test]
async fn test_auth_inactive_profile_is_rejected() {
    let fx = fixture();
    let profile = seed_profile(&fx.repo, "ada@example.com").await;
    let token = fx
        .repo
        .get_or_create_token(profile.id, "c".repeat(40))
        .await
        .unwrap();
    assert!(fx.repo.set_active(profile.id, false).await);

    let err = extract(&fx.state, Some(&format!("Token {}", token.key)))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidToken));
}

#[tokio::test]
async fn test_auth_token_dies_with_its_profile() {
    let fx = fixture();
    let profile = seed_profile(&fx.repo, "ada@example.com").await;
    let token = fx
        .repo
        .get_or_create_token(profile.id, "d".repeat(40))
        .await
        .unwrap();
    assert!(fx.repo.delete_profile(profile.id).await.unwrap());

    let err = extract(&fx.state, Some(&format!("Token {}", token.key)))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidToken));
}
