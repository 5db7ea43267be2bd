use profiles_api::{
    auth::AuthUser,
    models::{NewFeedItem, NewUserProfile, ProfileChanges, UserProfile},
    repository::{InMemoryRepository, PostgresRepository, Repository, RepositoryError},
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

/// Holds the database pool for the Postgres-backed runs.
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        DbTestContext { pool }
    }

    async fn repository(&self) -> PostgresRepository {
        let repo = PostgresRepository::new(self.pool.clone());
        repo.migrate()
            .await
            .expect("Failed to run database migrations.");
        repo
    }
}

// --- Test Data Helpers ---

/// Emails are unique per call so runs against a shared database do not collide.
fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, Uuid::new_v4().simple())
}

async fn create_test_profile(repo: &dyn Repository, email: &str, name: &str) -> UserProfile {
    repo.create_profile(NewUserProfile {
        email: email.to_string(),
        name: name.to_string(),
        password_hash: "hash".to_string(),
        is_staff: false,
    })
    .await
    .expect("Failed to create test profile")
}

// --- Shared Contract ---
// Each check runs against both stores; the Postgres runs need DATABASE_URL.

async fn check_profile_crud(repo: &dyn Repository) {
    let email = unique_email("crud");
    let created = create_test_profile(repo, &email, "Crud").await;
    assert_eq!(created.email, email);
    assert!(created.is_active);

    let fetched = repo.get_profile(created.id).await.unwrap().unwrap();
    assert_eq!(fetched, created);
    let by_email = repo.get_profile_by_email(&email).await.unwrap().unwrap();
    assert_eq!(by_email.id, created.id);

    let updated = repo
        .update_profile(
            created.id,
            ProfileChanges {
                name: Some("Renamed".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.email, email);
    assert_eq!(updated.password_hash, "hash");

    assert!(repo.delete_profile(created.id).await.unwrap());
    assert!(repo.get_profile(created.id).await.unwrap().is_none());
    assert!(!repo.delete_profile(created.id).await.unwrap());
    assert!(
        repo.update_profile(created.id, ProfileChanges::default())
            .await
            .unwrap()
            .is_none()
    );
}

async fn check_duplicate_email(repo: &dyn Repository) {
    let email = unique_email("dup");
    let first = create_test_profile(repo, &email, "First").await;

    let err = repo
        .create_profile(NewUserProfile {
            email: email.clone(),
            name: "Second".to_string(),
            password_hash: "hash".to_string(),
            is_staff: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::DuplicateEmail));

    let other = create_test_profile(repo, &unique_email("dup"), "Other").await;
    let err = repo
        .update_profile(
            other.id,
            ProfileChanges {
                email: Some(email),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::DuplicateEmail));

    repo.delete_profile(first.id).await.unwrap();
    repo.delete_profile(other.id).await.unwrap();
}

async fn check_search(repo: &dyn Repository) {
    let marker = Uuid::new_v4().simple().to_string();
    let ada = create_test_profile(repo, &unique_email("ada"), &format!("Ada {}", marker)).await;
    let alan = create_test_profile(repo, &unique_email("alan"), "Alan").await;

    let found = repo
        .list_profiles(Some(&marker.to_uppercase()))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, ada.id);

    // LIKE metacharacters match literally
    assert!(repo.list_profiles(Some("%")).await.unwrap().is_empty());

    let all = repo.list_profiles(None).await.unwrap();
    let ada_pos = all.iter().position(|p| p.id == ada.id).unwrap();
    let alan_pos = all.iter().position(|p| p.id == alan.id).unwrap();
    assert!(ada_pos < alan_pos, "profiles are listed in creation order");

    repo.delete_profile(ada.id).await.unwrap();
    repo.delete_profile(alan.id).await.unwrap();
}

async fn check_feed_items(repo: &dyn Repository) {
    let owner = create_test_profile(repo, &unique_email("feed"), "Feed").await;
    let user = AuthUser::from(&owner);

    let item = repo
        .create_feed_item(NewFeedItem::owned_by(&user, " first ".to_string()))
        .await
        .unwrap();
    assert_eq!(item.user_profile, owner.id);
    assert_eq!(item.status_text, "first");

    let updated = repo
        .update_feed_item(item.id, "second".to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status_text, "second");
    assert_eq!(updated.created_on, item.created_on);

    assert!(
        repo.list_feed_items()
            .await
            .unwrap()
            .iter()
            .any(|i| i.id == item.id)
    );

    // Deleting the owner removes its feed and token
    let token = repo
        .get_or_create_token(owner.id, Uuid::new_v4().simple().to_string())
        .await
        .unwrap();
    assert!(repo.delete_profile(owner.id).await.unwrap());
    assert!(repo.get_feed_item(item.id).await.unwrap().is_none());
    assert!(repo.get_token_user(&token.key).await.unwrap().is_none());
}

async fn check_unknown_owner(repo: &dyn Repository) {
    let ghost = AuthUser {
        id: Uuid::new_v4(),
        email: "ghost@example.com".to_string(),
        is_staff: false,
    };
    let err = repo
        .create_feed_item(NewFeedItem::owned_by(&ghost, "boo".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::UnknownOwner));
}

async fn check_tokens(repo: &dyn Repository) {
    let owner = create_test_profile(repo, &unique_email("token"), "Token").await;
    let first_key = Uuid::new_v4().simple().to_string();
    let second_key = Uuid::new_v4().simple().to_string();

    let first = repo
        .get_or_create_token(owner.id, first_key.clone())
        .await
        .unwrap();
    assert_eq!(first.key, first_key);
    assert_eq!(first.user_id, owner.id);

    // The existing token wins over a new candidate
    let second = repo
        .get_or_create_token(owner.id, second_key.clone())
        .await
        .unwrap();
    assert_eq!(second.key, first_key);

    let resolved = repo.get_token_user(&first_key).await.unwrap().unwrap();
    assert_eq!(resolved.id, owner.id);
    assert!(repo.get_token_user(&second_key).await.unwrap().is_none());

    repo.delete_profile(owner.id).await.unwrap();
}

// --- In-Memory Store ---

#[tokio::test]
async fn test_memory_profile_crud() {
    check_profile_crud(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_duplicate_email() {
    check_duplicate_email(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_search() {
    check_search(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_feed_items() {
    check_feed_items(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_unknown_owner() {
    check_unknown_owner(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_tokens() {
    check_tokens(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_set_active() {
    let repo = InMemoryRepository::new();
    let profile = create_test_profile(&repo, "ada@example.com", "Ada").await;

    assert!(repo.set_active(profile.id, false).await);
    assert!(!repo.get_profile(profile.id).await.unwrap().unwrap().is_active);
    assert!(!repo.set_active(Uuid::new_v4(), false).await);
}

// --- Postgres Store ---

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_profile_crud() {
    let ctx = DbTestContext::setup().await;
    check_profile_crud(&ctx.repository().await).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_duplicate_email() {
    let ctx = DbTestContext::setup().await;
    check_duplicate_email(&ctx.repository().await).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_search() {
    let ctx = DbTestContext::setup().await;
    check_search(&ctx.repository().await).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_feed_items() {
    let ctx = DbTestContext::setup().await;
    check_feed_items(&ctx.repository().await).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_unknown_owner() {
    let ctx = DbTestContext::setup().await;
    check_unknown_owner(&ctx.repository().await).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_tokens() {
    let ctx = DbTestContext::setup().await;
    check_tokens(&ctx.repository().await).await;
}
