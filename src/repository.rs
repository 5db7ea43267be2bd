use crate::models::{
    AuthToken, NewFeedItem, NewUserProfile, ProfileChanges, ProfileFeedItem, UserProfile,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// RepositoryError
///
/// Failures the store reports to the handlers. Constraint violations are split out
/// so they can be surfaced as field errors rather than server errors.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("a profile with this email already exists")]
    DuplicateEmail,
    #[error("the owning profile does not exist")]
    UnknownOwner,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The persistence contract shared by the Postgres store and the in-memory store.
/// `Send + Sync + async_trait` make `Arc<dyn Repository>` usable from axum handlers.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Profiles ---
    // Ordered by creation. `search` is a case-insensitive substring of name or email.
    async fn list_profiles(&self, search: Option<&str>) -> RepoResult<Vec<UserProfile>>;
    async fn get_profile(&self, id: Uuid) -> RepoResult<Option<UserProfile>>;
    async fn get_profile_by_email(&self, email: &str) -> RepoResult<Option<UserProfile>>;
    async fn create_profile(&self, profile: NewUserProfile) -> RepoResult<UserProfile>;
    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> RepoResult<Option<UserProfile>>;
    // Removes the profile together with its feed items and token.
    async fn delete_profile(&self, id: Uuid) -> RepoResult<bool>;

    // --- Feed ---
    async fn list_feed_items(&self) -> RepoResult<Vec<ProfileFeedItem>>;
    async fn get_feed_item(&self, id: Uuid) -> RepoResult<Option<ProfileFeedItem>>;
    async fn create_feed_item(&self, item: NewFeedItem) -> RepoResult<ProfileFeedItem>;
    async fn update_feed_item(
        &self,
        id: Uuid,
        status_text: String,
    ) -> RepoResult<Option<ProfileFeedItem>>;
    async fn delete_feed_item(&self, id: Uuid) -> RepoResult<bool>;

    // --- Tokens ---
    // Returns the existing token for `user_id`, or stores `candidate_key` as its token.
    async fn get_or_create_token(&self, user_id: Uuid, candidate_key: String)
    -> RepoResult<AuthToken>;
    async fn get_token_user(&self, key: &str) -> RepoResult<Option<UserProfile>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// like_pattern
///
/// Wraps `term` in `%` wildcards after escaping the LIKE metacharacters it contains.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn map_constraint(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return RepositoryError::DuplicateEmail;
        }
        if db.is_foreign_key_violation() {
            return RepositoryError::UnknownOwner;
        }
    }
    RepositoryError::Database(e)
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

const PROFILE_COLUMNS: &str = "id, email, name, password_hash, is_active, is_staff";
const FEED_COLUMNS: &str = "id, user_profile, status_text, created_on";

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations in `./migrations`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_profiles(&self, search: Option<&str>) -> RepoResult<Vec<UserProfile>> {
        let profiles = match search.filter(|s| !s.is_empty()) {
            Some(term) => {
                sqlx::query_as::<_, UserProfile>(&format!(
                    "SELECT {PROFILE_COLUMNS} FROM user_profiles \
                     WHERE name ILIKE $1 OR email ILIKE $1 ORDER BY created_at, id"
                ))
                .bind(like_pattern(term))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, UserProfile>(&format!(
                    "SELECT {PROFILE_COLUMNS} FROM user_profiles ORDER BY created_at, id"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(profiles)
    }

    async fn get_profile(&self, id: Uuid) -> RepoResult<Option<UserProfile>> {
        let profile = sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn get_profile_by_email(&self, email: &str) -> RepoResult<Option<UserProfile>> {
        let profile = sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn create_profile(&self, profile: NewUserProfile) -> RepoResult<UserProfile> {
        sqlx::query_as::<_, UserProfile>(&format!(
            "INSERT INTO user_profiles (id, email, name, password_hash, is_active, is_staff, created_at) \
             VALUES ($1, $2, $3, $4, true, $5, NOW()) RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(profile.email)
        .bind(profile.name)
        .bind(profile.password_hash)
        .bind(profile.is_staff)
        .fetch_one(&self.pool)
        .await
        .map_err(map_constraint)
    }

    /// update_profile
    ///
    /// `COALESCE` keeps every column whose change is `None`.
    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> RepoResult<Option<UserProfile>> {
        sqlx::query_as::<_, UserProfile>(&format!(
            "UPDATE user_profiles \
             SET email = COALESCE($2, email), \
                 name = COALESCE($3, name), \
                 password_hash = COALESCE($4, password_hash) \
             WHERE id = $1 RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.email)
        .bind(changes.name)
        .bind(changes.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_constraint)
    }

    async fn delete_profile(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM user_profiles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_feed_items(&self) -> RepoResult<Vec<ProfileFeedItem>> {
        let items = sqlx::query_as::<_, ProfileFeedItem>(&format!(
            "SELECT {FEED_COLUMNS} FROM profile_feed_items ORDER BY created_on, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn get_feed_item(&self, id: Uuid) -> RepoResult<Option<ProfileFeedItem>> {
        let item = sqlx::query_as::<_, ProfileFeedItem>(&format!(
            "SELECT {FEED_COLUMNS} FROM profile_feed_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn create_feed_item(&self, item: NewFeedItem) -> RepoResult<ProfileFeedItem> {
        sqlx::query_as::<_, ProfileFeedItem>(&format!(
            "INSERT INTO profile_feed_items (id, user_profile, status_text, created_on) \
             VALUES ($1, $2, $3, NOW()) RETURNING {FEED_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(item.user_profile())
        .bind(item.status_text())
        .fetch_one(&self.pool)
        .await
        .map_err(map_constraint)
    }

    async fn update_feed_item(
        &self,
        id: Uuid,
        status_text: String,
    ) -> RepoResult<Option<ProfileFeedItem>> {
        let item = sqlx::query_as::<_, ProfileFeedItem>(&format!(
            "UPDATE profile_feed_items SET status_text = $2 WHERE id = $1 RETURNING {FEED_COLUMNS}"
        ))
        .bind(id)
        .bind(status_text)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn delete_feed_item(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM profile_feed_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// get_or_create_token
    ///
    /// `ON CONFLICT (user_id) DO NOTHING` keeps the first key issued for a profile, so
    /// concurrent logins converge on a single token.
    async fn get_or_create_token(
        &self,
        user_id: Uuid,
        candidate_key: String,
    ) -> RepoResult<AuthToken> {
        sqlx::query(
            "INSERT INTO auth_tokens (key, user_id, created) VALUES ($1, $2, NOW()) \
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(candidate_key)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(map_constraint)?;

        let token = sqlx::query_as::<_, AuthToken>(
            "SELECT key, user_id, created FROM auth_tokens WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(token)
    }

    async fn get_token_user(&self, key: &str) -> RepoResult<Option<UserProfile>> {
        let profile = sqlx::query_as::<_, UserProfile>(
            "SELECT p.id, p.email, p.name, p.password_hash, p.is_active, p.is_staff \
             FROM auth_tokens t JOIN user_profiles p ON t.user_id = p.id \
             WHERE t.key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }
}

/// InMemoryRepository
///
/// Process-local store used for local development without a database and in tests.
/// Insertion order is preserved so listings match the Postgres ordering.
#[derive(Default)]
pub struct InMemoryRepository {
    inner: RwLock<MemoryTables>,
}

#[derive(Default)]
struct MemoryTables {
    profiles: Vec<UserProfile>,
    feed_items: Vec<ProfileFeedItem>,
    // token key -> token
    tokens: HashMap<String, AuthToken>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the active flag of a profile; used to model deactivated accounts.
    pub async fn set_active(&self, id: Uuid, is_active: bool) -> bool {
        let mut tables = self.inner.write().await;
        match tables.profiles.iter_mut().find(|p| p.id == id) {
            Some(profile) => {
                profile.is_active = is_active;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_profiles(&self, search: Option<&str>) -> RepoResult<Vec<UserProfile>> {
        let tables = self.inner.read().await;
        let needle = search.filter(|s| !s.is_empty()).map(str::to_lowercase);
        Ok(tables
            .profiles
            .iter()
            .filter(|p| match &needle {
                Some(n) => p.name.to_lowercase().contains(n) || p.email.to_lowercase().contains(n),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn get_profile(&self, id: Uuid) -> RepoResult<Option<UserProfile>> {
        let tables = self.inner.read().await;
        Ok(tables.profiles.iter().find(|p| p.id == id).cloned())
    }

    async fn get_profile_by_email(&self, email: &str) -> RepoResult<Option<UserProfile>> {
        let tables = self.inner.read().await;
        Ok(tables.profiles.iter().find(|p| p.email == email).cloned())
    }

    async fn create_profile(&self, profile: NewUserProfile) -> RepoResult<UserProfile> {
        let mut tables = self.inner.write().await;
        if tables.profiles.iter().any(|p| p.email == profile.email) {
            return Err(RepositoryError::DuplicateEmail);
        }
        let created = UserProfile {
            id: Uuid::new_v4(),
            email: profile.email,
            name: profile.name,
            password_hash: profile.password_hash,
            is_active: true,
            is_staff: profile.is_staff,
        };
        tables.profiles.push(created.clone());
        Ok(created)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> RepoResult<Option<UserProfile>> {
        let mut tables = self.inner.write().await;
        if let Some(email) = &changes.email {
            if tables.profiles.iter().any(|p| p.id != id && &p.email == email) {
                return Err(RepositoryError::DuplicateEmail);
            }
        }
        let Some(profile) = tables.profiles.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(email) = changes.email {
            profile.email = email;
        }
        if let Some(name) = changes.name {
            profile.name = name;
        }
        if let Some(password_hash) = changes.password_hash {
            profile.password_hash = password_hash;
        }
        Ok(Some(profile.clone()))
    }

    async fn delete_profile(&self, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.inner.write().await;
        let before = tables.profiles.len();
        tables.profiles.retain(|p| p.id != id);
        if tables.profiles.len() == before {
            return Ok(false);
        }
        tables.feed_items.retain(|item| item.user_profile != id);
        tables.tokens.retain(|_, token| token.user_id != id);
        Ok(true)
    }

    async fn list_feed_items(&self) -> RepoResult<Vec<ProfileFeedItem>> {
        let tables = self.inner.read().await;
        Ok(tables.feed_items.clone())
    }

    async fn get_feed_item(&self, id: Uuid) -> RepoResult<Option<ProfileFeedItem>> {
        let tables = self.inner.read().await;
        Ok(tables.feed_items.iter().find(|i| i.id == id).cloned())
    }

    async fn create_feed_item(&self, item: NewFeedItem) -> RepoResult<ProfileFeedItem> {
        let mut tables = self.inner.write().await;
        if !tables.profiles.iter().any(|p| p.id == item.user_profile()) {
            return Err(RepositoryError::UnknownOwner);
        }
        let created = ProfileFeedItem {
            id: Uuid::new_v4(),
            user_profile: item.user_profile(),
            status_text: item.status_text().to_string(),
            created_on: Utc::now(),
        };
        tables.feed_items.push(created.clone());
        Ok(created)
    }

    async fn update_feed_item(
        &self,
        id: Uuid,
        status_text: String,
    ) -> RepoResult<Option<ProfileFeedItem>> {
        let mut tables = self.inner.write().await;
        Ok(tables
            .feed_items
            .iter_mut()
            .find(|i| i.id == id)
            .map(|item| {
                item.status_text = status_text;
                item.clone()
            }))
    }

    async fn delete_feed_item(&self, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.inner.write().await;
        let before = tables.feed_items.len();
        tables.feed_items.retain(|i| i.id != id);
        Ok(tables.feed_items.len() < before)
    }

    async fn get_or_create_token(
        &self,
        user_id: Uuid,
        candidate_key: String,
    ) -> RepoResult<AuthToken> {
        let mut tables = self.inner.write().await;
        if !tables.profiles.iter().any(|p| p.id == user_id) {
            return Err(RepositoryError::UnknownOwner);
        }
        if let Some(existing) = tables.tokens.values().find(|t| t.user_id == user_id) {
            return Ok(existing.clone());
        }
        let token = AuthToken {
            key: candidate_key,
            user_id,
            created: Utc::now(),
        };
        tables.tokens.insert(token.key.clone(), token.clone());
        Ok(token)
    }

    async fn get_token_user(&self, key: &str) -> RepoResult<Option<UserProfile>> {
        let tables = self.inner.read().await;
        Ok(tables
            .tokens
            .get(key)
            .and_then(|token| tables.profiles.iter().find(|p| p.id == token.user_id))
            .cloned())
    }
}
