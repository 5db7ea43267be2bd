use std::env;

use thiserror::Error;

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and
/// pulled into handlers via `FromRef<AppState>`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Postgres connection string. `None` selects the in-memory store (local only).
    pub db_url: Option<String>,
    // Upper bound for the sqlx connection pool.
    pub db_max_connections: u32,
    // Address the HTTP listener binds to.
    pub bind_addr: String,
    // bcrypt work factor used when hashing profile passwords.
    pub password_hash_cost: u32,
    // Runtime environment marker. Controls log format and fail-fast rules.
    pub env: Env,
}

/// Env
///
/// Defines the runtime context: local development (pretty logs, optional database)
/// or production (JSON logs, database mandatory).
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// ConfigError
///
/// Raised by [`AppConfig::load`] when a variable is missing or cannot be parsed.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Lowest bcrypt work factor accepted for `PASSWORD_HASH_COST`.
pub const MIN_HASH_COST: u32 = 4;
/// Highest bcrypt work factor accepted for `PASSWORD_HASH_COST`.
pub const MAX_HASH_COST: u32 = 31;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

impl Default for AppConfig {
    /// default
    ///
    /// A non-panicking configuration used for test state scaffolding: in-memory store
    /// and the cheapest bcrypt cost so hashing does not dominate test time.
    fn default() -> Self {
        Self {
            db_url: None,
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
            bind_addr: "127.0.0.1:0".to_string(),
            password_hash_cost: MIN_HASH_COST,
            env: Env::Local,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables. Production requires
    /// `DATABASE_URL`; local runs fall back to the in-memory store when it is absent.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let db_url = match (env::var("DATABASE_URL").ok(), &env) {
            (Some(url), _) if !url.trim().is_empty() => Some(url),
            (_, Env::Production) => return Err(ConfigError::Missing("DATABASE_URL")),
            (_, Env::Local) => None,
        };

        let db_max_connections = parse_var("DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        if db_max_connections == 0 {
            return Err(ConfigError::Invalid {
                name: "DB_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }

        let password_hash_cost = parse_var("PASSWORD_HASH_COST", bcrypt::DEFAULT_COST)?;
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&password_hash_cost) {
            return Err(ConfigError::Invalid {
                name: "PASSWORD_HASH_COST",
                value: password_hash_cost.to_string(),
            });
        }

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        Ok(Self {
            db_url,
            db_max_connections,
            bind_addr,
            password_hash_cost,
            env,
        })
    }
}

fn parse_var(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}
