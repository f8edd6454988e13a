//! Database connection pool.
//!
//! The server keeps exactly one PostgreSQL pool per process. [`shared_pool`] builds it on first use
//! from [`DatabaseConfig`] and hands out the same `&'static PgPool` afterwards; [`crate::Application`]
//! fetches it once at boot and threads a clone through [`crate::AppState`].
//!
//! ```text
//! Application::new ──> shared_pool ──> SHARED_POOL (PoolSlot) ──> connect
//!        │
//!        └──> AppState { db: PgPool } ──> handlers
//! ```
//!
//! When [`DatabaseConfig::schema`] is set, every new connection runs `SET search_path` so queries
//! resolve against that schema.

mod errors;
mod slot;

pub use errors::DbError;
pub use slot::PoolSlot;

use sqlx::{
    Executor, PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use std::{str::FromStr, time::Duration};
use tracing::{debug, info, instrument};

use crate::config::{DatabaseConfig, PoolSettings};

static SHARED_POOL: PoolSlot<PgPool> = PoolSlot::new();

/// Pool options from the configured sizes and timeouts. A timeout of 0 disables it.
pub fn pool_options(settings: &PoolSettings) -> PgPoolOptions {
    let optional = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));

    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(optional(settings.idle_timeout_secs))
        .max_lifetime(optional(settings.max_lifetime_secs))
}

fn search_path_statement(schema: &str) -> String {
    format!("SET search_path = \"{}\"", schema.replace('"', "\"\""))
}

/// Build a new pool.
///
/// # Errors
///
/// [`DbError::InvalidUrl`] if the connection string does not parse, [`DbError::Connect`] if the
/// database cannot be reached. Lazy pools (`pool.lazy`) never connect here.
#[instrument(skip_all, fields(lazy = config.pool.lazy, schema = config.schema.as_deref()))]
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DbError> {
    let connect_options = PgConnectOptions::from_str(&config.url).map_err(DbError::InvalidUrl)?;
    let mut options = pool_options(&config.pool);

    if let Some(schema) = &config.schema {
        let statement = search_path_statement(schema);
        options = options.after_connect(move |conn, _meta| {
            let statement = statement.clone();
            Box::pin(async move {
                conn.execute(statement.as_str()).await?;
                Ok(())
            })
        });
    }

    if config.pool.lazy {
        debug!("Creating lazy database pool");
        return Ok(options.connect_lazy_with(connect_options));
    }

    let pool = options.connect_with(connect_options).await.map_err(DbError::Connect)?;
    info!(max_connections = config.pool.max_connections, "Database pool connected");
    Ok(pool)
}

/// The process-wide pool, built from `config` by the first caller.
///
/// Later calls return the same pool and ignore their `config`. If construction fails, nothing is
/// cached and the error is returned.
pub async fn shared_pool(config: &DatabaseConfig) -> Result<&'static PgPool, DbError> {
    SHARED_POOL.get_or_try_init(|| connect(config)).await
}

/// Check connectivity with `SELECT 1`.
pub async fn ping(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query("SELECT 1").execute(pool).await.map_err(DbError::Unavailable)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_config;

    fn unreachable_config() -> DatabaseConfig {
        create_test_config().database
    }

    #[test]
    fn test_pool_options_follow_settings() {
        let settings = PoolSettings {
            max_connections: 7,
            min_connections: 2,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 0,
            max_lifetime_secs: 60,
            lazy: false,
        };

        let options = pool_options(&settings);

        assert_eq!(options.get_max_connections(), 7);
        assert_eq!(options.get_min_connections(), 2);
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(5));
        assert_eq!(options.get_idle_timeout(), None);
        assert_eq!(options.get_max_lifetime(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_search_path_statement_quotes_schema() {
        assert_eq!(search_path_statement("blog"), "SET search_path = \"blog\"");
        assert_eq!(search_path_statement("a\"b"), "SET search_path = \"a\"\"b\"");
    }

    #[tokio::test]
    async fn test_malformed_url_is_rejected() {
        let mut config = unreachable_config();
        config.url = "not a connection string".to_string();

        let err = connect(&config).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidUrl(_)), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn test_eager_connect_to_unreachable_database_fails() {
        let mut config = unreachable_config();
        config.pool.lazy = false;

        let err = connect(&config).await.unwrap_err();
        assert!(matches!(err, DbError::Connect(_)), "unexpected error: {err:?}");
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_lazy_pool_defers_connection() {
        let config = unreachable_config();

        let pool = connect(&config).await.unwrap();
        assert_eq!(pool.size(), 0);

        let err = ping(&pool).await.unwrap_err();
        assert!(matches!(err, DbError::Unavailable(_)), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn test_shared_pool_is_a_singleton() {
        let config = unreachable_config();

        let first = shared_pool(&config).await.unwrap();
        let second = shared_pool(&config).await.unwrap();

        assert!(std::ptr::eq(first, second));
        assert!(SHARED_POOL.is_initialized());
    }
}
