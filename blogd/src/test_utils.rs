//! Shared fixtures for unit tests.

use axum_test::TestServer;
use sqlx::{
    PgPool,
    postgres::PgConnectOptions,
};
use std::str::FromStr;
use tempfile::TempDir;
use url::Url;

use crate::{Application, Config, db};

/// Nothing listens on port 1, so every connection attempt is refused.
pub const UNREACHABLE_DATABASE_URL: &str = "postgres://blogd@127.0.0.1:1/blogd";

/// Never created, so tests that do not write build output touch no disk.
pub const ABSENT_OUT_DIR: &str = "/nonexistent/blogd-test/dist";

/// Default configuration with a lazy pool to an unreachable database and a build output directory
/// that does not exist.
pub fn create_test_config() -> Config {
    let mut config = Config::default();

    config.database.url = UNREACHABLE_DATABASE_URL.to_string();
    config.database.pool.lazy = true;
    config.database.pool.acquire_timeout_secs = 1;
    config.session.url = Some(Url::parse("redis://127.0.0.1:1").unwrap());
    config.build.out_dir = ABSENT_OUT_DIR.into();

    config
}

/// [`create_test_config`] with `out_dir` under a temp dir. The directory is removed when the
/// returned guard drops, so keep it alive for the whole test.
pub fn create_test_site() -> (Config, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut config = create_test_config();
    config.build.out_dir = dir.path().join("dist");
    (config, dir)
}

/// A fresh lazy pool, separate from the process-wide one.
pub fn test_pool() -> PgPool {
    let config = create_test_config();
    let options = PgConnectOptions::from_str(&config.database.url).unwrap();
    db::pool_options(&config.database.pool).connect_lazy_with(options)
}

pub async fn test_server_with(config: Config) -> TestServer {
    Application::with_pool(config, test_pool())
        .expect("Failed to build application")
        .into_test_server()
}

pub async fn test_server() -> TestServer {
    test_server_with(create_test_config()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_output_dir_is_cleaned_up() {
        let (config, guard) = create_test_site();
        std::fs::create_dir_all(&config.build.out_dir).unwrap();
        let root = guard.path().to_path_buf();

        drop(guard);

        assert!(!root.exists());
        assert!(!create_test_config().build.out_dir.exists());
    }
}
