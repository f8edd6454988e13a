//! # blogd: boot layer for a server-rendered blog
//!
//! `blogd` assembles the site's configuration once at boot, validates the environment it runs in,
//! owns the process-wide PostgreSQL pool and serves the frontend's build output under the site's
//! request policies.
//!
//! ## Boot sequence
//!
//! 1. [`Config::load`] merges `blogd.yaml`, `BLOGD_*` overrides and the `.env` layers, then checks
//!    the declared environment schema ([`env::EnvSchema::blog`]). A missing `DATABASE_URL` or
//!    `REDIS_URL` aborts boot here.
//! 2. [`Application::new`] prunes excluded assets from the build output ([`bundle`]), obtains the
//!    shared pool ([`db::shared_pool`]) and assembles the router.
//! 3. [`Application::serve`] binds `server.host:server.port` and runs until the shutdown future
//!    resolves, then closes the pool.
//!
//! ## HTTP surface
//!
//! | Route      | Purpose                                                      |
//! |------------|--------------------------------------------------------------|
//! | `/healthz` | `SELECT 1` against the pool; 503 when the database is down   |
//! | `/_site`   | Public site settings for the renderer                        |
//! | fallback   | Files from `build.out_dir`                                   |
//!
//! Every route passes through the trailing slash and origin check middleware
//! ([`api::middleware`]).
//!
//! ## Operator commands
//!
//! `prune-bundle` runs [`prune_bundle`] against a build output directory. `send-test-mail` runs
//! [`send_test_mail`] to check the `SMTP_*` settings.

pub mod api;
pub mod bundle;
pub mod config;
pub mod db;
pub mod env;
pub mod errors;
pub mod mailer;
pub mod telemetry;

#[cfg(test)]
pub mod test_utils;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::get,
};
use bon::Builder;
pub use config::Config;
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, instrument};

use crate::{bundle::ExcludeAssets, mailer::Mailer};

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
}

/// Install the process-wide rustls crypto provider. Later calls are no-ops.
pub fn install_crypto_provider() {
    // Err means a provider is already installed
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Remove excluded assets from `build.out_dir` before it is served.
///
/// A missing output directory is not an error here: the server may run without a static build.
pub fn prune_build_output(config: &Config) -> Result<Vec<PathBuf>, errors::Error> {
    let out_dir = &config.build.out_dir;
    if !out_dir.is_dir() {
        debug!(out_dir = %out_dir.display(), "No build output to prune");
        return Ok(Vec::new());
    }

    let removed = ExcludeAssets::new(config.build.exclude_assets.clone()).prune_dir(out_dir)?;
    if !removed.is_empty() {
        info!(count = removed.len(), out_dir = %out_dir.display(), "Removed excluded assets from build output");
    }
    Ok(removed)
}

/// Remove excluded assets from `dir` (default `build.out_dir`) on operator request.
///
/// Unlike [`prune_build_output`], a missing directory is an error: the operator named something
/// that is not there.
pub fn prune_bundle(config: &Config, dir: Option<PathBuf>) -> Result<Vec<PathBuf>, errors::Error> {
    let dir = dir.unwrap_or_else(|| config.build.out_dir.clone());
    let removed = ExcludeAssets::new(config.build.exclude_assets.clone()).prune_dir(&dir)?;
    for path in &removed {
        info!(file = %path.display(), "Removed excluded asset");
    }
    info!(count = removed.len(), dir = %dir.display(), "Bundle pruned");
    Ok(removed)
}

/// Send one message to `to` with the configured SMTP settings.
///
/// With `out_dir` the message is written there as an `.eml` file instead of being sent.
pub async fn send_test_mail(config: &Config, to: &str, out_dir: Option<&Path>) -> Result<(), errors::Error> {
    let smtp = config.smtp.as_ref().ok_or_else(|| errors::Error::InvalidConfig {
        message: "SMTP_HOST must be set to send mail".to_string(),
    })?;

    let mailer = match out_dir {
        Some(dir) => {
            let sender = smtp.sender_address().ok_or_else(|| errors::Error::InvalidConfig {
                message: "SMTP_SENDER or SMTP_USER must be set to send mail".to_string(),
            })?;
            Mailer::to_directory(dir, sender)?
        }
        None => Mailer::new(smtp)?,
    };

    let site_url = config.site_url();
    mailer
        .send(
            to,
            &format!("Test mail from {site_url}"),
            &format!("<p>Mail delivery from <a href=\"{site_url}\">{site_url}</a> works.</p>"),
        )
        .await
}

/// Assemble routes, the static fallback and request policies.
pub fn build_router(state: &AppState) -> Router {
    let router = Router::new()
        .route("/healthz", get(api::handlers::health::healthz))
        .route("/_site", get(api::handlers::site::site_info))
        .fallback(api::handlers::static_assets::serve_build_output)
        .layer(from_fn_with_state(state.clone(), api::middleware::check_origin))
        .layer(from_fn_with_state(state.clone(), api::middleware::trailing_slash))
        .with_state(state.clone());

    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// The booted server: configuration, shared pool and router.
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Boot against the process-wide pool.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting blogd with configuration: {:#?}", config);

        prune_build_output(&config)?;
        let pool = db::shared_pool(&config.database).await?.clone();
        Self::with_pool(config, pool)
    }

    /// Boot against an explicit pool.
    #[instrument(skip_all)]
    pub fn with_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        let state = AppState::builder().db(pool.clone()).config(config.clone()).build();
        let router = build_router(&state);

        Ok(Self { router, config, pool })
    }

    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Serve until `shutdown` resolves, then close the pool.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("blogd listening on http://{}, site is {}", bind_addr, self.config.site_url());

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
