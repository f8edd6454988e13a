use axum::{Json, extract::State};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{
    AppState,
    config::{MarkdownConfig, MdxConfig, OutputMode, TrailingSlash},
    env::{EnvValue, Mode},
};

/// Public site settings for the frontend renderer. Contains no secrets.
#[derive(Debug, Serialize)]
pub struct SiteInfo {
    pub mode: Mode,
    pub site_url: String,
    pub assets_prefix: String,
    pub image_domains: Vec<String>,
    pub output: OutputMode,
    pub trailing_slash: TrailingSlash,
    pub session_cookie: String,
    pub dev_toolbar: bool,
    pub markdown: MarkdownConfig,
    pub mdx: MdxConfig,
    /// Client-context public environment values
    pub env: BTreeMap<String, EnvValue>,
}

// GET /_site
pub async fn site_info(State(state): State<AppState>) -> Json<SiteInfo> {
    let config = &state.config;

    Json(SiteInfo {
        mode: config.mode,
        site_url: config.site_url().to_string(),
        assets_prefix: config.assets_prefix(),
        image_domains: config.image_domains(),
        output: config.output,
        trailing_slash: config.site.trailing_slash,
        session_cookie: config.session.cookie.name.clone(),
        dev_toolbar: config.dev_toolbar.enabled,
        markdown: config.markdown.clone(),
        mdx: config.integrations.mdx.clone(),
        env: config.public_env.clone(),
    })
}
