//! Serving the frontend build output from `build.out_dir`.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, Uri, header},
    response::{IntoResponse, Response},
};
use std::path::{Component, Path};
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::{debug, instrument};

use crate::AppState;

const IMMUTABLE: &str = "public, max-age=31536000, immutable";

/// Fallback handler: files from the build output, with `dir/index.html` standing in for `dir`.
///
/// Hashed assets under `build.assets_dir` are cached indefinitely; everything else must be
/// revalidated.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn serve_build_output(State(state): State<AppState>, mut request: Request) -> Response {
    let build = &state.config.build;
    let path = request.uri().path().to_string();

    if let Some(index) = directory_index(&build.out_dir, &path).await
        && let Ok(uri) = Uri::try_from(with_query(&index, request.uri().query()))
    {
        debug!(index = %index, "Serving directory index");
        *request.uri_mut() = uri;
    }

    let response = match ServeDir::new(&build.out_dir)
        .append_index_html_on_directories(false)
        .oneshot(request)
        .await
    {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    };

    with_cache_headers(response, is_hashed_asset(&build.assets_dir, &path))
}

fn with_query(path: &str, query: Option<&str>) -> String {
    match query {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    }
}

/// `path/index.html` when `path` names a directory of the build output.
async fn directory_index(out_dir: &Path, path: &str) -> Option<String> {
    let relative = path.trim_matches('/');
    if relative.is_empty() {
        return Some("/index.html".to_string());
    }

    let relative_path = Path::new(relative);
    if !relative_path.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }

    let metadata = tokio::fs::metadata(out_dir.join(relative_path)).await.ok()?;
    metadata.is_dir().then(|| format!("/{relative}/index.html"))
}

fn is_hashed_asset(assets_dir: &str, path: &str) -> bool {
    let assets_dir = assets_dir.trim_matches('/');
    !assets_dir.is_empty()
        && path
            .trim_start_matches('/')
            .strip_prefix(assets_dir)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn with_cache_headers(mut response: Response, immutable: bool) -> Response {
    if response.status().is_success() {
        let value = if immutable { IMMUTABLE } else { "no-cache" };
        response.headers_mut().insert(header::CACHE_CONTROL, HeaderValue::from_static(value));
    }
    response
}
