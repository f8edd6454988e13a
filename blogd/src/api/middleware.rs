//! Request policies applied to every route, including the static fallback.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use crate::{AppState, config::Config, config::TrailingSlash, errors::Error};

/// Content types a browser can submit cross-site without a CORS preflight.
const FORM_CONTENT_TYPES: [&str; 3] = ["application/x-www-form-urlencoded", "multipart/form-data", "text/plain"];

/// Redirect `GET`/`HEAD` requests to the canonical form of their path (308, query preserved).
pub async fn trailing_slash(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !matches!(*request.method(), Method::GET | Method::HEAD) {
        return next.run(request).await;
    }

    match canonical_path(state.config.site.trailing_slash, request.uri().path()) {
        Some(target) => {
            let target = match request.uri().query() {
                Some(query) => format!("{target}?{query}"),
                None => target,
            };
            debug!(from = %request.uri(), to = %target, "Redirecting to canonical path");
            Redirect::permanent(&target).into_response()
        }
        None => next.run(request).await,
    }
}

/// The path to redirect to, or `None` if `path` is already canonical.
fn canonical_path(policy: TrailingSlash, path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }

    let target = match policy {
        TrailingSlash::Never if path.ends_with('/') => path.trim_end_matches('/').to_string(),
        TrailingSlash::Always if !path.ends_with('/') && !is_file_like(path) => format!("{path}/"),
        _ => return None,
    };

    // Collapse leading slashes: `//host` would be read as a protocol-relative URL.
    let target = target.trim_start_matches('/');
    Some(format!("/{target}"))
}

fn is_file_like(path: &str) -> bool {
    path.rsplit('/').next().is_some_and(|segment| segment.contains('.'))
}

/// Reject cross-site form submissions when `security.check_origin` is enabled.
pub async fn check_origin(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, Error> {
    if state.config.security.check_origin
        && is_form_submission(request.method(), request.headers())
        && !origin_allowed(&state.config, request.headers())
    {
        return Err(Error::Forbidden {
            message: format!("Cross-site {} form submissions are forbidden", request.method()),
        });
    }

    Ok(next.run(request).await)
}

/// Unsafe methods carrying a form-like body. A missing content type counts as form-like.
fn is_form_submission(method: &Method, headers: &HeaderMap) -> bool {
    if !matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE) {
        return false;
    }

    match headers.get(header::CONTENT_TYPE).and_then(|value| value.to_str().ok()) {
        Some(content_type) => {
            let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
            FORM_CONTENT_TYPES.contains(&essence.as_str())
        }
        None => true,
    }
}

/// `Origin` must be the configured site origin or the origin the request was addressed to.
fn origin_allowed(config: &Config, headers: &HeaderMap) -> bool {
    let Some(origin) = headers.get(header::ORIGIN).and_then(|value| value.to_str().ok()) else {
        return false;
    };

    let site_url = config.site_url();
    if origin == site_url.origin().ascii_serialization() {
        return true;
    }

    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|host| origin == format!("{}://{}", site_url.scheme(), host))
}
