//! HTTP surface of the blog server.
//!
//! - **[`handlers`]**: route handlers (`/healthz`, `/_site`) and the static file fallback that serves
//!   the build output
//! - **[`middleware`]**: request policies from the site configuration (trailing slash redirects,
//!   cross-site form rejection)
//!
//! Pages themselves are rendered by the frontend; this layer serves its output under the
//! configured policies.

pub mod handlers;
pub mod middleware;
