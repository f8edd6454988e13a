use axum::extract::State;
use tracing::instrument;

use crate::{AppState, db, errors::Error};

// GET /healthz - 200 while the database answers, 503 otherwise
#[instrument(skip_all, err)]
pub async fn healthz(State(state): State<AppState>) -> Result<&'static str, Error> {
    db::ping(&state.db).await?;
    Ok("OK")
}

#[cfg(test)]
mod tests {
    use crate::test_utils::test_server;
    use axum::http::StatusCode;

    #[test_log::test(tokio::test)]
    async fn test_healthz_unreachable_database_is_503() {
        let server = test_server().await;

        let response = server.get("/healthz").await;

        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        response.assert_text("Database unavailable");
    }
}
