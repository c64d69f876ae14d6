use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

/// `GET /health` — liveness check.
///
/// Returns `200 OK` when the file ledger is readable (it is the fallback for
/// every call, so the service can count visits). Returns
/// `503 Service Unavailable` when it is not. Redis readiness is reported but
/// does not affect the status.
///
/// Response shape:
/// ```json
/// {
///   "status": "ok",
///   "version": "0.1.0",
///   "store": {
///     "active": "redis",
///     "redis": { "configured": true, "ready": true },
///     "fallbacks": 0
///   }
/// }
/// ```
#[tracing::instrument(skip(state))]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let accounting = &state.accounting;
    let store = json!({
        "active": accounting.active_store(),
        "redis": {
            "configured": accounting.external_configured(),
            "ready": accounting.external_ready(),
        },
        "fallbacks": accounting.fallback_count(),
    });

    match accounting.ping_file().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
                "store": store,
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Health check: file ledger unreadable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "version": env!("CARGO_PKG_VERSION"),
                    "store": store,
                })),
            )
                .into_response()
        }
    }
}
