use std::sync::Arc;

use axum::{
    extract::State,
    http::{Extensions, HeaderMap},
    response::IntoResponse,
    Json,
};

use crate::{error::AppError, state::AppState};

/// `GET /api/visits` — current `{ total, unique }` without counting a visit.
#[tracing::instrument(skip(state, headers, extensions))]
pub async fn visits(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    extensions: Extensions,
) -> Result<impl IntoResponse, AppError> {
    let client = state.client_id(&headers, &extensions);
    if !state.check_rate_limit(&client).await {
        return Err(AppError::RateLimited);
    }

    let totals = state.accounting.snapshot().await?;
    Ok(Json(totals))
}
