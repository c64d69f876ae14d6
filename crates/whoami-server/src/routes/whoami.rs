use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::USER_AGENT, Extensions, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use whoami_core::VisitCounts;

use crate::{
    enrich::{geo, parse_user_agent, GeoLocation},
    error::AppError,
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub ip: String,
    pub browser: String,
    pub os: String,
    pub device: String,
    pub location: GeoLocation,
    pub visits: VisitCounts,
}

/// `GET /api/whoami` — describe the caller and count the visit.
///
/// ## Identity
/// The client key is the peer address, or the first `X-Forwarded-For` entry
/// when `WHOAMI_TRUST_PROXY=true`. A request with neither is counted under
/// the empty key.
///
/// ## Accounting
/// The increment runs on its own task: once started it completes even if the
/// client disconnects. A failing Redis store falls back to the file store.
///
/// ## Response
/// `200 OK` with `{ ip, browser, os, device, location, visits }`.
/// `500` with `{ "error": ... }` when no store could record the visit.
#[tracing::instrument(skip(state, headers, extensions))]
pub async fn whoami(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    extensions: Extensions,
) -> Result<impl IntoResponse, AppError> {
    let client = state.client_id(&headers, &extensions);

    if !state.check_rate_limit(&client).await {
        return Err(AppError::RateLimited);
    }

    let recording = {
        let accounting = Arc::clone(&state.accounting);
        let client = client.clone();
        tokio::spawn(async move { accounting.record(&client).await })
    };

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let ua = parse_user_agent(user_agent);
    let location = geo::lookup_bounded(Arc::clone(&state.geo), client.as_str().to_string()).await;

    let visits = recording
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

    Ok(Json(WhoAmIResponse {
        ip: client.into_string(),
        browser: ua
            .as_ref()
            .map(|u| u.browser_label())
            .unwrap_or_else(|| "Unknown".to_string()),
        os: ua
            .as_ref()
            .map(|u| u.os_label())
            .unwrap_or_else(|| "Unknown".to_string()),
        device: ua
            .as_ref()
            .map(|u| u.device_type.clone())
            .unwrap_or_else(|| "desktop".to_string()),
        location,
        visits,
    }))
}
