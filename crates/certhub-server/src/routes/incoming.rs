//! Incoming staging endpoints: bearer-token ingestion/export for the
//! spreadsheet integration, super_admin inbox management.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::error::ApiError;
use crate::identity::{self, Identity, Role};

#[derive(Debug, Deserialize)]
pub struct StageBody {
    #[serde(default)]
    pub event_code: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub rows: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    #[serde(default)]
    pub event_code: String,
    #[serde(default)]
    pub section: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectBody {
    pub reason: Option<String>,
}

/// Validate the spreadsheet integration's bearer token: the configured
/// process secret first, then the secrets store. No secret anywhere means
/// nothing can authenticate.
async fn check_sheets_auth(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(token) = identity::bearer_token(headers) else {
        return Err(ApiError::Unauthorized);
    };

    let secret = match &state.sheets_secret {
        Some(secret) => secret.clone(),
        None => state
            .db
            .get_secret("sheets_webhook_secret")
            .await
            .ok()
            .flatten()
            .ok_or(ApiError::Unauthorized)?,
    };

    if identity::token_matches(token, &secret) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

/// `GET /api/incoming-certificates?status=` (super_admin inbox)
pub async fn list(
    Query(params): Query<ListParams>,
    State(state): State<AppState>,
    identity: Identity,
) -> Result<impl IntoResponse, ApiError> {
    identity.require(Role::SuperAdmin)?;

    let status = params.status.as_deref().unwrap_or("pending");
    let items = state.incoming.list(status).await?;
    Ok(Json(json!({ "items": items })))
}

/// `POST /api/incoming-certificates` (bearer token)
pub async fn stage(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<StageBody>,
) -> Result<impl IntoResponse, ApiError> {
    check_sheets_auth(&state, &headers).await?;

    let Some(rows) = body.rows else {
        return Err(ApiError::Validation(
            "event_code, section and rows are required".to_string(),
        ));
    };
    if body.event_code.trim().is_empty() || body.section.trim().is_empty() {
        return Err(ApiError::Validation(
            "event_code, section and rows are required".to_string(),
        ));
    }

    let count = state
        .incoming
        .stage(body.event_code.trim(), body.section.trim(), &rows)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Rows staged successfully", "count": count })),
    ))
}

/// `POST /api/incoming-certificates/{id}/approve` (super_admin)
pub async fn approve(
    Path(id): Path<String>,
    State(state): State<AppState>,
    identity: Identity,
) -> Result<impl IntoResponse, ApiError> {
    identity.require(Role::SuperAdmin)?;

    let certificate = state.incoming.approve(&id, &identity).await?;
    Ok(Json(json!({ "certificate": certificate })))
}

/// `POST /api/incoming-certificates/{id}/reject` (super_admin)
pub async fn reject(
    Path(id): Path<String>,
    State(state): State<AppState>,
    identity: Identity,
    body: Option<Json<RejectBody>>,
) -> Result<impl IntoResponse, ApiError> {
    identity.require(Role::SuperAdmin)?;

    let reason = body.and_then(|Json(b)| b.reason);
    let item = state.incoming.reject(&id, reason, &identity).await?;
    Ok(Json(json!({ "item": item })))
}

/// `GET /api/incoming-certificates/export?event_code=&section=` (bearer token)
pub async fn export(
    Query(params): Query<ExportParams>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    check_sheets_auth(&state, &headers).await?;

    if params.event_code.trim().is_empty() || params.section.trim().is_empty() {
        return Err(ApiError::Validation(
            "event_code and section are required".to_string(),
        ));
    }

    let rows = state
        .incoming
        .export(params.event_code.trim(), params.section.trim())
        .await?;
    Ok(Json(json!({ "rows": rows })))
}
