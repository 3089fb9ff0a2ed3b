//! Event management endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::error::ApiError;
use crate::identity::{Identity, Role};
use crate::storage::{EventPatch, NewEvent};

#[derive(Debug, Deserialize)]
pub struct CreateEventBody {
    #[serde(default)]
    pub event_code: String,
    #[serde(default)]
    pub event_name: String,
    pub year: i64,
    pub month: i64,
    pub session: i64,
    #[serde(default)]
    pub event_type: String,
}

fn validate_event(body: &CreateEventBody) -> Result<(), ApiError> {
    let mut problems = Vec::new();

    if body.event_code.trim().is_empty() {
        problems.push("Event code is required");
    }
    if body.event_name.trim().is_empty() {
        problems.push("Event name is required");
    }
    if !(2000..=2100).contains(&body.year) {
        problems.push("Year must be between 2000 and 2100");
    }
    if !(1..=12).contains(&body.month) {
        problems.push("Month must be between 1 and 12");
    }
    if body.session < 1 {
        problems.push("Session must be at least 1");
    }
    if body.event_type.trim().is_empty() {
        problems.push("Event type is required");
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(problems.join("; ")))
    }
}

/// `GET /api/events`
pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let events = state.db.list_events().await?;
    Ok(Json(json!({ "events": events })))
}

/// `POST /api/events` (admin)
pub async fn create(
    State(state): State<AppState>,
    identity: Identity,
    Json(body): Json<CreateEventBody>,
) -> Result<impl IntoResponse, ApiError> {
    identity.require(Role::Admin)?;
    validate_event(&body)?;

    if state.db.event_code_exists(body.event_code.trim()).await? {
        return Err(ApiError::Validation("Event code already exists".to_string()));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let event = state
        .db
        .create_event(&NewEvent {
            id: &id,
            event_code: body.event_code.trim(),
            event_name: body.event_name.trim(),
            year: body.year,
            month: body.month,
            session: body.session,
            event_type: body.event_type.trim(),
            created_by: Some(&identity.user_id),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "event": event }))))
}

/// `GET /api/events/{id}`
pub async fn get_by_id(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let event = state.db.get_event(&id).await?;
    Ok(Json(json!({ "event": event })))
}

/// `PUT /api/events/{id}` (admin) -- `event_code` is immutable.
pub async fn update(
    Path(id): Path<String>,
    State(state): State<AppState>,
    identity: Identity,
    Json(patch): Json<EventPatch>,
) -> Result<impl IntoResponse, ApiError> {
    identity.require(Role::Admin)?;
    let event = state.db.update_event(&id, &patch).await?;
    Ok(Json(json!({ "event": event })))
}
