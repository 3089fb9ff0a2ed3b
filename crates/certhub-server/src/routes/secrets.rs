//! Secrets store endpoint (runtime-mutable configuration).

use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::error::ApiError;
use crate::identity::{Identity, Role};

#[derive(Debug, Deserialize)]
pub struct UpsertSecretBody {
    #[serde(default)]
    pub value: String,
    pub description: Option<String>,
}

/// `PUT /api/secrets/{key}` (super_admin)
///
/// Values are write-only through the API; there is deliberately no read
/// endpoint.
pub async fn upsert(
    Path(key): Path<String>,
    State(state): State<AppState>,
    identity: Identity,
    Json(body): Json<UpsertSecretBody>,
) -> Result<impl IntoResponse, ApiError> {
    identity.require(Role::SuperAdmin)?;

    if body.value.is_empty() {
        return Err(ApiError::Validation("value is required".to_string()));
    }

    state
        .db
        .upsert_secret(&key, &body.value, body.description.as_deref())
        .await?;

    Ok(Json(json!({ "key": key, "success": true })))
}
