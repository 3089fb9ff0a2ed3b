//! Certificate management endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::error::ApiError;
use crate::identity::{Identity, Role};
use crate::minter::MintRequest;
use crate::storage::{CertificateFilter, CertificateUpdate, MetadataEntry};

#[derive(Debug, Deserialize)]
pub struct CreateCertificateBody {
    pub event_id: String,
    #[serde(flatten)]
    pub fields: MintRequest,
}

#[derive(Debug, Deserialize)]
pub struct BulkImportBody {
    #[serde(default)]
    pub event_code: String,
    #[serde(default)]
    pub certificates: Vec<MintRequest>,
}

#[derive(Debug, Deserialize)]
pub struct RevokeBody {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct MetadataBody {
    pub metadata: Vec<MetadataEntry>,
}

/// `GET /api/certificates`
pub async fn list(
    Query(filter): Query<CertificateFilter>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let certificates = state.db.list_certificates(&filter).await?;
    Ok(Json(json!({ "certificates": certificates })))
}

/// `POST /api/certificates` (admin)
pub async fn create(
    State(state): State<AppState>,
    identity: Identity,
    Json(body): Json<CreateCertificateBody>,
) -> Result<impl IntoResponse, ApiError> {
    identity.require(Role::Admin)?;

    let event = state
        .db
        .get_event(&body.event_id)
        .await
        .map_err(|_| ApiError::NotFound("Event not found".to_string()))?;

    let certificate = state
        .minter
        .mint(&event, &body.fields, Some(&identity.user_id))
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "certificate": certificate }))))
}

/// `GET /api/certificates/{id}` -- detail with event and metadata.
pub async fn get_by_id(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let certificate = state.db.get_certificate(&id).await?;
    let event = state.db.get_event(&certificate.event_id).await.ok();
    let metadata = state.db.list_metadata(&certificate.id).await?;

    Ok(Json(json!({
        "certificate": certificate,
        "event": event,
        "metadata": metadata,
    })))
}

/// `PUT /api/certificates/{id}` (admin) -- the public identifier is
/// immutable; unknown body fields (including `certificate_id`) are ignored.
pub async fn update(
    Path(id): Path<String>,
    State(state): State<AppState>,
    identity: Identity,
    Json(patch): Json<CertificateUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    identity.require(Role::Admin)?;
    let certificate = state.db.update_certificate(&id, &patch).await?;
    Ok(Json(json!({ "certificate": certificate })))
}

/// `POST /api/certificates/{id}/revoke` (admin)
pub async fn revoke(
    Path(id): Path<String>,
    State(state): State<AppState>,
    identity: Identity,
    Json(body): Json<RevokeBody>,
) -> Result<impl IntoResponse, ApiError> {
    identity.require(Role::Admin)?;

    if body.reason.trim().is_empty() {
        return Err(ApiError::Validation(
            "Revocation reason is required".to_string(),
        ));
    }

    let certificate = state
        .db
        .revoke_certificate(
            &id,
            &identity.user_id,
            body.reason.trim(),
            &certhub_core::db::now_iso(),
        )
        .await?;

    Ok(Json(json!({
        "message": "Certificate revoked successfully",
        "certificate": certificate,
    })))
}

/// `PUT /api/certificates/{id}/metadata` (admin) -- replace-all semantics.
pub async fn replace_metadata(
    Path(id): Path<String>,
    State(state): State<AppState>,
    identity: Identity,
    Json(body): Json<MetadataBody>,
) -> Result<impl IntoResponse, ApiError> {
    identity.require(Role::Admin)?;

    // 404 before touching rows
    let certificate = state.db.get_certificate(&id).await?;
    state
        .db
        .replace_metadata(&certificate.id, &body.metadata)
        .await?;

    Ok(Json(json!({ "success": true })))
}

/// `GET /api/certificates/{id}/qr-code` -- stream the stored PNG; fall back
/// to the public URL when the object is gone.
pub async fn qr_code(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let certificate = state
        .db
        .get_certificate(&id)
        .await
        .map_err(|_| ApiError::NotFound("Certificate not found".to_string()))?;

    let key = format!("{}.png", certificate.certificate_id);
    match state.store.get(&key).await {
        Ok(bytes) => Ok((
            [
                (header::CONTENT_TYPE, "image/png".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("inline; filename=\"{}-qr.png\"", certificate.certificate_id),
                ),
            ],
            bytes,
        )
            .into_response()),
        Err(_) => Ok(Json(json!({
            "qr_code_url": certificate.qr_code_image_path,
            "certificate_id": certificate.certificate_id,
        }))
        .into_response()),
    }
}

/// `POST /api/certificates/bulk-import` (admin)
pub async fn bulk_import(
    State(state): State<AppState>,
    identity: Identity,
    Json(body): Json<BulkImportBody>,
) -> Result<impl IntoResponse, ApiError> {
    identity.require(Role::Admin)?;

    if body.event_code.trim().is_empty() {
        return Err(ApiError::Validation("Event code is required".to_string()));
    }
    if body.certificates.is_empty() {
        return Err(ApiError::Validation(
            "At least one certificate is required".to_string(),
        ));
    }

    let Some(event) = state.db.get_event_by_code(body.event_code.trim()).await? else {
        return Err(ApiError::NotFound(format!(
            "Event with code \"{}\" not found",
            body.event_code.trim()
        )));
    };

    let report = state
        .minter
        .mint_batch(&event, &body.certificates, Some(&identity.user_id))
        .await;

    Ok(Json(json!({
        "message": format!(
            "Import completed: {} successful, {} errors",
            report.success.len(),
            report.errors.len()
        ),
        "success_count": report.success.len(),
        "error_count": report.errors.len(),
        "results": report,
    })))
}
