//! Public certificate verification.
//!
//! The response shape here is the public contract: printed and shared
//! verification links depend on it indefinitely, so the projection must stay
//! stable.

use axum::http::{HeaderMap, StatusCode};
use certhub_core::db::now_iso;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::storage::{CertDatabase, Certificate, CertificateMetadata, Event};

/// Requester context recorded in the verification log.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Extract the requester's address and agent from proxy headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Self {
            ip_address: header("x-forwarded-for").or_else(|| header("x-real-ip")),
            user_agent: header("user-agent"),
        }
    }
}

/// Wire shape of `GET /verify/{certificate_id}`.
#[derive(Debug, Serialize)]
pub struct VerificationResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerificationResponse {
    fn not_found() -> Self {
        Self {
            valid: false,
            status: None,
            revoked_at: None,
            revoked_reason: None,
            certificate: None,
            error: Some("Certificate not found".to_string()),
        }
    }

    fn failure() -> Self {
        Self {
            valid: false,
            status: None,
            revoked_at: None,
            revoked_reason: None,
            certificate: None,
            error: Some("Failed to verify certificate".to_string()),
        }
    }

    /// HTTP status for this response shape.
    pub fn http_status(&self) -> StatusCode {
        match &self.error {
            Some(e) if e == "Certificate not found" => StatusCode::NOT_FOUND,
            Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
            None => StatusCode::OK,
        }
    }
}

#[derive(Clone)]
pub struct VerificationService {
    db: CertDatabase,
}

impl VerificationService {
    pub const fn new(db: CertDatabase) -> Self {
        Self { db }
    }

    /// Look up a certificate by public identifier and project it.
    ///
    /// Every lookup that resolves a certificate appends a verification-log
    /// row, revoked certificates included; only active lookups bump the
    /// verification counter. Internal errors are never exposed.
    pub async fn verify(&self, certificate_id: &str, ctx: &RequestContext) -> VerificationResponse {
        match self.verify_inner(certificate_id, ctx).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, certificate_id = %certificate_id, "Verification lookup failed");
                VerificationResponse::failure()
            }
        }
    }

    async fn verify_inner(
        &self,
        certificate_id: &str,
        ctx: &RequestContext,
    ) -> Result<VerificationResponse, certhub_core::db::DatabaseError> {
        let Some(cert) = self.db.find_certificate_by_public_id(certificate_id).await? else {
            return Ok(VerificationResponse::not_found());
        };

        let event = self.db.get_event(&cert.event_id).await.ok();
        let metadata = self.db.list_metadata(&cert.id).await?;

        // Best-effort audit log; a log failure must not block the response.
        if let Err(e) = self
            .db
            .insert_verification_log(
                &cert.id,
                ctx.ip_address.as_deref(),
                ctx.user_agent.as_deref(),
                &now_iso(),
            )
            .await
        {
            warn!(error = %e, certificate_id = %cert.certificate_id, "Failed to write verification log");
        }

        let projection = project_certificate(&cert, event.as_ref(), &metadata);

        if cert.status == "revoked" {
            return Ok(VerificationResponse {
                valid: false,
                status: Some("revoked".to_string()),
                revoked_at: cert.revoked_at.clone(),
                revoked_reason: cert.revoked_reason.clone(),
                certificate: Some(projection),
                error: None,
            });
        }

        if let Err(e) = self.db.record_verification(&cert.id, &now_iso()).await {
            warn!(error = %e, certificate_id = %cert.certificate_id, "Failed to bump verification counter");
        }

        Ok(VerificationResponse {
            valid: true,
            status: None,
            revoked_at: None,
            revoked_reason: None,
            certificate: Some(projection),
            error: None,
        })
    }
}

/// Flatten a certificate, its event, and its metadata rows into the stable
/// public shape. `json`/`array` metadata is decoded; a decode failure falls
/// back to the raw string, never an error.
fn project_certificate(
    cert: &Certificate,
    event: Option<&Event>,
    metadata: &[CertificateMetadata],
) -> Value {
    let mut obj = Map::new();

    obj.insert(
        "certificate_id".to_string(),
        Value::String(cert.certificate_id.clone()),
    );
    obj.insert(
        "participant_name".to_string(),
        Value::String(cert.participant_name.clone()),
    );
    obj.insert("school".to_string(), Value::String(cert.school.clone()));
    obj.insert(
        "certificate_type".to_string(),
        Value::String(cert.certificate_type.clone()),
    );
    obj.insert(
        "event".to_string(),
        event.map_or(Value::Null, |e| Value::String(e.event_name.clone())),
    );
    obj.insert(
        "event_code".to_string(),
        event.map_or(Value::Null, |e| Value::String(e.event_code.clone())),
    );
    obj.insert(
        "date_issued".to_string(),
        Value::String(cert.date_issued.clone()),
    );
    obj.insert("status".to_string(), Value::String(cert.status.clone()));
    obj.insert("pdf_available".to_string(), Value::Bool(cert.pdf_available != 0));
    obj.insert(
        "pdf_download_url".to_string(),
        cert.pdf_storage_path
            .clone()
            .map_or(Value::Null, Value::String),
    );

    for meta in metadata {
        let value = if meta.field_type == "json" || meta.field_type == "array" {
            serde_json::from_str(&meta.field_value)
                .unwrap_or_else(|_| Value::String(meta.field_value.clone()))
        } else {
            Value::String(meta.field_value.clone())
        };
        obj.insert(meta.field_name.clone(), value);
    }

    Value::Object(obj)
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::minter::{CertificateMinter, MintRequest};
    use crate::objectstore::{MemoryObjectStore, ObjectStore};
    use crate::qr::QrBinder;
    use crate::storage::{MetadataEntry, NewEvent};

    struct Fixture {
        db: CertDatabase,
        minter: CertificateMinter,
        service: VerificationService,
        event: Event,
    }

    async fn fixture() -> Fixture {
        let db = CertDatabase::open_in_memory().await.unwrap();
        let event = db
            .create_event(&NewEvent {
                id: "e1",
                event_code: "mun24",
                event_name: "Model UN 2024",
                year: 2024,
                month: 6,
                session: 1,
                event_type: "MUN",
                created_by: None,
            })
            .await
            .unwrap();

        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::default());
        let minter = CertificateMinter::new(
            db.clone(),
            QrBinder::new("https://certs.example.org", store),
        );
        let service = VerificationService::new(db.clone());

        Fixture {
            db,
            minter,
            service,
            event,
        }
    }

    async fn mint(fx: &Fixture, name: &str) -> Certificate {
        fx.minter
            .mint(
                &fx.event,
                &MintRequest {
                    certificate_type: "MUN Participant".to_string(),
                    participant_name: Some(name.to_string()),
                    ..MintRequest::default()
                },
                None,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn unknown_identifier_is_not_found_and_logs_nothing() {
        let fx = fixture().await;
        let cert = mint(&fx, "Jane Doe").await;

        let resp = fx
            .service
            .verify("mun24-nope", &RequestContext::default())
            .await;

        assert!(!resp.valid);
        assert_eq!(resp.error.as_deref(), Some("Certificate not found"));
        assert_eq!(resp.http_status(), StatusCode::NOT_FOUND);

        // The lookup failed before any side effect
        assert_eq!(fx.db.count_verification_logs(&cert.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn active_certificate_counts_every_verification() {
        let fx = fixture().await;
        let cert = mint(&fx, "Jane Doe").await;

        for _ in 0..10 {
            let resp = fx
                .service
                .verify(&cert.certificate_id, &RequestContext::default())
                .await;
            assert!(resp.valid);
        }

        let stored = fx.db.get_certificate(&cert.id).await.unwrap();
        // Not idempotent by design: ten lookups, counter ten
        assert_eq!(stored.verification_count, 10);
        assert!(stored.last_verified_at.is_some());
        assert_eq!(fx.db.count_verification_logs(&cert.id).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn revoked_certificate_logs_but_does_not_count() {
        let fx = fixture().await;
        let cert = mint(&fx, "Jane Doe").await;
        fx.db
            .revoke_certificate(&cert.id, "admin-1", "Issued in error", "2024-07-01T12:00:00Z")
            .await
            .unwrap();

        let resp = fx
            .service
            .verify(&cert.certificate_id, &RequestContext::default())
            .await;

        assert!(!resp.valid);
        assert_eq!(resp.status.as_deref(), Some("revoked"));
        assert_eq!(resp.revoked_at.as_deref(), Some("2024-07-01T12:00:00Z"));
        assert_eq!(resp.revoked_reason.as_deref(), Some("Issued in error"));
        assert_eq!(resp.http_status(), StatusCode::OK);

        // The revoked projection is still present
        let projection = resp.certificate.unwrap();
        assert_eq!(projection["status"], "revoked");

        // Exactly one log row, counter untouched
        assert_eq!(fx.db.count_verification_logs(&cert.id).await.unwrap(), 1);
        let stored = fx.db.get_certificate(&cert.id).await.unwrap();
        assert_eq!(stored.verification_count, 0);
    }

    #[tokio::test]
    async fn metadata_round_trip_decodes_arrays() {
        let fx = fixture().await;
        let cert = mint(&fx, "Jane Doe").await;

        fx.db
            .insert_metadata(
                &cert.id,
                &[
                    MetadataEntry {
                        field_name: "team_members".to_string(),
                        field_value: r#"["A","B"]"#.to_string(),
                        field_type: "array".to_string(),
                    },
                    MetadataEntry {
                        field_name: "country".to_string(),
                        field_value: "France".to_string(),
                        field_type: "text".to_string(),
                    },
                    MetadataEntry {
                        field_name: "broken".to_string(),
                        field_value: "{not json".to_string(),
                        field_type: "json".to_string(),
                    },
                ],
            )
            .await
            .unwrap();

        let resp = fx
            .service
            .verify(&cert.certificate_id, &RequestContext::default())
            .await;
        let projection = resp.certificate.unwrap();

        assert_eq!(projection["team_members"], serde_json::json!(["A", "B"]));
        assert_eq!(projection["country"], "France");
        // Decode failure falls back to the raw string
        assert_eq!(projection["broken"], "{not json");
    }

    #[tokio::test]
    async fn projection_core_fields_are_stable() {
        let fx = fixture().await;
        let cert = mint(&fx, "Jane Doe").await;

        let resp = fx
            .service
            .verify(&cert.certificate_id, &RequestContext::default())
            .await;
        let projection = resp.certificate.unwrap();

        for key in [
            "certificate_id",
            "participant_name",
            "school",
            "certificate_type",
            "event",
            "event_code",
            "date_issued",
            "status",
            "pdf_available",
            "pdf_download_url",
        ] {
            assert!(projection.get(key).is_some(), "missing key: {key}");
        }

        assert_eq!(projection["event"], "Model UN 2024");
        assert_eq!(projection["event_code"], "mun24");
        assert_eq!(projection["pdf_available"], false);
        assert_eq!(projection["pdf_download_url"], Value::Null);
    }

    #[test]
    fn request_context_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9".parse().unwrap());
        headers.insert("x-real-ip", "198.51.100.1".parse().unwrap());
        headers.insert("user-agent", "curl/8.0".parse().unwrap());

        let ctx = RequestContext::from_headers(&headers);
        assert_eq!(ctx.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(ctx.user_agent.as_deref(), Some("curl/8.0"));
    }
}
