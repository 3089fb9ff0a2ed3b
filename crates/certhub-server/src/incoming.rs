//! Incoming-certificate staging workflow.
//!
//! Externally-pushed rows land in a pending queue keyed by (event, section).
//! Approval derives certificate fields from the opaque payload, promotes the
//! row through the minter exactly once, and writes the minted identifier
//! back into the payload so the external system can reconcile via export.
//! Transitions are uniform: both approve and reject fire only from
//! `pending`.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::identity::Identity;
use crate::minter::{CertificateMinter, MintRequest};
use crate::notify::Notifier;
use crate::storage::{CertDatabase, Certificate, IncomingCertificate};

/// Default award applied when a payload names no certificate type.
const DEFAULT_INCOMING_TYPE: &str = "MUN Participant";

/// Minimal reporting shape for the external system's reconciliation.
#[derive(Debug, Serialize)]
pub struct ExportRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_row_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code_url: Option<String>,
}

#[derive(Clone)]
pub struct IncomingWorkflow {
    db: CertDatabase,
    minter: CertificateMinter,
    notifier: Notifier,
}

impl IncomingWorkflow {
    pub const fn new(db: CertDatabase, minter: CertificateMinter, notifier: Notifier) -> Self {
        Self {
            db,
            minter,
            notifier,
        }
    }

    /// Stage externally-pushed rows as pending, all-or-nothing.
    ///
    /// Payloads are opaque at staging time; validation happens on approval.
    pub async fn stage(
        &self,
        event_code: &str,
        section: &str,
        rows: &[Value],
    ) -> Result<u64, ApiError> {
        let Some(event) = self.db.get_event_by_code(event_code).await? else {
            self.notifier
                .notify(&format!("Incoming staging: event not found for code {event_code}"))
                .await;
            return Err(ApiError::NotFound(format!(
                "Event with code \"{event_code}\" not found"
            )));
        };

        let count = self.db.stage_incoming(&event.id, section, rows).await?;

        info!(
            event_code = %event_code,
            section = %section,
            count,
            "Incoming rows staged"
        );

        Ok(count)
    }

    /// List incoming rows by status (inbox view).
    pub async fn list(&self, status: &str) -> Result<Vec<IncomingCertificate>, ApiError> {
        Ok(self.db.list_incoming(status).await?)
    }

    /// Promote a pending row into a real certificate, exactly once.
    ///
    /// On minting failure the row stays pending and the error is surfaced;
    /// on success the minted identifier and QR URL are merged into the
    /// payload before the row is marked accepted.
    pub async fn approve(
        &self,
        id: &str,
        approver: &Identity,
    ) -> Result<Certificate, ApiError> {
        let incoming = self.db.get_incoming(id).await?;

        if incoming.status != "pending" {
            return Err(ApiError::Validation(
                "Only pending rows can be approved".to_string(),
            ));
        }

        let payload: Value = serde_json::from_str(&incoming.payload).map_err(|_| {
            ApiError::Validation("Incoming payload is not valid JSON".to_string())
        })?;
        let request = mint_request_from_payload(&payload);
        let event = self.db.get_event(&incoming.event_id).await?;

        match self.minter.mint(&event, &request, Some(&approver.user_id)).await {
            Ok(cert) => {
                let payload_json = payload_with_mint_result(payload, &cert);
                let accepted = self
                    .db
                    .mark_incoming_accepted(id, &payload_json, &certhub_core::db::now_iso())
                    .await?;
                if !accepted {
                    // Lost a race after minting; the certificate stands, the
                    // row was processed by someone else.
                    warn!(incoming_id = %id, "Incoming row was no longer pending after mint");
                }

                self.notifier
                    .notify(&format!(
                        "Incoming certificate approved by {}: {}",
                        approver.user_id, cert.certificate_id
                    ))
                    .await;

                Ok(cert)
            }
            Err(e) => {
                self.notifier
                    .notify(&format!("Incoming certificate approval failed for {id}: {e}"))
                    .await;
                Err(e)
            }
        }
    }

    /// Reject a pending row with a reason.
    pub async fn reject(
        &self,
        id: &str,
        reason: Option<String>,
        rejecter: &Identity,
    ) -> Result<IncomingCertificate, ApiError> {
        let incoming = self.db.get_incoming(id).await?;

        if incoming.status != "pending" {
            return Err(ApiError::Validation(
                "Only pending rows can be rejected".to_string(),
            ));
        }

        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| "Rejected by admin".to_string());

        let rejected = self
            .db
            .mark_incoming_rejected(id, &reason, &certhub_core::db::now_iso())
            .await?;
        if !rejected {
            return Err(ApiError::Validation(
                "Only pending rows can be rejected".to_string(),
            ));
        }

        self.notifier
            .notify(&format!(
                "Incoming certificate rejected by {}: {id} ({reason})",
                rejecter.user_id
            ))
            .await;

        Ok(self.db.get_incoming(id).await?)
    }

    /// Export accepted rows for an event section in the reporting shape.
    pub async fn export(
        &self,
        event_code: &str,
        section: &str,
    ) -> Result<Vec<ExportRow>, ApiError> {
        let Some(event) = self.db.get_event_by_code(event_code).await? else {
            return Err(ApiError::NotFound(format!(
                "Event with code \"{event_code}\" not found"
            )));
        };

        let rows = self.db.list_accepted_incoming(&event.id, section).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let payload: Value =
                    serde_json::from_str(&row.payload).unwrap_or(Value::Null);
                let text = |key: &str| {
                    payload
                        .get(key)
                        .and_then(Value::as_str)
                        .map(str::to_string)
                };

                ExportRow {
                    sheet_row_id: payload.get("sheet_row_id").cloned(),
                    participant_name: text("participant_name").or_else(|| text("name")),
                    certificate_type: text("certificate_type").or_else(|| text("award_type")),
                    certificate_id: text("certificate_id"),
                    qr_code_url: text("qr_code_url"),
                }
            })
            .collect())
    }
}

/// Derive minter fields from the free-form payload via the fallback chains.
fn mint_request_from_payload(payload: &Value) -> MintRequest {
    let text = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    MintRequest {
        certificate_type: text("certificate_type")
            .or_else(|| text("award_type"))
            .unwrap_or_else(|| DEFAULT_INCOMING_TYPE.to_string()),
        participant_name: text("participant_name").or_else(|| text("name")),
        school: text("school"),
        date_issued: text("date_issued"),
        country: text("country"),
        committee: text("committee"),
        segment: text("segment"),
        team_name: text("team_name"),
        team_members: payload
            .get("team_members")
            .and_then(|v| serde_json::from_value(v.clone()).ok()),
        custom_fields: payload
            .get("custom_fields")
            .and_then(Value::as_object)
            .cloned(),
    }
}

/// Merge the minted identifier and QR URL into the staged payload so export
/// can hand them back to the external system.
fn payload_with_mint_result(payload: Value, cert: &Certificate) -> String {
    let mut obj = match payload {
        Value::Object(obj) => obj,
        other => {
            let mut obj = Map::new();
            if !other.is_null() {
                obj.insert("submitted".to_string(), other);
            }
            obj
        }
    };

    obj.insert(
        "certificate_id".to_string(),
        Value::String(cert.certificate_id.clone()),
    );
    obj.insert(
        "qr_code_url".to_string(),
        Value::String(cert.qr_code_image_path.clone()),
    );

    Value::Object(obj).to_string()
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::identity::Role;
    use crate::objectstore::{MemoryObjectStore, ObjectStore};
    use crate::qr::QrBinder;
    use crate::storage::NewEvent;

    fn super_admin() -> Identity {
        Identity {
            user_id: "root-1".to_string(),
            role: Role::SuperAdmin,
        }
    }

    async fn workflow() -> (IncomingWorkflow, CertDatabase) {
        let db = CertDatabase::open_in_memory().await.unwrap();
        db.create_event(&NewEvent {
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

        (
            IncomingWorkflow::new(db.clone(), minter, Notifier::disabled()),
            db,
        )
    }

    #[tokio::test]
    async fn stage_unknown_event_is_not_found() {
        let (wf, _db) = workflow().await;

        let err = wf
            .stage("bizcom24", "delegates", &[json!({"name": "Jane"})])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn approve_mints_once_and_writes_back() {
        let (wf, db) = workflow().await;
        wf.stage(
            "mun24",
            "delegates",
            &[json!({"name": "Jane Doe", "award_type": "Best Delegate", "sheet_row_id": 7})],
        )
        .await
        .unwrap();
        let id = db.list_incoming("pending").await.unwrap()[0].id.clone();

        let cert = wf.approve(&id, &super_admin()).await.unwrap();
        assert_eq!(cert.participant_name, "Jane Doe");
        assert_eq!(cert.certificate_type, "Best Delegate");
        assert_eq!(cert.created_by.as_deref(), Some("root-1"));

        let row = db.get_incoming(&id).await.unwrap();
        assert_eq!(row.status, "accepted");
        assert!(row.processed_at.is_some());

        // The payload now carries the minted identifier for export
        let payload: Value = serde_json::from_str(&row.payload).unwrap();
        assert_eq!(payload["certificate_id"], cert.certificate_id.as_str());
        assert_eq!(payload["qr_code_url"], cert.qr_code_image_path.as_str());

        // Re-approval must not mint a second certificate
        let err = wf.approve(&id, &super_admin()).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        let all = db
            .list_certificates(&crate::storage::CertificateFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn approve_defaults_type_when_payload_has_none() {
        let (wf, db) = workflow().await;
        wf.stage("mun24", "delegates", &[json!({"participant_name": "Jane"})])
            .await
            .unwrap();
        let id = db.list_incoming("pending").await.unwrap()[0].id.clone();

        let cert = wf.approve(&id, &super_admin()).await.unwrap();
        assert_eq!(cert.certificate_type, "MUN Participant");
        assert_eq!(cert.school, "N/A");
    }

    #[tokio::test]
    async fn approve_without_participant_leaves_row_pending() {
        let (wf, db) = workflow().await;
        wf.stage("mun24", "delegates", &[json!({"school": "Springfield High"})])
            .await
            .unwrap();
        let id = db.list_incoming("pending").await.unwrap()[0].id.clone();

        let err = wf.approve(&id, &super_admin()).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        // Not silently marked accepted
        let row = db.get_incoming(&id).await.unwrap();
        assert_eq!(row.status, "pending");
    }

    #[tokio::test]
    async fn reject_is_pending_only_and_records_reason() {
        let (wf, db) = workflow().await;
        wf.stage("mun24", "delegates", &[json!({"name": "Jane"})])
            .await
            .unwrap();
        let id = db.list_incoming("pending").await.unwrap()[0].id.clone();

        let row = wf.reject(&id, None, &super_admin()).await.unwrap();
        assert_eq!(row.status, "rejected");
        assert_eq!(row.rejection_reason.as_deref(), Some("Rejected by admin"));

        // Terminal: a second reject is an explicit error, not a no-op
        let err = wf
            .reject(&id, Some("again".to_string()), &super_admin())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn export_returns_accepted_rows_with_minted_ids() {
        let (wf, db) = workflow().await;
        wf.stage(
            "mun24",
            "delegates",
            &[
                json!({"name": "Jane", "sheet_row_id": 7}),
                json!({"name": "John", "sheet_row_id": 8}),
            ],
        )
        .await
        .unwrap();

        let pending = db.list_incoming("pending").await.unwrap();
        // Approve only one of the two
        let approved_id = pending
            .iter()
            .find(|r| r.payload.contains("Jane"))
            .unwrap()
            .id
            .clone();
        let cert = wf.approve(&approved_id, &super_admin()).await.unwrap();

        let rows = wf.export("mun24", "delegates").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sheet_row_id, Some(json!(7)));
        assert_eq!(rows[0].participant_name.as_deref(), Some("Jane"));
        assert_eq!(
            rows[0].certificate_id.as_deref(),
            Some(cert.certificate_id.as_str())
        );
        assert!(rows[0].qr_code_url.is_some());

        assert!(matches!(
            wf.export("unknown", "delegates").await,
            Err(ApiError::NotFound(_))
        ));
    }
}
