//! Data models for CertHub storage.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: String,
    pub event_code: String,
    pub event_name: String,
    pub year: i64,
    pub month: i64,
    pub session: i64,
    pub event_type: String,
    pub created_by: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Certificate {
    pub id: String,
    /// Public short identifier, immutable after creation.
    pub certificate_id: String,
    pub event_id: String,
    pub certificate_type: String,
    pub participant_name: String,
    pub school: String,
    pub date_issued: String,
    pub status: String,
    pub revoked_at: Option<String>,
    pub revoked_by: Option<String>,
    pub revoked_reason: Option<String>,
    pub qr_code_data: String,
    pub qr_code_image_path: String,
    pub pdf_storage_path: Option<String>,
    pub pdf_available: i64,
    pub verification_count: i64,
    pub last_verified_at: Option<String>,
    pub created_by: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CertificateMetadata {
    pub id: String,
    /// Storage row id of the owning certificate (not the public identifier).
    pub certificate_id: String,
    pub field_name: String,
    pub field_value: String,
    pub field_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IncomingCertificate {
    pub id: String,
    pub event_id: String,
    pub section: String,
    /// Opaque JSON submission from the external source.
    pub payload: String,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub processed_at: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VerificationLog {
    pub id: String,
    pub certificate_id: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub verified_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Secret {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub updated_at: i64,
}
