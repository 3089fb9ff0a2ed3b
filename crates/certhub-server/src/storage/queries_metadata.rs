//! Sparse certificate metadata and verification-log queries.

use certhub_core::db::DatabaseError;
use serde::{Deserialize, Serialize};

use super::db::CertDatabase;
use super::models::CertificateMetadata;

/// One sparse key/value attribute to attach to a certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub field_name: String,
    /// String-encoded value; `array`/`json` kinds hold serialized JSON.
    pub field_value: String,
    pub field_type: String,
}

impl CertDatabase {
    // =========================================================================
    // Certificate metadata
    // =========================================================================

    /// Insert metadata rows for a certificate (by storage row id).
    pub async fn insert_metadata(
        &self,
        certificate_row_id: &str,
        entries: &[MetadataEntry],
    ) -> Result<(), DatabaseError> {
        for entry in entries {
            let id = uuid::Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO certificate_metadata (id, certificate_id, field_name, field_value, field_type) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(certificate_row_id)
            .bind(&entry.field_name)
            .bind(&entry.field_value)
            .bind(&entry.field_type)
            .execute(self.pool())
            .await?;
        }

        Ok(())
    }

    /// List metadata rows for a certificate.
    pub async fn list_metadata(
        &self,
        certificate_row_id: &str,
    ) -> Result<Vec<CertificateMetadata>, DatabaseError> {
        let rows = sqlx::query_as::<_, CertificateMetadata>(
            "SELECT * FROM certificate_metadata WHERE certificate_id = ? ORDER BY field_name",
        )
        .bind(certificate_row_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    /// Replace a certificate's metadata wholesale (delete-all, insert-new).
    pub async fn replace_metadata(
        &self,
        certificate_row_id: &str,
        entries: &[MetadataEntry],
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM certificate_metadata WHERE certificate_id = ?")
            .bind(certificate_row_id)
            .execute(&mut *tx)
            .await?;

        for entry in entries {
            let id = uuid::Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO certificate_metadata (id, certificate_id, field_name, field_value, field_type) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(certificate_row_id)
            .bind(&entry.field_name)
            .bind(&entry.field_value)
            .bind(&entry.field_type)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    // =========================================================================
    // Verification log (append-only)
    // =========================================================================

    /// Append a verification-log row for a certificate (by storage row id).
    pub async fn insert_verification_log(
        &self,
        certificate_row_id: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
        verified_at: &str,
    ) -> Result<(), DatabaseError> {
        let id = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO verification_logs (id, certificate_id, ip_address, user_agent, verified_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(certificate_row_id)
        .bind(ip_address)
        .bind(user_agent)
        .bind(verified_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Count verification-log rows for a certificate.
    pub async fn count_verification_logs(
        &self,
        certificate_row_id: &str,
    ) -> Result<i64, DatabaseError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM verification_logs WHERE certificate_id = ?")
                .bind(certificate_row_id)
                .fetch_one(self.pool())
                .await?;

        Ok(row.0)
    }
}
