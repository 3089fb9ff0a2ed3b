//! Incoming-certificate staging rows and the secrets store.

use certhub_core::db::{DatabaseError, unix_timestamp};

use super::db::CertDatabase;
use super::models::{IncomingCertificate, Secret};

impl CertDatabase {
    // =========================================================================
    // Incoming staging rows
    // =========================================================================

    /// Stage externally-submitted rows for an event section, all-or-nothing.
    ///
    /// Each payload is stored verbatim as JSON with status `pending`; the
    /// content is opaque until approval.
    pub async fn stage_incoming(
        &self,
        event_id: &str,
        section: &str,
        payloads: &[serde_json::Value],
    ) -> Result<u64, DatabaseError> {
        let now = unix_timestamp();
        let mut tx = self.pool().begin().await?;

        for payload in payloads {
            let id = uuid::Uuid::new_v4().to_string();
            let payload_json =
                serde_json::to_string(payload).map_err(|e| DatabaseError::Query(e.to_string()))?;

            sqlx::query(
                "INSERT INTO incoming_certificates (id, event_id, section, payload, status, created_at) \
                 VALUES (?, ?, ?, ?, 'pending', ?)",
            )
            .bind(&id)
            .bind(event_id)
            .bind(section)
            .bind(&payload_json)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(payloads.len() as u64)
    }

    /// Get an incoming row by ID.
    pub async fn get_incoming(&self, id: &str) -> Result<IncomingCertificate, DatabaseError> {
        sqlx::query_as::<_, IncomingCertificate>(
            "SELECT * FROM incoming_certificates WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Incoming certificate {id}")))
    }

    /// List incoming rows with the given status, newest first.
    pub async fn list_incoming(
        &self,
        status: &str,
    ) -> Result<Vec<IncomingCertificate>, DatabaseError> {
        let rows = sqlx::query_as::<_, IncomingCertificate>(
            "SELECT * FROM incoming_certificates WHERE status = ? ORDER BY created_at DESC",
        )
        .bind(status)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    /// Transition a pending row to `accepted`, updating its payload with the
    /// minted certificate fields. Returns `false` if the row was not pending.
    pub async fn mark_incoming_accepted(
        &self,
        id: &str,
        payload_json: &str,
        processed_at: &str,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE incoming_certificates SET status = 'accepted', payload = ?, processed_at = ? \
             WHERE id = ? AND status = 'pending'",
        )
        .bind(payload_json)
        .bind(processed_at)
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Transition a pending row to `rejected` with a reason. Returns `false`
    /// if the row was not pending.
    pub async fn mark_incoming_rejected(
        &self,
        id: &str,
        reason: &str,
        processed_at: &str,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE incoming_certificates SET status = 'rejected', rejection_reason = ?, \
             processed_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(reason)
        .bind(processed_at)
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List accepted rows for an event section, oldest first (export order).
    pub async fn list_accepted_incoming(
        &self,
        event_id: &str,
        section: &str,
    ) -> Result<Vec<IncomingCertificate>, DatabaseError> {
        let rows = sqlx::query_as::<_, IncomingCertificate>(
            "SELECT * FROM incoming_certificates WHERE event_id = ? AND section = ? \
             AND status = 'accepted' ORDER BY created_at ASC",
        )
        .bind(event_id)
        .bind(section)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    // =========================================================================
    // Secrets (runtime-mutable configuration)
    // =========================================================================

    /// Get a secret value by key.
    pub async fn get_secret(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let secret = sqlx::query_as::<_, Secret>("SELECT * FROM secrets WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool())
            .await?;

        Ok(secret.map(|s| s.value))
    }

    /// Insert or update a secret.
    pub async fn upsert_secret(
        &self,
        key: &str,
        value: &str,
        description: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO secrets (key, value, description, updated_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, \
             description = COALESCE(excluded.description, secrets.description), \
             updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(description)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
