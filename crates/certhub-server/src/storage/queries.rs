//! Event and certificate queries for the CertHub server.

use certhub_core::db::{DatabaseError, unix_timestamp};
use serde::Deserialize;

use super::db::CertDatabase;
use super::models::{Certificate, Event};

/// Parameters for inserting an event.
#[derive(Debug, Clone)]
pub struct NewEvent<'a> {
    pub id: &'a str,
    pub event_code: &'a str,
    pub event_name: &'a str,
    pub year: i64,
    pub month: i64,
    pub session: i64,
    pub event_type: &'a str,
    pub created_by: Option<&'a str>,
}

/// Editable event fields; `None` leaves the stored value unchanged.
/// `event_code` is deliberately absent -- minted identifiers embed it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPatch {
    pub event_name: Option<String>,
    pub year: Option<i64>,
    pub month: Option<i64>,
    pub session: Option<i64>,
    pub event_type: Option<String>,
}

/// Parameters for inserting a certificate row.
#[derive(Debug, Clone)]
pub struct NewCertificate<'a> {
    pub id: &'a str,
    pub certificate_id: &'a str,
    pub event_id: &'a str,
    pub certificate_type: &'a str,
    pub participant_name: &'a str,
    pub school: &'a str,
    pub date_issued: &'a str,
    pub qr_code_data: &'a str,
    pub qr_code_image_path: &'a str,
    pub created_by: Option<&'a str>,
}

/// Editable certificate fields; `None` leaves the stored value unchanged.
/// The public `certificate_id` is immutable and cannot be patched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CertificateUpdate {
    pub certificate_type: Option<String>,
    pub participant_name: Option<String>,
    pub school: Option<String>,
    pub date_issued: Option<String>,
    pub pdf_storage_path: Option<String>,
    pub pdf_available: Option<bool>,
}

/// Filters for listing certificates; all optional, combined with AND.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CertificateFilter {
    pub event_id: Option<String>,
    pub certificate_type: Option<String>,
    pub status: Option<String>,
    /// Substring match on participant name, public identifier, or school.
    pub search: Option<String>,
}

impl CertDatabase {
    // =========================================================================
    // Event queries
    // =========================================================================

    /// Create a new event.
    pub async fn create_event(&self, params: &NewEvent<'_>) -> Result<Event, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO events (id, event_code, event_name, year, month, session, event_type, created_by, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(params.id)
        .bind(params.event_code)
        .bind(params.event_name)
        .bind(params.year)
        .bind(params.month)
        .bind(params.session)
        .bind(params.event_type)
        .bind(params.created_by)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_event(params.id).await
    }

    /// Get an event by ID.
    pub async fn get_event(&self, id: &str) -> Result<Event, DatabaseError> {
        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Event {id}")))
    }

    /// Find an event by its unique code.
    pub async fn get_event_by_code(&self, event_code: &str) -> Result<Option<Event>, DatabaseError> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE event_code = ?")
            .bind(event_code)
            .fetch_optional(self.pool())
            .await?;

        Ok(event)
    }

    /// List all events, newest first.
    pub async fn list_events(&self) -> Result<Vec<Event>, DatabaseError> {
        let events = sqlx::query_as::<_, Event>("SELECT * FROM events ORDER BY created_at DESC")
            .fetch_all(self.pool())
            .await?;

        Ok(events)
    }

    /// Check whether an event code is already taken.
    pub async fn event_code_exists(&self, event_code: &str) -> Result<bool, DatabaseError> {
        let row: (i64,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM events WHERE event_code = ?)")
                .bind(event_code)
                .fetch_one(self.pool())
                .await?;

        Ok(row.0 != 0)
    }

    /// Patch an event's editable fields and return the updated row.
    pub async fn update_event(&self, id: &str, patch: &EventPatch) -> Result<Event, DatabaseError> {
        sqlx::query(
            "UPDATE events SET \
             event_name = COALESCE(?, event_name), \
             year = COALESCE(?, year), \
             month = COALESCE(?, month), \
             session = COALESCE(?, session), \
             event_type = COALESCE(?, event_type) \
             WHERE id = ?",
        )
        .bind(patch.event_name.as_deref())
        .bind(patch.year)
        .bind(patch.month)
        .bind(patch.session)
        .bind(patch.event_type.as_deref())
        .bind(id)
        .execute(self.pool())
        .await?;

        self.get_event(id).await
    }

    // =========================================================================
    // Certificate queries
    // =========================================================================

    /// Insert a certificate row (status `active`, zero verifications).
    ///
    /// A duplicate public identifier surfaces as `DatabaseError::Conflict`
    /// via the UNIQUE constraint on `certificate_id`.
    pub async fn create_certificate(
        &self,
        params: &NewCertificate<'_>,
    ) -> Result<Certificate, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO certificates (id, certificate_id, event_id, certificate_type, participant_name, \
             school, date_issued, qr_code_data, qr_code_image_path, created_by, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(params.id)
        .bind(params.certificate_id)
        .bind(params.event_id)
        .bind(params.certificate_type)
        .bind(params.participant_name)
        .bind(params.school)
        .bind(params.date_issued)
        .bind(params.qr_code_data)
        .bind(params.qr_code_image_path)
        .bind(params.created_by)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_certificate(params.id).await
    }

    /// Get a certificate by storage row ID.
    pub async fn get_certificate(&self, id: &str) -> Result<Certificate, DatabaseError> {
        sqlx::query_as::<_, Certificate>("SELECT * FROM certificates WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Certificate {id}")))
    }

    /// Find a certificate by its public identifier.
    pub async fn find_certificate_by_public_id(
        &self,
        certificate_id: &str,
    ) -> Result<Option<Certificate>, DatabaseError> {
        let cert =
            sqlx::query_as::<_, Certificate>("SELECT * FROM certificates WHERE certificate_id = ?")
                .bind(certificate_id)
                .fetch_optional(self.pool())
                .await?;

        Ok(cert)
    }

    /// Check whether a public identifier is already taken (uniqueness probe).
    pub async fn certificate_id_exists(
        &self,
        certificate_id: &str,
    ) -> Result<bool, DatabaseError> {
        let row: (i64,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM certificates WHERE certificate_id = ?)")
                .bind(certificate_id)
                .fetch_one(self.pool())
                .await?;

        Ok(row.0 != 0)
    }

    /// List certificates matching the given filters, newest first.
    pub async fn list_certificates(
        &self,
        filter: &CertificateFilter,
    ) -> Result<Vec<Certificate>, DatabaseError> {
        let mut builder =
            sqlx::QueryBuilder::<sqlx::Sqlite>::new("SELECT * FROM certificates WHERE 1 = 1");

        if let Some(event_id) = &filter.event_id {
            builder.push(" AND event_id = ").push_bind(event_id);
        }
        if let Some(certificate_type) = &filter.certificate_type {
            builder
                .push(" AND certificate_type = ")
                .push_bind(certificate_type);
        }
        if let Some(status) = &filter.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{search}%");
            builder
                .push(" AND (participant_name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR certificate_id LIKE ")
                .push_bind(pattern.clone())
                .push(" OR school LIKE ")
                .push_bind(pattern)
                .push(")");
        }

        builder.push(" ORDER BY created_at DESC");

        let certs = builder
            .build_query_as::<Certificate>()
            .fetch_all(self.pool())
            .await?;

        Ok(certs)
    }

    /// Patch a certificate's editable fields and return the updated row.
    pub async fn update_certificate(
        &self,
        id: &str,
        patch: &CertificateUpdate,
    ) -> Result<Certificate, DatabaseError> {
        sqlx::query(
            "UPDATE certificates SET \
             certificate_type = COALESCE(?, certificate_type), \
             participant_name = COALESCE(?, participant_name), \
             school = COALESCE(?, school), \
             date_issued = COALESCE(?, date_issued), \
             pdf_storage_path = COALESCE(?, pdf_storage_path), \
             pdf_available = COALESCE(?, pdf_available) \
             WHERE id = ?",
        )
        .bind(patch.certificate_type.as_deref())
        .bind(patch.participant_name.as_deref())
        .bind(patch.school.as_deref())
        .bind(patch.date_issued.as_deref())
        .bind(patch.pdf_storage_path.as_deref())
        .bind(patch.pdf_available.map(i64::from))
        .bind(id)
        .execute(self.pool())
        .await?;

        self.get_certificate(id).await
    }

    /// Revoke a certificate, recording who and why.
    pub async fn revoke_certificate(
        &self,
        id: &str,
        revoked_by: &str,
        reason: &str,
        revoked_at: &str,
    ) -> Result<Certificate, DatabaseError> {
        let result = sqlx::query(
            "UPDATE certificates SET status = 'revoked', revoked_at = ?, revoked_by = ?, \
             revoked_reason = ? WHERE id = ?",
        )
        .bind(revoked_at)
        .bind(revoked_by)
        .bind(reason)
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Certificate {id}")));
        }

        self.get_certificate(id).await
    }

    /// Record a successful public verification: bump the monotonic counter
    /// and stamp `last_verified_at`.
    pub async fn record_verification(
        &self,
        id: &str,
        verified_at: &str,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE certificates SET verification_count = verification_count + 1, \
             last_verified_at = ? WHERE id = ?",
        )
        .bind(verified_at)
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
