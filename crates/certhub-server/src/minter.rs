//! Certificate minting: normalization, validation, identifier resolution,
//! QR binding, and persistence.
//!
//! Used by manual creation, bulk import, and incoming-row approval. Bulk
//! callers isolate per-item failures; single-item callers propagate the
//! first error.

use certhub_core::{id, taxonomy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::qr::QrBinder;
use crate::storage::{Certificate, CertDatabase, Event, MetadataEntry, NewCertificate};

/// Probe cap for the uniqueness resolver. Hitting it signals systemic data
/// problems, not normal operation.
const UNIQUENESS_PROBE_CAP: usize = 10_000;

/// Raw certificate fields as submitted by a caller. Any award name is
/// acceptable; recognized side fields and `custom_fields` become metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MintRequest {
    #[serde(default)]
    pub certificate_type: String,
    #[serde(default)]
    pub participant_name: Option<String>,
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub date_issued: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub committee: Option<String>,
    #[serde(default)]
    pub segment: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub team_members: Option<Vec<String>>,
    #[serde(default)]
    pub custom_fields: Option<serde_json::Map<String, Value>>,
}

/// One successfully imported item in a bulk report.
#[derive(Debug, Serialize)]
pub struct BulkSuccess {
    pub index: usize,
    pub certificate_id: String,
    pub participant_name: String,
    pub qr_code_image_url: String,
}

/// One failed item in a bulk report.
#[derive(Debug, Serialize)]
pub struct BulkError {
    pub index: usize,
    pub participant_name: String,
    pub error: String,
}

/// Outcome of a bulk import; partial failure is reported, never raised.
#[derive(Debug, Default, Serialize)]
pub struct BulkReport {
    pub success: Vec<BulkSuccess>,
    pub errors: Vec<BulkError>,
}

#[derive(Clone)]
pub struct CertificateMinter {
    db: CertDatabase,
    qr: QrBinder,
}

/// Fields after normalization and default application.
struct NormalizedFields {
    certificate_type: String,
    participant_name: String,
    school: String,
    date_issued: String,
    country: Option<String>,
}

impl CertificateMinter {
    pub const fn new(db: CertDatabase, qr: QrBinder) -> Self {
        Self { db, qr }
    }

    /// Mint one certificate for an event.
    ///
    /// A store uniqueness conflict (two writers racing on the same candidate
    /// identifier) triggers exactly one regeneration + retry.
    pub async fn mint(
        &self,
        event: &Event,
        request: &MintRequest,
        created_by: Option<&str>,
    ) -> Result<Certificate, ApiError> {
        let fields = normalize(request)?;

        let base = id::generate(
            &event.event_code,
            event.year,
            &fields.participant_name,
            &fields.school,
        );
        let certificate_id = self.ensure_unique(&base).await?;

        match self
            .insert(event, &certificate_id, &fields, request, created_by)
            .await
        {
            Err(ApiError::Conflict(_)) => {
                warn!(
                    certificate_id = %certificate_id,
                    "Identifier lost an insert race; regenerating"
                );
                let base = id::generate(
                    &event.event_code,
                    event.year,
                    &fields.participant_name,
                    &fields.school,
                );
                let certificate_id = self.ensure_unique(&base).await?;
                self.insert(event, &certificate_id, &fields, request, created_by)
                    .await
            }
            other => other,
        }
    }

    /// Mint a batch, item by item. A failure on one item never prevents the
    /// next; each failure is recorded against its index.
    pub async fn mint_batch(
        &self,
        event: &Event,
        items: &[MintRequest],
        created_by: Option<&str>,
    ) -> BulkReport {
        let mut report = BulkReport::default();

        for (index, item) in items.iter().enumerate() {
            let participant_name = item
                .participant_name
                .clone()
                .unwrap_or_else(|| "Unknown".to_string());

            match self.mint(event, item, created_by).await {
                Ok(cert) => report.success.push(BulkSuccess {
                    index,
                    certificate_id: cert.certificate_id,
                    participant_name: cert.participant_name,
                    qr_code_image_url: cert.qr_code_image_path,
                }),
                Err(e) => report.errors.push(BulkError {
                    index,
                    participant_name,
                    error: e.to_string(),
                }),
            }
        }

        report
    }

    /// Resolve a candidate identifier to one that is free in the store,
    /// appending `-1`, `-2`, ... until the probe comes back empty.
    ///
    /// A probe error is treated as free: blocking issuance indefinitely is
    /// worse than a theoretically racy insert, which the store's uniqueness
    /// constraint rejects anyway.
    pub async fn ensure_unique(&self, base: &str) -> Result<String, ApiError> {
        let mut candidate = base.to_string();

        for n in 1..=UNIQUENESS_PROBE_CAP {
            match self.db.certificate_id_exists(&candidate).await {
                Ok(false) => return Ok(candidate),
                Ok(true) => candidate = format!("{base}-{n}"),
                Err(e) => {
                    warn!(
                        error = %e,
                        candidate = %candidate,
                        "Uniqueness probe failed; treating candidate as free"
                    );
                    return Ok(candidate);
                }
            }
        }

        Err(ApiError::Dependency(format!(
            "No free certificate identifier after {UNIQUENESS_PROBE_CAP} probes (base {base})"
        )))
    }

    /// Bind the QR, insert the certificate row, then its metadata rows.
    ///
    /// The QR upload runs first so a failed upload aborts before any row
    /// exists. A metadata insert failure after the row insert leaves a
    /// metadata-less certificate behind; there is no cross-step transaction.
    async fn insert(
        &self,
        event: &Event,
        certificate_id: &str,
        fields: &NormalizedFields,
        request: &MintRequest,
        created_by: Option<&str>,
    ) -> Result<Certificate, ApiError> {
        let binding = self.qr.bind(certificate_id).await?;

        let row_id = uuid::Uuid::new_v4().to_string();
        let cert = self
            .db
            .create_certificate(&NewCertificate {
                id: &row_id,
                certificate_id,
                event_id: &event.id,
                certificate_type: &fields.certificate_type,
                participant_name: &fields.participant_name,
                school: &fields.school,
                date_issued: &fields.date_issued,
                qr_code_data: &binding.verification_url,
                qr_code_image_path: &binding.image_url,
                created_by,
            })
            .await?;

        let entries = metadata_entries(fields, request);
        if !entries.is_empty() {
            self.db.insert_metadata(&cert.id, &entries).await?;
        }

        info!(
            certificate_id = %cert.certificate_id,
            event_code = %event.event_code,
            certificate_type = %cert.certificate_type,
            category = ?taxonomy::award_category(&cert.certificate_type),
            "Certificate minted"
        );

        Ok(cert)
    }
}

/// Normalize the raw request: canonicalize the type, apply the default-value
/// policy, clean the country field, and enforce required fields.
fn normalize(request: &MintRequest) -> Result<NormalizedFields, ApiError> {
    let certificate_type = taxonomy::normalize_type(&request.certificate_type);

    let participant_name = request
        .participant_name
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_string();
    let school = normalize_school(request.school.as_deref());
    let date_issued = normalize_date(request.date_issued.as_deref());
    let country = request.country.as_deref().map(clean_country);

    let missing: Vec<&str> = taxonomy::required_fields(&certificate_type)
        .into_iter()
        .filter(|field| !has_field(request, &participant_name, field))
        .collect();

    if !missing.is_empty() {
        return Err(ApiError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    Ok(NormalizedFields {
        certificate_type,
        participant_name,
        school,
        date_issued,
        country,
    })
}

fn has_field(request: &MintRequest, participant_name: &str, field: &str) -> bool {
    let direct = match field {
        "participant_name" => return !participant_name.is_empty(),
        "school" => request.school.as_deref(),
        "date_issued" => request.date_issued.as_deref(),
        "country" => request.country.as_deref(),
        "committee" => request.committee.as_deref(),
        "segment" => request.segment.as_deref(),
        "team_name" => request.team_name.as_deref(),
        _ => None,
    };

    if direct.is_some_and(|v| !v.trim().is_empty()) {
        return true;
    }

    request
        .custom_fields
        .as_ref()
        .is_some_and(|fields| fields.get(field).is_some_and(|v| !v.is_null()))
}

/// Missing, empty, or the literal string "null" becomes "N/A".
fn normalize_school(school: Option<&str>) -> String {
    match school.map(str::trim) {
        None | Some("" | "null") => "N/A".to_string(),
        Some(s) => s.to_string(),
    }
}

/// Missing or malformed dates default to today (`YYYY-MM-DD`).
fn normalize_date(date: Option<&str>) -> String {
    match date.map(str::trim) {
        Some(d) if is_iso_date(d) => d.to_string(),
        _ => certhub_core::db::today_iso(),
    }
}

fn is_iso_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| matches!(i, 4 | 7) || b.is_ascii_digit())
}

/// Strip leading row numbers and trailing commas that sheet exports leave on
/// country cells; keep the original value if cleaning empties it.
fn clean_country(country: &str) -> String {
    let cleaned = country
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_end_matches(',')
        .trim();

    if cleaned.is_empty() {
        country.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Decompose recognized side fields plus `custom_fields` into metadata rows.
fn metadata_entries(fields: &NormalizedFields, request: &MintRequest) -> Vec<MetadataEntry> {
    let mut entries = Vec::new();

    let mut push_text = |name: &str, value: Option<&str>| {
        if let Some(v) = value {
            if !v.trim().is_empty() {
                entries.push(MetadataEntry {
                    field_name: name.to_string(),
                    field_value: v.to_string(),
                    field_type: "text".to_string(),
                });
            }
        }
    };

    push_text("country", fields.country.as_deref());
    push_text("committee", request.committee.as_deref());
    push_text("segment", request.segment.as_deref());
    push_text("team_name", request.team_name.as_deref());

    if let Some(members) = &request.team_members {
        if let Ok(serialized) = serde_json::to_string(members) {
            entries.push(MetadataEntry {
                field_name: "team_members".to_string(),
                field_value: serialized,
                field_type: "array".to_string(),
            });
        }
    }

    if let Some(custom) = &request.custom_fields {
        for (key, value) in custom {
            let (field_value, field_type) = match value {
                Value::String(s) => (s.clone(), "text"),
                Value::Object(_) | Value::Array(_) => (value.to_string(), "json"),
                other => (other.to_string(), "text"),
            };
            entries.push(MetadataEntry {
                field_name: key.clone(),
                field_value,
                field_type: field_type.to_string(),
            });
        }
    }

    entries
}
