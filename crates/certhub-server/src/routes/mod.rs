//! HTTP surface: router, shared state, and handlers.

mod certificates;
mod events;
mod incoming;
mod secrets;
mod verify;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::CorsLayer;

use crate::incoming::IncomingWorkflow;
use crate::minter::CertificateMinter;
use crate::notify::Notifier;
use crate::objectstore::ObjectStore;
use crate::storage::CertDatabase;
use crate::verification::VerificationService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: CertDatabase,
    pub minter: CertificateMinter,
    pub verification: VerificationService,
    pub incoming: IncomingWorkflow,
    pub store: Arc<dyn ObjectStore>,
    /// Bearer secret for the spreadsheet integration; when absent, the
    /// `sheets_webhook_secret` row of the secrets store is consulted.
    pub sheets_secret: Option<String>,
}

impl AppState {
    pub fn new(
        db: CertDatabase,
        minter: CertificateMinter,
        store: Arc<dyn ObjectStore>,
        notifier: Notifier,
        sheets_secret: Option<String>,
    ) -> Self {
        let verification = VerificationService::new(db.clone());
        let incoming = IncomingWorkflow::new(db.clone(), minter.clone(), notifier);
        Self {
            db,
            minter,
            verification,
            incoming,
            store,
            sheets_secret,
        }
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/verify/{certificate_id}", get(verify::verify_certificate))
        .route("/api/events", get(events::list).post(events::create))
        .route("/api/events/{id}", get(events::get_by_id).put(events::update))
        .route(
            "/api/certificates",
            get(certificates::list).post(certificates::create),
        )
        .route("/api/certificates/bulk-import", post(certificates::bulk_import))
        .route(
            "/api/certificates/{id}",
            get(certificates::get_by_id).put(certificates::update),
        )
        .route("/api/certificates/{id}/revoke", post(certificates::revoke))
        .route(
            "/api/certificates/{id}/metadata",
            put(certificates::replace_metadata),
        )
        .route("/api/certificates/{id}/qr-code", get(certificates::qr_code))
        .route(
            "/api/incoming-certificates",
            get(incoming::list).post(incoming::stage),
        )
        .route("/api/incoming-certificates/export", get(incoming::export))
        .route(
            "/api/incoming-certificates/{id}/approve",
            post(incoming::approve),
        )
        .route(
            "/api/incoming-certificates/{id}/reject",
            post(incoming::reject),
        )
        .route("/api/secrets/{key}", put(secrets::upsert))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
