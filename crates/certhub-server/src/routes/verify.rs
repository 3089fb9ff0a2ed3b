//! Public verification endpoint.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;

use super::AppState;
use crate::verification::RequestContext;

/// `GET /verify/{certificate_id}`
///
/// The one endpoint with a bit-exact public contract; status codes and body
/// shape come from the verification service itself.
pub async fn verify_certificate(
    Path(certificate_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let ctx = RequestContext::from_headers(&headers);
    let response = state.verification.verify(&certificate_id, &ctx).await;
    (response.http_status(), Json(response))
}
