use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::jwt::{self, RevokeClaims};
use crate::secret;
use crate::server::SharedState;

#[derive(Debug, Deserialize)]
pub struct RevokeRequestBody {
    #[serde(rename = "revokeRequest")]
    pub revoke_request: String,
}

/// `POST /revoke` — JWT-only, keyed by the root's secret. No second
/// Ed25519 signature is required: by the time a caller holds the root
/// secret they have already proven control of the original registration's
/// private channel.
pub async fn revoke(
    State(state): State<Arc<SharedState>>,
    Json(req): Json<RevokeRequestBody>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let peeked: RevokeClaims = jwt::peek_claims(&req.revoke_request)
        .map_err(|e| ApiError::Auth(e.to_string()))?;

    let record = state
        .store
        .get_by_id(&peeked.id)
        .map_err(ApiError::Store)?
        .ok_or_else(|| ApiError::NotFound("not found".to_string()))?;

    let root_record = state
        .store
        .get_by_id(&record.root)
        .map_err(ApiError::Store)?
        .ok_or_else(|| ApiError::NotFound("not found".to_string()))?;

    let box_secret = state.keys.box_secret_key().map_err(ApiError::Internal)?;
    let hmac_secret = secret::recover_record_secret(&root_record, &box_secret)
        .map_err(|_| ApiError::Auth("secret did not decrypt".to_string()))?;

    let _claims: RevokeClaims = jwt::verify_hmac(&req.revoke_request, &hmac_secret)
        .map_err(|e| ApiError::Auth(e.to_string()))?;

    state.store.mark_revoked(&record.id).map_err(ApiError::Store)?;

    tracing::info!(id = %record.id, "identity revoked");

    Ok(Json(json!({ "success": "true", "revoked": record.id })))
}
