use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::crypto;
use crate::error::ApiError;
use crate::jwt::{self, ConfirmClaims};
use crate::secret;
use crate::server::SharedState;

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    #[serde(rename = "challengeResponse")]
    pub challenge_response: String,
}

/// `POST /confirm` — verify possession of the signing key and promote the
/// record from `init` to `verified`.
pub async fn confirm(
    State(state): State<Arc<SharedState>>,
    Json(req): Json<ConfirmRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let peeked: ConfirmClaims = jwt::peek_claims(&req.challenge_response)
        .map_err(|e| ApiError::Auth(e.to_string()))?;

    let record = state
        .store
        .get_by_id(&peeked.id)
        .map_err(ApiError::Store)?
        .ok_or_else(|| ApiError::NotFound("not found".to_string()))?;

    let box_secret = state.keys.box_secret_key().map_err(ApiError::Internal)?;
    let hmac_secret = secret::recover_record_secret(&record, &box_secret)
        .map_err(|_| ApiError::Auth("secret did not decrypt".to_string()))?;

    let claims: ConfirmClaims = jwt::verify_hmac(&req.challenge_response, &hmac_secret)
        .map_err(|e| ApiError::Auth(e.to_string()))?;

    let signing_pubkey = crypto::base64url_decode(&record.signing_pubkey)
        .map_err(|_| ApiError::SignatureInvalid("signature does not verify".to_string()))?;
    let sig_bytes = crypto::base64url_decode(&claims.signature)
        .map_err(|_| ApiError::SignatureInvalid("signature does not verify".to_string()))?;
    let challenge_hash = crypto::sha256(record.challenge.as_bytes());

    if !crypto::verify_ed25519(&signing_pubkey, &challenge_hash, &sig_bytes) {
        return Err(ApiError::SignatureInvalid("signature does not verify".to_string()));
    }

    state.store.mark_verified(&record.id).map_err(ApiError::Store)?;
    state.chain.append(&record.id, &record.document);

    tracing::info!(id = %record.id, "identity verified");

    Ok((StatusCode::CREATED, Json(json!({ "success": "true", "id": record.id }))))
}
