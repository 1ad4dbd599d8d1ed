use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use crate::crypto;
use crate::error::ApiError;
use crate::jwt::{self, ConfirmClaims};
use crate::secret;
use crate::server::SharedState;

use super::confirm::ConfirmRequest;

/// `POST /confirmSupersede` — same JWT shape as `/confirm`, but the HMAC key
/// comes from the root's stored secret: the client proves control of the new
/// key-pair via the inner signature, but authenticates via the root's
/// existing secret channel.
pub async fn confirm_supersede(
    State(state): State<Arc<SharedState>>,
    Json(req): Json<ConfirmRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let peeked: ConfirmClaims = jwt::peek_claims(&req.challenge_response)
        .map_err(|e| ApiError::Auth(e.to_string()))?;

    let new_record = state
        .store
        .get_by_id(&peeked.id)
        .map_err(ApiError::Store)?
        .ok_or_else(|| ApiError::NotFound("not found".to_string()))?;

    let root_record = state
        .store
        .get_by_id(&new_record.root)
        .map_err(ApiError::Store)?
        .ok_or_else(|| ApiError::NotFound("not found".to_string()))?;

    let box_secret = state.keys.box_secret_key().map_err(ApiError::Internal)?;
    let hmac_secret = secret::recover_record_secret(&root_record, &box_secret)
        .map_err(|_| ApiError::Auth("secret did not decrypt".to_string()))?;

    let claims: ConfirmClaims = jwt::verify_hmac(&req.challenge_response, &hmac_secret)
        .map_err(|e| ApiError::Auth(e.to_string()))?;

    let signing_pubkey = crypto::base64url_decode(&new_record.signing_pubkey)
        .map_err(|_| ApiError::SignatureInvalid("signature does not verify".to_string()))?;
    let sig_bytes = crypto::base64url_decode(&claims.signature)
        .map_err(|_| ApiError::SignatureInvalid("signature does not verify".to_string()))?;
    let challenge_hash = crypto::sha256(new_record.challenge.as_bytes());

    if !crypto::verify_ed25519(&signing_pubkey, &challenge_hash, &sig_bytes) {
        return Err(ApiError::SignatureInvalid("signature does not verify".to_string()));
    }

    let predecessor_id = new_record
        .supersedes
        .clone()
        .ok_or_else(|| ApiError::NotFound("not found".to_string()))?;

    state
        .store
        .confirm_supersede(&predecessor_id, &new_record.id)
        .map_err(|e| match e {
            crate::store::StoreError::SerializationConflict => {
                ApiError::Conflict("item to supersede not active".to_string())
            }
            other => ApiError::Store(other),
        })?;

    tracing::info!(id = %new_record.id, supersedes = %predecessor_id, "supersede confirmed");

    Ok((StatusCode::CREATED, Json(json!({ "success": "true", "id": new_record.id }))))
}
