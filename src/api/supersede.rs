use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use crate::document::{self, RegistrationRequest, SecretCheck};
use crate::error::{ApiError, ValidationError};
use crate::server::SharedState;
use crate::store::{NewRecord, Status};

use super::generate_challenge;

/// `POST /supersede` — register a replacement document for an existing,
/// verified identity. Secret decryption is not required: the new record
/// reuses no new secret channel by design, the predecessor's does.
pub async fn supersede(
    State(state): State<Arc<SharedState>>,
    Json(req): Json<RegistrationRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let contexts = state.keys.recognized_contexts();
    let accepted = document::validate(&req, &contexts, state.test_mode, SecretCheck::Skip)
        .map_err(ValidationError)?;

    let predecessor_id = req
        .supersedes
        .clone()
        .ok_or_else(|| ApiError::Malformed("supersedes is required".to_string()))?;

    let predecessor = state
        .store
        .get_by_id(&predecessor_id)
        .map_err(ApiError::Store)?
        .ok_or_else(|| ApiError::BadRequest("item to supersede not found".to_string()))?;

    if predecessor.status != Status::Verified {
        return Err(ApiError::Conflict("item to supersede not active".to_string()));
    }

    let challenge = generate_challenge();
    let id = accepted.document.id.clone();

    state
        .store
        .insert(NewRecord {
            id: id.clone(),
            root: predecessor.root.clone(),
            document: accepted.document.raw,
            signing_pubkey: crate::crypto::base64url_encode(&accepted.document.signing_pubkey),
            encrypting_pubkey: crate::crypto::base64url_encode(&accepted.document.encrypting_pubkey),
            secret_ciphertext: String::new(),
            secret_nonce: String::new(),
            secret_master_pubkey: state.keys.box_public.clone(),
            challenge: challenge.clone(),
            status: Status::Init,
            supersedes: Some(predecessor_id.clone()),
            agent_id: None,
        })
        .map_err(ApiError::Store)?;

    tracing::info!(id = %id, supersedes = %predecessor_id, "supersede accepted, awaiting confirm");

    Ok((StatusCode::OK, Json(json!({ "id": id, "challenge": challenge }))))
}
