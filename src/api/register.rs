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

/// `POST /register` — validate a fresh document and issue a challenge.
pub async fn register(
    State(state): State<Arc<SharedState>>,
    Json(req): Json<RegistrationRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let box_secret = state
        .keys
        .box_secret_key()
        .map_err(ApiError::Internal)?;
    let contexts = state.keys.recognized_contexts();

    let accepted = document::validate(
        &req,
        &contexts,
        state.test_mode,
        SecretCheck::Require {
            service_secret_key: &box_secret,
        },
    )
    .map_err(ValidationError)?;

    let challenge = generate_challenge();
    let id = accepted.document.id.clone();

    state
        .store
        .insert(NewRecord {
            id: id.clone(),
            root: id.clone(),
            document: accepted.document.raw,
            signing_pubkey: crate::crypto::base64url_encode(&accepted.document.signing_pubkey),
            encrypting_pubkey: crate::crypto::base64url_encode(&accepted.document.encrypting_pubkey),
            secret_ciphertext: req.secret.ciphertext,
            secret_nonce: req.secret.nonce,
            secret_master_pubkey: state.keys.box_public.clone(),
            challenge: challenge.clone(),
            status: Status::Init,
            supersedes: None,
            agent_id: None,
        })
        .map_err(ApiError::Store)?;

    tracing::info!(id = %id, "registration accepted, awaiting confirm");

    Ok((StatusCode::OK, Json(json!({ "id": id, "challenge": challenge }))))
}
