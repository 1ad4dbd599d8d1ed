use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::document::{self, RegistrationRequest, SecretCheck};
use crate::error::{ApiError, ValidationError};
use crate::jwt::{self, AgentRegisterClaims};
use crate::server::SharedState;
use crate::store::{NewRecord, Status};

#[derive(Debug, Deserialize)]
pub struct AgentRegisterRequest {
    pub agentkey: String,
    pub registration: String,
}

/// `POST /agentRegister` — a trusted caller submits a pre-signed, compound
/// registration, short-circuiting the challenge/confirm round-trip.
pub async fn agent_register(
    State(state): State<Arc<SharedState>>,
    Json(req): Json<AgentRegisterRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let agent_secret_b64 = state
        .keys
        .agent_keys
        .get(&req.agentkey)
        .ok_or_else(|| ApiError::Auth("agentkey not found".to_string()))?;
    let agent_secret = crate::crypto::base64url_decode(agent_secret_b64)
        .map_err(|_| ApiError::Internal(anyhow::anyhow!("malformed agent secret")))?;

    let claims: AgentRegisterClaims = jwt::verify_hmac(&req.registration, &agent_secret)
        .map_err(|e| ApiError::Auth(e.to_string()))?;

    let box_secret = state.keys.box_secret_key().map_err(ApiError::Internal)?;
    let contexts = state.keys.recognized_contexts();

    let inner = RegistrationRequest {
        did: claims.did,
        signature: claims.signature,
        secret: claims.secret,
        supersedes: None,
    };

    let accepted = document::validate(
        &inner,
        &contexts,
        state.test_mode,
        SecretCheck::Require {
            service_secret_key: &box_secret,
        },
    )
    .map_err(ValidationError)?;

    let id = accepted.document.id.clone();

    state
        .store
        .insert(NewRecord {
            id: id.clone(),
            root: id.clone(),
            document: accepted.document.raw.clone(),
            signing_pubkey: crate::crypto::base64url_encode(&accepted.document.signing_pubkey),
            encrypting_pubkey: crate::crypto::base64url_encode(&accepted.document.encrypting_pubkey),
            secret_ciphertext: inner.secret.ciphertext,
            secret_nonce: inner.secret.nonce,
            secret_master_pubkey: state.keys.box_public.clone(),
            challenge: String::new(),
            status: Status::Verified,
            supersedes: None,
            agent_id: Some(req.agentkey.clone()),
        })
        .map_err(ApiError::Store)?;

    state.chain.append(&id, &accepted.document.raw);

    tracing::info!(id = %id, agent = %req.agentkey, "agent registration accepted");

    Ok((StatusCode::CREATED, Json(json!({ "success": "true", "id": id }))))
}
