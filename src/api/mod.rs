//! HTTP surface: one route per lifecycle operation, plus the three resolver reads.

mod agent_register;
mod confirm;
mod confirm_supersede;
mod register;
mod resolve;
mod revoke;
mod supersede;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::server::SharedState;

pub fn router(state: Arc<SharedState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/{id}", get(resolve::by_id))
        .route("/root/{id}", get(resolve::by_root))
        .route("/history/{id}", get(resolve::history))
        .route("/register", post(register::register))
        .route("/confirm", post(confirm::confirm))
        .route("/supersede", post(supersede::supersede))
        .route("/confirmSupersede", post(confirm_supersede::confirm_supersede))
        .route("/revoke", post(revoke::revoke))
        .route("/agentRegister", post(agent_register::agent_register))
        .with_state(state)
}

async fn index(axum::extract::State(state): axum::extract::State<Arc<SharedState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "masterPublicKey": state.keys.box_public })),
    )
}

/// `hex(RNG[32])`: a fresh per-registration challenge.
pub(crate) fn generate_challenge() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
