//! Error types for the registrar, with an HTTP mapping at the API boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// One reason a submitted document or signature failed validation.
///
/// Collected in order, never short-circuited, so a single response can
/// enumerate every defect a submitter made.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Reason {
    #[error("@context missing or incorrect")]
    ContextMismatch,
    #[error("id must be did:jlinc:{{base64 encoded string}}")]
    BadIdFormat,
    #[error("created missing or not RFC3339")]
    BadCreatedFormat,
    #[error("created outside acceptable clock skew")]
    CreatedOutOfRange,
    #[error("publicKey entry #signing missing or malformed")]
    MissingSigningKeyEntry,
    #[error("publicKey entry #encrypting missing or malformed")]
    MissingEncryptingKeyEntry,
    #[error("signing public key missing or size incorrect")]
    BadSigningKeySize,
    #[error("encrypting public key missing or size incorrect")]
    BadEncryptingKeySize,
    #[error("signature did not verify")]
    BadSignature,
    #[error("secret did not decrypt correctly")]
    SecretDidNotDecrypt,
}

/// Accumulated validation failures, formatted the way the registrar reports them.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", format_reasons(.0))]
pub struct ValidationError(pub Vec<Reason>);

fn format_reasons(reasons: &[Reason]) -> String {
    if reasons.len() == 1 {
        return format!("request contained 1 error: {}", reasons[0]);
    }
    let joined = reasons
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("request contained {} errors: {joined}", reasons.len())
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Malformed(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("JWT-{0}")]
    Auth(String),
    #[error("{0}")]
    SignatureInvalid(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("record revoked")]
    Revoked,
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Malformed(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg).into_response(),
            ApiError::Validation(e) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
            }
            ApiError::Auth(reason) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "success": "false", "error": format!("JWT-{reason}") })),
            )
                .into_response(),
            ApiError::SignatureInvalid(reason) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "success": "false", "error": reason })),
            )
                .into_response(),
            ApiError::Conflict(msg) => {
                (StatusCode::CONFLICT, Json(json!({ "status": msg }))).into_response()
            }
            ApiError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(json!({ "status": msg }))).into_response()
            }
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "status": msg }))).into_response()
            }
            ApiError::Revoked => (
                StatusCode::GONE,
                Json(json!({ "status": "revoked" })),
            )
                .into_response(),
            ApiError::Store(e) => {
                tracing::error!(error = %e, "store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}
