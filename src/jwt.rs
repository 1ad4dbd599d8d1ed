//! HMAC-SHA256 challenge-response JWTs.
//!
//! The signing key is never static: it is the plaintext recovered by
//! decrypting a specific identity's sealed secret, so every verification
//! call builds its `DecodingKey` fresh from bytes the caller supplies.

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Unexpected signing method")]
    UnexpectedAlgorithm,
    #[error("signature is invalid")]
    InvalidSignature,
    #[error("malformed token")]
    Malformed,
}

/// Claims carried by a plain confirm or confirm-supersede JWT.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfirmClaims {
    pub id: String,
    pub signature: String,
}

/// Claims carried by a revoke JWT: no inner signature, only the id.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RevokeClaims {
    pub id: String,
}

/// Claims carried by an agent-register compound JWT.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentRegisterClaims {
    pub did: serde_json::Value,
    pub signature: String,
    pub secret: crate::document::SealedSecret,
}

/// Read a JWT's payload without verifying its signature, to learn which
/// record's secret to fetch before the real, verifying decode.
pub fn peek_claims<T: DeserializeOwned>(token: &str) -> Result<T, JwtError> {
    let payload = token.split('.').nth(1).ok_or(JwtError::Malformed)?;
    let bytes = crate::crypto::base64url_decode(payload).map_err(|_| JwtError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| JwtError::Malformed)
}

/// Decode and verify a JWT against a per-identity HMAC secret, rejecting
/// anything but HS256 unconditionally.
pub fn verify_hmac<T: DeserializeOwned>(token: &str, hmac_secret: &[u8]) -> Result<T, JwtError> {
    let header = jsonwebtoken::decode_header(token).map_err(|_| JwtError::Malformed)?;
    if header.alg != Algorithm::HS256 {
        return Err(JwtError::UnexpectedAlgorithm);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;

    let key = DecodingKey::from_secret(hmac_secret);
    let data = jsonwebtoken::decode::<T>(token, &key, &validation)
        .map_err(|_| JwtError::InvalidSignature)?;
    Ok(data.claims)
}
