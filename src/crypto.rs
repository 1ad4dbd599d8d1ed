//! Primitive cryptographic operations: hashing, signatures, box decryption, codecs.

use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn base64url_encode(data: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

pub fn base64url_decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(s)
}

/// Re-encode a base58 (Bitcoin alphabet) key as base64url, preserving the
/// underlying bytes. Used to normalize v2 document keys at ingest.
pub fn base58_to_base64url(s: &str) -> Result<String, bs58::decode::Error> {
    let raw = bs58::decode(s).into_vec()?;
    Ok(base64url_encode(&raw))
}

/// Verify an Ed25519 signature given base64url-encoded public key and signature.
pub fn verify_ed25519(pubkey_bytes: &[u8], message: &[u8], signature_bytes: &[u8]) -> bool {
    let Ok(pubkey_array): Result<[u8; 32], _> = pubkey_bytes.try_into() else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&pubkey_array) else {
        return false;
    };
    let Ok(sig_array): Result<[u8; 64], _> = signature_bytes.try_into() else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_array);
    verifying_key.verify(message, &signature).is_ok()
}
