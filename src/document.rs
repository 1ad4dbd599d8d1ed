//! Parses and validates identity documents across both `@context` versions,
//! normalizing them to one internal representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto;
use crate::error::Reason;

/// Recognized `@context` strings for the two document schema versions.
#[derive(Debug, Clone)]
pub struct RecognizedContexts {
    pub v1: String,
    pub v2: String,
}

/// A document normalized to one shape regardless of which `@context` it arrived under.
#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    pub id: String,
    pub created: String,
    /// The raw bytes exactly as submitted, preserved for hashing and resolution.
    pub raw: Vec<u8>,
    pub signing_pubkey: [u8; 32],
    pub encrypting_pubkey: [u8; 32],
}

/// The request envelope carrying the document plus its self-signature and sealed secret.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistrationRequest {
    pub did: Value,
    pub signature: String,
    pub secret: SealedSecret,
    #[serde(default)]
    pub supersedes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SealedSecret {
    pub ciphertext: String,
    pub nonce: String,
}

/// Outcome of running the validator: the normalized document plus the recovered
/// HMAC secret, if secret decryption was attempted.
pub struct Accepted {
    pub document: NormalizedDocument,
    pub secret_plaintext: Option<zeroize::Zeroizing<Vec<u8>>>,
}

/// Whether to attempt secret decryption as part of validation. `supersede`
/// skips it (§4.1: fields 1-7 only); `register` and `agentRegister` require it.
pub enum SecretCheck<'a> {
    Skip,
    Require {
        service_secret_key: &'a crypto_box::SecretKey,
    },
}

/// Validate a registration request against both schema versions, accumulating
/// every failure rather than stopping at the first.
pub fn validate(
    req: &RegistrationRequest,
    contexts: &RecognizedContexts,
    test_mode: bool,
    secret_check: SecretCheck<'_>,
) -> Result<Accepted, Vec<Reason>> {
    let mut reasons = Vec::new();
    let raw = serde_json::to_vec(&req.did).unwrap_or_default();

    let context = req.did.get("@context").and_then(Value::as_str);
    let is_v2 = match context {
        Some(c) if c == contexts.v1 => false,
        Some(c) if c == contexts.v2 => true,
        _ => {
            reasons.push(Reason::ContextMismatch);
            false
        }
    };

    let id = req.did.get("id").and_then(Value::as_str).unwrap_or_default();
    if !valid_id_format(id) {
        reasons.push(Reason::BadIdFormat);
    }

    let created = req
        .did
        .get("created")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if !test_mode {
        match created.parse::<DateTime<Utc>>() {
            Ok(ts) => {
                let now = Utc::now();
                let lower = now - chrono::Duration::minutes(10);
                let upper = now + chrono::Duration::minutes(1);
                if ts < lower || ts > upper {
                    reasons.push(Reason::CreatedOutOfRange);
                }
            }
            Err(_) => reasons.push(Reason::BadCreatedFormat),
        }
    }

    let empty = Vec::new();
    let public_keys = req
        .did
        .get("publicKey")
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    let signing_entry = find_key_entry(public_keys, "#signing");
    let encrypting_entry = find_key_entry(public_keys, "#encrypting");

    let signing_b64 = match &signing_entry {
        Some(entry) => extract_key_material(entry, id, is_v2, "ed25519", "Ed25519VerificationKey2018"),
        None => {
            reasons.push(Reason::MissingSigningKeyEntry);
            None
        }
    };
    if signing_entry.is_some() && signing_b64.is_none() {
        reasons.push(Reason::MissingSigningKeyEntry);
    }

    let encrypting_b64 = match &encrypting_entry {
        Some(entry) => extract_key_material(
            entry,
            id,
            is_v2,
            "curve25519",
            "X25519KeyAgreementKey2019",
        ),
        None => {
            reasons.push(Reason::MissingEncryptingKeyEntry);
            None
        }
    };
    if encrypting_entry.is_some() && encrypting_b64.is_none() {
        reasons.push(Reason::MissingEncryptingKeyEntry);
    }

    let signing_pubkey = signing_b64.as_deref().and_then(decode_exact_32);
    if signing_b64.is_some() && signing_pubkey.is_none() {
        reasons.push(Reason::BadSigningKeySize);
    }

    if let Some(ref pk) = signing_pubkey {
        let msg = crypto::sha256(format!("{id}.{created}").as_bytes());
        let sig = crypto::base64url_decode(&req.signature).ok();
        let verifies = sig
            .as_ref()
            .map(|s| crypto::verify_ed25519(pk, &msg, s))
            .unwrap_or(false);
        if !verifies {
            reasons.push(Reason::BadSignature);
        }
    }

    let encrypting_pubkey = encrypting_b64.as_deref().and_then(decode_exact_32);
    if encrypting_b64.is_some() && encrypting_pubkey.is_none() {
        reasons.push(Reason::BadEncryptingKeySize);
    }

    let mut secret_plaintext = None;
    if let (SecretCheck::Require { service_secret_key }, Some(enc_pk)) =
        (&secret_check, &encrypting_pubkey)
    {
        let ciphertext = crypto::base64url_decode(&req.secret.ciphertext).unwrap_or_default();
        let nonce = crypto::base64url_decode(&req.secret.nonce).unwrap_or_default();
        match crate::secret::open_secret(&ciphertext, &nonce, enc_pk, service_secret_key) {
            Ok(plaintext) => secret_plaintext = Some(plaintext),
            Err(_) => reasons.push(Reason::SecretDidNotDecrypt),
        }
    }

    if !reasons.is_empty() {
        return Err(reasons);
    }

    Ok(Accepted {
        document: NormalizedDocument {
            id: id.to_string(),
            created: created.to_string(),
            raw,
            signing_pubkey: signing_pubkey.expect("validated above"),
            encrypting_pubkey: encrypting_pubkey.expect("validated above"),
        },
        secret_plaintext,
    })
}

fn valid_id_format(id: &str) -> bool {
    let Some(token) = id.strip_prefix("did:jlinc:") else {
        return false;
    };
    !token.is_empty() && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn find_key_entry<'a>(entries: &'a [Value], fragment: &str) -> Option<&'a Value> {
    entries.iter().find(|entry| {
        entry
            .get("id")
            .and_then(Value::as_str)
            .is_some_and(|entry_id| entry_id.ends_with(fragment))
    })
}

fn extract_key_material(
    entry: &Value,
    owner_id: &str,
    is_v2: bool,
    v1_type: &str,
    v2_type: &str,
) -> Option<String> {
    if is_v2 {
        let controller = entry.get("controller").and_then(Value::as_str)?;
        let ty = entry.get("type").and_then(Value::as_str)?;
        if controller != owner_id || ty != v2_type {
            return None;
        }
        let b58 = entry.get("publicKeyBase58").and_then(Value::as_str)?;
        crypto::base58_to_base64url(b58).ok()
    } else {
        let owner = entry.get("owner").and_then(Value::as_str)?;
        let ty = entry.get("type").and_then(Value::as_str)?;
        if owner != owner_id || ty != v1_type {
            return None;
        }
        entry
            .get("publicKeyBase64")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

fn decode_exact_32(b64: &str) -> Option<[u8; 32]> {
    let bytes = crypto::base64url_decode(b64).ok()?;
    bytes.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contexts() -> RecognizedContexts {
        RecognizedContexts {
            v1: "https://jlinc.org/v1".to_string(),
            v2: "https://www.w3.org/ns/did/v1".to_string(),
        }
    }

    #[test]
    fn rejects_bad_id_format() {
        assert!(!valid_id_format("did:other:abc"));
        assert!(!valid_id_format("did:jlinc:"));
        assert!(valid_id_format("did:jlinc:abc-123_XYZ"));
    }

    #[test]
    fn accumulates_multiple_errors() {
        let req = RegistrationRequest {
            did: serde_json::json!({
                "@context": "wrong",
                "id": "not-a-did",
                "created": "not-a-date",
                "publicKey": [],
            }),
            signature: String::new(),
            secret: SealedSecret {
                ciphertext: String::new(),
                nonce: String::new(),
            },
            supersedes: None,
        };
        let err = validate(&req, &contexts(), true, SecretCheck::Skip).unwrap_err();
        assert!(err.len() >= 4);
    }
}
