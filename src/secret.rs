//! Decryption of the client-supplied, box-sealed per-identity HMAC secret.
//!
//! The client encrypts its chosen HMAC key for the service using NaCl box
//! (XSalsa20Poly1305 with a Curve25519 shared point). Some older clients
//! wrap the sealed ciphertext with a 16-byte zero prefix, the padding the
//! original NaCl `crypto_box` wire format requires; we strip that prefix
//! from the raw ciphertext, before decryption, if present.

use crypto_box::aead::{generic_array::GenericArray, Aead};
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use zeroize::Zeroizing;

const ZERO_PREFIX_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("ciphertext too short")]
    TooShort,
    #[error("malformed nonce or key")]
    MalformedInput,
    #[error("box did not open")]
    DidNotOpen,
}

/// Recover the plaintext HMAC secret from a NaCl-box sealed ciphertext.
///
/// `sender_pubkey` is the document's encrypting key; `recipient_secret` is
/// the service's long-term X25519 secret key.
pub fn open_secret(
    ciphertext: &[u8],
    nonce: &[u8],
    sender_pubkey: &[u8; 32],
    recipient_secret: &SecretKey,
) -> Result<Zeroizing<Vec<u8>>, SecretError> {
    if ciphertext.len() <= ZERO_PREFIX_LEN {
        return Err(SecretError::TooShort);
    }
    if nonce.len() != 24 {
        return Err(SecretError::MalformedInput);
    }

    let body = if ciphertext[..ZERO_PREFIX_LEN].iter().all(|&b| b == 0) {
        &ciphertext[ZERO_PREFIX_LEN..]
    } else {
        ciphertext
    };

    let their_pubkey = PublicKey::from(*sender_pubkey);
    let cipher = SalsaBox::new(&their_pubkey, recipient_secret);
    let nonce_arr = GenericArray::clone_from_slice(nonce);

    let plaintext = Zeroizing::new(
        cipher
            .decrypt(&nonce_arr, body)
            .map_err(|_| SecretError::DidNotOpen)?,
    );

    Ok(plaintext)
}

/// Recover the HMAC secret stored against an identity record, keyed by the
/// service's long-term box secret key.
pub fn recover_record_secret(
    record: &crate::store::IdentityRecord,
    box_secret_key: &SecretKey,
) -> Result<Zeroizing<Vec<u8>>, SecretError> {
    let ciphertext = crate::crypto::base64url_decode(&record.secret_ciphertext)
        .map_err(|_| SecretError::MalformedInput)?;
    let nonce = crate::crypto::base64url_decode(&record.secret_nonce)
        .map_err(|_| SecretError::MalformedInput)?;
    let sender_pubkey: [u8; 32] = crate::crypto::base64url_decode(&record.encrypting_pubkey)
        .map_err(|_| SecretError::MalformedInput)?
        .try_into()
        .map_err(|_| SecretError::MalformedInput)?;
    open_secret(&ciphertext, &nonce, &sender_pubkey, box_secret_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_box::aead::OsRng;

    #[test]
    fn roundtrip_without_zero_prefix() {
        let recipient_secret = SecretKey::generate(&mut OsRng);
        let recipient_public = recipient_secret.public_key();
        let sender_secret = SecretKey::generate(&mut OsRng);
        let sender_pubkey = sender_secret.public_key();

        let cipher = SalsaBox::new(&recipient_public, &sender_secret);
        let nonce = crypto_box::generate_nonce(&mut OsRng);
        let plaintext = b"0123456789abcdef0123"; // 21 bytes, no zero prefix
        let ciphertext = cipher.encrypt(&nonce, plaintext.as_slice()).unwrap();

        let opened = open_secret(
            &ciphertext,
            nonce.as_slice(),
            sender_pubkey.as_bytes(),
            &recipient_secret,
        )
        .unwrap();
        assert_eq!(&opened[..], plaintext);
    }

    #[test]
    fn roundtrip_with_legacy_zero_prefix() {
        let recipient_secret = SecretKey::generate(&mut OsRng);
        let recipient_public = recipient_secret.public_key();
        let sender_secret = SecretKey::generate(&mut OsRng);
        let sender_pubkey = sender_secret.public_key();

        let cipher = SalsaBox::new(&recipient_public, &sender_secret);
        let nonce = crypto_box::generate_nonce(&mut OsRng);
        let plaintext = b"my-hmac-key";
        let mut ciphertext = vec![0u8; 16];
        ciphertext.extend_from_slice(&cipher.encrypt(&nonce, plaintext.as_slice()).unwrap());

        let opened = open_secret(
            &ciphertext,
            nonce.as_slice(),
            sender_pubkey.as_bytes(),
            &recipient_secret,
        )
        .unwrap();
        assert_eq!(&opened[..], b"my-hmac-key");
    }

    #[test]
    fn rejects_exactly_16_byte_ciphertext() {
        let recipient_secret = SecretKey::generate(&mut OsRng);
        let err = open_secret(&[0u8; 16], &[0u8; 24], &[1u8; 32], &recipient_secret).unwrap_err();
        assert!(matches!(err, SecretError::TooShort));
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let recipient_secret = SecretKey::generate(&mut OsRng);
        let recipient_public = recipient_secret.public_key();
        let sender_secret = SecretKey::generate(&mut OsRng);
        let sender_pubkey = sender_secret.public_key();

        let cipher = SalsaBox::new(&recipient_public, &sender_secret);
        let nonce = crypto_box::generate_nonce(&mut OsRng);
        let mut ciphertext = cipher.encrypt(&nonce, b"secret-key-material".as_slice()).unwrap();
        *ciphertext.last_mut().unwrap() ^= 0xff;

        let err = open_secret(
            &ciphertext,
            nonce.as_slice(),
            sender_pubkey.as_bytes(),
            &recipient_secret,
        )
        .unwrap_err();
        assert!(matches!(err, SecretError::DidNotOpen));
    }
}
