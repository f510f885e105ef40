//! Public-key sealing of short secrets.
//!
//! Used to carry the premaster secret to the certified owner of a public key.
//! The sender generates an ephemeral P-256 key, runs ECDH against the
//! recipient's static key, expands the shared secret with HKDF-SHA256 and
//! encrypts with AES-256-GCM. Wire form (base64):
//!
//! ```text
//! [ ephemeral SEC1 point (65) | nonce (12) | ciphertext + tag ]
//! ```

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{public_key_from_pem, KeyPair};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hkdf::Hkdf;
use p256::ecdh::{diffie_hellman, EphemeralSecret};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

const POINT_LEN: usize = 65;
const NONCE_LEN: usize = 12;
const HKDF_INFO: &[u8] = b"meshlink/premaster-seal";

fn cipher_from_shared(shared: &[u8], ephemeral_point: &[u8]) -> CryptoResult<Aes256Gcm> {
    let hk = Hkdf::<Sha256>::new(Some(ephemeral_point), shared);
    let mut key = [0u8; 32];
    hk.expand(HKDF_INFO, &mut key)
        .map_err(|e| CryptoError::Encryption(format!("HKDF expand failed: {e}")))?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| CryptoError::Encryption(format!("Failed to create cipher: {e}")));
    key.zeroize();
    cipher
}

/// Encrypt `plaintext` so only the holder of `recipient_pem`'s secret can read it.
pub fn seal(recipient_pem: &str, plaintext: &[u8]) -> CryptoResult<String> {
    let recipient = public_key_from_pem(recipient_pem)?;
    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let ephemeral_point = ephemeral.public_key().to_encoded_point(false);
    let shared = ephemeral.diffie_hellman(&recipient);

    let cipher = cipher_from_shared(shared.raw_secret_bytes(), ephemeral_point.as_bytes())?;
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(POINT_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(ephemeral_point.as_bytes());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(out))
}

/// Decrypt a value produced by [`seal`] with the recipient's key pair.
pub fn open(key_pair: &KeyPair, sealed_b64: &str) -> CryptoResult<Vec<u8>> {
    let raw = STANDARD.decode(sealed_b64)?;
    if raw.len() < POINT_LEN + NONCE_LEN {
        return Err(CryptoError::Decryption(format!(
            "sealed value too short: {} bytes",
            raw.len()
        )));
    }
    let (point, rest) = raw.split_at(POINT_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let ephemeral =
        PublicKey::from_sec1_bytes(point).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let shared = diffie_hellman(key_pair.secret().to_nonzero_scalar(), ephemeral.as_affine());

    let cipher = cipher_from_shared(shared.raw_secret_bytes(), point)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| CryptoError::Decryption(e.to_string()))
}
