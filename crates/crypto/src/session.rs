//! Session key derivation and the AES-256-GCM payload envelope.
//!
//! Both handshake participants derive
//!
//! ```text
//! sessionKey = hex(SHA-256(premaster || min(randomA, randomB) || max(randomA, randomB)))
//! ```
//!
//! Sorting the randoms makes the digest independent of which side initiated.
//! The 32 bytes behind the hex string key AES-256-GCM for application data.

use crate::error::{CryptoError, CryptoResult};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size in bytes of the hello randoms (rendered as hex on the wire).
pub const RANDOM_BYTES: usize = 16;

/// Size in bytes of the premaster secret (rendered as hex).
pub const PREMASTER_BYTES: usize = 32;

/// AES-GCM IV size (96 bits).
const IV_SIZE: usize = 12;

/// AES-GCM authentication tag size.
const TAG_SIZE: usize = 16;

/// `n` random bytes rendered as lowercase hex.
pub fn random_hex(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Derived symmetric session key, stored as lowercase hex.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey(String);

impl SessionKey {
    /// Wrap an existing hex key.
    pub fn from_hex(hex_key: impl Into<String>) -> Self {
        Self(hex_key.into())
    }

    /// Hex rendering of the key.
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// First `n` characters, used for READY proofs and logs.
    pub fn prefix(&self, n: usize) -> &str {
        match self.0.char_indices().nth(n) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }

    fn cipher(&self) -> CryptoResult<Aes256Gcm> {
        let mut key = hex::decode(&self.0)?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CryptoError::InvalidKey(format!("session key: {e}")));
        key.zeroize();
        cipher
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionKey({}...)", self.prefix(10))
    }
}

/// Derive the session key from the premaster secret and both randoms.
pub fn derive_session_key(premaster: &str, my_random: &str, peer_random: &str) -> SessionKey {
    let (low, high) = if my_random <= peer_random {
        (my_random, peer_random)
    } else {
        (peer_random, my_random)
    };

    let mut hasher = Sha256::new();
    hasher.update(premaster.as_bytes());
    hasher.update(low.as_bytes());
    hasher.update(high.as_bytes());
    SessionKey(hex::encode(hasher.finalize()))
}

/// Encrypted application payload as carried inside DATA messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    /// Always `true`; marks the payload as an envelope
    pub encrypted: bool,
    /// 96-bit IV, hex
    pub iv: String,
    /// Ciphertext without tag, hex
    pub content: String,
    /// GCM authentication tag, hex
    pub auth_tag: String,
}

/// Encrypt a string under the session key with a fresh random IV.
pub fn encrypt(plaintext: &str, key: &SessionKey) -> CryptoResult<EncryptedPayload> {
    let cipher = key.cipher()?;
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let mut sealed = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let tag = sealed.split_off(sealed.len() - TAG_SIZE);

    Ok(EncryptedPayload {
        encrypted: true,
        iv: hex::encode(iv),
        content: hex::encode(sealed),
        auth_tag: hex::encode(tag),
    })
}

/// Decrypt and authenticate an envelope produced by [`encrypt`].
pub fn decrypt(payload: &EncryptedPayload, key: &SessionKey) -> CryptoResult<String> {
    let cipher = key.cipher()?;
    let iv = hex::decode(&payload.iv)?;
    if iv.len() != IV_SIZE {
        return Err(CryptoError::Decryption(format!("IV must be {IV_SIZE} bytes")));
    }
    let mut sealed = hex::decode(&payload.content)?;
    sealed.extend(hex::decode(&payload.auth_tag)?);

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), sealed.as_slice())
        .map_err(|e| CryptoError::Decryption(e.to_string()))?;
    String::from_utf8(plaintext).map_err(|e| CryptoError::Decryption(e.to_string()))
}
