//! Cryptographic key management
//!
//! Every node and the CA own one long-lived P-256 key pair. Public keys
//! travel as SPKI PEM strings inside certificates and CA responses.

use crate::error::{CryptoError, CryptoResult};
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;

/// Long-lived P-256 key pair.
///
/// The secret scalar is zeroized by `SecretKey`'s own drop implementation.
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public_pem: String,
}

impl KeyPair {
    /// Generate a fresh key pair from the OS entropy source.
    pub fn generate() -> CryptoResult<Self> {
        Self::from_secret(SecretKey::random(&mut OsRng))
    }

    /// Wrap an existing secret key.
    pub fn from_secret(secret: SecretKey) -> CryptoResult<Self> {
        let public_pem = secret
            .public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::Encoding(e.to_string()))?;
        Ok(Self { secret, public_pem })
    }

    /// Public key as SPKI PEM.
    pub fn public_key_pem(&self) -> &str {
        &self.public_pem
    }

    /// Public key.
    pub fn public_key(&self) -> PublicKey {
        self.secret.public_key()
    }

    /// ECDSA signing key derived from the secret.
    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from(&self.secret)
    }

    /// ECDSA verifying key.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey::from(&self.public_key())
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.secret
    }

    /// Short printable fingerprint of the public key, for logs.
    pub fn fingerprint(&self) -> String {
        fingerprint_of(&self.public_pem)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

/// Parse an SPKI PEM public key.
pub fn public_key_from_pem(pem: &str) -> CryptoResult<PublicKey> {
    PublicKey::from_public_key_pem(pem).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// First characters of the base64 body of a PEM document.
pub fn fingerprint_of(pem: &str) -> String {
    pem.lines()
        .filter(|line| !line.starts_with("-----"))
        .collect::<String>()
        .chars()
        .skip(27)
        .take(24)
        .collect()
}
