//! Error types for Meshlink cryptographic operations.

use thiserror::Error;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A PEM or SEC1 encoded key could not be parsed
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Key encoding failed
    #[error("Key encoding failed: {0}")]
    Encoding(String),

    /// A signature was malformed (not a verification failure)
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Decryption or authentication failed
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Base64 decoding failed
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Hex decoding failed
    #[error("Hex error: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
