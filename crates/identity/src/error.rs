//! Error types for Meshlink identity operations.

use thiserror::Error;

/// Errors that can occur in identity operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Certificate Authority errors
    #[error("CA error: {0}")]
    CertificateAuthority(String),

    /// Certificate validation errors
    #[error("Certificate validation failed: {0}")]
    CertificateValidation(String),

    /// CA service unreachable or returned an error status
    #[error("CA request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Cryptographic errors
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] meshlink_crypto::CryptoError),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;
