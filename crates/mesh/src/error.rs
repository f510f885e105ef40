//! Error types for Meshlink mesh operations.
//!
//! None of these errors are fatal to a running node: the affected frame,
//! message or handshake step is dropped and the error is logged.

use thiserror::Error;

/// Errors that can occur in mesh operations.
#[derive(Debug, Error)]
pub enum MeshError {
    /// No path to the destination (or the destination is this node)
    #[error("No route found to destination: {destination}")]
    NoRoute { destination: String },

    /// Frame header is inconsistent (sequence out of range, total mismatch)
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Certificate or proof rejected, decryption failure
    #[error("Security error: {0}")]
    Security(String),

    /// Handshake message arrived in a state that cannot use it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Cryptographic errors
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] meshlink_crypto::CryptoError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] meshlink_core::CoreError),

    /// Network I/O errors
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The node runtime has stopped
    #[error("Node runtime stopped")]
    Stopped,
}

/// Result type for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;
