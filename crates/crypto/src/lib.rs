//! Cryptographic primitives for the Meshlink overlay network.
//!
//! This crate provides the cryptographic foundation for peer authentication
//! and session encryption between overlay nodes.
//!
//! # Core Capabilities
//!
//! - **Key Pairs**: P-256 node and CA key pairs with SPKI PEM public keys
//! - **Digital Signatures**: ECDSA/SHA-256 signing of canonical byte strings
//! - **Sealing**: public-key encryption of short secrets (ECDH + HKDF + AES-GCM)
//! - **Session Keys**: premaster/random based key derivation and the AES-256-GCM
//!   payload envelope
//!
//! # Security Principles
//!
//! - Never roll custom cryptographic primitives
//! - Secrets must never be logged in full
//! - Session key material is zeroized on drop

pub mod error;
pub mod keys;
pub mod sealed;
pub mod session;
pub mod signing;

pub use error::{CryptoError, CryptoResult};
pub use keys::{public_key_from_pem, KeyPair};
pub use sealed::{open, seal};
pub use session::{
    decrypt, derive_session_key, encrypt, random_hex, EncryptedPayload, SessionKey,
    PREMASTER_BYTES, RANDOM_BYTES,
};
pub use signing::{sign, verify};
