//! Identity management and authentication for the Meshlink overlay network.
//!
//! This crate binds node ids to public keys through certificates issued by a
//! single root authority.
//!
//! # Core Concepts
//!
//! - **Certificate**: `{subject, issuer, publicKey, signature}`, where the
//!   signature covers the canonical JSON of the first three fields
//! - **Certificate Authority**: issues and verifies certificates with its own
//!   P-256 key
//! - **CA Client**: HTTP client used by nodes to register at startup
//!
//! # Security Model
//!
//! Nodes fetch the CA public key once, during registration, and verify peer
//! certificates locally from then on.

pub mod api;
pub mod client;
pub mod error;
pub mod pki;

pub use api::{SignRequest, SignResponse, VerifyRequest, VerifyResponse};
pub use client::{CaClient, Registration};
pub use error::{IdentityError, IdentityResult};
pub use pki::{Certificate, CertificateAuthority, ROOT_ISSUER};
