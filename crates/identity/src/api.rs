//! Request and response bodies of the CA HTTP API.

use crate::pki::Certificate;
use serde::{Deserialize, Serialize};

/// `POST /sign` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    /// Node id to certify
    pub id: String,
    /// Node public key, SPKI PEM
    pub public_key: String,
}

/// `POST /sign` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignResponse {
    /// Freshly issued certificate
    pub certificate: Certificate,
    /// CA public key, SPKI PEM
    pub ca_public_key: String,
}

/// `POST /verify` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// Certificate to check
    pub certificate: Certificate,
}

/// `POST /verify` response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// Whether the signature verifies under the CA key
    pub valid: bool,
}
