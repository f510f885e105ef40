//! HTTP client for the CA service.

use crate::api::{SignRequest, SignResponse, VerifyRequest, VerifyResponse};
use crate::error::IdentityResult;
use crate::pki::Certificate;

/// Result of a successful registration.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Certificate issued for this node
    pub certificate: Certificate,
    /// CA public key used for all later peer verification
    pub ca_public_key: String,
}

/// Client for the CA `/sign` and `/verify` endpoints.
#[derive(Debug, Clone)]
pub struct CaClient {
    http: reqwest::Client,
    base_url: String,
}

impl CaClient {
    /// Create a client for a CA at `base_url` (e.g. `http://127.0.0.1:8000`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a public key and obtain a signed certificate plus the CA key.
    pub async fn register(&self, id: &str, public_key_pem: &str) -> IdentityResult<Registration> {
        let request = SignRequest {
            id: id.to_string(),
            public_key: public_key_pem.to_string(),
        };
        let response: SignResponse = self
            .http
            .post(format!("{}/sign", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::info!(node = id, "Certificate signed by CA");
        Ok(Registration {
            certificate: response.certificate,
            ca_public_key: response.ca_public_key,
        })
    }

    /// Ask the CA whether a certificate is valid (remote verification mode).
    pub async fn verify(&self, certificate: &Certificate) -> IdentityResult<bool> {
        let response: VerifyResponse = self
            .http
            .post(format!("{}/verify", self.base_url))
            .json(&VerifyRequest {
                certificate: certificate.clone(),
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.valid)
    }
}
