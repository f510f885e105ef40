//! Public Key Infrastructure (PKI) for Meshlink node identities.
//!
//! Provides the certificate model and the single root certificate authority.

use crate::error::{IdentityError, IdentityResult};
use meshlink_crypto::{self as crypto, KeyPair};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Issuer name written into every certificate.
pub const ROOT_ISSUER: &str = "RootCA";

/// Certificate binding a node id to a public key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// Subject (node id being certified)
    pub subject: String,
    /// Issuer (certificate authority)
    pub issuer: String,
    /// Subject's public key, SPKI PEM
    pub public_key: String,
    /// Base64 CA signature over [`Certificate::canonical_bytes`]
    pub signature: String,
}

/// Signed portion of a certificate. Field order is part of the format.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedFields<'a> {
    subject: &'a str,
    issuer: &'a str,
    public_key: &'a str,
}

fn canonical_bytes(subject: &str, issuer: &str, public_key: &str) -> IdentityResult<Vec<u8>> {
    Ok(serde_json::to_vec(&SignedFields {
        subject,
        issuer,
        public_key,
    })?)
}

impl Certificate {
    /// Canonical JSON of `{subject, issuer, publicKey}`, in that order.
    pub fn canonical_bytes(&self) -> IdentityResult<Vec<u8>> {
        canonical_bytes(&self.subject, &self.issuer, &self.public_key)
    }

    /// Verify the signature against a CA public key.
    pub fn verify(&self, ca_public_key: &str) -> IdentityResult<bool> {
        let message = self.canonical_bytes()?;
        Ok(crypto::verify(ca_public_key, &message, &self.signature)?)
    }

    /// Like [`Certificate::verify`], treating undecodable input as invalid.
    pub fn is_valid(&self, ca_public_key: &str) -> bool {
        match self.verify(ca_public_key) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!(subject = %self.subject, "Certificate could not be checked: {}", e);
                false
            }
        }
    }
}

/// Certificate Authority managing certificate issuance.
#[derive(Debug)]
pub struct CertificateAuthority {
    /// CA identity
    issuer: String,
    /// CA signing key
    key_pair: KeyPair,
    /// Issued certificates indexed by subject
    certificates: HashMap<String, Certificate>,
}

impl CertificateAuthority {
    /// Create a root authority with a freshly generated key.
    pub fn generate() -> IdentityResult<Self> {
        Ok(Self::with_key(KeyPair::generate()?))
    }

    /// Create a root authority around an existing key.
    pub fn with_key(key_pair: KeyPair) -> Self {
        Self {
            issuer: ROOT_ISSUER.to_string(),
            key_pair,
            certificates: HashMap::new(),
        }
    }

    /// CA public key, SPKI PEM.
    pub fn public_key_pem(&self) -> &str {
        self.key_pair.public_key_pem()
    }

    /// Short fingerprint of the CA key, for logs.
    pub fn fingerprint(&self) -> String {
        self.key_pair.fingerprint()
    }

    /// Issue a certificate for `subject` over `public_key_pem`.
    ///
    /// Re-registering a subject replaces its previous certificate.
    pub fn issue_certificate(
        &mut self,
        subject: &str,
        public_key_pem: &str,
    ) -> IdentityResult<Certificate> {
        if subject.is_empty() {
            return Err(IdentityError::CertificateAuthority(
                "subject must not be empty".to_string(),
            ));
        }
        crypto::public_key_from_pem(public_key_pem)?;

        let message = canonical_bytes(subject, &self.issuer, public_key_pem)?;
        let cert = Certificate {
            subject: subject.to_string(),
            issuer: self.issuer.clone(),
            public_key: public_key_pem.to_string(),
            signature: crypto::sign(&self.key_pair, &message),
        };

        tracing::info!(subject, "Issued certificate");
        self.certificates.insert(subject.to_string(), cert.clone());
        Ok(cert)
    }

    /// Verify a certificate against this authority's key.
    pub fn verify_certificate(&self, cert: &Certificate) -> bool {
        cert.issuer == self.issuer && cert.is_valid(self.public_key_pem())
    }

    /// Get the current certificate of a subject.
    pub fn get_certificate(&self, subject: &str) -> Option<&Certificate> {
        self.certificates.get(subject)
    }

    /// List all issued certificates.
    pub fn list_certificates(&self) -> Vec<&Certificate> {
        self.certificates.values().collect()
    }
}
