//! ECDSA P-256 / SHA-256 signatures over canonical byte strings.
//!
//! Signatures are DER-encoded and carried as standard base64, which is the
//! form stored in certificate `signature` fields.

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{public_key_from_pem, KeyPair};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, VerifyingKey};

/// Sign `message` and return the base64 DER signature.
pub fn sign(key_pair: &KeyPair, message: &[u8]) -> String {
    let signature: Signature = key_pair.signing_key().sign(message);
    STANDARD.encode(signature.to_der().as_bytes())
}

/// Verify a base64 DER signature over `message` with a PEM public key.
///
/// Returns `Ok(false)` for a well-formed signature that does not verify,
/// and an error when the key or signature cannot be decoded at all.
pub fn verify(public_key_pem: &str, message: &[u8], signature_b64: &str) -> CryptoResult<bool> {
    let public_key = public_key_from_pem(public_key_pem)?;
    let der = STANDARD.decode(signature_b64)?;
    let signature =
        Signature::from_der(&der).map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;

    Ok(VerifyingKey::from(&public_key)
        .verify(message, &signature)
        .is_ok())
}
