//! Certificate-authenticated key agreement and payload gating.
//!
//! ```text
//! initiator                         responder
//!   CLIENT_HELLO {random}      -->
//!                              <--  SERVER_HELLO {random, certificate}
//!   PREMASTER {sealed secret}  -->
//!   READY_CLIENT {READY:kkkkk} -->
//!                              <--  READY_SERVER {READY:kkkkk}
//! ```
//!
//! [`HandshakeManager::advance`] is the whole state machine: it takes one
//! inbound step and returns the replies to send. It performs no I/O.
//!
//! A peer counts as `SECURE` once its READY proof has arrived and the local
//! session key exists. The two can arrive in either order because PREMASTER
//! spans several staggered frames while READY_CLIENT fits in one.

use crate::error::{MeshError, MeshResult};
use crate::frame::{DataPayload, HandshakePayload};
use crate::session::{SecurityContext, SessionState, SessionStore};
use meshlink_core::NodeId;
use meshlink_crypto::{self as crypto, EncryptedPayload, KeyPair, PREMASTER_BYTES, RANDOM_BYTES};
use meshlink_identity::Certificate;
use std::fmt;
use zeroize::Zeroizing;

/// Literal prefix of READY proofs.
pub const READY_PREFIX: &str = "READY";

/// Session key hex characters disclosed in a READY proof.
const READY_KEY_CHARS: usize = 5;

/// Text shown in place of a payload that failed authentication.
pub const DECRYPTION_FAILED: &str = "[Decryption Failed]";

/// Output of a handshake step.
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeAction {
    /// Send a handshake message to `to`
    Send { to: NodeId, payload: HandshakePayload },
    /// The session with `peer` just became `SECURE`
    Established { peer: NodeId },
}

/// A DATA payload after [`HandshakeManager::secure_unwrap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnwrappedPayload {
    /// Arrived in the clear
    Plain(String),
    /// Decrypted with the session key
    Decrypted(String),
    /// Envelope did not authenticate under the session key
    DecryptionFailed,
    /// Envelope arrived but there is no key for the sender
    Undecryptable(EncryptedPayload),
}

impl fmt::Display for UnwrappedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnwrappedPayload::Plain(text) | UnwrappedPayload::Decrypted(text) => f.write_str(text),
            UnwrappedPayload::DecryptionFailed => f.write_str(DECRYPTION_FAILED),
            UnwrappedPayload::Undecryptable(envelope) => {
                match serde_json::to_string(envelope) {
                    Ok(json) => f.write_str(&json),
                    Err(_) => f.write_str("[Encrypted]"),
                }
            }
        }
    }
}

/// Handshake driver and per-peer session owner for one node.
#[derive(Debug)]
pub struct HandshakeManager {
    node_id: NodeId,
    key_pair: KeyPair,
    certificate: Option<Certificate>,
    ca_public_key: Option<String>,
    sessions: SessionStore,
}

impl HandshakeManager {
    pub fn new(node_id: impl Into<NodeId>, key_pair: KeyPair) -> Self {
        Self {
            node_id: node_id.into(),
            key_pair,
            certificate: None,
            ca_public_key: None,
            sessions: SessionStore::new(),
        }
    }

    /// Install the certificate and CA key obtained at registration.
    pub fn with_credentials(mut self, certificate: Certificate, ca_public_key: impl Into<String>) -> Self {
        self.set_credentials(certificate, ca_public_key);
        self
    }

    pub fn set_credentials(&mut self, certificate: Certificate, ca_public_key: impl Into<String>) {
        self.certificate = Some(certificate);
        self.ca_public_key = Some(ca_public_key.into());
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn state(&self, peer: &str) -> SessionState {
        self.sessions.state(peer)
    }

    /// Start a handshake with `peer`.
    pub fn initiate(&mut self, peer: &str) -> Vec<HandshakeAction> {
        let random = crypto::random_hex(RANDOM_BYTES);
        let ctx = self.sessions.entry(peer);
        ctx.restart_exchange();
        ctx.my_random = Some(random.clone());
        ctx.peer_random = None;
        ctx.advance_to(SessionState::HandshakeStarted);

        tracing::info!(node = %self.node_id, %peer, "Initiating handshake");
        vec![HandshakeAction::Send {
            to: peer.to_string(),
            payload: HandshakePayload::ClientHello { random },
        }]
    }

    /// Process one handshake message from `src`.
    ///
    /// An `Err` aborts this step only: nothing is sent to the peer and the
    /// session stays where it was.
    pub fn advance(&mut self, src: &str, payload: HandshakePayload) -> MeshResult<Vec<HandshakeAction>> {
        tracing::debug!(node = %self.node_id, peer = %src, step = payload.step(), "Handshake step");
        match payload {
            HandshakePayload::ClientHello { random } => self.on_client_hello(src, random),
            HandshakePayload::ServerHello { random, certificate } => {
                self.on_server_hello(src, random, certificate)
            }
            HandshakePayload::Premaster { data } => self.on_premaster(src, &data),
            HandshakePayload::ReadyClient { data } | HandshakePayload::ReadyServer { data } => {
                self.on_ready(src, data)
            }
        }
    }

    fn on_client_hello(&mut self, src: &str, peer_random: String) -> MeshResult<Vec<HandshakeAction>> {
        let certificate = self.certificate.clone().ok_or_else(|| {
            MeshError::InvalidState("no certificate to present in SERVER_HELLO".to_string())
        })?;

        let random = crypto::random_hex(RANDOM_BYTES);
        let ctx = self.sessions.entry(src);
        ctx.restart_exchange();
        ctx.peer_random = Some(peer_random);
        ctx.my_random = Some(random.clone());
        ctx.advance_to(SessionState::HandshakeStarted);

        Ok(vec![HandshakeAction::Send {
            to: src.to_string(),
            payload: HandshakePayload::ServerHello { random, certificate },
        }])
    }

    fn on_server_hello(
        &mut self,
        src: &str,
        peer_random: String,
        certificate: Certificate,
    ) -> MeshResult<Vec<HandshakeAction>> {
        let ca_public_key = self.ca_public_key.as_deref().ok_or_else(|| {
            MeshError::InvalidState("CA public key unknown, cannot check certificates".to_string())
        })?;
        if !certificate.is_valid(ca_public_key) {
            tracing::warn!(node = %self.node_id, peer = %src, "Invalid certificate in SERVER_HELLO");
            return Err(MeshError::Security(format!("invalid certificate from {src}")));
        }
        if certificate.subject != src {
            tracing::warn!(node = %self.node_id, peer = %src, subject = %certificate.subject, "Certificate subject differs from sender");
        }
        tracing::info!(node = %self.node_id, peer = %src, "Verified certificate");

        let ctx = self.sessions.entry(src);
        let my_random = ctx.my_random.clone().ok_or_else(|| {
            MeshError::InvalidState(format!("SERVER_HELLO from {src} without CLIENT_HELLO"))
        })?;

        let premaster = Zeroizing::new(crypto::random_hex(PREMASTER_BYTES));
        let sealed = crypto::seal(&certificate.public_key, premaster.as_bytes())?;
        let key = crypto::derive_session_key(&premaster, &my_random, &peer_random);
        let proof = ready_proof(&key);

        ctx.peer_random = Some(peer_random);
        ctx.peer_cert = Some(certificate);
        ctx.premaster = Some(premaster);
        ctx.session_key = Some(key);

        let mut actions = vec![
            HandshakeAction::Send {
                to: src.to_string(),
                payload: HandshakePayload::Premaster { data: sealed },
            },
            HandshakeAction::Send {
                to: src.to_string(),
                payload: HandshakePayload::ReadyClient { data: proof },
            },
        ];
        actions.extend(self.try_establish(src));
        Ok(actions)
    }

    fn on_premaster(&mut self, src: &str, sealed: &str) -> MeshResult<Vec<HandshakeAction>> {
        let opened = crypto::open(&self.key_pair, sealed)
            .map_err(|e| MeshError::Security(format!("premaster from {src} rejected: {e}")))?;
        let premaster = Zeroizing::new(
            String::from_utf8(opened)
                .map_err(|_| MeshError::Security(format!("premaster from {src} is not text")))?,
        );

        let ctx = self.sessions.entry(src);
        let (Some(my_random), Some(peer_random)) = (ctx.my_random.as_deref(), ctx.peer_random.as_deref()) else {
            return Err(MeshError::InvalidState(format!(
                "PREMASTER from {src} before hello exchange"
            )));
        };
        let key = crypto::derive_session_key(&premaster, my_random, peer_random);
        let proof = ready_proof(&key);
        ctx.premaster = Some(premaster);
        ctx.session_key = Some(key);

        let mut actions = vec![HandshakeAction::Send {
            to: src.to_string(),
            payload: HandshakePayload::ReadyServer { data: proof },
        }];
        actions.extend(self.try_establish(src));
        Ok(actions)
    }

    fn on_ready(&mut self, src: &str, proof: String) -> MeshResult<Vec<HandshakeAction>> {
        if !proof.starts_with(READY_PREFIX) {
            return Err(MeshError::Security(format!("malformed READY from {src}")));
        }
        self.sessions.entry(src).peer_ready = Some(proof);
        Ok(self.try_establish(src).into_iter().collect())
    }

    /// Signal the session once both the peer's READY and our key exist.
    /// Each READY is consumed, so every completed exchange signals once.
    fn try_establish(&mut self, peer: &str) -> Option<HandshakeAction> {
        let ctx = self.sessions.entry(peer);
        if ctx.session_key.is_none() {
            return None;
        }
        let proof = ctx.peer_ready.take()?;
        let key = ctx.session_key.as_ref()?;
        let proof_matches = proof == ready_proof(key);
        let key_prefix = key.prefix(10).to_string();

        if !proof_matches {
            tracing::warn!(node = %self.node_id, %peer, "READY proof does not match local session key");
        }
        ctx.advance_to(SessionState::Secure);
        tracing::info!(node = %self.node_id, %peer, "Secure channel established");
        tracing::debug!(node = %self.node_id, %peer, key = %key_prefix, "Session key in use");
        Some(HandshakeAction::Established {
            peer: peer.to_string(),
        })
    }

    /// Encrypt a plain payload for `target` if its session is `SECURE`.
    /// Anything else passes through unchanged.
    pub fn secure_wrap(&self, target: &str, payload: DataPayload) -> MeshResult<DataPayload> {
        let text = match payload {
            DataPayload::Plain(text) => text,
            other => return Ok(other),
        };
        match self.sessions.get(target).and_then(secure_key) {
            Some(key) => Ok(DataPayload::Encrypted(crypto::encrypt(&text, key)?)),
            None => Ok(DataPayload::Plain(text)),
        }
    }

    /// Decrypt an envelope from `src` when a session key exists.
    pub fn secure_unwrap(&self, src: &str, payload: DataPayload) -> UnwrappedPayload {
        let envelope = match payload {
            DataPayload::Plain(text) => return UnwrappedPayload::Plain(text),
            DataPayload::Encrypted(envelope) if envelope.encrypted => envelope,
            DataPayload::Encrypted(envelope) => {
                return UnwrappedPayload::Undecryptable(envelope);
            }
        };
        let Some(key) = self.sessions.get(src).and_then(|ctx| ctx.session_key()) else {
            tracing::warn!(node = %self.node_id, peer = %src, "Encrypted payload but no session key");
            return UnwrappedPayload::Undecryptable(envelope);
        };
        match crypto::decrypt(&envelope, key) {
            Ok(text) => UnwrappedPayload::Decrypted(text),
            Err(e) => {
                tracing::warn!(node = %self.node_id, peer = %src, "Decryption failed: {}", e);
                UnwrappedPayload::DecryptionFailed
            }
        }
    }
}

fn secure_key(ctx: &SecurityContext) -> Option<&meshlink_crypto::SessionKey> {
    if ctx.is_secure() {
        ctx.session_key()
    } else {
        None
    }
}

fn ready_proof(key: &meshlink_crypto::SessionKey) -> String {
    format!("{READY_PREFIX}:{}", key.prefix(READY_KEY_CHARS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshlink_identity::CertificateAuthority;
    use proptest::prelude::*;

    fn enrolled(ca: &mut CertificateAuthority, id: &str) -> HandshakeManager {
        let key_pair = KeyPair::generate().unwrap();
        let cert = ca.issue_certificate(id, key_pair.public_key_pem()).unwrap();
        HandshakeManager::new(id, key_pair).with_credentials(cert, ca.public_key_pem())
    }

    /// Feed every Send to the other side until nothing is left to send.
    fn run(a: &mut HandshakeManager, b: &mut HandshakeManager, initial: Vec<HandshakeAction>) -> Vec<HandshakeAction> {
        let mut pending: Vec<(String, HandshakeAction)> =
            initial.into_iter().map(|act| (a.node_id().to_string(), act)).collect();
        let mut established = Vec::new();
        while !pending.is_empty() {
            let (from, action) = pending.remove(0);
            match action {
                HandshakeAction::Send { to, payload } => {
                    let receiver = if to == a.node_id() { &mut *a } else { &mut *b };
                    let replies = receiver.advance(&from, payload).unwrap_or_default();
                    let me = receiver.node_id().to_string();
                    pending.extend(replies.into_iter().map(|r| (me.clone(), r)));
                }
                done @ HandshakeAction::Established { .. } => established.push(done),
            }
        }
        established
    }

    fn pair() -> (HandshakeManager, HandshakeManager) {
        let mut ca = CertificateAuthority::generate().unwrap();
        (enrolled(&mut ca, "A"), enrolled(&mut ca, "B"))
    }

    #[test]
    fn test_handshake_symmetry() {
        let (mut a, mut b) = pair();
        let hello = a.initiate("B");
        assert_eq!(a.state("B"), SessionState::HandshakeStarted);

        let established = run(&mut a, &mut b, hello);
        assert_eq!(established.len(), 2);
        assert_eq!(a.state("B"), SessionState::Secure);
        assert_eq!(b.state("A"), SessionState::Secure);

        let key_a = a.sessions().get("B").unwrap().session_key().unwrap();
        let key_b = b.sessions().get("A").unwrap().session_key().unwrap();
        assert_eq!(key_a, key_b);
        assert_eq!(key_a.as_hex().len(), 64);
    }

    #[test]
    fn test_repeated_handshake_signals_each_time() {
        let (mut a, mut b) = pair();
        let hello = a.initiate("B");
        assert_eq!(run(&mut a, &mut b, hello).len(), 2);
        let first_key = a.sessions().get("B").unwrap().session_key().unwrap().clone();

        let hello = a.initiate("B");
        assert!(a.sessions().get("B").unwrap().session_key().is_none());
        let established = run(&mut a, &mut b, hello);
        assert_eq!(established.len(), 2);
        assert!(established.contains(&HandshakeAction::Established { peer: "B".to_string() }));
        assert!(established.contains(&HandshakeAction::Established { peer: "A".to_string() }));
        assert_eq!(a.state("B"), SessionState::Secure);
        assert_eq!(b.state("A"), SessionState::Secure);

        let key_a = a.sessions().get("B").unwrap().session_key().unwrap();
        let key_b = b.sessions().get("A").unwrap().session_key().unwrap();
        assert_eq!(key_a, key_b);
        assert_ne!(key_a, &first_key);

        let wrapped = a.secure_wrap("B", DataPayload::from("again")).unwrap();
        assert!(matches!(wrapped, DataPayload::Encrypted(_)));
        assert_eq!(b.secure_unwrap("A", wrapped), UnwrappedPayload::Decrypted("again".to_string()));
    }

    #[test]
    fn test_responder_drops_stale_key_on_new_hello() {
        let (mut a, mut b) = pair();
        let hello = a.initiate("B");
        run(&mut a, &mut b, hello);

        let hello = a.initiate("B");
        let HandshakeAction::Send { payload, .. } = hello[0].clone() else { panic!() };
        b.advance("A", payload).unwrap();
        assert!(b.sessions().get("A").unwrap().session_key().is_none());
        assert_eq!(b.state("A"), SessionState::Secure);

        let plain = b.secure_wrap("A", DataPayload::from("hi")).unwrap();
        assert_eq!(plain, DataPayload::from("hi"));
    }

    #[test]
    fn test_ready_before_premaster() {
        let (mut a, mut b) = pair();
        let hello = a.initiate("B");
        let HandshakeAction::Send { payload, .. } = hello[0].clone() else { panic!() };
        let server_hello = b.advance("A", payload).unwrap();
        let HandshakeAction::Send { payload, .. } = server_hello[0].clone() else { panic!() };
        let replies = a.advance("B", payload).unwrap();
        assert_eq!(a.state("B"), SessionState::HandshakeStarted);

        // Deliver READY_CLIENT first, then PREMASTER.
        let HandshakeAction::Send { payload: premaster, .. } = replies[0].clone() else { panic!() };
        let HandshakeAction::Send { payload: ready, .. } = replies[1].clone() else { panic!() };
        assert!(b.advance("A", ready).unwrap().is_empty());
        assert_eq!(b.state("A"), SessionState::HandshakeStarted);

        let out = b.advance("A", premaster).unwrap();
        assert!(out.contains(&HandshakeAction::Established { peer: "A".to_string() }));
        assert_eq!(b.state("A"), SessionState::Secure);
    }

    #[test]
    fn test_tampered_certificate_never_secure() {
        let mut ca = CertificateAuthority::generate().unwrap();
        let mut a = enrolled(&mut ca, "A");
        let mut b = enrolled(&mut ca, "B");
        let mut forged = b.certificate.clone().unwrap();
        forged.subject = "Mallory".to_string();
        b.certificate = Some(forged);

        let hello = a.initiate("B");
        let established = run(&mut a, &mut b, hello);
        assert!(established.is_empty());
        assert_eq!(a.state("B"), SessionState::HandshakeStarted);
        assert_eq!(b.state("A"), SessionState::HandshakeStarted);
    }

    #[test]
    fn test_foreign_ca_rejected() {
        let mut ca = CertificateAuthority::generate().unwrap();
        let mut rogue = CertificateAuthority::generate().unwrap();
        let mut a = enrolled(&mut ca, "A");
        let mut b = enrolled(&mut rogue, "B");

        let hello = a.initiate("B");
        let HandshakeAction::Send { payload, .. } = hello[0].clone() else { panic!() };
        let reply = b.advance("A", payload).unwrap();
        let HandshakeAction::Send { payload, .. } = reply[0].clone() else { panic!() };
        assert!(matches!(a.advance("B", payload), Err(MeshError::Security(_))));
    }

    #[test]
    fn test_premaster_without_hello_rejected() {
        let (mut a, mut b) = pair();
        let sealed = crypto::seal(b.key_pair().public_key_pem(), b"00").unwrap();
        let err = b.advance("A", HandshakePayload::Premaster { data: sealed }).unwrap_err();
        assert!(matches!(err, MeshError::InvalidState(_)));
        assert!(a.advance("B", HandshakePayload::ReadyServer { data: "nope".into() }).is_err());
    }

    #[test]
    fn test_weak_ready_prefix_accepted() {
        let (mut a, mut b) = pair();
        let hello = a.initiate("B");
        let HandshakeAction::Send { payload, .. } = hello[0].clone() else { panic!() };
        let reply = b.advance("A", payload).unwrap();
        let HandshakeAction::Send { payload, .. } = reply[0].clone() else { panic!() };
        a.advance("B", payload).unwrap();

        let out = a
            .advance("B", HandshakePayload::ReadyServer { data: "READY:zzzzz".into() })
            .unwrap();
        assert_eq!(out, vec![HandshakeAction::Established { peer: "B".to_string() }]);
    }

    #[test]
    fn test_wrap_passthrough_until_secure() {
        let (mut a, mut b) = pair();
        let wrapped = a.secure_wrap("B", DataPayload::from("hi")).unwrap();
        assert_eq!(wrapped, DataPayload::from("hi"));
        assert_eq!(b.secure_unwrap("A", wrapped), UnwrappedPayload::Plain("hi".to_string()));

        let hello = a.initiate("B");
        run(&mut a, &mut b, hello);
        let wrapped = a.secure_wrap("B", DataPayload::from("hi")).unwrap();
        assert!(matches!(wrapped, DataPayload::Encrypted(_)));
        assert_eq!(
            b.secure_unwrap("A", wrapped).to_string(),
            "hi"
        );
    }

    #[test]
    fn test_tampered_envelope_reports_failure() {
        let (mut a, mut b) = pair();
        let hello = a.initiate("B");
        run(&mut a, &mut b, hello);

        let DataPayload::Encrypted(mut envelope) = a.secure_wrap("B", DataPayload::from("secret")).unwrap() else {
            panic!("expected envelope");
        };
        envelope.content = "00".repeat(envelope.content.len() / 2);
        let out = b.secure_unwrap("A", DataPayload::Encrypted(envelope));
        assert_eq!(out, UnwrappedPayload::DecryptionFailed);
        assert_eq!(out.to_string(), DECRYPTION_FAILED);
    }

    #[test]
    fn test_envelope_without_key_passes_through() {
        let (a, _) = pair();
        let key = crypto::SessionKey::from_hex("11".repeat(32));
        let envelope = crypto::encrypt("x", &key).unwrap();
        let out = a.secure_unwrap("B", DataPayload::Encrypted(envelope.clone()));
        assert_eq!(out, UnwrappedPayload::Undecryptable(envelope));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]
        #[test]
        fn prop_wrap_unwrap_identity(text in ".*") {
            let (mut a, mut b) = pair();
            let hello = a.initiate("B");
            run(&mut a, &mut b, hello);
            let wrapped = a.secure_wrap("B", DataPayload::from(text.as_str())).unwrap();
            prop_assert_eq!(b.secure_unwrap("A", wrapped), UnwrappedPayload::Decrypted(text));
        }
    }
}
