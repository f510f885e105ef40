//! Per-peer security contexts.

use meshlink_core::NodeId;
use meshlink_crypto::SessionKey;
use meshlink_identity::Certificate;
use std::collections::HashMap;
use std::fmt;
use zeroize::Zeroizing;

/// Handshake progress with one peer. Only ever moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionState {
    #[default]
    None,
    HandshakeStarted,
    Secure,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::None => "NONE",
            SessionState::HandshakeStarted => "HANDSHAKE_STARTED",
            SessionState::Secure => "SECURE",
        };
        f.write_str(name)
    }
}

/// Security context this node holds for one peer.
#[derive(Default)]
pub struct SecurityContext {
    state: SessionState,
    pub(crate) my_random: Option<String>,
    pub(crate) peer_random: Option<String>,
    pub(crate) premaster: Option<Zeroizing<String>>,
    pub(crate) session_key: Option<SessionKey>,
    pub(crate) peer_cert: Option<Certificate>,
    /// READY proof received from the peer, possibly ahead of the key.
    pub(crate) peer_ready: Option<String>,
}

impl fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityContext")
            .field("state", &self.state)
            .field("session_key", &self.session_key)
            .field("peer", &self.peer_cert.as_ref().map(|c| &c.subject))
            .finish_non_exhaustive()
    }
}

impl SecurityContext {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_secure(&self) -> bool {
        self.state == SessionState::Secure
    }

    pub fn session_key(&self) -> Option<&SessionKey> {
        self.session_key.as_ref()
    }

    pub fn peer_certificate(&self) -> Option<&Certificate> {
        self.peer_cert.as_ref()
    }

    /// Move to `next` if it is ahead of the current state.
    /// Returns whether the state changed.
    pub(crate) fn advance_to(&mut self, next: SessionState) -> bool {
        if next > self.state {
            self.state = next;
            true
        } else {
            false
        }
    }

    /// Forget everything negotiated by the previous exchange.
    pub(crate) fn restart_exchange(&mut self) {
        self.premaster = None;
        self.session_key = None;
        self.peer_ready = None;
    }
}

/// All security contexts of one node, created lazily per peer.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<NodeId, SecurityContext>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, peer: &str) -> Option<&SecurityContext> {
        self.sessions.get(peer)
    }

    pub(crate) fn entry(&mut self, peer: &str) -> &mut SecurityContext {
        self.sessions.entry(peer.to_string()).or_default()
    }

    /// Current state for `peer`, `None` if never contacted.
    pub fn state(&self, peer: &str) -> SessionState {
        self.sessions
            .get(peer)
            .map(SecurityContext::state)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
