//! Wire and application message types.
//!
//! A [`TransportFrame`] is one bounded-size fragment of a serialized
//! [`AppMessage`]. Frames sharing an `id` carry the same `total` and distinct
//! `seq` values in `[0, total)`.

use meshlink_core::NodeId;
use meshlink_crypto::EncryptedPayload;
use meshlink_identity::Certificate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Destination string reserved for flooded broadcast frames.
pub const BROADCAST_ID: &str = "BROADCAST";

/// Frame destination: one node, or every reachable node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Destination {
    /// A single node
    Node(NodeId),
    /// Flooded to all nodes
    Broadcast,
}

impl Destination {
    /// Whether this destination is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Destination::Broadcast)
    }

    /// Whether this destination names `node`.
    pub fn is_node(&self, node: &str) -> bool {
        matches!(self, Destination::Node(id) if id == node)
    }
}

impl From<String> for Destination {
    fn from(raw: String) -> Self {
        if raw == BROADCAST_ID {
            Destination::Broadcast
        } else {
            Destination::Node(raw)
        }
    }
}

impl From<&str> for Destination {
    fn from(raw: &str) -> Self {
        Destination::from(raw.to_string())
    }
}

impl From<Destination> for String {
    fn from(dst: Destination) -> Self {
        match dst {
            Destination::Node(id) => id,
            Destination::Broadcast => BROADCAST_ID.to_string(),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Node(id) => f.write_str(id),
            Destination::Broadcast => f.write_str(BROADCAST_ID),
        }
    }
}

/// One fragment of a serialized application message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportFrame {
    /// Message id shared by all fragments
    pub id: String,
    /// Originating node
    pub src: NodeId,
    /// Final destination
    pub dst: Destination,
    /// Fragment index in `[0, total)`
    pub seq: u32,
    /// Number of fragments of the message
    pub total: u32,
    /// Fragment contents
    pub data: String,
}

impl TransportFrame {
    /// Check the `seq`/`total` header invariant.
    pub fn is_well_formed(&self) -> bool {
        self.total > 0 && self.seq < self.total
    }
}

/// Handshake step record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandshakePayload {
    /// Initiator nonce
    ClientHello {
        /// Initiator random, hex
        random: String,
    },
    /// Responder nonce and certificate
    ServerHello {
        /// Responder random, hex
        random: String,
        /// Responder's CA-signed certificate
        certificate: Certificate,
    },
    /// Premaster secret sealed to the responder's certified key
    Premaster {
        /// Sealed premaster, base64
        data: String,
    },
    /// Initiator key-possession proof
    ReadyClient {
        /// `READY:` followed by a session key prefix
        data: String,
    },
    /// Responder key-possession proof
    ReadyServer {
        /// `READY:` followed by a session key prefix
        data: String,
    },
}

impl HandshakePayload {
    /// Step name as it appears on the wire.
    pub fn step(&self) -> &'static str {
        match self {
            HandshakePayload::ClientHello { .. } => "CLIENT_HELLO",
            HandshakePayload::ServerHello { .. } => "SERVER_HELLO",
            HandshakePayload::Premaster { .. } => "PREMASTER",
            HandshakePayload::ReadyClient { .. } => "READY_CLIENT",
            HandshakePayload::ReadyServer { .. } => "READY_SERVER",
        }
    }
}

/// DATA payload: a plain string or an AES-GCM envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataPayload {
    /// Encrypted under the pairwise session key
    Encrypted(EncryptedPayload),
    /// Sent in the clear
    Plain(String),
}

impl From<&str> for DataPayload {
    fn from(text: &str) -> Self {
        DataPayload::Plain(text.to_string())
    }
}

impl From<String> for DataPayload {
    fn from(text: String) -> Self {
        DataPayload::Plain(text)
    }
}

/// Application message carried by a frame sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppMessage {
    /// Security handshake step
    Handshake(HandshakePayload),
    /// Point-to-point data
    Data(DataPayload),
    /// Flooded plain text
    Broadcast(String),
}

impl AppMessage {
    /// Message type name as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            AppMessage::Handshake(_) => "HANDSHAKE",
            AppMessage::Data(_) => "DATA",
            AppMessage::Broadcast(_) => "BROADCAST",
        }
    }
}

/// Split `data` into `ceil(chars / chunk_size)` ordered chunks.
///
/// Chunks are cut on character boundaries so every chunk is valid UTF-8;
/// `chunk_size` counts characters. An empty input yields no chunks.
pub fn split_chunks(data: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let chars: Vec<char> = data.chars().collect();
    chars
        .chunks(chunk_size)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
