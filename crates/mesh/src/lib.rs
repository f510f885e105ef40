//! Meshlink Mesh - multi-hop overlay transport with authenticated sessions
//!
//! Nodes of a static topology exchange fragmented JSON frames over
//! short-lived TCP connections, relaying unicast traffic along BFS shortest
//! paths and flooding broadcasts with duplicate suppression.
//!
//! # Core Components
//!
//! - **Routing**: deterministic BFS next-hop selection over the topology
//! - **Transport**: fragmentation, reassembly, relaying and broadcast flooding
//! - **Handshake**: certificate-authenticated key agreement per peer pair
//! - **Node**: single-worker runtime tying the above to TCP
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use meshlink_core::Topology;
//! use meshlink_crypto::KeyPair;
//! use meshlink_mesh::{HandshakeManager, Node, TransportConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let topology = Arc::new(Topology::from_file("topology.json")?);
//! let handshake = HandshakeManager::new("A", KeyPair::generate()?);
//! let node = Node::start(topology, handshake, TransportConfig::default()).await?;
//! node.handle.broadcast("hello everyone").await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod frame;
pub mod gossip;
pub mod handshake;
pub mod node;
pub mod reassembly;
pub mod routing;
pub mod session;
pub mod transport;
pub mod wire;

pub use error::{MeshError, MeshResult};
pub use frame::{
    split_chunks, AppMessage, DataPayload, Destination, HandshakePayload, TransportFrame,
    BROADCAST_ID,
};
pub use gossip::SeenFragments;
pub use handshake::{HandshakeAction, HandshakeManager, UnwrappedPayload, DECRYPTION_FAILED};
pub use node::{Node, NodeCommand, NodeEvent, NodeHandle, RunningNode};
pub use reassembly::ReassemblyBuffers;
pub use routing::Router;
pub use session::{SecurityContext, SessionState, SessionStore};
pub use transport::{Transport, TransportAction, TransportConfig};
