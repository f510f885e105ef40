//! Fixtures for in-process overlays.

use meshlink_ca::{app, AppState};
use meshlink_core::{NodeEntry, Topology};
use meshlink_crypto::KeyPair;
use meshlink_identity::CaClient;
use meshlink_mesh::{HandshakeManager, Node, NodeEvent, NodeHandle, RunningNode, TransportConfig};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// How long a test waits for an expected event.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Enable log output for a test run (`RUST_LOG` controls the level).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Start a CA on an ephemeral loopback port. Returns its base URL.
pub async fn start_ca() -> String {
    let state = Arc::new(AppState::generate().expect("CA key generation"));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind CA");
    let addr: SocketAddr = listener.local_addr().expect("CA address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app(state)).await;
    });
    format!("http://{addr}")
}

/// A running node plus its event stream.
pub struct TestNode {
    pub handle: NodeHandle,
    pub events: mpsc::UnboundedReceiver<NodeEvent>,
}

impl TestNode {
    /// Wait for the next event, failing the test on timeout.
    pub async fn next_event(&mut self) -> NodeEvent {
        tokio::time::timeout(EVENT_TIMEOUT, self.events.recv())
            .await
            .expect("timed out waiting for node event")
            .expect("node event stream closed")
    }

    /// Whether no event arrives within `wait`.
    pub async fn stays_quiet(&mut self, wait: Duration) -> bool {
        tokio::time::timeout(wait, self.events.recv()).await.is_err()
    }
}

/// An overlay of nodes on loopback listeners, all registered with one CA.
pub struct TestOverlay {
    pub topology: Arc<Topology>,
    pub nodes: HashMap<String, TestNode>,
}

impl TestOverlay {
    /// Build and start an overlay from `(id, neighbors)` pairs.
    pub async fn start(edges: &[(&str, &[&str])], ca_url: &str) -> Self {
        Self::start_with(edges, ca_url, |_| None).await
    }

    /// Like [`TestOverlay::start`], but `ca_for` may send chosen nodes to a different CA.
    pub async fn start_with<F>(edges: &[(&str, &[&str])], ca_url: &str, ca_for: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut listeners = Vec::new();
        let mut entries = Vec::new();
        for (id, neighbors) in edges {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind node");
            let port = listener.local_addr().expect("node address").port();
            entries.push((id.to_string(), NodeEntry::new(port, neighbors)));
            listeners.push((id.to_string(), listener));
        }
        let topology = Arc::new(Topology::from_nodes(entries).expect("valid topology"));

        let config = TransportConfig {
            frame_stagger: Duration::from_millis(5),
            ..TransportConfig::default()
        };

        let mut nodes = HashMap::new();
        for (id, listener) in listeners {
            let url = ca_for(&id).unwrap_or_else(|| ca_url.to_string());
            let key_pair = KeyPair::generate().expect("node key");
            let registration = CaClient::new(url)
                .register(&id, key_pair.public_key_pem())
                .await
                .expect("CA registration");
            let handshake = HandshakeManager::new(id.clone(), key_pair)
                .with_credentials(registration.certificate, registration.ca_public_key);

            let RunningNode { handle, events, .. } =
                Node::start_on(listener, topology.clone(), handshake, config.clone())
                    .expect("node start");
            nodes.insert(id, TestNode { handle, events });
        }

        Self { topology, nodes }
    }

    pub fn node(&mut self, id: &str) -> &mut TestNode {
        self.nodes.get_mut(id).expect("node in overlay")
    }

    pub fn handle(&self, id: &str) -> NodeHandle {
        self.nodes.get(id).expect("node in overlay").handle.clone()
    }
}

/// `A - B - C`
pub const LINE: &[(&str, &[&str])] = &[("A", &["B"]), ("B", &["A", "C"]), ("C", &["B"])];

/// `A - B - D - C - A` plus the chord `B - C`.
pub const CYCLE: &[(&str, &[&str])] = &[
    ("A", &["B", "C"]),
    ("B", &["A", "C", "D"]),
    ("C", &["A", "B", "D"]),
    ("D", &["B", "C"]),
];
