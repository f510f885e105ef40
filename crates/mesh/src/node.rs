//! Node runtime.
//!
//! One worker task owns the [`Transport`] and [`HandshakeManager`] and
//! processes inbound frames and application commands strictly one at a
//! time. Connection handlers only parse frames and queue them; outbound
//! frames are written by short-lived detached tasks.

use crate::error::{MeshError, MeshResult};
use crate::frame::{AppMessage, DataPayload, Destination, TransportFrame};
use crate::handshake::{HandshakeAction, HandshakeManager, UnwrappedPayload};
use crate::routing::Router;
use crate::session::SessionState;
use crate::transport::{Transport, TransportAction, TransportConfig};
use crate::wire;
use meshlink_core::{CoreError, NodeId, Topology};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Depth of the worker's inbound queue.
const INBOUND_QUEUE: usize = 1024;

/// Requests from the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeCommand {
    /// Start a handshake with a peer
    Connect(NodeId),
    /// Send text to a peer, encrypted if the session is secure
    Send { to: NodeId, text: String },
    /// Flood text to every node
    Broadcast(String),
    /// Stop the runtime
    Shutdown,
}

/// Notifications to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    DataReceived { from: NodeId, payload: UnwrappedPayload },
    BroadcastReceived { from: NodeId, text: String },
    SecureChannelEstablished { peer: NodeId },
}

enum Inbound {
    Frame(TransportFrame),
    Command {
        command: NodeCommand,
        reply: oneshot::Sender<MeshResult<()>>,
    },
    SessionState {
        peer: NodeId,
        reply: oneshot::Sender<SessionState>,
    },
}

/// Cloneable handle to a running node.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    node_id: NodeId,
    local_addr: SocketAddr,
    inbound: mpsc::Sender<Inbound>,
}

impl std::fmt::Debug for Inbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Inbound::Frame(frame) => f.debug_tuple("Frame").field(&frame.id).finish(),
            Inbound::Command { command, .. } => f.debug_tuple("Command").field(command).finish(),
            Inbound::SessionState { peer, .. } => f.debug_tuple("SessionState").field(peer).finish(),
        }
    }
}

impl NodeHandle {
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Submit a command and wait until the worker has processed it.
    pub async fn execute(&self, command: NodeCommand) -> MeshResult<()> {
        let (reply, rx) = oneshot::channel();
        self.inbound
            .send(Inbound::Command { command, reply })
            .await
            .map_err(|_| MeshError::Stopped)?;
        rx.await.map_err(|_| MeshError::Stopped)?
    }

    pub async fn connect(&self, peer: impl Into<NodeId>) -> MeshResult<()> {
        self.execute(NodeCommand::Connect(peer.into())).await
    }

    pub async fn send(&self, to: impl Into<NodeId>, text: impl Into<String>) -> MeshResult<()> {
        self.execute(NodeCommand::Send {
            to: to.into(),
            text: text.into(),
        })
        .await
    }

    pub async fn broadcast(&self, text: impl Into<String>) -> MeshResult<()> {
        self.execute(NodeCommand::Broadcast(text.into())).await
    }

    pub async fn shutdown(&self) -> MeshResult<()> {
        self.execute(NodeCommand::Shutdown).await
    }

    /// Session state with `peer` as seen by this node.
    pub async fn session_state(&self, peer: impl Into<NodeId>) -> MeshResult<SessionState> {
        let (reply, rx) = oneshot::channel();
        self.inbound
            .send(Inbound::SessionState {
                peer: peer.into(),
                reply,
            })
            .await
            .map_err(|_| MeshError::Stopped)?;
        rx.await.map_err(|_| MeshError::Stopped)
    }
}

/// Running node: the handle plus the application event stream.
pub struct RunningNode {
    pub handle: NodeHandle,
    pub events: mpsc::UnboundedReceiver<NodeEvent>,
    pub task: JoinHandle<()>,
}

/// Node builder and worker state.
pub struct Node {
    node_id: NodeId,
    topology: Arc<Topology>,
    transport: Transport,
    handshake: HandshakeManager,
    events: mpsc::UnboundedSender<NodeEvent>,
}

impl Node {
    /// Bind the address the topology assigns to `handshake.node_id()` and start.
    pub async fn start(
        topology: Arc<Topology>,
        handshake: HandshakeManager,
        config: TransportConfig,
    ) -> MeshResult<RunningNode> {
        let addr = topology.require(handshake.node_id())?.address();
        let listener = TcpListener::bind(&addr).await?;
        Self::start_on(listener, topology, handshake, config)
    }

    /// Start on an already bound listener.
    pub fn start_on(
        listener: TcpListener,
        topology: Arc<Topology>,
        handshake: HandshakeManager,
        config: TransportConfig,
    ) -> MeshResult<RunningNode> {
        let node_id = handshake.node_id().to_string();
        topology.require(&node_id)?;
        let local_addr = listener.local_addr()?;

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let node = Node {
            transport: Transport::new(node_id.clone(), Router::new(topology.clone()), config),
            node_id: node_id.clone(),
            topology,
            handshake,
            events: events_tx,
        };

        tracing::info!(node = %node_id, "Node listening on {}", local_addr);
        let acceptor = tokio::spawn(accept_loop(listener, inbound_tx.clone(), node_id.clone()));
        let task = tokio::spawn(node.run(inbound_rx, acceptor));

        Ok(RunningNode {
            handle: NodeHandle {
                node_id,
                local_addr,
                inbound: inbound_tx,
            },
            events: events_rx,
            task,
        })
    }

    async fn run(mut self, mut inbound: mpsc::Receiver<Inbound>, acceptor: JoinHandle<()>) {
        while let Some(item) = inbound.recv().await {
            match item {
                Inbound::Frame(frame) => {
                    let actions = self.transport.handle_frame(frame);
                    self.execute(actions);
                }
                Inbound::SessionState { peer, reply } => {
                    let _ = reply.send(self.handshake.state(&peer));
                }
                Inbound::Command {
                    command: NodeCommand::Shutdown,
                    reply,
                } => {
                    let _ = reply.send(Ok(()));
                    break;
                }
                Inbound::Command { command, reply } => {
                    let result = self.handle_command(command);
                    if let Err(e) = &result {
                        tracing::warn!(node = %self.node_id, "Command failed: {}", e);
                    }
                    let _ = reply.send(result);
                }
            }
        }
        acceptor.abort();
        tracing::info!(node = %self.node_id, "Node stopped");
    }

    fn handle_command(&mut self, command: NodeCommand) -> MeshResult<()> {
        match command {
            NodeCommand::Connect(peer) => {
                self.require_peer(&peer)?;
                let actions = self.handshake.initiate(&peer);
                self.apply_handshake(actions)
            }
            NodeCommand::Send { to, text } => {
                self.require_peer(&to)?;
                let payload = self.handshake.secure_wrap(&to, DataPayload::Plain(text))?;
                let actions = self
                    .transport
                    .send(Destination::Node(to), &AppMessage::Data(payload))?;
                self.execute(actions);
                Ok(())
            }
            NodeCommand::Broadcast(text) => {
                let actions = self
                    .transport
                    .send(Destination::Broadcast, &AppMessage::Broadcast(text))?;
                self.execute(actions);
                Ok(())
            }
            NodeCommand::Shutdown => Ok(()),
        }
    }

    fn require_peer(&self, peer: &str) -> MeshResult<()> {
        if peer == self.node_id {
            return Err(MeshError::NoRoute {
                destination: peer.to_string(),
            });
        }
        if !self.topology.contains(peer) {
            return Err(CoreError::UnknownNode(peer.to_string()).into());
        }
        Ok(())
    }

    fn apply_handshake(&mut self, actions: Vec<HandshakeAction>) -> MeshResult<()> {
        for action in actions {
            match action {
                HandshakeAction::Send { to, payload } => {
                    let frames = self
                        .transport
                        .send(Destination::Node(to), &AppMessage::Handshake(payload))?;
                    self.execute(frames);
                }
                HandshakeAction::Established { peer } => {
                    self.emit(NodeEvent::SecureChannelEstablished { peer });
                }
            }
        }
        Ok(())
    }

    fn execute(&mut self, actions: Vec<TransportAction>) {
        for action in actions {
            match action {
                TransportAction::Transmit {
                    next_hop,
                    frame,
                    delay,
                } => self.transmit(next_hop, frame, delay),
                TransportAction::Deliver { src, message } => self.deliver(src, message),
            }
        }
    }

    fn transmit(&self, next_hop: NodeId, frame: TransportFrame, delay: std::time::Duration) {
        let Some(addr) = self.topology.address(&next_hop) else {
            tracing::warn!(node = %self.node_id, %next_hop, "No address for next hop");
            return;
        };
        let node_id = self.node_id.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Err(e) = wire::send_frame(&addr, &frame).await {
                tracing::warn!(node = %node_id, %next_hop, id = %frame.id, seq = frame.seq, "Failed to send frame: {}", e);
            }
        });
    }

    fn deliver(&mut self, src: NodeId, message: AppMessage) {
        match message {
            AppMessage::Handshake(payload) => {
                let result = self
                    .handshake
                    .advance(&src, payload)
                    .and_then(|actions| self.apply_handshake(actions));
                if let Err(e) = result {
                    tracing::warn!(node = %self.node_id, peer = %src, "Handshake aborted: {}", e);
                }
            }
            AppMessage::Data(payload) => {
                let payload = self.handshake.secure_unwrap(&src, payload);
                self.emit(NodeEvent::DataReceived { from: src, payload });
            }
            AppMessage::Broadcast(text) => {
                self.emit(NodeEvent::BroadcastReceived { from: src, text });
            }
        }
    }

    fn emit(&self, event: NodeEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!(node = %self.node_id, "Event receiver dropped");
        }
    }
}

async fn accept_loop(listener: TcpListener, inbound: mpsc::Sender<Inbound>, node_id: NodeId) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(node = %node_id, "Accept failed: {}", e);
                continue;
            }
        };
        let inbound = inbound.clone();
        let node_id = node_id.clone();
        tokio::spawn(async move {
            match wire::read_frame(stream).await {
                Ok(frame) => {
                    if inbound.send(Inbound::Frame(frame)).await.is_err() {
                        tracing::debug!(node = %node_id, "Runtime stopped, dropping frame");
                    }
                }
                Err(e) => tracing::warn!(node = %node_id, %peer, "Discarding inbound frame: {}", e),
            }
        });
    }
}
