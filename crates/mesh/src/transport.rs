//! Fragmentation, relaying and broadcast flooding.
//!
//! [`Transport`] performs no I/O. Sending a message and handling an inbound
//! frame both return a list of [`TransportAction`]s which the node runtime
//! executes: frames to write to a neighbor (after a stagger delay) and
//! complete messages to hand to the application layer.

use crate::error::{MeshError, MeshResult};
use crate::frame::{split_chunks, AppMessage, Destination, TransportFrame};
use crate::gossip::{SeenFragments, DEFAULT_SEEN_CAPACITY};
use crate::reassembly::ReassemblyBuffers;
use crate::routing::Router;
use meshlink_core::NodeId;
use std::time::Duration;
use uuid::Uuid;

/// Transport tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Nominal maximum frame size
    pub mtu: usize,
    /// Space reserved for frame metadata
    pub header_overhead: usize,
    /// Lower bound on the data chunk size
    pub min_chunk: usize,
    /// Delay between consecutive frames of one message
    pub frame_stagger: Duration,
    /// Remembered broadcast fragments
    pub dedup_capacity: usize,
    /// Lifetime of incomplete reassembly buffers
    pub reassembly_ttl: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mtu: 200,
            header_overhead: 90,
            min_chunk: 10,
            frame_stagger: Duration::from_millis(100),
            dedup_capacity: DEFAULT_SEEN_CAPACITY,
            reassembly_ttl: Duration::from_secs(120),
        }
    }
}

impl TransportConfig {
    /// Characters of payload per frame.
    pub fn chunk_size(&self) -> usize {
        self.mtu
            .saturating_sub(self.header_overhead)
            .max(self.min_chunk)
            .max(1)
    }
}

/// Work produced by the transport for the runtime to carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportAction {
    /// Write `frame` to `next_hop` once `delay` has elapsed
    Transmit {
        next_hop: NodeId,
        frame: TransportFrame,
        delay: Duration,
    },
    /// A complete message from `src` for this node
    Deliver { src: NodeId, message: AppMessage },
}

/// Per-node transport state.
#[derive(Debug)]
pub struct Transport {
    node_id: NodeId,
    router: Router,
    config: TransportConfig,
    seen: SeenFragments,
    buffers: ReassemblyBuffers,
}

impl Transport {
    pub fn new(node_id: impl Into<NodeId>, router: Router, config: TransportConfig) -> Self {
        Self {
            node_id: node_id.into(),
            seen: SeenFragments::new(config.dedup_capacity),
            buffers: ReassemblyBuffers::new(config.reassembly_ttl),
            router,
            config,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Fragment `message` and address its frames.
    ///
    /// Unicast frames all go to the BFS next hop towards `dst`. Broadcast
    /// frames go to every direct neighbor and are marked as seen here so
    /// the flood does not echo back into this node.
    pub fn send(&mut self, dst: Destination, message: &AppMessage) -> MeshResult<Vec<TransportAction>> {
        let hops = match &dst {
            Destination::Node(target) => {
                let hop = self.router.next_hop(&self.node_id, target).ok_or_else(|| {
                    MeshError::NoRoute {
                        destination: target.clone(),
                    }
                })?;
                vec![hop]
            }
            Destination::Broadcast => self.router.topology().neighbors(&self.node_id).to_vec(),
        };

        let serialized = serde_json::to_string(message)?;
        let id = Uuid::new_v4().to_string();
        let chunks = split_chunks(&serialized, self.config.chunk_size());
        let total = chunks.len() as u32;

        tracing::debug!(
            node = %self.node_id,
            %dst,
            kind = message.kind(),
            frames = total,
            "Sending message"
        );

        let mut actions = Vec::with_capacity(chunks.len() * hops.len());
        for (seq, data) in chunks.into_iter().enumerate() {
            let seq = seq as u32;
            let frame = TransportFrame {
                id: id.clone(),
                src: self.node_id.clone(),
                dst: dst.clone(),
                seq,
                total,
                data,
            };
            if dst.is_broadcast() {
                self.seen.insert(&frame.id, seq);
            }
            let delay = self.config.frame_stagger * seq;
            for hop in &hops {
                actions.push(TransportAction::Transmit {
                    next_hop: hop.clone(),
                    frame: frame.clone(),
                    delay,
                });
            }
        }
        Ok(actions)
    }

    /// Process one inbound frame.
    ///
    /// Malformed frames, duplicate broadcast fragments and frames with no
    /// onward route are dropped with a log line; they never fail the node.
    pub fn handle_frame(&mut self, frame: TransportFrame) -> Vec<TransportAction> {
        if !frame.is_well_formed() {
            tracing::warn!(node = %self.node_id, id = %frame.id, seq = frame.seq, total = frame.total, "Dropping malformed frame");
            return Vec::new();
        }

        if frame.dst.is_broadcast() {
            return self.handle_broadcast(frame);
        }
        if frame.dst.is_node(&self.node_id) {
            return self.reassemble(frame).into_iter().collect();
        }

        let dst = frame.dst.to_string();
        match self.router.next_hop(&self.node_id, &dst) {
            Some(next_hop) => {
                tracing::debug!(node = %self.node_id, id = %frame.id, seq = frame.seq, %next_hop, "Relaying frame");
                vec![TransportAction::Transmit {
                    next_hop,
                    frame,
                    delay: Duration::ZERO,
                }]
            }
            None => {
                tracing::warn!(node = %self.node_id, destination = %dst, "No route for relayed frame, dropping");
                Vec::new()
            }
        }
    }

    fn handle_broadcast(&mut self, frame: TransportFrame) -> Vec<TransportAction> {
        if !self.seen.insert(&frame.id, frame.seq) {
            return Vec::new();
        }
        if frame.src == self.node_id {
            return Vec::new();
        }

        let mut actions: Vec<TransportAction> = self
            .router
            .topology()
            .neighbors(&self.node_id)
            .iter()
            .map(|neighbor| TransportAction::Transmit {
                next_hop: neighbor.clone(),
                frame: frame.clone(),
                delay: Duration::ZERO,
            })
            .collect();
        actions.extend(self.reassemble(frame));
        actions
    }

    fn reassemble(&mut self, frame: TransportFrame) -> Option<TransportAction> {
        let complete = match self.buffers.insert(&frame) {
            Ok(Some(complete)) => complete,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(node = %self.node_id, "Dropping frame: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<AppMessage>(&complete) {
            Ok(message) => Some(TransportAction::Deliver {
                src: frame.src,
                message,
            }),
            Err(e) => {
                tracing::warn!(node = %self.node_id, id = %frame.id, "Discarding undecodable message: {}", e);
                None
            }
        }
    }

    /// Incomplete messages currently buffered.
    pub fn pending_reassemblies(&self) -> usize {
        self.buffers.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::DataPayload;
    use meshlink_core::{NodeEntry, Topology};
    use std::collections::{HashMap, VecDeque};
    use std::sync::Arc;

    fn topology(edges: &[(&str, &[&str])]) -> Arc<Topology> {
        let nodes = edges
            .iter()
            .enumerate()
            .map(|(i, (id, neighbors))| (id.to_string(), NodeEntry::new(9000 + i as u16, neighbors)))
            .collect::<Vec<_>>();
        Arc::new(Topology::from_nodes(nodes).unwrap())
    }

    fn config() -> TransportConfig {
        TransportConfig {
            frame_stagger: Duration::ZERO,
            ..TransportConfig::default()
        }
    }

    /// Hand every transmit to the named node until the network is quiet.
    /// Returns what each node delivered and the number of frames sent.
    fn pump(
        transports: &mut HashMap<String, Transport>,
        initial: Vec<TransportAction>,
    ) -> (HashMap<String, Vec<(String, AppMessage)>>, usize) {
        let mut queue: VecDeque<TransportAction> = initial.into();
        let mut delivered: HashMap<String, Vec<(String, AppMessage)>> = HashMap::new();
        let mut transmits = 0;

        while let Some(action) = queue.pop_front() {
            let TransportAction::Transmit { next_hop, frame, .. } = action else {
                continue;
            };
            transmits += 1;
            let node = transports.get_mut(&next_hop).expect("known node");
            for produced in node.handle_frame(frame) {
                match produced {
                    TransportAction::Deliver { src, message } => delivered
                        .entry(next_hop.clone())
                        .or_default()
                        .push((src, message)),
                    transmit => queue.push_back(transmit),
                }
            }
        }
        (delivered, transmits)
    }

    fn line() -> HashMap<String, Transport> {
        let topo = topology(&[("A", &["B"]), ("B", &["A", "C"]), ("C", &["B"])]);
        ["A", "B", "C"]
            .into_iter()
            .map(|id| (id.to_string(), Transport::new(id, Router::new(topo.clone()), config())))
            .collect()
    }

    #[test]
    fn test_chunk_size_floor() {
        let cfg = TransportConfig {
            mtu: 50,
            ..TransportConfig::default()
        };
        assert_eq!(cfg.chunk_size(), 10);
        assert_eq!(TransportConfig::default().chunk_size(), 110);
    }

    #[test]
    fn test_unicast_relayed_and_attributed_to_origin() {
        let mut nodes = line();
        let message = AppMessage::Data(DataPayload::from("hello"));
        let actions = nodes
            .get_mut("A")
            .unwrap()
            .send(Destination::from("C"), &message)
            .unwrap();
        assert!(actions
            .iter()
            .all(|a| matches!(a, TransportAction::Transmit { next_hop, .. } if next_hop == "B")));

        let (delivered, _) = pump(&mut nodes, actions);
        assert_eq!(delivered.get("C"), Some(&vec![("A".to_string(), message)]));
        assert!(delivered.get("B").is_none());
    }

    #[test]
    fn test_large_message_fragmented() {
        let mut nodes = line();
        let text = "x".repeat(1_000);
        let message = AppMessage::Data(DataPayload::from(text.as_str()));
        let actions = nodes
            .get_mut("A")
            .unwrap()
            .send(Destination::from("C"), &message)
            .unwrap();
        assert!(actions.len() > 1);
        let total = match &actions[0] {
            TransportAction::Transmit { frame, .. } => frame.total as usize,
            _ => panic!("expected transmit"),
        };
        assert_eq!(actions.len(), total);

        let (delivered, _) = pump(&mut nodes, actions);
        assert_eq!(delivered["C"].len(), 1);
        assert_eq!(delivered["C"][0].1, message);
    }

    #[test]
    fn test_frames_staggered_by_sequence() {
        let topo = topology(&[("A", &["B"]), ("B", &["A"])]);
        let mut a = Transport::new("A", Router::new(topo), TransportConfig::default());
        let text = "y".repeat(500);
        let actions = a
            .send(Destination::from("B"), &AppMessage::Data(DataPayload::from(text)))
            .unwrap();
        for action in actions {
            if let TransportAction::Transmit { frame, delay, .. } = action {
                assert_eq!(delay, Duration::from_millis(100) * frame.seq);
            }
        }
    }

    #[test]
    fn test_no_route_errors() {
        let topo = topology(&[("A", &[]), ("B", &[])]);
        let mut a = Transport::new("A", Router::new(topo), config());
        let message = AppMessage::Data(DataPayload::from("x"));
        assert!(matches!(
            a.send(Destination::from("B"), &message),
            Err(MeshError::NoRoute { .. })
        ));
        assert!(a.send(Destination::from("A"), &message).is_err());
    }

    #[test]
    fn test_broadcast_reaches_all_once_in_cycle() {
        let topo = topology(&[
            ("A", &["B", "C"]),
            ("B", &["A", "C", "D"]),
            ("C", &["A", "B", "D"]),
            ("D", &["B", "C"]),
        ]);
        let mut nodes: HashMap<String, Transport> = ["A", "B", "C", "D"]
            .into_iter()
            .map(|id| (id.to_string(), Transport::new(id, Router::new(topo.clone()), config())))
            .collect();

        let message = AppMessage::Broadcast("hi all".to_string());
        let actions = nodes
            .get_mut("A")
            .unwrap()
            .send(Destination::Broadcast, &message)
            .unwrap();
        assert_eq!(actions.len(), 2);

        let (delivered, transmits) = pump(&mut nodes, actions);
        for id in ["B", "C", "D"] {
            assert_eq!(delivered[id], vec![("A".to_string(), message.clone())]);
        }
        assert!(delivered.get("A").is_none());
        // Each node forwards the single fragment once per neighbor.
        assert!(transmits <= 2 + 3 + 3 + 2);
    }

    #[test]
    fn test_malformed_frame_dropped() {
        let mut nodes = line();
        let frame = TransportFrame {
            id: "m".to_string(),
            src: "A".to_string(),
            dst: Destination::from("C"),
            seq: 3,
            total: 2,
            data: String::new(),
        };
        assert!(nodes.get_mut("B").unwrap().handle_frame(frame).is_empty());
    }

    #[test]
    fn test_relay_without_route_dropped() {
        let mut nodes = line();
        let frame = TransportFrame {
            id: "m".to_string(),
            src: "A".to_string(),
            dst: Destination::from("Z"),
            seq: 0,
            total: 1,
            data: "{}".to_string(),
        };
        assert!(nodes.get_mut("B").unwrap().handle_frame(frame).is_empty());
    }
}
