//! Configuration management for Meshlink.
//!
//! Two documents drive a node: the static [`Topology`] shared by every node
//! of the overlay, and the per-process [`NodeSettings`] read from the
//! environment.

use crate::error::{CoreError, Result};
use crate::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Host used for nodes that do not specify one.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// One node entry of the topology document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeEntry {
    /// TCP port the node listens on
    pub port: u16,
    /// Adjacent nodes, in routing tie-break order
    #[serde(default)]
    pub neighbors: Vec<NodeId>,
    /// Host the node listens on
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

impl NodeEntry {
    /// Create an entry on the default host.
    pub fn new(port: u16, neighbors: &[&str]) -> Self {
        Self {
            port,
            neighbors: neighbors.iter().map(|n| n.to_string()).collect(),
            host: default_host(),
        }
    }

    /// `host:port` socket address string.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Static overlay topology: node id -> {port, neighbors}.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topology {
    /// All nodes of the overlay
    pub nodes: BTreeMap<NodeId, NodeEntry>,
}

impl Topology {
    /// Build a validated topology from `(id, entry)` pairs.
    pub fn from_nodes<I>(nodes: I) -> Result<Self>
    where
        I: IntoIterator<Item = (NodeId, NodeEntry)>,
    {
        let topology = Self {
            nodes: nodes.into_iter().collect(),
        };
        topology.validate()?;
        Ok(topology)
    }

    /// Parse and validate a JSON topology document.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let topology: Self = serde_json::from_str(raw)?;
        topology.validate()?;
        Ok(topology)
    }

    /// Parse and validate a TOML topology document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let topology: Self = toml::from_str(raw)?;
        topology.validate()?;
        Ok(topology)
    }

    /// Load a topology file; `.toml` files are parsed as TOML, everything
    /// else as JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&raw),
            _ => Self::from_json_str(&raw),
        }
    }

    /// Check that every neighbor reference resolves to a node entry.
    pub fn validate(&self) -> Result<()> {
        for (id, entry) in &self.nodes {
            if let Some(missing) = entry.neighbors.iter().find(|n| !self.nodes.contains_key(*n)) {
                return Err(CoreError::UnknownNeighbor {
                    node: id.clone(),
                    neighbor: missing.clone(),
                });
            }
        }
        Ok(())
    }

    /// Look up a node entry.
    pub fn get(&self, id: &str) -> Option<&NodeEntry> {
        self.nodes.get(id)
    }

    /// Look up a node entry, failing with [`CoreError::UnknownNode`].
    pub fn require(&self, id: &str) -> Result<&NodeEntry> {
        self.get(id)
            .ok_or_else(|| CoreError::UnknownNode(id.to_string()))
    }

    /// Whether the node exists.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Neighbors of a node in configured order (empty for unknown ids).
    pub fn neighbors(&self, id: &str) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|entry| entry.neighbors.as_slice())
            .unwrap_or(&[])
    }

    /// Socket address of a node.
    pub fn address(&self, id: &str) -> Option<String> {
        self.nodes.get(id).map(NodeEntry::address)
    }
}

/// Per-process settings, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSettings {
    /// CA service host
    pub ca_host: String,
    /// CA service port
    pub ca_port: u16,
    /// Path of the topology document
    pub topology_path: PathBuf,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            ca_host: DEFAULT_HOST.to_string(),
            ca_port: 8000,
            topology_path: PathBuf::from("topology.json"),
        }
    }
}

impl NodeSettings {
    /// Read `CA_HOST`, `CA_PORT` and `TOPOLOGY_PATH`, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`NodeSettings::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let ca_port = match lookup("CA_PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| CoreError::Config(format!("CA_PORT is not a port: {raw}")))?,
            None => defaults.ca_port,
        };

        Ok(Self {
            ca_host: lookup("CA_HOST").unwrap_or(defaults.ca_host),
            ca_port,
            topology_path: lookup("TOPOLOGY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.topology_path),
        })
    }

    /// Base URL of the CA service.
    pub fn ca_url(&self) -> String {
        format!("http://{}:{}", self.ca_host, self.ca_port)
    }
}
