//! Core error types

use thiserror::Error;

/// Core error type for Meshlink
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration error (missing or invalid settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Topology document violates an invariant
    #[error("Topology error: node {node} references unknown neighbor {neighbor}")]
    UnknownNeighbor {
        /// Node whose neighbor list is broken
        node: String,
        /// Neighbor id that has no entry
        neighbor: String,
    },

    /// Node id absent from the topology
    #[error("Node {0} is not defined in the topology")]
    UnknownNode(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
