//! Core functionality for the Meshlink overlay network.
//!
//! This crate provides the fundamental types shared by every Meshlink
//! component: the static topology document, node settings, the common
//! error type and the logging bootstrap.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{NodeEntry, NodeSettings, Topology, DEFAULT_HOST};
pub use error::{CoreError, Result};

/// Identifier of a logical overlay node (as written in the topology document).
pub type NodeId = String;
