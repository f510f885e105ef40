//! End-to-end tests for the Meshlink overlay
//!
//! Every test runs a real CA and several nodes in-process on loopback
//! listeners, so frames cross actual TCP connections.
//!
//! - Multi-hop relaying and source attribution
//! - Broadcast flooding over cyclic topologies
//! - Handshake, secure channel establishment and encrypted DATA

pub mod test_utils;

#[cfg(test)]
mod overlay_tests;

#[cfg(test)]
mod secure_channel_tests;
