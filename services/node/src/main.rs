//! Meshlink overlay node.

mod cli;
mod config;

use anyhow::Context;
use clap::Parser;
use meshlink_core::{logging, NodeSettings, Topology};
use meshlink_crypto::KeyPair;
use meshlink_identity::CaClient;
use meshlink_mesh::{HandshakeManager, Node, NodeEvent, TransportConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use config::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_from_env();

    let args = Args::parse();
    let settings = args.settings(NodeSettings::from_env()?);

    let topology = Topology::from_file(&settings.topology_path)
        .with_context(|| format!("loading topology {}", settings.topology_path.display()))?;
    topology.require(&args.node_id)?;
    let topology = Arc::new(topology);

    let key_pair = KeyPair::generate()?;
    info!(node = %args.node_id, fingerprint = %key_pair.fingerprint(), "Generated node key pair");

    let ca = CaClient::new(settings.ca_url());
    let registration = ca
        .register(&args.node_id, key_pair.public_key_pem())
        .await
        .with_context(|| format!("registering with CA at {}", ca.base_url()))?;

    let handshake = HandshakeManager::new(args.node_id.clone(), key_pair)
        .with_credentials(registration.certificate, registration.ca_public_key);
    let transport = TransportConfig {
        frame_stagger: Duration::from_millis(args.frame_stagger_ms),
        ..TransportConfig::default()
    };
    let node = Node::start(topology, handshake, transport).await?;

    let interactive = cli::is_interactive();
    tokio::spawn(print_events(node.events, args.node_id.clone(), interactive));

    if interactive {
        cli::run(node.handle.clone()).await?;
    } else {
        println!("[CLI] Non-interactive mode (stdin is not a TTY). Commands disabled.");
        tokio::signal::ctrl_c().await?;
    }

    node.handle.shutdown().await?;
    Ok(())
}

async fn print_events(mut events: mpsc::UnboundedReceiver<NodeEvent>, node_id: String, interactive: bool) {
    while let Some(event) = events.recv().await {
        match event {
            NodeEvent::DataReceived { from, payload } => {
                println!("\n>>> [RECEIVED] From Node {from}: {payload}");
            }
            NodeEvent::BroadcastReceived { from, text } => {
                println!("\n>>> [BROADCAST RECEIVED] From Node {from}: {text}");
            }
            NodeEvent::SecureChannelEstablished { peer } => {
                println!("\n*** Secure channel established with Node {peer}");
            }
        }
        if interactive {
            cli::prompt(&node_id);
        }
    }
}
