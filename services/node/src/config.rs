use clap::Parser;
use meshlink_core::NodeSettings;
use std::path::PathBuf;

/// Meshlink overlay node
#[derive(Debug, Parser)]
#[command(name = "meshlink-node")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Id of this node in the topology
    pub node_id: String,

    /// Topology file (JSON or TOML) [env: TOPOLOGY_PATH]
    #[arg(short, long)]
    pub topology: Option<PathBuf>,

    /// CA service host [env: CA_HOST]
    #[arg(long)]
    pub ca_host: Option<String>,

    /// CA service port [env: CA_PORT]
    #[arg(long)]
    pub ca_port: Option<u16>,

    /// Delay between frames of one message, in milliseconds
    #[arg(long, default_value_t = 100)]
    pub frame_stagger_ms: u64,
}

impl Args {
    /// Apply command-line overrides on top of environment settings.
    pub fn settings(&self, mut base: NodeSettings) -> NodeSettings {
        if let Some(path) = &self.topology {
            base.topology_path = path.clone();
        }
        if let Some(host) = &self.ca_host {
            base.ca_host = host.clone();
        }
        if let Some(port) = self.ca_port {
            base.ca_port = port;
        }
        base
    }
}
