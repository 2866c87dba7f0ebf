//! Command tree.

use std::fmt;

use clap::{Args, Parser, Subcommand, ValueEnum};
use lifecycle::{DaServiceConfig, DEFAULT_LISTEN_NETWORK, DEFAULT_NODE_ADDRESS};

/// Data-availability shim served alongside a celestia node.
#[derive(Parser, Debug)]
#[command(name = "celestia-da")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "pretty", env = "CELESTIA_DA_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint; spans are exported when set.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT", global = true)]
    pub otlp_endpoint: Option<String>,

    #[command(subcommand)]
    pub node: NodeCommand,
}

impl Cli {
    /// Splits out the node type and the start arguments.
    pub fn into_start(self) -> (NodeType, DaArgs) {
        let (node, NodeArgs { action }) = match self.node {
            NodeCommand::Bridge(args) => (NodeType::Bridge, args),
            NodeCommand::Full(args) => (NodeType::Full, args),
            NodeCommand::Light(args) => (NodeType::Light, args),
        };
        match action {
            NodeAction::Start(start) => (node, start.da),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum LogFormat {
    /// Human-readable, multi-line.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum NodeCommand {
    /// Manage a bridge node.
    Bridge(NodeArgs),
    /// Manage a full node.
    Full(NodeArgs),
    /// Manage a light node.
    Light(NodeArgs),
}

#[derive(Args, Debug)]
pub struct NodeArgs {
    #[command(subcommand)]
    pub action: NodeAction,
}

#[derive(Subcommand, Debug)]
pub enum NodeAction {
    /// Start the node and the celestia-da service.
    Start(StartArgs),
}

#[derive(Args, Debug)]
pub struct StartArgs {
    #[command(flatten)]
    pub da: DaArgs,
}

/// Flags of the celestia-da service.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct DaArgs {
    /// Backing node RPC address.
    #[arg(long = "grpc.address", default_value = DEFAULT_NODE_ADDRESS, env = "CELESTIA_DA_ADDRESS")]
    pub address: String,

    /// Backing node auth token.
    #[arg(long = "grpc.token", env = "CELESTIA_DA_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Namespace ID for blobs, 28 bytes as hex.
    #[arg(long = "grpc.namespace", env = "CELESTIA_DA_NAMESPACE")]
    pub namespace: Option<String>,

    /// Address the service listens on.
    #[arg(long = "grpc.listen", default_value = "", env = "CELESTIA_DA_LISTEN")]
    pub listen: String,

    /// Network family to listen on: tcp, tcp4, tcp6, unix or unixpacket.
    #[arg(long = "grpc.network", default_value = DEFAULT_LISTEN_NETWORK, env = "CELESTIA_DA_NETWORK")]
    pub network: String,
}

impl From<DaArgs> for DaServiceConfig {
    fn from(args: DaArgs) -> Self {
        Self {
            node_address: args.address,
            node_token: args.token,
            namespace: args.namespace,
            listen_address: args.listen,
            listen_network: args.network,
            ..DaServiceConfig::default()
        }
    }
}

/// Which kind of node is being started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Bridge,
    Full,
    Light,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bridge => "bridge",
            Self::Full => "full",
            Self::Light => "light",
        })
    }
}
