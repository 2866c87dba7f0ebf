//! celestia-da entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: the `clap` command tree
//!    `celestia-da <bridge|full|light> start [flags]`, with environment
//!    fallbacks for every flag.
//! 2. **Wire observability**: `tracing-subscriber` with an `EnvFilter`, a
//!    pretty or JSON fmt layer, and an optional OpenTelemetry OTLP exporter.
//!    All `tracing` spans and events from every workspace crate flow through
//!    it.
//! 3. **Register start hooks**: the celestia-da service hook, backed by the
//!    node's JSON-RPC client.
//! 4. **Supervise**: wait for Ctrl-C, SIGTERM, or a fatal service error, then
//!    drain the services. A fatal error exits non-zero.

mod cli;
mod host;
mod telemetry;

use clap::Parser;
use tracing::error;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let telemetry = telemetry::init(cli.log_format, cli.otlp_endpoint.as_deref())?;

    let (node, args) = cli.into_start();
    let result = host::run(node, args).await;
    if let Err(e) = &result {
        let message = format!("{e:#}");
        error!(error = %message, "celestia-da exited with error");
    }

    telemetry.shutdown();
    result
}
