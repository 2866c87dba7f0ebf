//! The host process: start hooks, signals, and exit status.

use anyhow::Context;
use lifecycle::{da_service_hook, DaServiceConfig, RpcConnector, StartContext, StartHooks};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cli::{DaArgs, NodeType};

/// Runs the node until a signal arrives or a service fails fatally.
pub async fn run(node: NodeType, args: DaArgs) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();

    let mut hooks = StartHooks::new();
    hooks.register(
        "celestia-da",
        da_service_hook(DaServiceConfig::from(args), RpcConnector),
    );

    let ctx = StartContext {
        shutdown: shutdown.clone(),
    };
    let mut services = hooks
        .run(&ctx)
        .await
        .with_context(|| format!("failed to start {node} node"))?;
    info!(%node, services = services.len(), "node started");

    let outcome = tokio::select! {
        signal = shutdown_signal() => {
            match signal {
                Ok(()) => info!("shutdown requested"),
                Err(e) => error!(error = %e, "failed to listen for shutdown signals; stopping"),
            }
            Ok(())
        }
        err = services.fatal() => Err(err),
    };

    shutdown.cancel();
    let failures = services.shutdown().await;
    for (hook, e) in &failures {
        error!(hook = %hook, error = %e, "service failed while stopping");
    }

    outcome.context("celestia-da service failed")?;
    if let Some((hook, e)) = failures.into_iter().next() {
        return Err(anyhow::Error::new(e).context(format!("service '{hook}' failed while stopping")));
    }
    info!(%node, "node stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() -> std::io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}
