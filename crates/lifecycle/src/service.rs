//! The supervised data-availability service.
//!
//! [`launch`] validates configuration on the caller's stack and then spawns a
//! single task that connects to the backing node, builds the facade, binds the
//! listener and serves. The caller keeps a [`ServiceHandle`] to observe the
//! task, to learn about fatal failures and to stop it.

use std::future::pending;
use std::sync::Arc;

use async_trait::async_trait;
use da::{BlobService, CelestiaDa, DataAvailability};
use listener::{bind, LocalAddr, Security, Server};
use node_rpc::{ClientConfig, ConnectError, NodeRpcClient};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::{DaServiceConfig, DaServiceError, ValidatedConfig};

/// Port for obtaining a backing node client.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Client produced by a successful connect.
    type Client: BlobService + 'static;

    /// Connects to the node at `address`, giving up when `cancel` fires.
    async fn connect(
        &self,
        address: &str,
        token: &str,
        config: &ClientConfig,
        cancel: &CancellationToken,
    ) -> Result<Self::Client, ConnectError>;
}

/// [`Connector`] backed by the node's JSON-RPC endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct RpcConnector;

#[async_trait]
impl Connector for RpcConnector {
    type Client = NodeRpcClient;

    async fn connect(
        &self,
        address: &str,
        token: &str,
        config: &ClientConfig,
        cancel: &CancellationToken,
    ) -> Result<NodeRpcClient, ConnectError> {
        node_rpc::connect_with(address, token, config, cancel).await
    }
}

/// Observable progress of the service task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Connecting or binding.
    Unstarted,
    /// Accepting connections on the given address.
    Listening(LocalAddr),
    /// Stopped without a fatal error.
    StoppedClean,
    /// Stopped with a fatal error, reported through [`ServiceHandle::fatal`].
    StoppedError,
}

/// Starts the data-availability service.
///
/// Configuration is checked before anything is spawned, so a missing token or
/// namespace never reaches the network. `shutdown` is the host's cancellation
/// token; it aborts an in-progress connect. The serve loop itself only stops
/// through [`ServiceHandle::shutdown`].
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Any error from [`DaServiceConfig::validate`].
pub fn launch<C: Connector>(
    config: &DaServiceConfig,
    connector: C,
    shutdown: CancellationToken,
) -> Result<ServiceHandle, DaServiceError> {
    let validated = config.validate()?;
    info!(
        namespace = %validated.namespace,
        node = %validated.node_address,
        listen = %validated.endpoint,
        "launching celestia-da service"
    );

    let (state_tx, state_rx) = watch::channel(RunState::Unstarted);
    let close = CancellationToken::new();
    let span = info_span!("da_service", namespace = %validated.namespace);
    let task = tokio::spawn(
        supervise(validated, connector, shutdown, close.clone(), state_tx).instrument(span),
    );

    Ok(ServiceHandle {
        close,
        state: state_rx,
        task: Some(task),
    })
}

async fn supervise<C: Connector>(
    config: ValidatedConfig,
    connector: C,
    shutdown: CancellationToken,
    close: CancellationToken,
    state: watch::Sender<RunState>,
) -> Result<(), DaServiceError> {
    let outcome = run(config, &connector, &shutdown, close, &state).await;

    match &outcome {
        Ok(()) => {
            state.send_replace(RunState::StoppedClean);
        }
        Err(e) if !e.is_fatal() => {
            info!(error = %e, "service stopped before serving");
            state.send_replace(RunState::StoppedClean);
        }
        Err(e) => {
            error!(error = %e, "celestia-da service failed");
            state.send_replace(RunState::StoppedError);
        }
    }
    outcome
}

async fn run<C: Connector>(
    config: ValidatedConfig,
    connector: &C,
    shutdown: &CancellationToken,
    close: CancellationToken,
    state: &watch::Sender<RunState>,
) -> Result<(), DaServiceError> {
    let client = connector
        .connect(&config.node_address, &config.node_token, &config.client, shutdown)
        .await?;

    let facade: Arc<dyn DataAvailability> = Arc::new(CelestiaDa::new(client, config.namespace));
    let listener = bind(&config.endpoint).await?;
    state.send_replace(RunState::Listening(listener.local_addr().clone()));

    Server::new(facade, Security::Insecure)
        .with_config(config.server)
        .serve_listener(listener, close)
        .await?;
    Ok(())
}

/// Handle to a launched service.
#[derive(Debug)]
pub struct ServiceHandle {
    close: CancellationToken,
    state: watch::Receiver<RunState>,
    task: Option<JoinHandle<Result<(), DaServiceError>>>,
}

impl ServiceHandle {
    /// Returns a receiver that tracks [`RunState`] changes.
    pub fn state(&self) -> watch::Receiver<RunState> {
        self.state.clone()
    }

    /// Resolves with the error if the task fails fatally.
    ///
    /// A clean stop, or a connect cancelled by host shutdown, leaves this
    /// pending forever. Cancel-safe.
    pub async fn fatal(&mut self) -> DaServiceError {
        let Some(task) = self.task.as_mut() else {
            return pending().await;
        };
        let outcome = join_outcome(task.await);
        self.task = None;

        match outcome {
            Err(e) if e.is_fatal() => e,
            _ => pending().await,
        }
    }

    /// Closes the listener, waits for connections to drain and the task to end.
    ///
    /// # Errors
    ///
    /// The task's fatal error, if it had already failed or failed while
    /// stopping.
    pub async fn shutdown(mut self) -> Result<(), DaServiceError> {
        self.close.cancel();
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        match join_outcome(task.await) {
            Err(e) if e.is_fatal() => Err(e),
            _ => {
                info!("celestia-da service stopped");
                Ok(())
            }
        }
    }
}

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        if self.task.is_some() && !self.close.is_cancelled() {
            warn!("service handle dropped without shutdown; closing listener");
            self.close.cancel();
        }
    }
}

fn join_outcome(
    joined: Result<Result<(), DaServiceError>, tokio::task::JoinError>,
) -> Result<(), DaServiceError> {
    joined.map_err(|e| DaServiceError::Task(e.to_string()))?
}
