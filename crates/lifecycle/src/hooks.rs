//! Host start hooks.
//!
//! A host builds one [`StartHooks`] list at its composition root, registers
//! callbacks in the order they must run, and calls [`StartHooks::run`] once
//! configuration is resolved and before its main loop. Hooks that launch a
//! background service hand back its [`ServiceHandle`]; the collected handles
//! form the host's [`Services`].

use std::error::Error as StdError;
use std::future::pending;

use futures::future::{select_all, FutureExt};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{DaServiceConfig, DaServiceError};
use crate::service::{launch, Connector, ServiceHandle};

/// Boxed error returned by a hook.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

type Hook = Box<dyn FnOnce(&StartContext) -> Result<Option<ServiceHandle>, BoxError> + Send>;

/// What a hook gets to see of the host.
#[derive(Debug, Clone)]
pub struct StartContext {
    /// Cancelled when the host begins to stop.
    pub shutdown: CancellationToken,
}

/// A hook failed; the host must not start.
#[derive(Debug, Error)]
#[error("start hook '{hook}' failed: {source}")]
pub struct HookError {
    /// Name the hook was registered under.
    pub hook: String,
    /// What went wrong.
    #[source]
    pub source: BoxError,
}

/// Ordered list of start callbacks.
#[derive(Default)]
pub struct StartHooks {
    hooks: Vec<(String, Hook)>,
}

impl StartHooks {
    /// Creates an empty hook list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hook; hooks run in registration order.
    pub fn register<F>(&mut self, name: impl Into<String>, hook: F) -> &mut Self
    where
        F: FnOnce(&StartContext) -> Result<Option<ServiceHandle>, BoxError> + Send + 'static,
    {
        self.hooks.push((name.into(), Box::new(hook)));
        self
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Runs every hook in order, stopping at the first failure.
    ///
    /// Services launched by hooks that ran before a failure are shut down
    /// before the error is returned.
    ///
    /// # Errors
    ///
    /// The first [`HookError`].
    pub async fn run(self, ctx: &StartContext) -> Result<Services, HookError> {
        let mut services = Services::default();

        for (name, hook) in self.hooks {
            debug!(hook = %name, "running start hook");
            match hook(ctx) {
                Ok(Some(handle)) => services.handles.push((name, handle)),
                Ok(None) => {}
                Err(source) => {
                    services.shutdown().await;
                    return Err(HookError { hook: name, source });
                }
            }
        }
        Ok(services)
    }
}

impl std::fmt::Debug for StartHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|(name, _)| name))
            .finish()
    }
}

/// Background services launched by start hooks.
#[derive(Debug, Default)]
pub struct Services {
    handles: Vec<(String, ServiceHandle)>,
}

impl Services {
    /// Number of running services.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no hook launched a service.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Resolves with the first fatal service failure. Pending forever when
    /// there are no services or none fail.
    pub async fn fatal(&mut self) -> DaServiceError {
        if self.handles.is_empty() {
            return pending().await;
        }
        let watchers = self
            .handles
            .iter_mut()
            .map(|(_, handle)| handle.fatal().boxed());
        let (err, _, _) = select_all(watchers).await;
        err
    }

    /// Stops every service in reverse launch order.
    ///
    /// Returns the failures encountered while stopping, tagged with the name
    /// of the hook that launched the service.
    pub async fn shutdown(self) -> Vec<(String, DaServiceError)> {
        let mut failures = Vec::new();
        for (name, handle) in self.handles.into_iter().rev() {
            if let Err(e) = handle.shutdown().await {
                failures.push((name, e));
            }
        }
        info!(failed = failures.len(), "services stopped");
        failures
    }
}

/// Builds the hook that launches the data-availability service.
pub fn da_service_hook<C: Connector>(
    config: DaServiceConfig,
    connector: C,
) -> impl FnOnce(&StartContext) -> Result<Option<ServiceHandle>, BoxError> + Send + 'static {
    move |ctx: &StartContext| {
        launch(&config, connector, ctx.shutdown.clone())
            .map(Some)
            .map_err(BoxError::from)
    }
}
