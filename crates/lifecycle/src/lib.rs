//! celestia-da lifecycle coordinator.
//!
//! Wires the namespace codec, the backing node client, the facade and the
//! transport server into one supervised service, and gives the host an ordered
//! list of start hooks to launch it from.
//!
//! ## Startup
//!
//! 1. [`DaServiceConfig::validate`] runs synchronously inside the start hook.
//!    A missing token or namespace, or a namespace that does not decode, fails
//!    the hook before any network activity.
//! 2. [`launch`] spawns the service task: connect, build the facade, bind,
//!    serve. The host's startup path does not wait on it.
//! 3. The host watches [`ServiceHandle::fatal`] (or [`Services::fatal`]) next
//!    to its own signals; any error arriving there must end the process with
//!    a non-zero status.
//!
//! ## Architectural Layer
//!
//! **Composition.** Owns no protocol or domain logic of its own.

mod config;
mod hooks;
mod service;

pub use config::{
    DaServiceConfig, DaServiceError, ValidatedConfig, DEFAULT_LISTEN_NETWORK, DEFAULT_NODE_ADDRESS,
};
pub use hooks::{da_service_hook, BoxError, HookError, Services, StartContext, StartHooks};
pub use service::{launch, Connector, RpcConnector, RunState, ServiceHandle};
