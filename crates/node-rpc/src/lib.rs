//! celestia-da backing node client adapter.
//!
//! Implements the [`da::BlobService`] trait over the backing node's JSON-RPC
//! API: JSON-RPC 2.0 requests sent as HTTP POSTs, authenticated with a bearer
//! token.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Request framing, authentication, timeouts, and response
//! decoding all live here. The [`da`] crate sees only [`da::BlobService`].
//!
//! ## Connecting
//!
//! [`connect`] parses the address, builds the HTTP client, and issues a single
//! probe call so that unreachable nodes and rejected tokens surface at startup
//! rather than on the first client request. There is no retry: callers treat
//! every [`ConnectError`] other than [`ConnectError::Canceled`] as fatal.

mod client;
mod connect;
mod wire;

pub use client::{ClientConfig, NodeRpcClient, DEFAULT_REQUEST_TIMEOUT};
pub use connect::{connect, connect_with, parse_address, ConnectError};
