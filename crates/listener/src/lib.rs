//! celestia-da transport server.
//!
//! Binds a listener on a configurable network family and serves the
//! [`da::DataAvailability`] contract over it:
//!
//! - [`bind`] turns a [`ListenerEndpoint`] (`tcp`, `tcp4`, `tcp6`, `unix`,
//!   `unixpacket`) into a [`BoundListener`], or a [`BindError`].
//! - [`Server`] runs the accept/serve loop, one task per connection, with
//!   newline-delimited JSON framing on stream sockets and one frame per
//!   packet on `unixpacket` (see [`protocol`]).
//!
//! ## Shutdown
//!
//! | Exit | Result |
//! |------|--------|
//! | `close` token cancelled | `Ok(())`, the expected path |
//! | non-transient accept error | [`ServerError`], fatal to the host |
//!
//! Either way the listener is released once and open connections drain.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Socket handling, framing, and request decoding live
//! here. The [`da`] crate sees none of it.

mod endpoint;
pub mod protocol;
mod server;

pub use endpoint::{bind, Accepted, BindError, BoundListener, ListenNetwork, ListenerEndpoint, LocalAddr};
pub use server::{
    Security, ServeError, Server, ServerConfig, ServerError, DEFAULT_DRAIN_TIMEOUT,
    DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_FRAME_LENGTH,
};
