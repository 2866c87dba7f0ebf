//! Error types for the data-availability domain.
//!
//! [`BackendError`] is what a [`crate::BlobService`] implementation reports when
//! the backing node cannot satisfy a call. [`DaError`] is what the facade
//! reports to transport callers; it wraps backend failures and adds the
//! argument checks the facade performs itself.
//!
//! Namespace decoding errors live next to the codec in
//! [`crate::namespace::NamespaceError`].

use thiserror::Error;

use crate::types::InvalidBlobId;

// ---------------------------------------------------------------------------
// Backend errors
// ---------------------------------------------------------------------------

/// A failed call to the backing node.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The node could not be reached or the request did not complete.
    #[error("transport failure calling {method}: {message}")]
    Transport {
        /// RPC method that was being called.
        method: String,
        /// Description of the transport failure.
        message: String,
    },

    /// The node answered with an RPC-level error.
    #[error("{method} failed with code {code}: {message}")]
    Rpc {
        /// RPC method that was called.
        method: String,
        /// Error code returned by the node.
        code: i64,
        /// Error message returned by the node.
        message: String,
    },

    /// The node's response could not be decoded.
    #[error("malformed response to {method}: {message}")]
    Decode {
        /// RPC method that was called.
        method: String,
        /// Description of the decoding problem.
        message: String,
    },

    /// The requested blob does not exist at the given height.
    #[error("blob not found")]
    NotFound,
}

// ---------------------------------------------------------------------------
// Facade errors
// ---------------------------------------------------------------------------

/// Errors surfaced by [`crate::DataAvailability`] operations.
#[derive(Debug, Error)]
pub enum DaError {
    /// A caller-supplied argument was rejected before reaching the backing node.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A blob ID could not be split into height and commitment.
    #[error(transparent)]
    InvalidId(#[from] InvalidBlobId),

    /// The operation is not offered by this facade.
    #[error("{operation} is not supported")]
    Unsupported {
        /// Name of the unsupported operation.
        operation: &'static str,
    },

    /// The backing node failed the call.
    #[error("backing node error: {0}")]
    Backend(#[from] BackendError),
}

impl DaError {
    /// Stable numeric code for the wire protocol.
    ///
    /// Follows JSON-RPC 2.0 numbering: `-32602` for rejected parameters and
    /// the `-32000..=-32099` server range for everything else.
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) => -32602,
            Self::InvalidId(_) => -32001,
            Self::Unsupported { .. } => -32002,
            Self::Backend(BackendError::NotFound) => -32003,
            Self::Backend(_) => -32000,
        }
    }
}
