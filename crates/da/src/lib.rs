//! Core data-availability domain for celestia-da.
//!
//! This crate holds every domain concept the shim needs: the namespace codec,
//! the value types exchanged with clients, the error taxonomy, and the two port
//! traits that separate the domain from I/O. Infrastructure crates implement
//! [`BlobService`] (the backing node) or serve [`DataAvailability`] (the
//! transport); they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** No I/O dependencies. The
//! [`CelestiaDa`] facade is pure composition over a [`BlobService`].
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`namespace`] | `Namespace` codec and version-0 validation |
//! | [`types`] | `Blob`, `BlobId`, `Commitment`, `Proof`, `Height` |
//! | [`errors`] | `BackendError`, `DaError` |
//! | [`ports`] | `BlobService`, `DataAvailability` |
//! | [`facade`] | `CelestiaDa` |

pub mod errors;
pub mod facade;
pub mod namespace;
pub mod ports;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{BackendError, DaError};
pub use facade::{CelestiaDa, DEFAULT_MAX_BLOB_SIZE};
pub use namespace::{Namespace, NamespaceError, NamespaceVersion, NAMESPACE_ID_SIZE, NAMESPACE_SIZE};
pub use ports::{BlobService, DataAvailability, StoredBlob};
pub use types::{Blob, BlobId, Commitment, Height, InvalidBlobId, Proof};
