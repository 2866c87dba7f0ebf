//! Port traits.
//!
//! - [`BlobService`] is implemented by infrastructure crates that talk to the
//!   backing node (see `node-rpc`).
//! - [`DataAvailability`] is the contract the transport serves. The
//!   [`crate::CelestiaDa`] facade implements it over any [`BlobService`].
//!
//! Both traits are dyn-compatible via `async-trait` so the composition root can
//! hold them as trait objects.

use async_trait::async_trait;

use crate::errors::{BackendError, DaError};
use crate::namespace::Namespace;
use crate::types::{Blob, BlobId, Commitment, Height, Proof};

/// A blob as stored by the backing node, with the commitment it computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Namespace the blob was submitted under.
    pub namespace: Namespace,
    /// Payload bytes.
    pub data: Blob,
    /// Commitment computed by the backing node.
    pub commitment: Commitment,
}

/// Blob operations offered by the backing node.
#[async_trait]
pub trait BlobService: Send + Sync {
    /// Submits payloads under `namespace` and returns the inclusion height.
    ///
    /// A negative `gas_price` asks the node to pick its own price.
    async fn submit(
        &self,
        namespace: &Namespace,
        blobs: &[Blob],
        gas_price: f64,
    ) -> Result<Height, BackendError>;

    /// Fetches one blob by height and commitment.
    async fn get(
        &self,
        height: Height,
        namespace: &Namespace,
        commitment: &Commitment,
    ) -> Result<StoredBlob, BackendError>;

    /// Fetches every blob in `namespace` at `height`.
    ///
    /// Returns an empty list when the height holds no blobs for the namespace.
    async fn get_all(
        &self,
        height: Height,
        namespace: &Namespace,
    ) -> Result<Vec<StoredBlob>, BackendError>;

    /// Fetches the inclusion proof for one blob.
    async fn get_proof(
        &self,
        height: Height,
        namespace: &Namespace,
        commitment: &Commitment,
    ) -> Result<Proof, BackendError>;

    /// Asks the node whether `proof` shows `commitment` included at `height`.
    async fn included(
        &self,
        height: Height,
        namespace: &Namespace,
        proof: &Proof,
        commitment: &Commitment,
    ) -> Result<bool, BackendError>;
}

/// The data-availability request contract served over the transport.
#[async_trait]
pub trait DataAvailability: Send + Sync {
    /// Largest payload, in bytes, a single blob may carry.
    async fn max_blob_size(&self) -> Result<u64, DaError>;

    /// Retrieves blobs by identifier, in request order.
    async fn get(&self, ids: &[BlobId]) -> Result<Vec<Blob>, DaError>;

    /// Lists identifiers of all blobs at `height`.
    async fn get_ids(&self, height: Height) -> Result<Vec<BlobId>, DaError>;

    /// Computes commitments for payloads without submitting them.
    async fn commit(&self, blobs: &[Blob]) -> Result<Vec<Commitment>, DaError>;

    /// Submits payloads; returns one identifier and one proof per blob.
    async fn submit(
        &self,
        blobs: &[Blob],
        gas_price: f64,
    ) -> Result<(Vec<BlobId>, Vec<Proof>), DaError>;

    /// Checks each `(id, proof)` pair for inclusion.
    async fn validate(&self, ids: &[BlobId], proofs: &[Proof]) -> Result<Vec<bool>, DaError>;
}
