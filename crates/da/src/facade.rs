//! The Celestia data-availability facade.
//!
//! [`CelestiaDa`] pairs exactly one [`BlobService`] with exactly one
//! [`Namespace`] and implements [`DataAvailability`] by delegating to the
//! backing node. Every operation is scoped to that namespace. The facade keeps
//! no mutable state, so one instance can be shared across connections behind
//! an `Arc`.

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::errors::{BackendError, DaError};
use crate::namespace::Namespace;
use crate::ports::{BlobService, DataAvailability};
use crate::types::{Blob, BlobId, Commitment, Height, Proof};

/// Largest blob payload accepted by the backing chain, in bytes.
pub const DEFAULT_MAX_BLOB_SIZE: u64 = 1_974_272;

/// Data-availability facade over a backing node client.
pub struct CelestiaDa<C> {
    client: C,
    namespace: Namespace,
}

impl<C: BlobService> CelestiaDa<C> {
    /// Composes a facade from an already-connected client and a validated
    /// namespace.
    pub fn new(client: C, namespace: Namespace) -> Self {
        Self { client, namespace }
    }

    /// Returns the namespace every operation is scoped to.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}

impl<C> std::fmt::Debug for CelestiaDa<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CelestiaDa")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C: BlobService> DataAvailability for CelestiaDa<C> {
    async fn max_blob_size(&self) -> Result<u64, DaError> {
        Ok(DEFAULT_MAX_BLOB_SIZE)
    }

    #[instrument(skip_all, fields(count = ids.len()))]
    async fn get(&self, ids: &[BlobId]) -> Result<Vec<Blob>, DaError> {
        let mut blobs = Vec::with_capacity(ids.len());
        for id in ids {
            let (height, commitment) = id.split()?;
            let stored = self.client.get(height, &self.namespace, &commitment).await?;
            blobs.push(stored.data);
        }
        Ok(blobs)
    }

    #[instrument(skip(self), fields(height = %height))]
    async fn get_ids(&self, height: Height) -> Result<Vec<BlobId>, DaError> {
        let stored = match self.client.get_all(height, &self.namespace).await {
            Ok(stored) => stored,
            Err(BackendError::NotFound) => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(stored
            .iter()
            .map(|blob| BlobId::from_parts(height, &blob.commitment))
            .collect())
    }

    async fn commit(&self, blobs: &[Blob]) -> Result<Vec<Commitment>, DaError> {
        if blobs.is_empty() {
            return Ok(Vec::new());
        }
        Err(DaError::Unsupported {
            operation: "commit",
        })
    }

    #[instrument(skip_all, fields(count = blobs.len(), gas_price = gas_price))]
    async fn submit(
        &self,
        blobs: &[Blob],
        gas_price: f64,
    ) -> Result<(Vec<BlobId>, Vec<Proof>), DaError> {
        if blobs.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let height = self.client.submit(&self.namespace, blobs, gas_price).await?;
        debug!(%height, "blobs included");

        // The node reports only the height; recover each blob's commitment by
        // matching payloads, consuming matches so duplicates map one-to-one.
        let mut included = self.client.get_all(height, &self.namespace).await?;
        let mut ids = Vec::with_capacity(blobs.len());
        let mut proofs = Vec::with_capacity(blobs.len());
        for blob in blobs {
            let position = included
                .iter()
                .position(|stored| stored.data == *blob)
                .ok_or(BackendError::NotFound)?;
            let stored = included.remove(position);

            let proof = self
                .client
                .get_proof(height, &self.namespace, &stored.commitment)
                .await?;
            ids.push(BlobId::from_parts(height, &stored.commitment));
            proofs.push(proof);
        }
        Ok((ids, proofs))
    }

    #[instrument(skip_all, fields(count = ids.len()))]
    async fn validate(&self, ids: &[BlobId], proofs: &[Proof]) -> Result<Vec<bool>, DaError> {
        if ids.len() != proofs.len() {
            return Err(DaError::InvalidArgument(format!(
                "got {} IDs but {} proofs",
                ids.len(),
                proofs.len()
            )));
        }

        let mut results = Vec::with_capacity(ids.len());
        for (id, proof) in ids.iter().zip(proofs) {
            let (height, commitment) = id.split()?;
            let included = self
                .client
                .included(height, &self.namespace, proof, &commitment)
                .await?;
            results.push(included);
        }
        Ok(results)
    }
}
