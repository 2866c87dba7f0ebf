//! Value types exchanged through the data-availability contract.
//!
//! Payloads, commitments, and proofs are opaque byte strings owned by the
//! backing node's format; this crate never looks inside them. [`BlobId`] is the
//! one type with structure: it packs a block [`Height`] and a [`Commitment`]
//! so a single identifier is enough to fetch a blob back.
//!
//! All byte-carrying types serialise as standard base64 strings, matching the
//! JSON encoding the backing node uses for byte slices.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Serde adapter encoding `Vec<u8>` as a standard base64 string.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Macro for byte-string newtypes.
// Generates: struct, new(), as_bytes(), into_bytes(), len(), is_empty(),
// base64 serde, From<Vec<u8>>.
// ---------------------------------------------------------------------------
macro_rules! bytes_type {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
        pub struct $name(Vec<u8>);

        impl $name {
            /// Wraps raw bytes.
            pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
                Self(bytes.into())
            }

            /// Returns the bytes as a slice.
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            /// Consumes the value and returns the owned bytes.
            pub fn into_bytes(self) -> Vec<u8> {
                self.0
            }

            /// Returns the number of bytes.
            pub fn len(&self) -> usize {
                self.0.len()
            }

            /// Returns `true` if there are no bytes.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<Vec<u8>> for $name {
            fn from(bytes: Vec<u8>) -> Self {
                Self(bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                base64_bytes::serialize(&self.0, serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                base64_bytes::deserialize(deserializer).map(Self)
            }
        }
    };
}

bytes_type! {
    /// Opaque blob payload submitted to or retrieved from the backing node.
    Blob
}

bytes_type! {
    /// Commitment the backing node computes over a blob's share layout.
    ///
    /// Used together with a [`Height`] to address a single blob.
    Commitment
}

bytes_type! {
    /// Inclusion proof in the backing node's own encoding.
    ///
    /// Proofs are fetched from and handed back to the backing node verbatim.
    Proof
}

// ---------------------------------------------------------------------------
// Heights
// ---------------------------------------------------------------------------

/// Block height in the backing chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Height(u64);

impl Height {
    /// Creates a [`Height`] from a raw integer.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying integer value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Height {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Blob identifiers
// ---------------------------------------------------------------------------

/// Number of leading [`BlobId`] bytes holding the little-endian height.
pub const HEIGHT_PREFIX_SIZE: usize = 8;

/// A [`BlobId`] too short to carry a height.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("blob ID must be at least {HEIGHT_PREFIX_SIZE} bytes, got {len}")]
pub struct InvalidBlobId {
    /// Length of the rejected ID.
    pub len: usize,
}

bytes_type! {
    /// Identifies a submitted blob: little-endian [`Height`] followed by the
    /// blob's [`Commitment`].
    BlobId
}

impl BlobId {
    /// Packs a height and commitment into an identifier.
    pub fn from_parts(height: Height, commitment: &Commitment) -> Self {
        let mut bytes = Vec::with_capacity(HEIGHT_PREFIX_SIZE + commitment.len());
        bytes.extend_from_slice(&height.as_u64().to_le_bytes());
        bytes.extend_from_slice(commitment.as_bytes());
        Self(bytes)
    }

    /// Splits the identifier back into height and commitment.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBlobId`] if the ID is shorter than
    /// [`HEIGHT_PREFIX_SIZE`] bytes.
    pub fn split(&self) -> Result<(Height, Commitment), InvalidBlobId> {
        if self.0.len() < HEIGHT_PREFIX_SIZE {
            return Err(InvalidBlobId { len: self.0.len() });
        }
        let (height, commitment) = self.0.split_at(HEIGHT_PREFIX_SIZE);
        let mut prefix = [0u8; HEIGHT_PREFIX_SIZE];
        prefix.copy_from_slice(height);
        Ok((
            Height::new(u64::from_le_bytes(prefix)),
            Commitment::new(commitment),
        ))
    }
}
