//! Namespace codec.
//!
//! A [`Namespace`] partitions blob data inside the backing node. Operators
//! supply the namespace ID as hex text; [`Namespace::decode`] turns that text
//! into a validated version-0 namespace or explains why it cannot.
//!
//! ## Version 0 layout
//!
//! | Bytes | Meaning |
//! |-------|---------|
//! | `0` | version tag (`0x00`), not part of the operator text |
//! | `1..19` | reserved prefix, must be all zero |
//! | `19..29` | user-chosen ID bytes |
//!
//! The operator text covers the 28-byte ID only (56 hex characters).

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size in bytes of a namespace ID (excluding the version tag).
pub const NAMESPACE_ID_SIZE: usize = 28;

/// Size in bytes of a namespace on the wire (version tag + ID).
pub const NAMESPACE_SIZE: usize = 1 + NAMESPACE_ID_SIZE;

/// Number of leading ID bytes that must be zero for version 0.
pub const VERSION_ZERO_PREFIX_SIZE: usize = 18;

/// Number of user-chosen ID bytes for version 0.
pub const VERSION_ZERO_ID_SIZE: usize = NAMESPACE_ID_SIZE - VERSION_ZERO_PREFIX_SIZE;

/// Structural version of a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamespaceVersion {
    /// The only version accepted for blob data.
    Zero,
}

impl NamespaceVersion {
    /// Returns the on-wire version tag.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Zero => 0,
        }
    }
}

/// Why namespace text could not be turned into a [`Namespace`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NamespaceError {
    /// The text is not an even-length string of hex digits.
    #[error("invalid hex value of a namespace: {0}")]
    InvalidEncoding(#[from] hex::FromHexError),

    /// The decoded bytes violate the version-0 namespace rules.
    #[error("invalid namespace: {reason}")]
    InvalidNamespace {
        /// Which rule was violated.
        reason: String,
    },
}

impl NamespaceError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidNamespace {
            reason: reason.into(),
        }
    }
}

/// A validated version-0 blob namespace.
///
/// Immutable once constructed. The only way to obtain one is through
/// [`Namespace::decode`] or [`Namespace::from_id`], so holding a `Namespace`
/// proves the bytes passed validation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Namespace {
    version: NamespaceVersion,
    id: [u8; NAMESPACE_ID_SIZE],
}

impl Namespace {
    /// Decodes operator-supplied hex text into a namespace.
    ///
    /// Upper- and lower-case hex digits are both accepted.
    ///
    /// # Errors
    ///
    /// - [`NamespaceError::InvalidEncoding`] if `text` has odd length or
    ///   contains a non-hex character.
    /// - [`NamespaceError::InvalidNamespace`] if the decoded bytes are not a
    ///   valid version-0 namespace ID.
    pub fn decode(text: &str) -> Result<Self, NamespaceError> {
        let bytes = hex::decode(text)?;
        Self::from_id(&bytes)
    }

    /// Validates raw ID bytes as a version-0 namespace.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::InvalidNamespace`] when the length is not
    /// [`NAMESPACE_ID_SIZE`], the reserved prefix is not zeroed, or the ID
    /// falls in the range reserved by the backing node.
    pub fn from_id(bytes: &[u8]) -> Result<Self, NamespaceError> {
        let id: [u8; NAMESPACE_ID_SIZE] = bytes.try_into().map_err(|_| {
            NamespaceError::invalid(format!(
                "expected {NAMESPACE_ID_SIZE} bytes for a version 0 namespace ID, got {}",
                bytes.len()
            ))
        })?;

        if id[..VERSION_ZERO_PREFIX_SIZE].iter().any(|b| *b != 0) {
            return Err(NamespaceError::invalid(format!(
                "the first {VERSION_ZERO_PREFIX_SIZE} bytes of a version 0 namespace ID must be zero"
            )));
        }

        // 0x00..00 through 0x00..FF are primary reserved namespaces.
        if id[..NAMESPACE_ID_SIZE - 1].iter().all(|b| *b == 0) {
            return Err(NamespaceError::invalid(
                "namespace ID is reserved by the backing node",
            ));
        }

        Ok(Self {
            version: NamespaceVersion::Zero,
            id,
        })
    }

    /// Parses the on-wire form produced by [`Namespace::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::InvalidNamespace`] if the length is not
    /// [`NAMESPACE_SIZE`], the version tag is not zero, or the ID fails
    /// [`Namespace::from_id`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NamespaceError> {
        match bytes.split_first() {
            Some((0, id)) => Self::from_id(id),
            Some((version, _)) => Err(NamespaceError::invalid(format!(
                "unsupported namespace version {version}"
            ))),
            None => Err(NamespaceError::invalid("empty namespace")),
        }
    }

    /// Returns the structural version.
    pub fn version(&self) -> NamespaceVersion {
        self.version
    }

    /// Returns the 28-byte namespace ID.
    pub fn id(&self) -> &[u8; NAMESPACE_ID_SIZE] {
        &self.id
    }

    /// Returns the user-chosen part of the ID (the bytes after the prefix).
    pub fn user_id(&self) -> &[u8] {
        &self.id[VERSION_ZERO_PREFIX_SIZE..]
    }

    /// Returns the ID as canonical lowercase hex.
    pub fn id_hex(&self) -> String {
        hex::encode(self.id)
    }

    /// Returns the on-wire form: version tag followed by the ID.
    pub fn to_bytes(&self) -> [u8; NAMESPACE_SIZE] {
        let mut out = [0u8; NAMESPACE_SIZE];
        out[0] = self.version.as_u8();
        out[1..].copy_from_slice(&self.id);
        out
    }
}

impl FromStr for Namespace {
    type Err = NamespaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id_hex())
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("version", &self.version)
            .field("id", &self.id_hex())
            .finish()
    }
}
