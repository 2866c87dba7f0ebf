//! JSON shapes exchanged with the backing node.
//!
//! The node speaks JSON-RPC 2.0 with positional parameters. Byte slices are
//! base64 strings; namespaces travel in their 29-byte wire form.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use da::types::base64_bytes;
use da::{Blob, Commitment, Namespace, StoredBlob};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outgoing JSON-RPC request envelope.
#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

/// Incoming JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

/// Error member of a JSON-RPC response.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// A blob as the node encodes it.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WireBlob {
    #[serde(with = "base64_bytes")]
    pub namespace: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub share_version: u32,
    // The node derives the commitment itself on submit.
    #[serde(
        default,
        with = "base64_bytes",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub commitment: Vec<u8>,
}

impl WireBlob {
    /// Builds the submit form of a payload.
    pub fn outgoing(namespace: &Namespace, blob: &Blob) -> Self {
        Self {
            namespace: namespace.to_bytes().to_vec(),
            data: blob.as_bytes().to_vec(),
            share_version: 0,
            commitment: Vec::new(),
        }
    }

    /// Converts a node response into the domain type.
    pub fn into_stored(self) -> Result<StoredBlob, String> {
        let namespace = Namespace::from_bytes(&self.namespace).map_err(|e| e.to_string())?;
        Ok(StoredBlob {
            namespace,
            data: Blob::new(self.data),
            commitment: Commitment::new(self.commitment),
        })
    }
}

/// Base64 form of a namespace for positional parameters.
pub(crate) fn namespace_param(namespace: &Namespace) -> Value {
    bytes_param(&namespace.to_bytes())
}

/// Base64 form of arbitrary bytes for positional parameters.
pub(crate) fn bytes_param(bytes: &[u8]) -> Value {
    Value::String(STANDARD.encode(bytes))
}
