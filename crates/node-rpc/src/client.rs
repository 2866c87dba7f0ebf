//! JSON-RPC client for the backing node.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use da::{BackendError, Blob, BlobService, Commitment, Height, Namespace, Proof, StoredBlob};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::wire::{bytes_param, namespace_param, RpcRequest, RpcResponse, WireBlob};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Message the node uses when a height holds no matching blob.
const NOT_FOUND_MESSAGE: &str = "blob: not found";

/// Tunables for [`NodeRpcClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upper bound on a single request, including the response body.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Why a single call failed, before it is mapped to a caller-facing error.
#[derive(Debug)]
pub(crate) enum CallError {
    Http(reqwest::Error),
    Status(StatusCode),
    Rpc { code: i64, message: String },
    Decode(String),
}

impl CallError {
    fn into_backend(self, method: &str) -> BackendError {
        match self {
            Self::Http(err) => BackendError::Transport {
                method: method.to_owned(),
                message: err.to_string(),
            },
            Self::Status(status) => BackendError::Transport {
                method: method.to_owned(),
                message: format!("HTTP {status}"),
            },
            Self::Rpc { message, .. } if message.contains(NOT_FOUND_MESSAGE) => {
                BackendError::NotFound
            }
            Self::Rpc { code, message } => BackendError::Rpc {
                method: method.to_owned(),
                code,
                message,
            },
            Self::Decode(message) => BackendError::Decode {
                method: method.to_owned(),
                message,
            },
        }
    }
}

/// Handle to the backing node's JSON-RPC endpoint.
///
/// Obtained through [`crate::connect`], which verifies the node is reachable
/// and accepts the token before handing the client out.
pub struct NodeRpcClient {
    http: reqwest::Client,
    url: Url,
    token: String,
    next_id: AtomicU64,
}

impl NodeRpcClient {
    pub(crate) fn new(url: Url, token: &str, config: &ClientConfig) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            url,
            token: token.to_owned(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Returns the endpoint this client talks to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Sends one JSON-RPC call and returns the raw `result` member.
    pub(crate) async fn send(&self, method: &str, params: Value) -> Result<Value, CallError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let mut builder = self.http.post(self.url.clone()).json(&request);
        if !self.token.is_empty() {
            builder = builder.bearer_auth(&self.token);
        }

        let response = builder.send().await.map_err(CallError::Http)?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CallError::Status(status));
        }

        // JSON-RPC errors may arrive with a non-2xx status, so decode first.
        let body: RpcResponse = match response.json().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => return Err(CallError::Status(status)),
            Err(err) => return Err(CallError::Decode(err.to_string())),
        };

        if let Some(error) = body.error {
            return Err(CallError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(body.result.unwrap_or(Value::Null))
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, BackendError> {
        debug!(method, "calling backing node");
        let result = self
            .send(method, params)
            .await
            .map_err(|e| e.into_backend(method))?;
        serde_json::from_value(result).map_err(|e| BackendError::Decode {
            method: method.to_owned(),
            message: e.to_string(),
        })
    }
}

impl std::fmt::Debug for NodeRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRpcClient")
            .field("url", &self.url.as_str())
            .field("authenticated", &!self.token.is_empty())
            .finish_non_exhaustive()
    }
}

fn proof_param(method: &str, proof: &Proof) -> Result<Value, BackendError> {
    serde_json::from_slice(proof.as_bytes()).map_err(|e| BackendError::Decode {
        method: method.to_owned(),
        message: format!("proof is not valid JSON: {e}"),
    })
}

fn stored(method: &str, wire: WireBlob) -> Result<StoredBlob, BackendError> {
    wire.into_stored().map_err(|message| BackendError::Decode {
        method: method.to_owned(),
        message,
    })
}

#[async_trait]
impl BlobService for NodeRpcClient {
    #[instrument(skip_all, fields(count = blobs.len()))]
    async fn submit(
        &self,
        namespace: &Namespace,
        blobs: &[Blob],
        gas_price: f64,
    ) -> Result<Height, BackendError> {
        let wire: Vec<WireBlob> = blobs
            .iter()
            .map(|blob| WireBlob::outgoing(namespace, blob))
            .collect();
        let height: u64 = self
            .call("blob.Submit", json!([wire, gas_price]))
            .await?;
        Ok(Height::new(height))
    }

    #[instrument(skip_all, fields(height = %height))]
    async fn get(
        &self,
        height: Height,
        namespace: &Namespace,
        commitment: &Commitment,
    ) -> Result<StoredBlob, BackendError> {
        const METHOD: &str = "blob.Get";
        let wire: WireBlob = self
            .call(
                METHOD,
                json!([
                    height.as_u64(),
                    namespace_param(namespace),
                    bytes_param(commitment.as_bytes())
                ]),
            )
            .await?;
        stored(METHOD, wire)
    }

    #[instrument(skip_all, fields(height = %height))]
    async fn get_all(
        &self,
        height: Height,
        namespace: &Namespace,
    ) -> Result<Vec<StoredBlob>, BackendError> {
        const METHOD: &str = "blob.GetAll";
        let wire: Option<Vec<WireBlob>> = match self
            .call(METHOD, json!([height.as_u64(), [namespace_param(namespace)]]))
            .await
        {
            Ok(wire) => wire,
            Err(BackendError::NotFound) => None,
            Err(err) => return Err(err),
        };
        wire.unwrap_or_default()
            .into_iter()
            .map(|blob| stored(METHOD, blob))
            .collect()
    }

    #[instrument(skip_all, fields(height = %height))]
    async fn get_proof(
        &self,
        height: Height,
        namespace: &Namespace,
        commitment: &Commitment,
    ) -> Result<Proof, BackendError> {
        const METHOD: &str = "blob.GetProof";
        let proof: Value = self
            .call(
                METHOD,
                json!([
                    height.as_u64(),
                    namespace_param(namespace),
                    bytes_param(commitment.as_bytes())
                ]),
            )
            .await?;
        let bytes = serde_json::to_vec(&proof).map_err(|e| BackendError::Decode {
            method: METHOD.to_owned(),
            message: e.to_string(),
        })?;
        Ok(Proof::new(bytes))
    }

    #[instrument(skip_all, fields(height = %height))]
    async fn included(
        &self,
        height: Height,
        namespace: &Namespace,
        proof: &Proof,
        commitment: &Commitment,
    ) -> Result<bool, BackendError> {
        const METHOD: &str = "blob.Included";
        self.call(
            METHOD,
            json!([
                height.as_u64(),
                namespace_param(namespace),
                proof_param(METHOD, proof)?,
                bytes_param(commitment.as_bytes())
            ]),
        )
        .await
    }
}
