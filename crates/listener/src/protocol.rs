//! Wire protocol and request dispatch.
//!
//! Each frame is one line of JSON. Requests carry a caller-chosen `id`, a
//! `method` name, and named `params`; every request gets exactly one response
//! echoing the `id` with either a `result` or an `error`.
//!
//! | Method | Params | Result |
//! |--------|--------|--------|
//! | `da.MaxBlobSize` | – | `u64` |
//! | `da.Get` | `ids` | `[blob]` |
//! | `da.GetIDs` | `height` | `[id]` |
//! | `da.Commit` | `blobs` | `[commitment]` |
//! | `da.Submit` | `blobs`, `gas_price` (default `-1`) | `{ids, proofs}` |
//! | `da.Validate` | `ids`, `proofs` | `[bool]` |
//!
//! Byte strings are base64.

use da::{Blob, BlobId, DaError, DataAvailability, Height, Proof};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Malformed JSON.
pub const PARSE_ERROR: i32 = -32700;
/// JSON that is not a request object.
pub const INVALID_REQUEST: i32 = -32600;
/// Unknown method name.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Params missing or of the wrong shape.
pub const INVALID_PARAMS: i32 = -32602;
/// Failure producing the response itself.
pub const INTERNAL_ERROR: i32 = -32603;
/// Frame longer than the configured maximum.
pub const FRAME_TOO_LARGE: i32 = -32010;

/// An incoming request frame.
#[derive(Debug, Deserialize)]
pub struct Request {
    /// Caller-chosen correlation id, echoed in the response.
    pub id: u64,
    /// Method name, e.g. `da.Get`.
    pub method: String,
    /// Named parameters; absent means `null`.
    #[serde(default)]
    pub params: Value,
}

/// Error member of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// One of the error code constants in this module, or a `DaError` code.
    pub code: i32,
    /// Human-readable description.
    pub message: String,
}

/// An outgoing response frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Id of the request this answers; `0` when it could not be read.
    pub id: u64,
    /// Set on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Set on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl Response {
    /// Builds a successful response.
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response.
    pub fn failure(id: u64, code: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(ErrorObject {
                code,
                message: message.into(),
            }),
        }
    }
}

impl From<(u64, DaError)> for Response {
    fn from((id, err): (u64, DaError)) -> Self {
        Self::failure(id, err.code(), err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Params
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct IdsParams {
    ids: Vec<BlobId>,
}

#[derive(Debug, Deserialize)]
struct HeightParams {
    height: Height,
}

#[derive(Debug, Deserialize)]
struct BlobsParams {
    blobs: Vec<Blob>,
}

fn default_gas_price() -> f64 {
    -1.0
}

#[derive(Debug, Deserialize)]
struct SubmitParams {
    blobs: Vec<Blob>,
    #[serde(default = "default_gas_price")]
    gas_price: f64,
}

#[derive(Debug, Deserialize)]
struct ValidateParams {
    ids: Vec<BlobId>,
    proofs: Vec<Proof>,
}

#[derive(Debug, Serialize)]
struct SubmitResult {
    ids: Vec<BlobId>,
    proofs: Vec<Proof>,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

enum Failure {
    Params(serde_json::Error),
    Da(DaError),
    Encode(serde_json::Error),
}

impl From<DaError> for Failure {
    fn from(err: DaError) -> Self {
        Self::Da(err)
    }
}

fn params<T: DeserializeOwned>(value: Value) -> Result<T, Failure> {
    serde_json::from_value(value).map_err(Failure::Params)
}

fn encode<T: Serialize>(value: T) -> Result<Value, Failure> {
    serde_json::to_value(value).map_err(Failure::Encode)
}

/// Decodes one frame, runs it against `facade`, and builds the response.
pub async fn handle_frame(facade: &dyn DataAvailability, frame: &str) -> Response {
    let value: Value = match serde_json::from_str(frame) {
        Ok(value) => value,
        Err(e) => return Response::failure(0, PARSE_ERROR, format!("parse error: {e}")),
    };
    let request: Request = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => return Response::failure(0, INVALID_REQUEST, format!("invalid request: {e}")),
    };
    dispatch(facade, request).await
}

/// Runs a decoded request against `facade`.
pub async fn dispatch(facade: &dyn DataAvailability, request: Request) -> Response {
    let Request { id, method, params: raw } = request;
    debug!(id, method = %method, "dispatching request");

    let outcome = match method.as_str() {
        "da.MaxBlobSize" => max_blob_size(facade).await,
        "da.Get" => get(facade, raw).await,
        "da.GetIDs" => get_ids(facade, raw).await,
        "da.Commit" => commit(facade, raw).await,
        "da.Submit" => submit(facade, raw).await,
        "da.Validate" => validate(facade, raw).await,
        _ => {
            return Response::failure(id, METHOD_NOT_FOUND, format!("unknown method '{method}'"))
        }
    };

    match outcome {
        Ok(result) => Response::success(id, result),
        Err(Failure::Params(e)) => Response::failure(id, INVALID_PARAMS, format!("invalid params: {e}")),
        Err(Failure::Da(e)) => Response::from((id, e)),
        Err(Failure::Encode(e)) => Response::failure(id, INTERNAL_ERROR, format!("internal error: {e}")),
    }
}

async fn max_blob_size(facade: &dyn DataAvailability) -> Result<Value, Failure> {
    encode(facade.max_blob_size().await?)
}

async fn get(facade: &dyn DataAvailability, raw: Value) -> Result<Value, Failure> {
    let IdsParams { ids } = params(raw)?;
    encode(facade.get(&ids).await?)
}

async fn get_ids(facade: &dyn DataAvailability, raw: Value) -> Result<Value, Failure> {
    let HeightParams { height } = params(raw)?;
    encode(facade.get_ids(height).await?)
}

async fn commit(facade: &dyn DataAvailability, raw: Value) -> Result<Value, Failure> {
    let BlobsParams { blobs } = params(raw)?;
    encode(facade.commit(&blobs).await?)
}

async fn submit(facade: &dyn DataAvailability, raw: Value) -> Result<Value, Failure> {
    let SubmitParams { blobs, gas_price } = params(raw)?;
    let (ids, proofs) = facade.submit(&blobs, gas_price).await?;
    encode(SubmitResult { ids, proofs })
}

async fn validate(facade: &dyn DataAvailability, raw: Value) -> Result<Value, Failure> {
    let ValidateParams { ids, proofs } = params(raw)?;
    encode(facade.validate(&ids, &proofs).await?)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use da::Commitment;
    use serde_json::json;

    use super::*;

    /// Facade that answers from fixed data.
    struct Fixed;

    #[async_trait]
    impl DataAvailability for Fixed {
        async fn max_blob_size(&self) -> Result<u64, DaError> {
            Ok(64)
        }

        async fn get(&self, ids: &[BlobId]) -> Result<Vec<Blob>, DaError> {
            Ok(ids.iter().map(|id| Blob::new(id.as_bytes().to_vec())).collect())
        }

        async fn get_ids(&self, height: Height) -> Result<Vec<BlobId>, DaError> {
            Ok(vec![BlobId::from_parts(height, &Commitment::new(vec![1]))])
        }

        async fn commit(&self, _blobs: &[Blob]) -> Result<Vec<Commitment>, DaError> {
            Err(DaError::Unsupported { operation: "commit" })
        }

        async fn submit(
            &self,
            blobs: &[Blob],
            gas_price: f64,
        ) -> Result<(Vec<BlobId>, Vec<Proof>), DaError> {
            assert_eq!(gas_price, -1.0);
            Ok((
                vec![BlobId::new(vec![0; 8]); blobs.len()],
                vec![Proof::new(vec![1]); blobs.len()],
            ))
        }

        async fn validate(&self, ids: &[BlobId], _proofs: &[Proof]) -> Result<Vec<bool>, DaError> {
            Ok(vec![true; ids.len()])
        }
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        let response = handle_frame(&Fixed, "{not json").await;
        assert_eq!(response.id, 0);
        assert_eq!(response.error.unwrap().code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn missing_method_is_an_invalid_request() {
        let response = handle_frame(&Fixed, r#"{"id": 3}"#).await;
        assert_eq!(response.error.unwrap().code, INVALID_REQUEST);
    }

    #[tokio::test]
    async fn unknown_method_echoes_id() {
        let response = handle_frame(&Fixed, r#"{"id": 9, "method": "da.Nope"}"#).await;
        assert_eq!(response.id, 9);
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_params_are_rejected() {
        let response =
            handle_frame(&Fixed, r#"{"id": 1, "method": "da.GetIDs", "params": {"height": "x"}}"#)
                .await;
        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn max_blob_size_needs_no_params() {
        let response = handle_frame(&Fixed, r#"{"id": 1, "method": "da.MaxBlobSize"}"#).await;
        assert_eq!(response.result, Some(json!(64)));
    }

    #[tokio::test]
    async fn submit_defaults_gas_price() {
        let response = handle_frame(
            &Fixed,
            r#"{"id": 2, "method": "da.Submit", "params": {"blobs": ["aGk="]}}"#,
        )
        .await;
        let result = response.result.unwrap();
        assert_eq!(result["ids"], json!(["AAAAAAAAAAA="]));
        assert_eq!(result["proofs"], json!(["AQ=="]));
    }

    #[tokio::test]
    async fn facade_errors_carry_their_code() {
        let response = handle_frame(
            &Fixed,
            r#"{"id": 5, "method": "da.Commit", "params": {"blobs": ["aGk="]}}"#,
        )
        .await;
        let error = response.error.unwrap();
        assert_eq!(error.code, DaError::Unsupported { operation: "commit" }.code());
    }

    #[test]
    fn success_response_omits_error_member() {
        let json = serde_json::to_value(Response::success(1, json!(true))).unwrap();
        assert_eq!(json, json!({"id": 1, "result": true}));
    }
}
