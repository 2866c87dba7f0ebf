//! Client adapter factory.

use reqwest::{StatusCode, Url};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::client::{CallError, ClientConfig, NodeRpcClient};

/// Method used to prove the node is reachable and accepts the token.
const PROBE_METHOD: &str = "header.LocalHead";

/// Why a client handle could not be established.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The address is not a URL with an HTTP(S) scheme and a host.
    #[error("invalid backing node address '{address}': {reason}")]
    InvalidAddress {
        /// The rejected address.
        address: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The node could not be reached or did not answer the probe.
    #[error("failed to reach backing node at {address}: {message}")]
    Connection {
        /// The address being connected to.
        address: String,
        /// Description of the failure.
        message: String,
    },

    /// The node rejected the bearer token.
    #[error("backing node at {address} rejected the auth token (HTTP {status})")]
    Unauthorized {
        /// The address being connected to.
        address: String,
        /// HTTP status returned by the node.
        status: u16,
    },

    /// The caller cancelled before the connection completed.
    #[error("connection to backing node cancelled")]
    Canceled,
}

impl ConnectError {
    /// Returns `true` when the failure is a cancellation rather than a
    /// connection problem.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

/// Parses and checks a backing node address.
///
/// # Errors
///
/// Returns [`ConnectError::InvalidAddress`] unless `address` is an `http` or
/// `https` URL with a host.
pub fn parse_address(address: &str) -> Result<Url, ConnectError> {
    let invalid = |reason: String| ConnectError::InvalidAddress {
        address: address.to_owned(),
        reason,
    };

    let url = Url::parse(address).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_owned()));
    }
    Ok(url)
}

/// Connects to the backing node with default client settings.
///
/// See [`connect_with`].
pub async fn connect(
    address: &str,
    token: &str,
    cancel: &CancellationToken,
) -> Result<NodeRpcClient, ConnectError> {
    connect_with(address, token, &ClientConfig::default(), cancel).await
}

/// Builds a client handle and proves it works with one probe call.
///
/// An empty `token` sends no `Authorization` header; whether that is allowed
/// is the node's decision. There is no retry.
///
/// # Errors
///
/// - [`ConnectError::InvalidAddress`] for a malformed address.
/// - [`ConnectError::Connection`] when the node cannot be reached.
/// - [`ConnectError::Unauthorized`] when the node rejects the token.
/// - [`ConnectError::Canceled`] when `cancel` fires first.
#[instrument(skip(token, config, cancel))]
pub async fn connect_with(
    address: &str,
    token: &str,
    config: &ClientConfig,
    cancel: &CancellationToken,
) -> Result<NodeRpcClient, ConnectError> {
    let url = parse_address(address)?;
    if cancel.is_cancelled() {
        return Err(ConnectError::Canceled);
    }

    let client = NodeRpcClient::new(url, token, config).map_err(|e| ConnectError::Connection {
        address: address.to_owned(),
        message: format!("failed to build HTTP client: {e}"),
    })?;

    let probe = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(ConnectError::Canceled),
        probe = client.send(PROBE_METHOD, serde_json::json!([])) => probe,
    };

    match probe {
        // Any answer from the RPC layer proves reachability and authorisation.
        Ok(_) | Err(CallError::Rpc { .. }) => {
            info!(address, "connected to backing node");
            Ok(client)
        }
        Err(CallError::Status(status))
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN =>
        {
            Err(ConnectError::Unauthorized {
                address: address.to_owned(),
                status: status.as_u16(),
            })
        }
        Err(CallError::Status(status)) => Err(ConnectError::Connection {
            address: address.to_owned(),
            message: format!("HTTP {status}"),
        }),
        Err(CallError::Http(err)) => Err(ConnectError::Connection {
            address: address.to_owned(),
            message: err.to_string(),
        }),
        Err(CallError::Decode(message)) => Err(ConnectError::Connection {
            address: address.to_owned(),
            message: format!("unexpected probe response: {message}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_address_accepts_default_endpoint() {
        let url = parse_address("http://127.0.0.1:26658").unwrap();
        assert_eq!(url.port(), Some(26658));
    }

    #[test]
    fn parse_address_rejects_garbage() {
        assert!(matches!(
            parse_address("not a url"),
            Err(ConnectError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn parse_address_rejects_non_http_scheme() {
        assert!(matches!(
            parse_address("unix:///tmp/node.sock"),
            Err(ConnectError::InvalidAddress { .. })
        ));
    }

    #[tokio::test]
    async fn cancelled_token_fails_before_any_request() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        // Nothing listens on port 9; a request attempt would be a connection error.
        let err = connect("http://127.0.0.1:9", "token", &cancel)
            .await
            .unwrap_err();
        assert!(err.is_canceled());
    }
}
