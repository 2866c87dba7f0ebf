//! Data-availability service configuration and its error taxonomy.

use da::{Namespace, NamespaceError};
use listener::{BindError, ListenerEndpoint, ServerConfig, ServerError};
use node_rpc::{ClientConfig, ConnectError};
use thiserror::Error;

/// Backing node endpoint used when none is configured.
pub const DEFAULT_NODE_ADDRESS: &str = "http://127.0.0.1:26658";

/// Listen network used when none is configured.
pub const DEFAULT_LISTEN_NETWORK: &str = "tcp";

/// Raw service configuration, as resolved by the host's flag parsing.
#[derive(Debug, Clone)]
pub struct DaServiceConfig {
    /// URL of the backing node's RPC endpoint.
    pub node_address: String,
    /// Bearer token for the backing node. Required; may be empty.
    pub node_token: Option<String>,
    /// Hex-encoded namespace ID. Required.
    pub namespace: Option<String>,
    /// Address to serve on. Empty binds an ephemeral port on every interface
    /// for TCP families; Unix families need a path.
    pub listen_address: String,
    /// Network family to serve on.
    pub listen_network: String,
    /// Backing node client tunables.
    pub client: ClientConfig,
    /// Transport server tunables.
    pub server: ServerConfig,
}

impl Default for DaServiceConfig {
    fn default() -> Self {
        Self {
            node_address: DEFAULT_NODE_ADDRESS.to_owned(),
            node_token: None,
            namespace: None,
            listen_address: String::new(),
            listen_network: DEFAULT_LISTEN_NETWORK.to_owned(),
            client: ClientConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Configuration that passed every check possible without network access.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    /// URL of the backing node's RPC endpoint.
    pub node_address: String,
    /// Bearer token; empty sends no `Authorization` header.
    pub node_token: String,
    /// Decoded namespace every operation is scoped to.
    pub namespace: Namespace,
    /// Where the transport server listens.
    pub endpoint: ListenerEndpoint,
    /// Backing node client tunables.
    pub client: ClientConfig,
    /// Transport server tunables.
    pub server: ServerConfig,
}

impl DaServiceConfig {
    /// Checks required fields and decodes the namespace.
    ///
    /// The listen endpoint is carried through unchecked; an unusable family
    /// or address is reported when the listener binds.
    ///
    /// # Errors
    ///
    /// [`DaServiceError::MissingConfiguration`] for an absent token or
    /// namespace, [`DaServiceError::Namespace`] for undecodable namespace text.
    pub fn validate(&self) -> Result<ValidatedConfig, DaServiceError> {
        let node_token = self
            .node_token
            .clone()
            .ok_or(DaServiceError::MissingConfiguration { field: "token" })?;
        let namespace_text = self
            .namespace
            .as_deref()
            .filter(|text| !text.is_empty())
            .ok_or(DaServiceError::MissingConfiguration { field: "namespace" })?;
        let namespace = Namespace::decode(namespace_text)?;

        Ok(ValidatedConfig {
            node_address: self.node_address.clone(),
            node_token,
            namespace,
            endpoint: ListenerEndpoint::new(&self.listen_network, &self.listen_address),
            client: self.client.clone(),
            server: self.server.clone(),
        })
    }
}

/// Every way the data-availability service can fail.
#[derive(Debug, Error)]
pub enum DaServiceError {
    /// A required configuration value is absent.
    #[error("required configuration '{field}' is not set")]
    MissingConfiguration {
        /// Name of the missing value.
        field: &'static str,
    },

    /// The namespace text is not a valid namespace.
    #[error(transparent)]
    Namespace(#[from] NamespaceError),

    /// The backing node client could not be created.
    #[error("failed to create backing node RPC client: {0}")]
    Connect(#[from] ConnectError),

    /// The listener could not be opened.
    #[error(transparent)]
    Bind(#[from] BindError),

    /// The serve loop stopped with an error.
    #[error("server stopped with error: {0}")]
    Server(#[from] ServerError),

    /// The service task panicked or was aborted.
    #[error("service task failed: {0}")]
    Task(String),
}

impl DaServiceError {
    /// Whether this failure must bring the host down.
    ///
    /// Only a cancelled connect is exempt: it happens when the host is
    /// already stopping.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Connect(err) if err.is_canceled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namespace_text() -> String {
        format!("{}00000000000000010042", "00".repeat(18))
    }

    fn complete() -> DaServiceConfig {
        DaServiceConfig {
            node_token: Some("token".into()),
            namespace: Some(namespace_text()),
            listen_address: "127.0.0.1:0".into(),
            ..DaServiceConfig::default()
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = DaServiceConfig::default();
        assert_eq!(config.node_address, "http://127.0.0.1:26658");
        assert_eq!(config.listen_network, "tcp");
        assert!(config.listen_address.is_empty());
    }

    #[test]
    fn validate_accepts_complete_config() {
        let validated = complete().validate().unwrap();
        assert_eq!(validated.namespace.id_hex(), namespace_text());
        assert_eq!(validated.endpoint, ListenerEndpoint::new("tcp", "127.0.0.1:0"));
    }

    #[test]
    fn validate_allows_empty_token() {
        let config = DaServiceConfig {
            node_token: Some(String::new()),
            ..complete()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_requires_token() {
        let config = DaServiceConfig {
            node_token: None,
            ..complete()
        };
        assert!(matches!(
            config.validate(),
            Err(DaServiceError::MissingConfiguration { field: "token" })
        ));
    }

    #[test]
    fn validate_requires_namespace() {
        for namespace in [None, Some(String::new())] {
            let config = DaServiceConfig {
                namespace,
                ..complete()
            };
            assert!(matches!(
                config.validate(),
                Err(DaServiceError::MissingConfiguration { field: "namespace" })
            ));
        }
    }

    #[test]
    fn validate_rejects_bad_namespace() {
        let config = DaServiceConfig {
            namespace: Some("xyz".into()),
            ..complete()
        };
        assert!(matches!(
            config.validate(),
            Err(DaServiceError::Namespace(NamespaceError::InvalidEncoding(_)))
        ));
    }

    #[test]
    fn validate_rejects_reserved_namespace() {
        let config = DaServiceConfig {
            namespace: Some(format!("{}00000000000000000042", "00".repeat(18))),
            ..complete()
        };
        assert!(matches!(
            config.validate(),
            Err(DaServiceError::Namespace(NamespaceError::InvalidNamespace { .. }))
        ));
    }

    #[test]
    fn validate_defers_listen_network_check() {
        let config = DaServiceConfig {
            listen_network: "carrier-pigeon".into(),
            ..complete()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn cancelled_connect_is_not_fatal() {
        assert!(!DaServiceError::from(ConnectError::Canceled).is_fatal());
        assert!(DaServiceError::MissingConfiguration { field: "token" }.is_fatal());
    }
}
