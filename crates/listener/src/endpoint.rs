//! Listen endpoints and binding.
//!
//! A [`ListenerEndpoint`] is a raw `(network, address)` pair taken straight
//! from configuration. Nothing is checked until [`bind`], so an unknown
//! network family is reported as a [`BindError`] together with every other
//! reason a listener cannot be opened.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};
use tokio::sync::Mutex;
use tokio_seqpacket::{UnixSeqpacket, UnixSeqpacketListener};
use tracing::{debug, info, warn};

/// Network families a listener may be bound on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenNetwork {
    /// TCP over whichever IP family the address resolves to.
    Tcp,
    /// TCP restricted to IPv4.
    Tcp4,
    /// TCP restricted to IPv6.
    Tcp6,
    /// Unix domain stream socket.
    Unix,
    /// Unix domain sequenced-packet socket.
    UnixPacket,
}

impl ListenNetwork {
    /// Returns the configuration spelling of the family.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Tcp4 => "tcp4",
            Self::Tcp6 => "tcp6",
            Self::Unix => "unix",
            Self::UnixPacket => "unixpacket",
        }
    }

    fn accepts(self, addr: &SocketAddr) -> bool {
        match self {
            Self::Tcp4 => addr.is_ipv4(),
            Self::Tcp6 => addr.is_ipv6(),
            _ => true,
        }
    }
}

impl FromStr for ListenNetwork {
    type Err = BindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Self::Tcp),
            "tcp4" => Ok(Self::Tcp4),
            "tcp6" => Ok(Self::Tcp6),
            "unix" => Ok(Self::Unix),
            "unixpacket" => Ok(Self::UnixPacket),
            other => Err(BindError::UnsupportedNetwork {
                network: other.to_owned(),
            }),
        }
    }
}

impl fmt::Display for ListenNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the transport server accepts connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerEndpoint {
    /// Network family name, e.g. `"tcp"` or `"unix"`.
    pub network: String,
    /// Host/port for TCP families, socket path for Unix families.
    pub address: String,
}

impl ListenerEndpoint {
    /// Creates an endpoint from raw configuration values.
    pub fn new(network: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for ListenerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.network, self.address)
    }
}

/// Why a listener could not be opened.
#[derive(Debug, Error)]
pub enum BindError {
    /// The network family is not one of the supported names, or cannot be
    /// served by this transport.
    #[error("unsupported listen network '{network}'; must be \"tcp\", \"tcp4\", \"tcp6\", \"unix\" or \"unixpacket\"")]
    UnsupportedNetwork {
        /// The rejected family.
        network: String,
    },

    /// A Unix family was configured without a socket path.
    #[error("no socket path configured for listen network '{network}'")]
    MissingAddress {
        /// The Unix family that needs a path.
        network: ListenNetwork,
    },

    /// The address could not be resolved.
    #[error("failed to resolve listen address '{address}': {source}")]
    Resolve {
        /// The address being resolved.
        address: String,
        /// Underlying resolver error.
        source: io::Error,
    },

    /// The address resolved, but not to the requested IP family.
    #[error("listen address '{address}' has no {network} address")]
    NoAddressForFamily {
        /// The address being resolved.
        address: String,
        /// The requested family.
        network: ListenNetwork,
    },

    /// A non-socket file occupies the Unix socket path.
    #[error("path {} exists but is not a socket", path.display())]
    NotASocket {
        /// The occupied path.
        path: PathBuf,
    },

    /// The operating system refused the bind (address in use, permissions).
    #[error("failed to create network listener on {address}: {source}")]
    Io {
        /// The address being bound.
        address: String,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// The address a listener actually bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalAddr {
    /// A TCP socket address (with the real port when `:0` was requested).
    Tcp(SocketAddr),
    /// A Unix socket path, stream or sequenced-packet.
    Unix(PathBuf),
}

impl fmt::Display for LocalAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "{addr}"),
            Self::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

/// An accepted connection.
pub enum Accepted {
    /// TCP peer.
    Tcp(TcpStream, SocketAddr),
    /// Unix domain stream peer.
    Unix(UnixStream),
    /// Unix domain sequenced-packet peer; one packet is one frame.
    UnixPacket(UnixSeqpacket),
}

impl fmt::Debug for Accepted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(_, peer) => f.debug_tuple("Tcp").field(peer).finish(),
            Self::Unix(_) => f.write_str("Unix"),
            Self::UnixPacket(_) => f.write_str("UnixPacket"),
        }
    }
}

enum Inner {
    Tcp(TcpListener),
    Unix(UnixListener),
    // Accept needs exclusive access; only the serve loop ever accepts.
    UnixPacket(Mutex<UnixSeqpacketListener>),
}

/// An open listener.
///
/// Dropping it closes the socket; for Unix families the socket file is also
/// removed. A failure to remove the file is logged and otherwise ignored.
pub struct BoundListener {
    inner: Inner,
    local_addr: LocalAddr,
}

impl BoundListener {
    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> &LocalAddr {
        &self.local_addr
    }

    /// Waits for the next connection.
    pub async fn accept(&self) -> io::Result<Accepted> {
        match &self.inner {
            Inner::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                Ok(Accepted::Tcp(stream, peer))
            }
            Inner::Unix(listener) => {
                let (stream, _) = listener.accept().await?;
                Ok(Accepted::Unix(stream))
            }
            Inner::UnixPacket(listener) => {
                let socket = listener.lock().await.accept().await?;
                Ok(Accepted::UnixPacket(socket))
            }
        }
    }
}

impl fmt::Debug for BoundListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundListener")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

impl Drop for BoundListener {
    fn drop(&mut self) {
        if let LocalAddr::Unix(path) = &self.local_addr {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to close network listener");
                }
            }
        }
        debug!(local_addr = %self.local_addr, "network listener closed");
    }
}

/// Opens a listener for `endpoint`.
///
/// # Errors
///
/// An empty address on a TCP family binds an ephemeral port on every
/// interface.
///
/// # Errors
///
/// Returns a [`BindError`] when the family is unknown, a Unix family has no
/// path, the address is unresolvable, or the operating system refuses the
/// bind.
pub async fn bind(endpoint: &ListenerEndpoint) -> Result<BoundListener, BindError> {
    let network: ListenNetwork = endpoint.network.parse()?;

    let listener = match network {
        ListenNetwork::Tcp | ListenNetwork::Tcp4 | ListenNetwork::Tcp6 => {
            if endpoint.address.is_empty() {
                info!(%network, "no listen address configured; binding an ephemeral port");
            }
            bind_tcp(network, &endpoint.address).await?
        }
        ListenNetwork::Unix => bind_unix(socket_path(network, &endpoint.address)?)?,
        ListenNetwork::UnixPacket => {
            bind_unixpacket(socket_path(network, &endpoint.address)?)?
        }
    };

    info!(%network, local_addr = %listener.local_addr, "network listener bound");
    Ok(listener)
}

/// Expands Go-style `":port"` (or nothing at all) into a wildcard host for
/// the family.
fn wildcard(network: ListenNetwork, address: &str) -> String {
    let address = if address.is_empty() { ":0" } else { address };
    match address.strip_prefix(':') {
        Some(port) if network == ListenNetwork::Tcp6 => format!("[::]:{port}"),
        Some(port) => format!("0.0.0.0:{port}"),
        None => address.to_owned(),
    }
}

async fn bind_tcp(network: ListenNetwork, address: &str) -> Result<BoundListener, BindError> {
    let target = wildcard(network, address);
    let candidates: Vec<SocketAddr> = tokio::net::lookup_host(target.as_str())
        .await
        .map_err(|source| BindError::Resolve {
            address: address.to_owned(),
            source,
        })?
        .filter(|addr| network.accepts(addr))
        .collect();

    let mut last_error = None;
    for candidate in candidates {
        match TcpListener::bind(candidate).await {
            Ok(listener) => {
                let local = listener.local_addr().unwrap_or(candidate);
                return Ok(BoundListener {
                    inner: Inner::Tcp(listener),
                    local_addr: LocalAddr::Tcp(local),
                });
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(match last_error {
        Some(source) => BindError::Io {
            address: address.to_owned(),
            source,
        },
        None => BindError::NoAddressForFamily {
            address: address.to_owned(),
            network,
        },
    })
}

fn bind_unix(path: &Path) -> Result<BoundListener, BindError> {
    remove_stale_socket(path)?;
    let listener = UnixListener::bind(path).map_err(|source| BindError::Io {
        address: path.display().to_string(),
        source,
    })?;
    Ok(BoundListener {
        inner: Inner::Unix(listener),
        local_addr: LocalAddr::Unix(path.to_path_buf()),
    })
}

fn socket_path(network: ListenNetwork, address: &str) -> Result<&Path, BindError> {
    if address.is_empty() {
        return Err(BindError::MissingAddress { network });
    }
    Ok(Path::new(address))
}

fn bind_unixpacket(path: &Path) -> Result<BoundListener, BindError> {
    remove_stale_socket(path)?;
    let listener = UnixSeqpacketListener::bind(path).map_err(|source| BindError::Io {
        address: path.display().to_string(),
        source,
    })?;
    Ok(BoundListener {
        inner: Inner::UnixPacket(Mutex::new(listener)),
        local_addr: LocalAddr::Unix(path.to_path_buf()),
    })
}

fn remove_stale_socket(path: &Path) -> Result<(), BindError> {
    use std::os::unix::fs::FileTypeExt;

    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(BindError::Io {
                address: path.display().to_string(),
                source,
            })
        }
    };

    if !metadata.file_type().is_socket() {
        return Err(BindError::NotASocket {
            path: path.to_path_buf(),
        });
    }

    std::fs::remove_file(path).map_err(|source| BindError::Io {
        address: path.display().to_string(),
        source,
    })?;
    debug!(path = %path.display(), "removed stale socket file");
    Ok(())
}
