//! Accept/serve loop.
//!
//! [`Server::serve_listener`] owns a [`BoundListener`] for its whole run and
//! drops it exactly once on the way out. The loop ends in one of two ways:
//!
//! - the `close` token is cancelled: the listener is closed deliberately and
//!   the call returns `Ok(())`;
//! - accepting fails with a non-transient error: the call returns
//!   [`ServerError`].
//!
//! In both cases in-flight connections are told to stop after their current
//! request and are given [`ServerConfig::drain_timeout`] to finish before they
//! are aborted.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use da::DataAvailability;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tokio_seqpacket::UnixSeqpacket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::endpoint::{bind, Accepted, BindError, BoundListener, ListenerEndpoint};
use crate::protocol::{handle_frame, Response, FRAME_TOO_LARGE, PARSE_ERROR};

/// Default cap on simultaneously open connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Default time in-flight connections get to finish after the listener closes.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default maximum length of one request line, in bytes.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 8 * 1024 * 1024;

/// Pause after a transient accept error before accepting again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Transport security for the served connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Security {
    /// Plaintext. The only mode currently offered.
    Insecure,
}

/// Tunables for [`Server`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum simultaneously open connections; further accepts wait.
    pub max_connections: usize,
    /// How long in-flight connections may run after the listener closes.
    pub drain_timeout: Duration,
    /// Longest accepted request line, in bytes.
    pub max_frame_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

/// Unrecoverable end of the serve loop.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Accepting a connection failed with a non-transient error.
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
}

/// Either half of [`Server::serve`] failing.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The listener could not be opened; serving never started.
    #[error(transparent)]
    Bind(#[from] BindError),
    /// The serve loop ended with an error.
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Serves a [`DataAvailability`] facade over a listener.
pub struct Server {
    facade: Arc<dyn DataAvailability>,
    security: Security,
    config: ServerConfig,
}

impl Server {
    /// Creates a server with default tunables.
    pub fn new(facade: Arc<dyn DataAvailability>, security: Security) -> Self {
        Self {
            facade,
            security,
            config: ServerConfig::default(),
        }
    }

    /// Replaces the tunables.
    #[must_use]
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds `endpoint` and serves on it until `close` is cancelled.
    ///
    /// # Errors
    ///
    /// [`ServeError::Bind`] if the listener cannot be opened (nothing is
    /// accepted), [`ServeError::Server`] if the loop fails afterwards.
    pub async fn serve(
        &self,
        endpoint: &ListenerEndpoint,
        close: CancellationToken,
    ) -> Result<(), ServeError> {
        let listener = bind(endpoint).await?;
        self.serve_listener(listener, close).await?;
        Ok(())
    }

    /// Serves on an already-bound listener until `close` is cancelled.
    ///
    /// Cancelling `close` is the deliberate way to stop: it closes the listener
    /// and returns `Ok(())` once connections drain.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when accepting fails for a reason other than a
    /// transient per-connection error.
    pub async fn serve_listener(
        &self,
        listener: BoundListener,
        close: CancellationToken,
    ) -> Result<(), ServerError> {
        match self.security {
            Security::Insecure => warn!("serving without transport encryption"),
        }
        info!(local_addr = %listener.local_addr(), "serving celestia-da");

        let permits = Arc::new(Semaphore::new(self.config.max_connections));
        let connections_close = close.child_token();
        let mut connections = JoinSet::new();

        let result = loop {
            let permit = tokio::select! {
                biased;
                () = close.cancelled() => break Ok(()),
                Some(_) = connections.join_next(), if !connections.is_empty() => continue,
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    // The semaphore is never closed.
                    Err(_) => break Ok(()),
                },
            };

            let accepted = tokio::select! {
                biased;
                () = close.cancelled() => break Ok(()),
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok(stream) => self.spawn_connection(
                    &mut connections,
                    stream,
                    permit,
                    connections_close.clone(),
                ),
                Err(e) if is_transient(&e) => {
                    warn!(error = %e, "transient accept failure; retrying");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
                Err(e) => break Err(ServerError::Accept(e)),
            }
        };

        drop(listener);
        connections_close.cancel();
        self.drain(connections).await;

        match &result {
            Ok(()) => info!("server stopped"),
            Err(e) => error!(error = %e, "server stopped with error"),
        }
        result
    }

    fn spawn_connection(
        &self,
        connections: &mut JoinSet<()>,
        accepted: Accepted,
        permit: OwnedSemaphorePermit,
        close: CancellationToken,
    ) {
        let facade = Arc::clone(&self.facade);
        let max_frame_length = self.config.max_frame_length;
        let id = Uuid::new_v4();

        match accepted {
            Accepted::Tcp(stream, peer) => {
                let span = info_span!("connection", %id, %peer);
                connections.spawn(
                    async move {
                        handle_connection(stream, facade, max_frame_length, close).await;
                        drop(permit);
                    }
                    .instrument(span),
                );
            }
            Accepted::Unix(stream) => {
                let span = info_span!("connection", %id);
                connections.spawn(
                    async move {
                        handle_connection(stream, facade, max_frame_length, close).await;
                        drop(permit);
                    }
                    .instrument(span),
                );
            }
            Accepted::UnixPacket(socket) => {
                let span = info_span!("connection", %id, kind = "seqpacket");
                connections.spawn(
                    async move {
                        handle_packet_connection(socket, facade, max_frame_length, close).await;
                        drop(permit);
                    }
                    .instrument(span),
                );
            }
        }
    }

    async fn drain(&self, mut connections: JoinSet<()>) {
        if connections.is_empty() {
            return;
        }
        debug!(open = connections.len(), "draining connections");

        let drained = tokio::time::timeout(self.config.drain_timeout, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = connections.len(),
                "connections did not drain in time; aborting"
            );
            connections.shutdown().await;
        }
    }
}

/// Accept errors that concern one connection or a momentary resource shortage
/// rather than the listener itself.
fn is_transient(err: &io::Error) -> bool {
    // EMFILE / ENFILE: descriptors may free up as connections close.
    const ENFILE: i32 = 23;
    const EMFILE: i32 = 24;

    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    ) || matches!(err.raw_os_error(), Some(ENFILE | EMFILE))
}

async fn handle_connection<S>(
    stream: S,
    facade: Arc<dyn DataAvailability>,
    max_frame_length: usize,
    close: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    debug!("connection accepted");
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(max_frame_length));

    loop {
        let frame = tokio::select! {
            biased;
            () = close.cancelled() => break,
            frame = framed.next() => frame,
        };

        let response = match frame {
            None => break,
            Some(Ok(line)) if line.trim().is_empty() => continue,
            Some(Ok(line)) => handle_frame(facade.as_ref(), &line).await,
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                let response = Response::failure(
                    0,
                    FRAME_TOO_LARGE,
                    format!("request exceeds {max_frame_length} bytes"),
                );
                if let Err(e) = send(&mut framed, &response).await {
                    debug!(error = %e, "connection write failed");
                }
                break;
            }
            Some(Err(LinesCodecError::Io(e))) => {
                debug!(error = %e, "connection read failed");
                break;
            }
        };

        if let Err(e) = send(&mut framed, &response).await {
            debug!(error = %e, "connection write failed");
            break;
        }
    }
    debug!("connection closed");
}

/// Serves a sequenced-packet connection: each packet is one request frame
/// and each response goes back as one packet.
async fn handle_packet_connection(
    socket: UnixSeqpacket,
    facade: Arc<dyn DataAvailability>,
    max_frame_length: usize,
    close: CancellationToken,
) {
    debug!("connection accepted");
    // One spare byte detects packets longer than the limit, which the kernel
    // truncates to the buffer size.
    let mut buf = vec![0u8; max_frame_length + 1];

    loop {
        let received = tokio::select! {
            biased;
            () = close.cancelled() => break,
            received = socket.recv(&mut buf) => received,
        };

        let response = match received {
            Ok(0) => break,
            Ok(len) if len > max_frame_length => {
                let response = Response::failure(
                    0,
                    FRAME_TOO_LARGE,
                    format!("request exceeds {max_frame_length} bytes"),
                );
                if let Err(e) = send_packet(&socket, &response).await {
                    debug!(error = %e, "connection write failed");
                }
                break;
            }
            Ok(len) => match std::str::from_utf8(&buf[..len]) {
                Ok(frame) if frame.trim().is_empty() => continue,
                Ok(frame) => handle_frame(facade.as_ref(), frame).await,
                Err(e) => Response::failure(0, PARSE_ERROR, format!("parse error: {e}")),
            },
            Err(e) => {
                debug!(error = %e, "connection read failed");
                break;
            }
        };

        if let Err(e) = send_packet(&socket, &response).await {
            debug!(error = %e, "connection write failed");
            break;
        }
    }
    debug!("connection closed");
}

async fn send_packet(socket: &UnixSeqpacket, response: &Response) -> io::Result<()> {
    let packet = serde_json::to_vec(response).map_err(io::Error::other)?;
    socket.send(&packet).await?;
    Ok(())
}

async fn send<S>(framed: &mut Framed<S, LinesCodec>, response: &Response) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let line = serde_json::to_string(response).map_err(io::Error::other)?;
    framed.send(line).await.map_err(|e| match e {
        LinesCodecError::Io(e) => e,
        LinesCodecError::MaxLineLengthExceeded => {
            io::Error::new(io::ErrorKind::InvalidData, "response line too long")
        }
    })
}
