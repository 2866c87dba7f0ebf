//! End-to-end tests of the serve loop over real sockets.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use da::{Blob, BlobId, Commitment, DaError, DataAvailability, Height, Proof};
use listener::protocol::{Response, FRAME_TOO_LARGE};
use listener::{bind, BindError, ListenerEndpoint, LocalAddr, Security, ServeError, Server, ServerConfig};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UnixStream};
use tokio_seqpacket::UnixSeqpacket;
use tokio_util::sync::CancellationToken;

/// Facade that stores nothing and answers with fixed values.
struct Static;

#[async_trait]
impl DataAvailability for Static {
    async fn max_blob_size(&self) -> Result<u64, DaError> {
        Ok(1024)
    }

    async fn get(&self, ids: &[BlobId]) -> Result<Vec<Blob>, DaError> {
        Ok(vec![Blob::new(b"payload".to_vec()); ids.len()])
    }

    async fn get_ids(&self, height: Height) -> Result<Vec<BlobId>, DaError> {
        Ok(vec![BlobId::from_parts(height, &Commitment::new(vec![0xab]))])
    }

    async fn commit(&self, _blobs: &[Blob]) -> Result<Vec<Commitment>, DaError> {
        Ok(Vec::new())
    }

    async fn submit(
        &self,
        blobs: &[Blob],
        _gas_price: f64,
    ) -> Result<(Vec<BlobId>, Vec<Proof>), DaError> {
        Ok((
            vec![BlobId::new(vec![0; 8]); blobs.len()],
            vec![Proof::new(vec![]); blobs.len()],
        ))
    }

    async fn validate(&self, ids: &[BlobId], _proofs: &[Proof]) -> Result<Vec<bool>, DaError> {
        Ok(vec![true; ids.len()])
    }
}

fn server() -> Arc<Server> {
    let config = ServerConfig {
        max_frame_length: 256,
        drain_timeout: Duration::from_secs(1),
        ..ServerConfig::default()
    };
    Arc::new(Server::new(Arc::new(Static), Security::Insecure).with_config(config))
}

async fn roundtrip<S>(stream: &mut BufReader<S>, request: serde_json::Value) -> Response
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut line = request.to_string();
    line.push('\n');
    stream.get_mut().write_all(line.as_bytes()).await.unwrap();

    let mut reply = String::new();
    stream.read_line(&mut reply).await.unwrap();
    serde_json::from_str(&reply).unwrap()
}

#[tokio::test]
async fn serves_requests_over_tcp_until_closed() {
    let listener = bind(&ListenerEndpoint::new("tcp", "127.0.0.1:0")).await.unwrap();
    let LocalAddr::Tcp(addr) = listener.local_addr().clone() else {
        panic!("expected a TCP listener");
    };

    let close = CancellationToken::new();
    let serving = tokio::spawn({
        let server = server();
        let close = close.clone();
        async move { server.serve_listener(listener, close).await }
    });

    let mut stream = BufReader::new(TcpStream::connect(addr).await.unwrap());
    let response = roundtrip(&mut stream, json!({"id": 7, "method": "da.MaxBlobSize"})).await;
    assert_eq!(response.id, 7);
    assert_eq!(response.result, Some(json!(1024)));

    let response = roundtrip(
        &mut stream,
        json!({"id": 8, "method": "da.GetIDs", "params": {"height": 1}}),
    )
    .await;
    assert_eq!(response.result, Some(json!(["AQAAAAAAAACr"])));

    close.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok(), "closing the listener is a clean shutdown");
}

#[tokio::test]
async fn closing_listener_ends_idle_connections() {
    let listener = bind(&ListenerEndpoint::new("tcp", "127.0.0.1:0")).await.unwrap();
    let LocalAddr::Tcp(addr) = listener.local_addr().clone() else {
        panic!("expected a TCP listener");
    };

    let close = CancellationToken::new();
    let serving = tokio::spawn({
        let server = server();
        let close = close.clone();
        async move { server.serve_listener(listener, close).await }
    });

    let mut stream = BufReader::new(TcpStream::connect(addr).await.unwrap());
    // Make sure the connection is accepted before closing.
    roundtrip(&mut stream, json!({"id": 1, "method": "da.MaxBlobSize"})).await;

    close.cancel();
    serving.await.unwrap().unwrap();

    let mut rest = String::new();
    let read = stream.read_line(&mut rest).await.unwrap_or(0);
    assert_eq!(read, 0, "server side should have closed the connection");
    assert!(TcpStream::connect(addr).await.is_err(), "listener is released");
}

#[tokio::test]
async fn serves_over_unix_socket_and_removes_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("da.sock");
    let endpoint = ListenerEndpoint::new("unix", path.to_str().unwrap());

    let close = CancellationToken::new();
    let serving = tokio::spawn({
        let server = server();
        let close = close.clone();
        async move { server.serve(&endpoint, close).await }
    });

    let mut stream = None;
    for _ in 0..50 {
        if let Ok(connected) = UnixStream::connect(&path).await {
            stream = Some(connected);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let mut stream = BufReader::new(stream.expect("socket never came up"));

    let response = roundtrip(
        &mut stream,
        json!({"id": 2, "method": "da.Validate", "params": {"ids": ["AAAAAAAAAAA="], "proofs": [""]}}),
    )
    .await;
    assert_eq!(response.result, Some(json!([true])));

    close.cancel();
    serving.await.unwrap().unwrap();
    assert!(!path.exists(), "socket file is removed on shutdown");
}

#[tokio::test]
async fn serves_one_request_per_packet_over_unixpacket() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("da-packet.sock");
    let listener = bind(&ListenerEndpoint::new("unixpacket", path.to_str().unwrap()))
        .await
        .unwrap();

    let close = CancellationToken::new();
    let serving = tokio::spawn({
        let server = server();
        let close = close.clone();
        async move { server.serve_listener(listener, close).await }
    });

    let socket = UnixSeqpacket::connect(&path).await.unwrap();
    let request = json!({"id": 4, "method": "da.GetIDs", "params": {"height": 1}});
    socket.send(request.to_string().as_bytes()).await.unwrap();

    let mut buf = vec![0u8; 1024];
    let len = socket.recv(&mut buf).await.unwrap();
    let response: Response = serde_json::from_slice(&buf[..len]).unwrap();
    assert_eq!(response.id, 4);
    assert_eq!(response.result, Some(json!(["AQAAAAAAAACr"])));

    close.cancel();
    serving.await.unwrap().unwrap();
    assert!(!path.exists(), "socket file is removed on shutdown");
}

#[tokio::test]
async fn empty_tcp_address_serves_on_ephemeral_port() {
    let listener = bind(&ListenerEndpoint::new("tcp", "")).await.unwrap();
    let LocalAddr::Tcp(bound) = listener.local_addr().clone() else {
        panic!("expected a TCP listener");
    };

    let close = CancellationToken::new();
    let serving = tokio::spawn({
        let server = server();
        let close = close.clone();
        async move { server.serve_listener(listener, close).await }
    });

    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], bound.port()));
    let mut stream = BufReader::new(TcpStream::connect(addr).await.unwrap());
    let response = roundtrip(&mut stream, json!({"id": 3, "method": "da.MaxBlobSize"})).await;
    assert_eq!(response.result, Some(json!(1024)));

    close.cancel();
    serving.await.unwrap().unwrap();
}

#[tokio::test]
async fn oversize_frame_is_rejected_and_connection_closed() {
    let listener = bind(&ListenerEndpoint::new("tcp", "127.0.0.1:0")).await.unwrap();
    let LocalAddr::Tcp(addr) = listener.local_addr().clone() else {
        panic!("expected a TCP listener");
    };

    let close = CancellationToken::new();
    let serving = tokio::spawn({
        let server = server();
        let close = close.clone();
        async move { server.serve_listener(listener, close).await }
    });

    let mut stream = BufReader::new(TcpStream::connect(addr).await.unwrap());
    let mut line = "x".repeat(1024);
    line.push('\n');
    stream.get_mut().write_all(line.as_bytes()).await.unwrap();

    let mut reply = String::new();
    stream.read_line(&mut reply).await.unwrap();
    let response: Response = serde_json::from_str(&reply).unwrap();
    assert_eq!(response.error.unwrap().code, FRAME_TOO_LARGE);

    close.cancel();
    serving.await.unwrap().unwrap();
}

#[tokio::test]
async fn unsupported_network_fails_without_serving() {
    let close = CancellationToken::new();
    let err = server()
        .serve(&ListenerEndpoint::new("udp", "127.0.0.1:0"), close)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ServeError::Bind(BindError::UnsupportedNetwork { .. })
    ));
}
