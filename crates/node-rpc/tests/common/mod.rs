//! Minimal HTTP JSON-RPC responder standing in for the backing node.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One request as seen by the fake node.
#[derive(Debug, Clone)]
pub struct Captured {
    pub authorization: Option<String>,
    pub method: String,
    pub params: Value,
}

/// Reply produced by a handler: HTTP status and JSON body.
pub type Reply = (u16, Value);

type Handler = Arc<dyn Fn(&str, &Value) -> Reply + Send + Sync>;

/// A running fake node.
pub struct FakeNode {
    pub url: String,
    pub requests: Arc<Mutex<Vec<Captured>>>,
}

impl FakeNode {
    /// Starts a node that answers every call with `handler`.
    pub async fn start(handler: impl Fn(&str, &Value) -> Reply + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake node");
        let url = format!("http://{}", listener.local_addr().expect("local addr"));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Handler = Arc::new(handler);

        let captured = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = Arc::clone(&handler);
                let captured = Arc::clone(&captured);
                tokio::spawn(async move {
                    let _ = serve_one(stream, handler, captured).await;
                });
            }
        });

        Self { url, requests }
    }

    /// Starts a node that answers every call with a JSON-RPC `result`.
    pub async fn answering(result: Value) -> Self {
        Self::start(move |_, _| (200, json!({"jsonrpc": "2.0", "id": 1, "result": result.clone()})))
            .await
    }

    pub fn captured(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }
}

/// JSON-RPC success body.
pub fn ok(result: Value) -> Reply {
    (200, json!({"jsonrpc": "2.0", "id": 1, "result": result}))
}

/// JSON-RPC error body.
pub fn rpc_error(code: i64, message: &str) -> Reply {
    (
        200,
        json!({"jsonrpc": "2.0", "id": 1, "error": {"code": code, "message": message}}),
    )
}

async fn serve_one(
    mut stream: TcpStream,
    handler: Handler,
    captured: Arc<Mutex<Vec<Captured>>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut content_length = 0usize;
    let mut authorization = None;
    for line in head.lines().skip(1) {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse().unwrap_or(0),
                "authorization" => authorization = Some(value.trim().to_owned()),
                _ => {}
            }
        }
    }

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let request: Value =
        serde_json::from_slice(&buf[header_end..header_end + content_length]).unwrap_or(Value::Null);
    let method = request["method"].as_str().unwrap_or_default().to_owned();
    let params = request["params"].clone();
    captured.lock().unwrap().push(Captured {
        authorization,
        method: method.clone(),
        params: params.clone(),
    });

    let (status, body) = handler(&method, &params);
    let body = body.to_string();
    let response = format!(
        "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}
