//! In-process DevTools WebSocket endpoint for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use devtools_harness::{Session, SessionOptions};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

/// How long a test waits for the client to write something.
const READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Installs a test subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// MockTarget
// ============================================================================

/// A bound endpoint waiting for one client.
pub struct MockTarget {
    listener: TcpListener,
    url: String,
}

impl MockTarget {
    /// Binds to a random local port.
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        Self {
            listener,
            url: format!("ws://127.0.0.1:{port}/devtools/page/MOCK"),
        }
    }

    /// Debugger URL clients should open.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Accepts the client and completes the handshake.
    pub async fn accept(self) -> MockPeer {
        let (stream, _) = timeout(READ_TIMEOUT, self.listener.accept())
            .await
            .expect("client connected in time")
            .expect("accept");
        MockPeer {
            ws: accept_async(stream).await.expect("handshake"),
        }
    }

    /// Serves clients forever, answering every command with
    /// `{ "method": <method> }`.
    pub fn spawn_echo(self) -> String {
        let url = self.url.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = self.listener.accept().await {
                tokio::spawn(async move {
                    let Ok(mut ws) = accept_async(stream).await else {
                        return;
                    };
                    while let Some(Ok(frame)) = ws.next().await {
                        let Message::Text(text) = frame else {
                            continue;
                        };
                        let Ok(request) = serde_json::from_str::<Value>(&text) else {
                            continue;
                        };
                        let reply = json!({ "id": request["id"], "result": { "method": request["method"] } });
                        if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        url
    }
}

// ============================================================================
// MockPeer
// ============================================================================

/// The target side of one accepted connection.
pub struct MockPeer {
    ws: WebSocketStream<TcpStream>,
}

impl MockPeer {
    /// Reads the next command the client sent.
    pub async fn next_request(&mut self) -> Value {
        loop {
            let frame = timeout(READ_TIMEOUT, self.ws.next())
                .await
                .expect("request in time")
                .expect("stream open")
                .expect("valid frame");
            if let Message::Text(text) = frame {
                return serde_json::from_str(&text).expect("json request");
            }
        }
    }

    /// Reads `n` commands.
    pub async fn next_requests(&mut self, n: usize) -> Vec<Value> {
        let mut requests = Vec::with_capacity(n);
        for _ in 0..n {
            requests.push(self.next_request().await);
        }
        requests
    }

    /// Writes a raw JSON frame.
    pub async fn push(&mut self, message: Value) {
        self.ws
            .send(Message::Text(message.to_string().into()))
            .await
            .expect("push");
    }

    /// Writes a raw text frame.
    pub async fn push_text(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string().into()))
            .await
            .expect("push");
    }

    /// Answers a command with a result.
    pub async fn respond(&mut self, id: &Value, result: Value) {
        self.push(json!({ "id": id, "result": result })).await;
    }

    /// Answers a command with a protocol error.
    pub async fn respond_error(&mut self, id: &Value, code: i64, message: &str) {
        self.push(json!({ "id": id, "error": { "code": code, "message": message } }))
            .await;
    }

    /// Answers a `Runtime.evaluate` with an inline value.
    pub async fn respond_value(&mut self, id: &Value, value: Value) {
        self.respond(id, json!({ "result": { "type": "object", "value": value } }))
            .await;
    }

    /// Emits an unsolicited event.
    pub async fn emit(&mut self, method: &str, params: Value) {
        self.push(json!({ "method": method, "params": params })).await;
    }

    /// Emits a `console.log` with one string argument.
    pub async fn emit_console(&mut self, text: &str) {
        self.emit(
            "Runtime.consoleAPICalled",
            json!({ "type": "log", "args": [{ "type": "string", "value": text }], "timestamp": 0.0 }),
        )
        .await;
    }

    /// Closes the connection from the target side.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// Options with deadlines short enough for tests.
pub fn test_options() -> SessionOptions {
    SessionOptions::new()
        .with_command_timeout(Duration::from_secs(2))
        .with_wait_timeout(Duration::from_secs(2))
        .with_poll_interval(Duration::from_millis(5))
}

/// Opens a session against a fresh mock target.
pub async fn open_session(options: SessionOptions) -> (Session, MockPeer) {
    init_tracing();
    let target = MockTarget::bind().await;
    let url = target.url().to_string();

    let (session, peer) = tokio::join!(Session::open(&url, options), target.accept());
    (session.expect("session opens"), peer)
}
