//! Mock Polygon WebSocket server for integration tests.
//!
//! Speaks enough of the Polygon crypto protocol to exercise the connector:
//! - Sends the `connected` status on accept
//! - Answers `auth` with `auth_success` / `auth_failed`
//! - Answers `subscribe` with `success`, then plays the scripted frames
//! - Optionally closes the connection after the frames
//! - Records every client message

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Server behavior shared by every connection.
#[derive(Debug, Clone)]
pub struct MockBehavior {
    /// Key accepted by `auth`.
    pub api_key: String,
    /// Text frames sent after a subscription.
    pub frames: Vec<String>,
    /// Send a Close frame once all frames are sent.
    pub close_after_frames: bool,
}

/// A mock Polygon WebSocket server for testing.
pub struct MockPolygonServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<Mutex<u32>>,
}

impl MockPolygonServer {
    /// Start a new mock server on an available port.
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let messages: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(VecDeque::new()));
        let connections: Arc<Mutex<u32>> = Arc::new(Mutex::new(0));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let messages_clone = messages.clone();
        let connections_clone = connections.clone();
        let behavior = Arc::new(behavior);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(
                            stream,
                            behavior.clone(),
                            messages_clone.clone(),
                            connections_clone.clone(),
                        ));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            messages,
            connections,
        }
    }

    /// Get the server's WebSocket URL.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Get the number of connections received.
    pub async fn connection_count(&self) -> u32 {
        *self.connections.lock().await
    }

    /// Get all received messages.
    pub async fn received_messages(&self) -> Vec<String> {
        self.messages.lock().await.iter().cloned().collect()
    }

    /// Shutdown the server.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// One frame of `count` XA aggregates, sequence numbers from `first_seq`.
pub fn xa_frame(first_seq: u64, count: u64) -> String {
    let events: Vec<_> = (first_seq..first_seq + count)
        .map(|seq| {
            let start = 1_700_000_040_000i64 + seq as i64 * 60_000;
            json!({
                "ev": "XA",
                "pair": "BTC-USD",
                "v": 1.0 + seq as f64,
                "vw": 64000.0,
                "z": seq,
                "o": 64000.0,
                "c": 64001.0,
                "h": 64002.0,
                "l": 63999.0,
                "s": start,
                "e": start + 60_000
            })
        })
        .collect();
    serde_json::Value::Array(events).to_string()
}

fn status(status: &str, message: &str) -> Message {
    Message::Text(json!([{"ev": "status", "status": status, "message": message}]).to_string())
}

async fn handle_connection(
    stream: TcpStream,
    behavior: Arc<MockBehavior>,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<Mutex<u32>>,
) {
    {
        let mut count = connections.lock().await;
        *count += 1;
    }

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    if write
        .send(status("connected", "Connected Successfully"))
        .await
        .is_err()
    {
        return;
    }

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                {
                    let mut msgs = messages.lock().await;
                    msgs.push_back(text.clone());
                }

                let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&text) else {
                    continue;
                };
                let params = parsed
                    .get("params")
                    .and_then(|p| p.as_str())
                    .unwrap_or_default()
                    .to_string();

                match parsed.get("action").and_then(|a| a.as_str()) {
                    Some("auth") if params == behavior.api_key => {
                        let _ = write.send(status("auth_success", "authenticated")).await;
                    }
                    Some("auth") => {
                        let _ = write
                            .send(status("auth_failed", "authentication failed"))
                            .await;
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                    Some("subscribe") => {
                        let _ = write
                            .send(status("success", &format!("subscribed to: {params}")))
                            .await;
                        for frame in &behavior.frames {
                            let _ = write.send(Message::Text(frame.clone())).await;
                        }
                        if behavior.close_after_frames {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                    }
                    _ => {}
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_starts() {
        let server = MockPolygonServer::start(MockBehavior {
            api_key: "key".to_string(),
            frames: Vec::new(),
            close_after_frames: false,
        })
        .await;
        assert!(server.url().starts_with("ws://127.0.0.1:"));
        server.shutdown().await;
    }

    #[test]
    fn test_xa_frame_shape() {
        let frame: serde_json::Value = serde_json::from_str(&xa_frame(5, 2)).unwrap();
        let events = frame.as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["z"], 5);
        assert_eq!(events[1]["ev"], "XA");
    }
}
