#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Mock MPD daemon for testing
//!
//! Speaks the line protocol: greets every connection, then answers each
//! request line with a scripted body followed by `OK`, or with `ACK`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

pub const DEFAULT_GREETING: &str = "OK MPD 0.23.5";

/// Mock MPD state
#[derive(Debug, Clone)]
pub struct MockMpdState {
    pub greeting: String,
    /// Response bodies keyed by exact request line
    pub responses: HashMap<String, String>,
    /// ACK messages keyed by exact request line
    pub rejections: HashMap<String, String>,
    /// Every request line received, across connections
    pub received: Vec<String>,
    pub connections: usize,
    /// Delay before answering each request
    pub response_delay: Option<Duration>,
    /// Pause in the middle of each response body
    pub split_delay: Option<Duration>,
}

impl Default for MockMpdState {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            responses: HashMap::new(),
            rejections: HashMap::new(),
            received: Vec::new(),
            connections: 0,
            response_delay: None,
            split_delay: None,
        }
    }
}

/// Mock MPD server
pub struct MockMpdServer {
    addr: SocketAddr,
    state: Arc<RwLock<MockMpdState>>,
    handle: JoinHandle<()>,
}

impl MockMpdServer {
    /// Start a mock MPD server on a random port
    pub async fn start() -> Self {
        let state = Arc::new(RwLock::new(MockMpdState::default()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state_clone = state.clone();
        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        let state = state_clone.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, state).await;
                        });
                    }
                    Err(_) => break,
                }
            }
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Get the server address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Answer `command` with `body` (newline-terminated field lines) then `OK`
    pub async fn respond(&self, command: &str, body: &str) {
        self.state
            .write()
            .await
            .responses
            .insert(command.to_string(), body.to_string());
    }

    /// Answer `command` with an ACK carrying `message`
    pub async fn reject(&self, command: &str, message: &str) {
        self.state
            .write()
            .await
            .rejections
            .insert(command.to_string(), message.to_string());
    }

    pub async fn set_greeting(&self, greeting: &str) {
        self.state.write().await.greeting = greeting.to_string();
    }

    pub async fn set_response_delay(&self, delay: Duration) {
        self.state.write().await.response_delay = Some(delay);
    }

    pub async fn set_split_delay(&self, delay: Duration) {
        self.state.write().await.split_delay = Some(delay);
    }

    /// Request lines received so far
    pub async fn received(&self) -> Vec<String> {
        self.state.read().await.received.clone()
    }

    /// Number of connections accepted so far
    pub async fn connections(&self) -> usize {
        self.state.read().await.connections
    }

    /// Stop the mock server
    pub async fn stop(self) {
        self.handle.abort();
    }
}

/// Handle a single TCP connection
async fn handle_connection(stream: TcpStream, state: Arc<RwLock<MockMpdState>>) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    let greeting = {
        let mut state = state.write().await;
        state.connections += 1;
        format!("{}\n", state.greeting)
    };
    if writer.write_all(greeting.as_bytes()).await.is_err() {
        return;
    }

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break, // Connection closed
            Ok(_) => {
                let command = line.trim_end_matches(['\r', '\n']).to_string();
                let (response, response_delay, split_delay) = {
                    let mut state = state.write().await;
                    state.received.push(command.clone());
                    (
                        process_command(&command, &state),
                        state.response_delay,
                        state.split_delay,
                    )
                };
                if let Some(delay) = response_delay {
                    tokio::time::sleep(delay).await;
                }
                if write_response(&mut writer, &response, split_delay)
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

async fn write_response(
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    response: &str,
    split_delay: Option<Duration>,
) -> std::io::Result<()> {
    let bytes = response.as_bytes();
    match split_delay {
        Some(delay) if bytes.len() > 1 => {
            let (head, tail) = bytes.split_at(bytes.len() / 2);
            writer.write_all(head).await?;
            writer.flush().await?;
            tokio::time::sleep(delay).await;
            writer.write_all(tail).await?;
        }
        _ => writer.write_all(bytes).await?,
    }
    writer.flush().await
}

/// Build the full response to one request line
fn process_command(command: &str, state: &MockMpdState) -> String {
    if let Some(message) = state.rejections.get(command) {
        let name = command.split_whitespace().next().unwrap_or("");
        return format!("ACK [50@0] {{{}}} {}\n", name, message);
    }
    let body = state.responses.get(command).map(String::as_str).unwrap_or("");
    format!("{}OK\n", body)
}
