//! Resumable MPD connection
//!
//! A session writes its whole command queue up front (pipelining) and then
//! hands the responses back one bounded read at a time. Nothing here blocks
//! longer than the budget passed to [`ConnectionSession::poll`], so a host
//! can interleave polls with its own event loop.
//!
//! ```text
//! open ──► Streaming ──(last end-of-response marker / remote close)──► Complete
//!              │                                                          │
//!              └──────────────────────── kill() ──────────────────────────┴──► Closed
//! ```
//!
//! Buffered partial lines survive between polls. A killed session refuses
//! further polls instead of replaying stale bytes.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::command::{is_end_marker, parse_greeting, Command, ACK_PREFIX};
use super::error::MpdError;
use super::line_buffer::LineBuffer;

/// Upper bound on bytes taken from the socket per poll
pub const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Lifecycle of a [`ConnectionSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Responses are still outstanding
    Streaming,
    /// Every queued command was answered, or the daemon hung up
    Complete,
    /// Killed by the caller
    Closed,
}

/// Result of one poll
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Poll {
    pub lines: Vec<String>,
    pub end_of_stream: bool,
}

impl Poll {
    fn pending(lines: Vec<String>) -> Self {
        Self {
            lines,
            end_of_stream: false,
        }
    }

    fn finished(lines: Vec<String>) -> Self {
        Self {
            lines,
            end_of_stream: true,
        }
    }
}

/// One streaming connection to the daemon
pub struct ConnectionSession<S = TcpStream> {
    stream: Option<S>,
    buffer: LineBuffer,
    read_buf: Box<[u8]>,
    addr: String,
    server_version: String,
    commands_sent: usize,
    responses_seen: usize,
    state: SessionState,
}

impl ConnectionSession<TcpStream> {
    /// Connect to `host:port`, wait for the greeting and pipeline `commands`.
    ///
    /// Connecting and the greeting each get `budget`.
    pub async fn open(
        host: &str,
        port: u16,
        commands: &[Command],
        budget: Duration,
    ) -> Result<Self, MpdError> {
        let addr = format!("{}:{}", host, port);
        let stream = timeout(budget, TcpStream::connect(&addr))
            .await
            .map_err(|_| MpdError::ConnectTimeout {
                addr: addr.clone(),
                budget,
            })?
            .map_err(|source| MpdError::Connect {
                addr: addr.clone(),
                source,
            })?;

        debug!("Connected to MPD at {}", addr);
        Self::handshake(stream, addr, commands, budget).await
    }
}

impl<S> ConnectionSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Start a session over an already-connected stream.
    pub async fn from_stream(
        stream: S,
        commands: &[Command],
        budget: Duration,
    ) -> Result<Self, MpdError> {
        Self::handshake(stream, "<stream>".to_string(), commands, budget).await
    }

    async fn handshake(
        mut stream: S,
        addr: String,
        commands: &[Command],
        budget: Duration,
    ) -> Result<Self, MpdError> {
        let mut buffer = LineBuffer::new();
        let mut read_buf = vec![0u8; READ_CHUNK_SIZE].into_boxed_slice();

        let greeting = timeout(budget, read_line(&mut stream, &mut buffer, &mut read_buf))
            .await
            .map_err(|_| MpdError::ConnectTimeout {
                addr: addr.clone(),
                budget,
            })??;

        let version = greeting
            .as_deref()
            .and_then(parse_greeting)
            .map(str::to_string);
        let Some(server_version) = version else {
            return Err(MpdError::Greeting {
                addr,
                line: greeting.unwrap_or_default(),
            });
        };

        let payload: Vec<u8> = commands.iter().flat_map(Command::to_wire).collect();
        if !payload.is_empty() {
            let write = async {
                stream.write_all(&payload).await?;
                stream.flush().await
            };
            timeout(budget, write)
                .await
                .map_err(|_| MpdError::WriteTimeout {
                    addr: addr.clone(),
                    budget,
                })??;
        }

        debug!(
            "MPD {} at {}: pipelined {} command(s)",
            server_version,
            addr,
            commands.len()
        );

        let state = if commands.is_empty() {
            SessionState::Complete
        } else {
            SessionState::Streaming
        };

        Ok(Self {
            stream: Some(stream),
            buffer,
            read_buf,
            addr,
            server_version,
            commands_sent: commands.len(),
            responses_seen: 0,
            state,
        })
    }

    /// Make one read attempt bounded by `budget`.
    ///
    /// Returns whatever complete lines arrived. An empty, unfinished poll
    /// means nothing arrived in time; call again later.
    pub async fn poll(&mut self, budget: Duration) -> Result<Poll, MpdError> {
        match self.state {
            SessionState::Closed => return Err(MpdError::SessionClosed),
            SessionState::Complete => return Ok(Poll::finished(Vec::new())),
            SessionState::Streaming => {}
        }

        // Lines that arrived together with the greeting are served first
        let buffered: Vec<String> = self.buffer.feed(&[]).collect();
        if !buffered.is_empty() {
            return Ok(self.account(buffered));
        }

        let Some(stream) = self.stream.as_mut() else {
            return Err(MpdError::SessionClosed);
        };

        let read = match timeout(budget, stream.read(&mut self.read_buf)).await {
            Ok(read) => read,
            Err(_) => return Ok(Poll::default()),
        };

        match read {
            Ok(0) => {
                let lines: Vec<String> = self.buffer.flush().into_iter().collect();
                self.count_markers(&lines);
                if self.responses_seen < self.commands_sent {
                    warn!(
                        "MPD at {} closed the connection with {} response(s) outstanding",
                        self.addr,
                        self.outstanding()
                    );
                }
                self.finish();
                Ok(Poll::finished(lines))
            }
            Ok(n) => {
                let lines: Vec<String> = self.buffer.feed(&self.read_buf[..n]).collect();
                Ok(self.account(lines))
            }
            Err(e) => {
                self.kill();
                Err(MpdError::Io(e))
            }
        }
    }

    /// Drop the connection and everything buffered. Safe to call repeatedly.
    pub fn kill(&mut self) {
        if self.state != SessionState::Closed {
            debug!("Killing MPD session to {}", self.addr);
        }
        self.stream = None;
        self.buffer.clear();
        self.state = SessionState::Closed;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether no more output will arrive
    pub fn is_finished(&self) -> bool {
        self.state != SessionState::Streaming
    }

    /// Version from the daemon's greeting line
    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Commands still waiting for their end-of-response marker
    pub fn outstanding(&self) -> usize {
        self.commands_sent.saturating_sub(self.responses_seen)
    }

    fn account(&mut self, lines: Vec<String>) -> Poll {
        self.count_markers(&lines);
        if self.responses_seen >= self.commands_sent {
            self.finish();
            Poll::finished(lines)
        } else {
            Poll::pending(lines)
        }
    }

    fn count_markers(&mut self, lines: &[String]) {
        for line in lines.iter().filter(|l| is_end_marker(l)) {
            if line.starts_with(ACK_PREFIX) {
                debug!("MPD at {} rejected a command: {}", self.addr, line);
            }
            self.responses_seen += 1;
        }
    }

    fn finish(&mut self) {
        if self.buffer.pending_len() > 0 {
            debug!(
                "Discarding {} trailing byte(s) from {}",
                self.buffer.pending_len(),
                self.addr
            );
        }
        self.stream = None;
        self.buffer.clear();
        self.state = SessionState::Complete;
    }
}

/// Read until one complete line is buffered; `None` if the peer hung up first.
async fn read_line<S>(
    stream: &mut S,
    buffer: &mut LineBuffer,
    read_buf: &mut [u8],
) -> Result<Option<String>, MpdError>
where
    S: AsyncRead + Unpin,
{
    loop {
        let n = stream.read(read_buf).await?;
        if n == 0 {
            return Ok(buffer.flush());
        }
        if let Some(line) = buffer.feed(&read_buf[..n]).next() {
            return Ok(Some(line));
        }
    }
}
