use std::time::Duration;

use thiserror::Error;

/// Errors raised by the MPD protocol layer.
///
/// A read that times out is deliberately absent: an empty poll is the
/// normal "try again later" signal, not a failure.
#[derive(Debug, Error)]
pub enum MpdError {
    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("connection to {addr} timed out after {budget:?}")]
    ConnectTimeout { addr: String, budget: Duration },
    #[error("sending commands to {addr} timed out after {budget:?}")]
    WriteTimeout { addr: String, budget: Duration },
    #[error("unexpected greeting from {addr}: {line:?}")]
    Greeting { addr: String, line: String },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session is closed")]
    SessionClosed,
}

impl MpdError {
    /// Whether the failure happened while establishing the connection.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::ConnectTimeout { .. }
                | Self::WriteTimeout { .. }
                | Self::Greeting { .. }
        )
    }
}
