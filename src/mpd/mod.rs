//! MPD protocol plumbing: line decoding, request formatting and resumable sessions

pub mod command;
pub mod error;
pub mod line_buffer;
pub mod session;

pub use command::{escape_argument, Command};
pub use error::MpdError;
pub use line_buffer::LineBuffer;
pub use session::{ConnectionSession, Poll, SessionState};

/// Default MPD port
pub const DEFAULT_PORT: u16 = 6600;
