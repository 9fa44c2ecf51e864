//! MPD request lines
//!
//! Every request is a single line. String arguments are wrapped in double
//! quotes and escaped with [`escape_argument`].

use std::fmt;

/// End-of-response marker for a successful command
pub const OK_MARKER: &str = "OK";
/// Prefix of the end-of-response marker for a failed command
pub const ACK_PREFIX: &str = "ACK ";
/// Prefix of the line a daemon sends right after accepting a connection
pub const GREETING_PREFIX: &str = "OK MPD ";

/// One queued protocol request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command(String);

impl Command {
    /// Wrap an already-formatted request line.
    pub fn raw(line: impl Into<String>) -> Self {
        Self(line.into())
    }

    pub fn status() -> Self {
        Self::raw("status")
    }

    pub fn current_song() -> Self {
        Self::raw("currentsong")
    }

    pub fn playlist_info() -> Self {
        Self::raw("playlistinfo")
    }

    pub fn clear() -> Self {
        Self::raw("clear")
    }

    /// `play`, optionally at a playlist position
    pub fn play(position: Option<u32>) -> Self {
        match position {
            Some(pos) => Self(format!("play {}", pos)),
            None => Self::raw("play"),
        }
    }

    /// `list "<tag>" ["<filter>" ...] [group "<field>" ...]`
    pub fn list<F, G>(tag: &str, filters: F, groups: G) -> Self
    where
        F: IntoIterator,
        F::Item: AsRef<str>,
        G: IntoIterator,
        G::Item: AsRef<str>,
    {
        let mut line = format!("list {}", quote(tag));
        for filter in filters {
            line.push(' ');
            line.push_str(&quote(filter.as_ref()));
        }
        for group in groups {
            line.push_str(" group ");
            line.push_str(&quote(group.as_ref()));
        }
        Self(line.trim().to_string())
    }

    /// `findadd "<tag>" "<value>" ...` adding every song matching all pairs exactly
    pub fn find_add<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut line = String::from("findadd");
        for (tag, value) in pairs {
            line.push(' ');
            line.push_str(&quote(tag));
            line.push(' ');
            line.push_str(&quote(value));
        }
        Self(line)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bytes written to the socket, terminator included
    pub fn to_wire(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.0.len() + 1);
        bytes.extend_from_slice(self.0.as_bytes());
        bytes.push(b'\n');
        bytes
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Escape a string argument: backslashes first, then colon, quote and space.
pub fn escape_argument(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | ':' | '"' | ' ') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn quote(value: &str) -> String {
    format!("\"{}\"", escape_argument(value))
}

/// Whether `line` terminates the response to one command.
pub fn is_end_marker(line: &str) -> bool {
    line == OK_MARKER || line.starts_with(ACK_PREFIX)
}

/// Version announced by a greeting line, if `line` is one.
pub fn parse_greeting(line: &str) -> Option<&str> {
    line.strip_prefix(GREETING_PREFIX).map(str::trim)
}
