//! Records and status blocks rebuilt from `key: value` lines

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A field holding one value, or several when the key repeated within a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Single(String),
    Multi(Vec<String>),
}

impl FieldValue {
    /// Append a repeated value, promoting to a sequence in arrival order.
    fn push(&mut self, value: String) {
        match self {
            Self::Single(first) => {
                let first = std::mem::take(first);
                *self = Self::Multi(vec![first, value]);
            }
            Self::Multi(values) => values.push(value),
        }
    }

    pub fn first(&self) -> &str {
        match self {
            Self::Single(value) => value,
            Self::Multi(values) => values.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(value) => vec![value.as_str()],
            Self::Multi(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// Display form; multiple values are joined with `", "`
    pub fn joined(&self) -> Cow<'_, str> {
        match self {
            Self::Single(value) => Cow::Borrowed(value),
            Self::Multi(values) => Cow::Owned(values.join(", ")),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(value) => value.is_empty(),
            Self::Multi(values) => values.iter().all(String::is_empty),
        }
    }
}

/// Split `key: value` on the first `": "`, lower-casing the key.
///
/// Lines without a separator or with an empty value yield `None`.
pub fn parse_field_line(line: &str) -> Option<(String, &str)> {
    let (key, value) = line.split_once(": ")?;
    if value.is_empty() {
        return None;
    }
    Some((key.to_lowercase(), value))
}

/// One logical item (song, album, artist, ...) reassembled from field lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field; a key seen before accumulates rather than overwrites.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        match self.fields.entry(key.into()) {
            std::collections::btree_map::Entry::Occupied(mut entry) => entry.get_mut().push(value),
            std::collections::btree_map::Entry::Vacant(entry) => {
                entry.insert(FieldValue::Single(value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Display text of a field, empty when absent
    pub fn text(&self, key: &str) -> Cow<'_, str> {
        self.fields
            .get(key)
            .map(FieldValue::joined)
            .unwrap_or(Cow::Borrowed(""))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Playback state value meaning a song is playing
pub const STATE_PLAY: &str = "play";

/// Daemon status fields (`state`, `songid`, `playlistlength`, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    fields: BTreeMap<String, String>,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn state(&self) -> Option<&str> {
        self.get("state")
    }

    pub fn song_id(&self) -> Option<&str> {
        self.get("songid")
    }

    pub fn playlist_length(&self) -> Option<u32> {
        self.get("playlistlength").and_then(|v| v.parse().ok())
    }

    pub fn is_playing(&self) -> bool {
        self.state() == Some(STATE_PLAY)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
