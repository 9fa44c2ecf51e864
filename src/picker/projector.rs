//! Record → candidate projection
//!
//! Builds the line shown in the picker from the entity's template and keeps
//! the raw tag values so later actions (add, play, browse) can address the
//! same songs on the daemon.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::assembler::AssembledRecord;
use super::query::EntityKind;
use super::record::FieldValue;
use super::template::{Template, WidthResolver};

/// Prefix marking the candidate of the playing song
pub const NOW_PLAYING_MARKER: char = '▶';

/// Namespace for raw tags carried on a candidate
pub const TAG_PREFIX: &str = "meta__";

/// Tags extracted for display and selection
pub const DEFAULT_TAGS: [&str; 8] = [
    "date",
    "genre",
    "title",
    "album",
    "track",
    "artist",
    "albumartist",
    "pos",
];

/// Width used when a track number carries no total
const DEFAULT_TRACK_WIDTH: usize = 2;

/// One selectable line in the picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub display_text: String,
    /// Raw source values keyed `meta__<tag>`
    pub tags: BTreeMap<String, FieldValue>,
    pub entity: EntityKind,
    pub is_current: bool,
}

impl Candidate {
    /// Raw value of `tag` (without the namespace prefix)
    pub fn tag(&self, tag: &str) -> Option<&FieldValue> {
        self.tags.get(&format!("{}{}", TAG_PREFIX, tag))
    }

    /// Tags with the namespace stripped, in key order
    pub fn tag_pairs(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.tags
            .iter()
            .filter_map(|(key, value)| key.strip_prefix(TAG_PREFIX).map(|tag| (tag, value)))
    }
}

/// Zero-pad a track number to the width of its total (`"3/12"` → `"03"`).
///
/// Without a total the width is 2 (`"7"` → `"07"`). Longer numbers are kept.
pub fn normalize_track(track: &str) -> String {
    if track.is_empty() {
        return String::new();
    }
    let (number, width) = match track.split_once('/') {
        Some((number, total)) if !total.is_empty() => (number, total.chars().count()),
        Some((number, _)) => (number, DEFAULT_TRACK_WIDTH),
        None => (track, DEFAULT_TRACK_WIDTH),
    };
    format!("{:0>width$}", number, width = width)
}

pub struct CandidateProjector {
    entity: EntityKind,
    template: Option<Template>,
    tags: Vec<String>,
}

impl CandidateProjector {
    pub fn new(entity: EntityKind, template: Option<Template>, tags: Vec<String>) -> Self {
        Self {
            entity,
            template,
            tags,
        }
    }

    /// Projector with the entity's built-in template and the default tags
    pub fn for_entity(entity: EntityKind) -> Self {
        Self::new(
            entity,
            Some(Template::parse(entity.default_template())),
            DEFAULT_TAGS.iter().map(|t| t.to_string()).collect(),
        )
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn template(&self) -> Option<&Template> {
        self.template.as_ref()
    }

    pub fn project(&self, assembled: &AssembledRecord, widths: &dyn WidthResolver) -> Candidate {
        let record = &assembled.record;

        let mut meta: BTreeMap<String, String> = self
            .tags
            .iter()
            .map(|tag| (tag.clone(), record.text(tag).into_owned()))
            .collect();
        if let Some(template) = &self.template {
            for name in template.placeholders() {
                meta.entry(name.to_string())
                    .or_insert_with(|| record.text(name).into_owned());
            }
        }

        if let Some(album_artist) = meta.get_mut("albumartist") {
            if album_artist.is_empty() {
                *album_artist = record.text("artist").into_owned();
            }
        }

        if !self.entity.is_playlist() {
            if let Some(track) = meta.get_mut("track") {
                *track = normalize_track(track);
            }
        }

        let text = match &self.template {
            Some(template) => template.render(&meta, widths),
            None => record.text(self.entity.separator_key()).into_owned(),
        };
        let display_text = if assembled.is_current {
            format!("{}{}", NOW_PLAYING_MARKER, text)
        } else {
            text
        };

        let tags = self
            .tags
            .iter()
            .filter_map(|tag| {
                record
                    .get(tag)
                    .filter(|value| !value.is_empty())
                    .map(|value| (format!("{}{}", TAG_PREFIX, tag), value.clone()))
            })
            .collect();

        Candidate {
            display_text,
            tags,
            entity: self.entity,
            is_current: assembled.is_current,
        }
    }
}
