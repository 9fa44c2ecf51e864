//! Groups flat `key: value` lines into records
//!
//! Responses to pipelined commands arrive back to back, so the assembler
//! walks through the optional preamble sections before the listing itself:
//!
//! ```text
//! AwaitingStatus ──OK──► AwaitingSecondarySection ──OK──► AwaitingRecords ──OK──► Done
//!        │                                                    ▲
//!        └──────────────OK (no current-song section)──────────┘
//! ```
//!
//! Each end-of-response marker (`OK`, or `ACK ...` for a failed command)
//! closes the current section. Inside the listing a new record starts
//! whenever the separator key shows up while a record is in progress.

use tracing::{debug, warn};

use super::projector::normalize_track;
use super::record::{parse_field_line, RawRecord, Status};
use crate::mpd::command::{is_end_marker, ACK_PREFIX};

/// Section the assembler expects next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingStatus,
    AwaitingSecondarySection,
    AwaitingRecords,
    Done,
}

/// Which preamble commands were queued ahead of the listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Preamble {
    /// `status`
    pub status: bool,
    /// `currentsong`
    pub current_song: bool,
}

/// A finalized record with its now-playing flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledRecord {
    pub record: RawRecord,
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblerEvent {
    /// The status section ended; [`RecordAssembler::status`] is complete
    StatusReady,
    /// The current-song section ended
    CurrentSongReady,
    Record(AssembledRecord),
}

pub struct RecordAssembler {
    phase: Phase,
    has_current_song_section: bool,
    separator: String,
    status: Status,
    current_song: Option<RawRecord>,
    section: RawRecord,
    in_progress: RawRecord,
    id_matched: bool,
    records_emitted: usize,
}

impl RecordAssembler {
    /// `status` and `current_song` seed what earlier sessions already learned;
    /// a queued preamble section replaces them when it arrives.
    pub fn new(
        separator: &str,
        preamble: Preamble,
        status: Status,
        current_song: Option<RawRecord>,
    ) -> Self {
        let phase = if preamble.status {
            Phase::AwaitingStatus
        } else if preamble.current_song {
            Phase::AwaitingSecondarySection
        } else {
            Phase::AwaitingRecords
        };

        Self {
            phase,
            has_current_song_section: preamble.current_song,
            separator: separator.to_lowercase(),
            status,
            current_song,
            section: RawRecord::new(),
            in_progress: RawRecord::new(),
            id_matched: false,
            records_emitted: 0,
        }
    }

    /// Consume one decoded line.
    pub fn push_line(&mut self, line: &str) -> Option<AssemblerEvent> {
        if is_end_marker(line) {
            return self.end_section(line);
        }

        let Some((key, value)) = parse_field_line(line) else {
            return None;
        };

        match self.phase {
            Phase::AwaitingStatus => {
                self.status.insert(key, value);
                None
            }
            Phase::AwaitingSecondarySection => {
                self.section.insert(key, value);
                None
            }
            Phase::AwaitingRecords => {
                let finished = if key == self.separator && !self.in_progress.is_empty() {
                    Some(std::mem::take(&mut self.in_progress))
                } else {
                    None
                };
                self.in_progress.insert(key, value);
                finished.map(|record| AssemblerEvent::Record(self.assemble(record)))
            }
            Phase::Done => {
                debug!("Ignoring line after final response: {:?}", line);
                None
            }
        }
    }

    /// Finalize at end of stream, returning the trailing record if any.
    pub fn finish(&mut self) -> Option<AssemblerEvent> {
        let event = match self.phase {
            Phase::AwaitingRecords if !self.in_progress.is_empty() => {
                let record = std::mem::take(&mut self.in_progress);
                Some(AssemblerEvent::Record(self.assemble(record)))
            }
            Phase::AwaitingStatus | Phase::AwaitingSecondarySection => {
                warn!("Stream ended before the listing arrived ({:?})", self.phase);
                None
            }
            _ => None,
        };
        self.phase = Phase::Done;
        event
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    /// The playing song, once known from a preamble or an id match
    pub fn current_song(&self) -> Option<&RawRecord> {
        self.current_song.as_ref()
    }

    pub fn records_emitted(&self) -> usize {
        self.records_emitted
    }

    fn end_section(&mut self, marker: &str) -> Option<AssemblerEvent> {
        if marker.starts_with(ACK_PREFIX) {
            warn!("MPD rejected a command during {:?}: {}", self.phase, marker);
        }

        match self.phase {
            Phase::AwaitingStatus => {
                self.phase = if self.has_current_song_section {
                    Phase::AwaitingSecondarySection
                } else {
                    Phase::AwaitingRecords
                };
                Some(AssemblerEvent::StatusReady)
            }
            Phase::AwaitingSecondarySection => {
                let section = std::mem::take(&mut self.section);
                self.current_song = if section.is_empty() { None } else { Some(section) };
                self.phase = Phase::AwaitingRecords;
                Some(AssemblerEvent::CurrentSongReady)
            }
            Phase::AwaitingRecords => self.finish(),
            Phase::Done => {
                warn!("Unexpected end-of-response marker after the listing: {}", marker);
                None
            }
        }
    }

    fn assemble(&mut self, record: RawRecord) -> AssembledRecord {
        let is_current = self.is_current(&record);
        self.records_emitted += 1;
        AssembledRecord { record, is_current }
    }

    /// Ids are compared when the record carries one. Otherwise the
    /// (artist, title, track) tuple is compared with the known current
    /// song, which also matches identical songs on other albums.
    fn is_current(&mut self, record: &RawRecord) -> bool {
        if !self.status.is_playing() {
            return false;
        }

        if let Some(id) = record.get("id") {
            if self.id_matched || self.status.song_id() != Some(id.first()) {
                return false;
            }
            self.id_matched = true;
            self.current_song = Some(record.clone());
            return true;
        }

        self.current_song
            .as_ref()
            .is_some_and(|current| same_song(current, record))
    }
}

fn same_song(current: &RawRecord, candidate: &RawRecord) -> bool {
    if current.text("title").is_empty() {
        return false;
    }
    current.text("artist") == candidate.text("artist")
        && current.text("title") == candidate.text("title")
        && normalize_track(&current.text("track")) == normalize_track(&candidate.text("track"))
}
