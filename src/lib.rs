//! mpd-picker - MPD library browsing core
//!
//! Streams listings from a Music Player Daemon and turns them into
//! display candidates a fuzzy picker can filter and act upon.
//!
//! This library provides:
//! - Resumable, non-blocking protocol sessions with pipelined commands
//! - Record assembly and now-playing detection
//! - Template-driven candidate projection with viewport-relative columns
//! - Caching of large listings and queue actions (add, replace, play)

pub mod config;
pub mod mpd;
pub mod picker;
