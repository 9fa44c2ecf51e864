//! Mock servers for integration testing
//!
//! These mock servers simulate the real daemon, allowing full integration
//! testing without a music library.

pub mod mpd;

pub use mpd::MockMpdServer;
