//! Memoized candidate lists for expensive listings
//!
//! Small listings are cheap to fetch again, so only lists of at least
//! `min_items` candidates are stored. Entries are replaced or dropped as a
//! whole, never extended.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::projector::Candidate;
use super::query::Fingerprint;

/// Default minimum list size worth caching
pub const DEFAULT_MIN_CACHE_ITEMS: usize = 5000;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub candidates: Vec<Candidate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ResultCache {
    entries: HashMap<Fingerprint, CacheEntry>,
    min_items: usize,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CACHE_ITEMS)
    }
}

impl ResultCache {
    pub fn new(min_items: usize) -> Self {
        Self {
            entries: HashMap::new(),
            min_items,
        }
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&[Candidate]> {
        self.entries
            .get(fingerprint)
            .map(|entry| entry.candidates.as_slice())
    }

    pub fn entry(&self, fingerprint: &Fingerprint) -> Option<&CacheEntry> {
        self.entries.get(fingerprint)
    }

    /// Store a completed list if it is large enough; returns whether it was stored.
    pub fn put(&mut self, fingerprint: Fingerprint, candidates: Vec<Candidate>) -> bool {
        if candidates.len() < self.min_items {
            return false;
        }
        debug!(
            "Caching {} candidates for query {}",
            candidates.len(),
            fingerprint
        );
        let entry = CacheEntry {
            fingerprint: fingerprint.clone(),
            candidates,
            created_at: Utc::now(),
        };
        self.entries.insert(fingerprint, entry);
        true
    }

    pub fn invalidate_all(&mut self) {
        if !self.entries.is_empty() {
            debug!("Dropping {} cached listing(s)", self.entries.len());
        }
        self.entries.clear();
    }

    pub fn min_items(&self) -> usize {
        self.min_items
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
