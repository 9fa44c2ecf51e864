//! The picker: drives one query at a time from request to candidate list
//!
//! The first [`Picker::gather`] after [`Picker::start`] opens a session and
//! waits up to the configured timeout for data. While the listing is still
//! streaming, `gather` reports `is_async` and later calls only wait briefly,
//! so the host stays responsive and shows candidates as they arrive.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::assembler::{AssemblerEvent, Phase, Preamble, RecordAssembler};
use super::cache::ResultCache;
use super::error::PickerError;
use super::projector::{Candidate, CandidateProjector};
use super::query::{Fingerprint, Query};
use super::record::{RawRecord, Status};
use super::store::{self, StateStore, CURRENT_SONG_KEY, STATUS_KEY};
use super::template::{AbsoluteWidths, ViewportPercent, WidthResolver};
use crate::config::PickerConfig;
use crate::mpd::{Command, ConnectionSession};

/// Wait per poll once a listing is streaming
pub const ASYNC_POLL_BUDGET: Duration = Duration::from_millis(30);

/// Host state passed with every gather
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatherContext {
    /// Columns available for display; template sizes become percentages of it
    pub viewport_width: Option<usize>,
    /// Discard persisted state and cached listings before querying
    pub redraw: bool,
}

/// Candidates produced by one gather
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gathered {
    /// Only the candidates new since the previous gather
    pub candidates: Vec<Candidate>,
    /// More candidates are on the way
    pub is_async: bool,
}

/// An in-flight query
struct Gathering {
    query: Query,
    fingerprint: Fingerprint,
    session: ConnectionSession,
    assembler: RecordAssembler,
    projector: CandidateProjector,
    collected: Vec<Candidate>,
}

pub struct Picker {
    config: PickerConfig,
    cache: ResultCache,
    store: Option<Box<dyn StateStore>>,
    query: Option<Query>,
    gathering: Option<Gathering>,
}

impl Picker {
    pub fn new(config: PickerConfig) -> Self {
        let cache = ResultCache::new(config.min_cache_files);
        Self {
            config,
            cache,
            store: None,
            query: None,
            gathering: None,
        }
    }

    /// Share status and the playing song through `store`.
    pub fn with_store(mut self, store: Box<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &PickerConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    pub fn store(&self) -> Option<&dyn StateStore> {
        self.store.as_deref()
    }

    /// Whether a session is still streaming
    pub fn is_gathering(&self) -> bool {
        self.gathering.is_some()
    }

    /// Switch to `query`, abandoning any listing still in flight.
    pub fn start(&mut self, query: Query) {
        self.kill();
        debug!("Starting query {} [{}]", query, query.fingerprint());
        self.query = Some(query);
    }

    /// Tear down the active session, if any.
    pub fn kill(&mut self) {
        if let Some(mut gathering) = self.gathering.take() {
            debug!(
                "Abandoning query {} after {} candidate(s)",
                gathering.query,
                gathering.collected.len()
            );
            gathering.session.kill();
        }
    }

    pub async fn gather(&mut self, ctx: GatherContext) -> Result<Gathered, PickerError> {
        if let Some(gathering) = self.gathering.take() {
            return self
                .poll_gathering(gathering, ASYNC_POLL_BUDGET, ctx.viewport_width)
                .await;
        }

        let Some(query) = self.query.clone() else {
            return Err(PickerError::NoQuery);
        };
        let fingerprint = query.fingerprint();

        if ctx.redraw {
            self.forget_playback_state();
            self.cache.invalidate_all();
        } else if let Some(cached) = self.cache.get(&fingerprint) {
            debug!("Serving {} cached candidate(s) for {}", cached.len(), query);
            return Ok(Gathered {
                candidates: cached.to_vec(),
                is_async: false,
            });
        }

        let entity = query.entity();
        let status: Option<Status> = self.persisted(STATUS_KEY);
        let current_song: Option<RawRecord> = self.persisted(CURRENT_SONG_KEY);
        let projector = CandidateProjector::new(
            entity,
            self.config.template_for(entity),
            self.config.tags.clone(),
        );

        let preamble = Preamble {
            status: status.is_none(),
            current_song: current_song.is_none() && !entity.is_playlist(),
        };
        let mut commands = Vec::with_capacity(3);
        if preamble.status {
            commands.push(Command::status());
        }
        if preamble.current_song {
            commands.push(Command::current_song());
        }
        commands.push(query.listing_command(projector.template()));

        let timeout = self.config.timeout();
        let session =
            ConnectionSession::open(&self.config.host, self.config.port, &commands, timeout)
                .await
                .map_err(|e| PickerError::query(&query, e))?;
        info!(
            "Querying MPD {} at {}: {}",
            session.server_version(),
            session.addr(),
            query
        );

        let assembler = RecordAssembler::new(
            entity.separator_key(),
            preamble,
            status.unwrap_or_default(),
            current_song,
        );
        let gathering = Gathering {
            query,
            fingerprint,
            session,
            assembler,
            projector,
            collected: Vec::new(),
        };
        self.poll_gathering(gathering, timeout, ctx.viewport_width)
            .await
    }

    async fn poll_gathering(
        &mut self,
        mut gathering: Gathering,
        budget: Duration,
        viewport_width: Option<usize>,
    ) -> Result<Gathered, PickerError> {
        let poll = match gathering.session.poll(budget).await {
            Ok(poll) => poll,
            Err(e) => {
                gathering.session.kill();
                return Err(PickerError::query(&gathering.query, e));
            }
        };

        let percent;
        let widths: &dyn WidthResolver = match viewport_width {
            Some(viewport_width) => {
                percent = ViewportPercent { viewport_width };
                &percent
            }
            None => &AbsoluteWidths,
        };

        let mut candidates = self.absorb(&mut gathering, &poll.lines, widths);

        if !poll.end_of_stream {
            gathering.collected.extend(candidates.iter().cloned());
            self.gathering = Some(gathering);
            return Ok(Gathered {
                candidates,
                is_async: true,
            });
        }

        // A listing cut short by the daemon never reaches Done on its own
        let answered = gathering.assembler.phase() == Phase::Done;
        if let Some(AssemblerEvent::Record(record)) = gathering.assembler.finish() {
            candidates.push(gathering.projector.project(&record, widths));
        }
        gathering.collected.extend(candidates.iter().cloned());
        self.complete(gathering, answered);

        Ok(Gathered {
            candidates,
            is_async: false,
        })
    }

    /// Run polled lines through the assembler and project every finished record.
    fn absorb(
        &mut self,
        gathering: &mut Gathering,
        lines: &[String],
        widths: &dyn WidthResolver,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for line in lines {
            match gathering.assembler.push_line(line) {
                Some(AssemblerEvent::StatusReady) if !gathering.assembler.status().is_empty() => {
                    self.persist(STATUS_KEY, Some(gathering.assembler.status()));
                }
                Some(AssemblerEvent::StatusReady) => {
                    warn!("MPD sent an empty status; it will be requested again");
                }
                Some(AssemblerEvent::CurrentSongReady) => {
                    self.persist(CURRENT_SONG_KEY, gathering.assembler.current_song());
                }
                Some(AssemblerEvent::Record(record)) => {
                    candidates.push(gathering.projector.project(&record, widths));
                }
                None => {}
            }
        }
        candidates
    }

    fn complete(&mut self, mut gathering: Gathering, answered: bool) {
        gathering.session.kill();

        if !gathering.assembler.status().is_empty() {
            self.persist(STATUS_KEY, Some(gathering.assembler.status()));
        }
        if let Some(current) = gathering.assembler.current_song() {
            self.persist(CURRENT_SONG_KEY, Some(current));
        }

        info!(
            "Query {} complete: {} candidate(s)",
            gathering.query,
            gathering.collected.len()
        );
        if answered {
            self.cache.put(gathering.fingerprint, gathering.collected);
        }
    }

    pub(crate) fn persisted<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.store
            .as_deref()
            .and_then(|s| store::load(s, key))
    }

    pub(crate) fn persist<T: Serialize>(&mut self, key: &str, value: Option<&T>) {
        if let Some(s) = self.store.as_deref_mut() {
            store::save(s, key, value);
        }
    }

    /// Drop persisted status and playing song so the next query asks again.
    pub(crate) fn forget_playback_state(&mut self) {
        self.persist::<Status>(STATUS_KEY, None);
        self.persist::<RawRecord>(CURRENT_SONG_KEY, None);
    }
}

impl Drop for Picker {
    fn drop(&mut self) {
        self.kill();
    }
}
