//! Picker core: turns MPD listings into selectable, acted-upon candidates

pub mod actions;
pub mod assembler;
pub mod cache;
pub mod error;
pub mod projector;
pub mod query;
pub mod record;
pub mod source;
pub mod store;
pub mod template;

pub use actions::{browse_into, commands_for, Action, ActionOutcome};
pub use assembler::{AssembledRecord, AssemblerEvent, Phase, Preamble, RecordAssembler};
pub use cache::ResultCache;
pub use error::PickerError;
pub use projector::{Candidate, CandidateProjector, NOW_PLAYING_MARKER};
pub use query::{EntityKind, Fingerprint, Query};
pub use record::{FieldValue, RawRecord, Status};
pub use source::{GatherContext, Gathered, Picker, ASYNC_POLL_BUDGET};
pub use store::{MemoryStore, StateStore};
pub use template::{AbsoluteWidths, Template, ViewportPercent, WidthResolver};
