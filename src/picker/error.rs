use thiserror::Error;

use super::actions::Action;
use super::query::{Fingerprint, Query};
use crate::mpd::MpdError;

/// Failures surfaced to the picker host
#[derive(Debug, Error)]
pub enum PickerError {
    #[error("query {query} [{fingerprint}] failed: {source}")]
    Query {
        fingerprint: Fingerprint,
        query: String,
        #[source]
        source: MpdError,
    },
    #[error("no query has been started")]
    NoQuery,
    #[error("{action} failed: {source}")]
    Action {
        action: Action,
        #[source]
        source: MpdError,
    },
    #[error("nothing to {0}: no candidate carries addressable tags")]
    NoTargets(Action),
}

impl PickerError {
    pub(crate) fn query(query: &Query, source: MpdError) -> Self {
        Self::Query {
            fingerprint: query.fingerprint(),
            query: query.to_string(),
            source,
        }
    }

    /// Whether the daemon could not be reached at all.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Query { source, .. } | Self::Action { source, .. } => {
                source.is_connection_error()
            }
            Self::NoQuery | Self::NoTargets(_) => false,
        }
    }
}
