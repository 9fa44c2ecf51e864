//! Acting on selected candidates: queueing songs and drilling down

use std::fmt;
use std::str::FromStr;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::PickerError;
use super::projector::Candidate;
use super::query::{EntityKind, Query};
use super::record::Status;
use super::source::Picker;
use super::store::STATUS_KEY;
use crate::mpd::command::{is_end_marker, ACK_PREFIX};
use crate::mpd::{Command, ConnectionSession};

/// Tag holding a playlist position; it identifies a queue slot, not songs
const POSITION_TAG: &str = "pos";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Append matching songs to the queue
    Add,
    /// Clear the queue, add matching songs and start from the top
    Replace,
    /// Add matching songs and start playing the first of them
    Play,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Replace => "replace",
            Self::Play => "play",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "add" => Ok(Self::Add),
            "replace" => Ok(Self::Replace),
            "play" => Ok(Self::Play),
            other => Err(format!("unknown action: {}", other)),
        }
    }
}

/// What the daemon made of an action's commands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Commands answered with `OK`
    pub acknowledged: usize,
    /// `ACK` lines for commands the daemon refused
    pub rejected: Vec<String>,
    /// Commands still unanswered when the timeout elapsed
    pub unanswered: usize,
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        self.rejected.is_empty() && self.unanswered == 0
    }
}

/// `findadd` matching the songs behind `candidate`, if it carries any tags
pub fn find_add_for(candidate: &Candidate) -> Option<Command> {
    let pairs: Vec<(&str, &str)> = candidate
        .tag_pairs()
        .filter(|(tag, _)| *tag != POSITION_TAG)
        .flat_map(|(tag, value)| value.values().into_iter().map(move |v| (tag, v)))
        .filter(|(_, value)| !value.is_empty())
        .collect();
    if pairs.is_empty() {
        return None;
    }
    Some(Command::find_add(pairs))
}

/// Commands carrying out `action` on `targets`.
///
/// `status` supplies the queue length so `play` can start at the first added
/// song. An empty list means no target could be addressed.
pub fn commands_for(action: Action, targets: &[Candidate], status: Option<&Status>) -> Vec<Command> {
    if action == Action::Play {
        if let [target] = targets {
            if let Some(position) = queue_position(target) {
                return vec![Command::play(Some(position))];
            }
        }
    }

    let finds: Vec<Command> = targets.iter().filter_map(find_add_for).collect();
    if finds.is_empty() {
        return Vec::new();
    }

    match action {
        Action::Add => finds,
        Action::Replace => {
            let mut commands = Vec::with_capacity(finds.len() + 2);
            commands.push(Command::clear());
            commands.extend(finds);
            commands.push(Command::play(Some(0)));
            commands
        }
        Action::Play => {
            let start = status.and_then(Status::playlist_length);
            let mut commands = finds;
            commands.push(Command::play(start));
            commands
        }
    }
}

fn queue_position(candidate: &Candidate) -> Option<u32> {
    if !candidate.entity.is_playlist() {
        return None;
    }
    candidate.tag(POSITION_TAG)?.first().parse().ok()
}

/// Query listing the next level below `candidate`, narrowed by everything
/// `parent` was already narrowed by.
pub fn browse_into(parent: &Query, candidate: &Candidate) -> Option<Query> {
    let entity = candidate.entity;
    let target: EntityKind = entity.browse_target()?;
    let value = candidate.tag(entity.as_str())?.first();
    if value.is_empty() {
        return None;
    }

    let mut filter_args = parent.filter_args().to_vec();
    filter_args.push(entity.as_str().to_string());
    filter_args.push(value.to_string());
    Some(Query::new(target, filter_args))
}

impl Picker {
    /// Apply `action` to `targets` over a dedicated connection.
    ///
    /// Waits until every command is answered or the configured timeout
    /// elapses. Playback state is forgotten afterwards since the queue or
    /// the playing song has likely changed.
    pub async fn run_action(
        &mut self,
        action: Action,
        targets: &[Candidate],
    ) -> Result<ActionOutcome, PickerError> {
        let status: Option<Status> = self.persisted(STATUS_KEY);
        let commands = commands_for(action, targets, status.as_ref());
        if commands.is_empty() {
            return Err(PickerError::NoTargets(action));
        }

        let budget = self.config().timeout();
        let deadline = Instant::now() + budget;
        let mut session =
            ConnectionSession::open(&self.config().host, self.config().port, &commands, budget)
                .await
                .map_err(|source| PickerError::Action { action, source })?;
        debug!("Sent {} command(s) for {}", commands.len(), action);

        let mut outcome = ActionOutcome::default();
        let result = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break Ok(());
            }
            let poll = match session.poll(remaining).await {
                Ok(poll) => poll,
                Err(source) => break Err(PickerError::Action { action, source }),
            };
            for line in poll.lines.iter().filter(|line| is_end_marker(line)) {
                if line.starts_with(ACK_PREFIX) {
                    warn!("MPD rejected part of {}: {}", action, line);
                    outcome.rejected.push(line.clone());
                } else {
                    outcome.acknowledged += 1;
                }
            }
            if poll.end_of_stream {
                break Ok(());
            }
        };
        session.kill();
        self.forget_playback_state();
        result?;

        outcome.unanswered = commands
            .len()
            .saturating_sub(outcome.acknowledged + outcome.rejected.len());
        if outcome.unanswered > 0 {
            warn!(
                "{} command(s) for {} unanswered after {:?}",
                outcome.unanswered, action, budget
            );
        }
        info!(
            "{} on {} target(s): {} ok, {} rejected",
            action,
            targets.len(),
            outcome.acknowledged,
            outcome.rejected.len()
        );
        Ok(outcome)
    }

    /// Start the query one level below `candidate`; returns it when there is one.
    pub fn browse_into(&mut self, candidate: &Candidate) -> Option<Query> {
        let parent = self.query()?;
        let next = browse_into(parent, candidate)?;
        self.start(next.clone());
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picker::projector::TAG_PREFIX;
    use crate::picker::record::FieldValue;
    use std::collections::BTreeMap;

    fn candidate(entity: EntityKind, tags: &[(&str, &str)]) -> Candidate {
        let mut map = BTreeMap::new();
        for (tag, value) in tags {
            map.insert(
                format!("{}{}", TAG_PREFIX, tag),
                FieldValue::Single(value.to_string()),
            );
        }
        Candidate {
            display_text: String::new(),
            tags: map,
            entity,
            is_current: false,
        }
    }

    fn lines(commands: &[Command]) -> Vec<&str> {
        commands.iter().map(Command::as_str).collect()
    }

    #[test]
    fn test_add_issues_one_findadd_per_target() {
        let targets = [
            candidate(EntityKind::Artist, &[("artist", "Bob")]),
            candidate(EntityKind::Artist, &[("artist", "Ann")]),
        ];
        assert_eq!(
            lines(&commands_for(Action::Add, &targets, None)),
            vec![r#"findadd "artist" "Bob""#, r#"findadd "artist" "Ann""#]
        );
    }

    #[test]
    fn test_findadd_skips_position_and_orders_tags() {
        let target = candidate(
            EntityKind::Album,
            &[("album", "A"), ("date", "1999"), ("albumartist", "X"), ("pos", "4")],
        );
        assert_eq!(
            find_add_for(&target).map(|c| c.to_string()),
            Some(r#"findadd "album" "A" "albumartist" "X" "date" "1999""#.to_string())
        );
    }

    #[test]
    fn test_findadd_repeats_multi_valued_tags() {
        let mut target = candidate(EntityKind::Genre, &[]);
        target.tags.insert(
            "meta__genre".to_string(),
            FieldValue::Multi(vec!["Rock".to_string(), "Pop".to_string()]),
        );
        assert_eq!(
            find_add_for(&target).map(|c| c.to_string()),
            Some(r#"findadd "genre" "Rock" "genre" "Pop""#.to_string())
        );
    }

    #[test]
    fn test_replace_clears_and_plays_from_top() {
        let targets = [candidate(EntityKind::Album, &[("album", "A")])];
        assert_eq!(
            lines(&commands_for(Action::Replace, &targets, None)),
            vec!["clear", r#"findadd "album" "A""#, "play 0"]
        );
    }

    #[test]
    fn test_play_starts_at_first_added_song() {
        let mut status = Status::new();
        status.insert("playlistlength", "12");
        let targets = [candidate(EntityKind::Title, &[("title", "Song")])];

        assert_eq!(
            lines(&commands_for(Action::Play, &targets, Some(&status))),
            vec![r#"findadd "title" "Song""#, "play 12"]
        );
        assert_eq!(
            lines(&commands_for(Action::Play, &targets, None)),
            vec![r#"findadd "title" "Song""#, "play"]
        );
    }

    #[test]
    fn test_play_queue_entry_jumps_to_position() {
        let targets = [candidate(
            EntityKind::Playlist,
            &[("title", "Song"), ("pos", "3")],
        )];
        assert_eq!(lines(&commands_for(Action::Play, &targets, None)), vec!["play 3"]);
    }

    #[test]
    fn test_untagged_targets_produce_nothing() {
        let targets = [candidate(EntityKind::Playlist, &[("pos", "3")])];
        assert!(commands_for(Action::Add, &targets, None).is_empty());
        assert!(commands_for(Action::Replace, &[], None).is_empty());
    }

    #[test]
    fn test_browse_into_inherits_parent_filters() {
        let parent = Query::new(EntityKind::Album, ["genre", "Rock"]);
        let target = candidate(EntityKind::Album, &[("album", "A"), ("date", "1999")]);

        let next = browse_into(&parent, &target).expect("albums browse into titles");
        assert_eq!(next.entity(), EntityKind::Title);
        assert_eq!(next.filter_args(), &["genre", "Rock", "album", "A"]);
    }

    #[test]
    fn test_browse_into_leaf_entities() {
        let parent = Query::new(EntityKind::Title, ["album", "A"]);
        let target = candidate(EntityKind::Title, &[("title", "Song")]);
        assert_eq!(browse_into(&parent, &target), None);

        let parent = Query::new(EntityKind::Artist, Vec::<String>::new());
        let untagged = candidate(EntityKind::Artist, &[]);
        assert_eq!(browse_into(&parent, &untagged), None);
    }

    #[test]
    fn test_action_parses_case_insensitively() {
        assert_eq!("Replace".parse::<Action>(), Ok(Action::Replace));
        assert!("shuffle".parse::<Action>().is_err());
    }
}
