//! Queries: what to browse and how it is identified

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::template::Template;
use crate::mpd::Command;

/// Grouping level being browsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Date,
    Genre,
    Artist,
    AlbumArtist,
    Album,
    Title,
    Playlist,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown entity kind: {0:?}")]
pub struct UnknownEntity(pub String);

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        Self::Date,
        Self::Genre,
        Self::Artist,
        Self::AlbumArtist,
        Self::Album,
        Self::Title,
        Self::Playlist,
    ];

    /// Protocol tag name (also the field name in records)
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Genre => "genre",
            Self::Artist => "artist",
            Self::AlbumArtist => "albumartist",
            Self::Album => "album",
            Self::Title => "title",
            Self::Playlist => "playlist",
        }
    }

    /// Field whose reappearance starts a new record
    pub fn separator_key(self) -> &'static str {
        match self {
            Self::Playlist => "file",
            other => other.as_str(),
        }
    }

    pub fn default_template(self) -> &'static str {
        match self {
            Self::Date => "{date}",
            Self::Genre => "{genre}",
            Self::Artist => "{artist}",
            Self::AlbumArtist | Self::Album => "{albumartist} - {album} ({date})",
            Self::Title => "{track} {artist} - {title}",
            Self::Playlist => {
                "{artist:19.19} {track:4.4} {title:25.25} {album:>20.20} {date:^4.4} {genre}"
            }
        }
    }

    /// Entity listed when browsing into an item of this kind
    pub fn browse_target(self) -> Option<EntityKind> {
        match self {
            Self::Date | Self::Genre | Self::Artist | Self::AlbumArtist => Some(Self::Album),
            Self::Album => Some(Self::Title),
            Self::Title | Self::Playlist => None,
        }
    }

    pub fn is_playlist(self) -> bool {
        self == Self::Playlist
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = UnknownEntity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lowered)
            .ok_or_else(|| UnknownEntity(s.to_string()))
    }
}

/// Stable cache key derived from a query
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Entity plus filter arguments, e.g. albums by one artist
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    entity: EntityKind,
    filter_args: Vec<String>,
}

impl Query {
    pub fn new<I, S>(entity: EntityKind, filter_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entity,
            filter_args: filter_args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn filter_args(&self) -> &[String] {
        &self.filter_args
    }

    /// SHA-256 over the entity and each argument, NUL separated (first 16 hex chars)
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(self.entity.as_str().as_bytes());
        for arg in &self.filter_args {
            hasher.update([0u8]);
            hasher.update(arg.as_bytes());
        }
        let digest = hasher.finalize();
        Fingerprint(hex::encode(&digest[..8]))
    }

    /// Request producing this query's records.
    ///
    /// Listings group by every template placeholder other than the entity
    /// itself so the projected text has its fields available.
    pub fn listing_command(&self, template: Option<&Template>) -> Command {
        if self.entity.is_playlist() {
            return Command::playlist_info();
        }
        let entity = self.entity.as_str();
        let groups: Vec<&str> = template
            .map(|t| t.placeholders().filter(|name| *name != entity).collect())
            .unwrap_or_default();
        Command::list(entity, &self.filter_args, groups)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entity.as_str())?;
        for arg in &self.filter_args {
            write!(f, " {:?}", arg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_round_trips_through_str() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>(), Ok(kind));
        }
        assert_eq!("AlbumArtist".parse::<EntityKind>(), Ok(EntityKind::AlbumArtist));
        assert_eq!(
            "composer".parse::<EntityKind>(),
            Err(UnknownEntity("composer".to_string()))
        );
    }

    #[test]
    fn test_separator_key_is_file_for_playlist() {
        assert_eq!(EntityKind::Playlist.separator_key(), "file");
        assert_eq!(EntityKind::Album.separator_key(), "album");
    }

    #[test]
    fn test_browse_targets() {
        assert_eq!(EntityKind::Genre.browse_target(), Some(EntityKind::Album));
        assert_eq!(EntityKind::Album.browse_target(), Some(EntityKind::Title));
        assert_eq!(EntityKind::Title.browse_target(), None);
        assert_eq!(EntityKind::Playlist.browse_target(), None);
    }

    #[test]
    fn test_fingerprint_is_stable_and_distinguishes_arguments() {
        let a = Query::new(EntityKind::Album, ["artist", "Bob"]);
        let b = Query::new(EntityKind::Album, ["artist", "Bob"]);
        let c = Query::new(EntityKind::Album, ["artist", "Ann"]);
        let d = Query::new(EntityKind::Album, ["artistBob"]);

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_ne!(a.fingerprint(), d.fingerprint());
        assert_eq!(a.fingerprint().as_str().len(), 16);
    }

    #[test]
    fn test_listing_command_for_artist_has_no_groups() {
        let query = Query::new(EntityKind::Artist, Vec::<String>::new());
        let template = Template::parse(EntityKind::Artist.default_template());
        assert_eq!(
            query.listing_command(Some(&template)).as_str(),
            r#"list "artist""#
        );
    }

    #[test]
    fn test_listing_command_groups_by_template_fields() {
        let query = Query::new(EntityKind::Title, ["album", "X"]);
        let template = Template::parse(EntityKind::Title.default_template());
        assert_eq!(
            query.listing_command(Some(&template)).as_str(),
            r#"list "title" "album" "X" group "track" group "artist""#
        );

        let albums = Query::new(EntityKind::Album, Vec::<String>::new());
        let template = Template::parse(EntityKind::Album.default_template());
        assert_eq!(
            albums.listing_command(Some(&template)).as_str(),
            r#"list "album" group "albumartist" group "date""#
        );
    }

    #[test]
    fn test_listing_command_for_playlist() {
        let query = Query::new(EntityKind::Playlist, Vec::<String>::new());
        assert_eq!(query.listing_command(None).as_str(), "playlistinfo");
    }

    #[test]
    fn test_display_includes_arguments() {
        let query = Query::new(EntityKind::Album, ["artist", "Bob"]);
        assert_eq!(query.to_string(), r#"album "artist" "Bob""#);
    }
}
