use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::model::id::UserId;
use std::{fmt, time::Duration};

use crate::error::{Error, Result};

/// Metadata block of a track as the Lavalink node describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub identifier: String,
    pub is_seekable: bool,
    pub author: String,
    /// Duración en milisegundos
    pub length: u64,
    pub is_stream: bool,
    pub position: u64,
    pub title: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub isrc: Option<String>,
    pub source_name: String,
}

/// Track exactly as returned by `loadtracks`, before anyone requested it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTrack {
    pub encoded: String,
    pub info: TrackInfo,
    #[serde(default)]
    pub plugin_info: serde_json::Value,
}

/// User a track is queued on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub id: UserId,
    pub name: String,
}

impl Requester {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// The two shapes a track can arrive in when building a [`Track`].
#[derive(Debug, Clone)]
pub enum TrackInput {
    /// Straight from the node (search results, autoplay).
    Raw(RawTrack),
    /// Already bound to a requester; re-binding replaces it.
    Wrapped(Track),
}

impl From<RawTrack> for TrackInput {
    fn from(track: RawTrack) -> Self {
        Self::Raw(track)
    }
}

impl From<Track> for TrackInput {
    fn from(track: Track) -> Self {
        Self::Wrapped(track)
    }
}

/// A queued or playing track, bound to the user who asked for it.
///
/// Immutable once built. Two tracks are equal when their encoded payloads
/// are equal, which is what queue/history deduplication relies on.
#[derive(Debug, Clone)]
pub struct Track {
    encoded: String,
    info: TrackInfo,
    plugin_info: serde_json::Value,
    requester: Requester,
    added_at: DateTime<Utc>,
}

impl Track {
    /// Binds `source` to `requester`.
    ///
    /// Fails with [`Error::InvalidTrack`] when there is no source, or when the
    /// raw track carries no encoded payload (nothing the node could play).
    pub fn new(source: Option<TrackInput>, requester: Requester) -> Result<Self> {
        let (encoded, info, plugin_info) = match source.ok_or(Error::InvalidTrack)? {
            TrackInput::Raw(raw) => (raw.encoded, raw.info, raw.plugin_info),
            TrackInput::Wrapped(track) => (track.encoded, track.info, track.plugin_info),
        };

        if encoded.is_empty() {
            return Err(Error::InvalidTrack);
        }

        Ok(Self {
            encoded,
            info,
            plugin_info,
            requester,
            added_at: Utc::now(),
        })
    }

    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    pub fn info(&self) -> &TrackInfo {
        &self.info
    }

    pub fn plugin_info(&self) -> &serde_json::Value {
        &self.plugin_info
    }

    pub fn requester(&self) -> &Requester {
        &self.requester
    }

    pub fn title(&self) -> &str {
        &self.info.title
    }

    pub fn author(&self) -> &str {
        &self.info.author
    }

    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    /// Streams report a meaningless length, so they have no duration.
    pub fn duration(&self) -> Option<Duration> {
        if self.info.is_stream {
            None
        } else {
            Some(Duration::from_millis(self.info.length))
        }
    }

    /// Duración legible ("3m 25s"), o "LIVE" para streams.
    pub fn formatted_duration(&self) -> String {
        match self.duration() {
            // Redondear a segundos para no mostrar milisegundos
            Some(duration) => {
                humantime::format_duration(Duration::from_secs(duration.as_secs())).to_string()
            }
            None => "LIVE".to_string(),
        }
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

impl Eq for Track {}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.info.title, self.info.author)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn raw(encoded: &str, author: &str) -> RawTrack {
        RawTrack {
            encoded: encoded.to_string(),
            info: TrackInfo {
                identifier: format!("id-{encoded}"),
                is_seekable: true,
                author: author.to_string(),
                length: 205_000,
                is_stream: false,
                position: 0,
                title: format!("Song {encoded}"),
                uri: Some(format!("https://youtube.com/watch?v={encoded}")),
                artwork_url: None,
                isrc: None,
                source_name: "youtube".to_string(),
            },
            plugin_info: serde_json::Value::Null,
        }
    }

    pub(crate) fn user(id: u64) -> Requester {
        Requester::new(UserId::new(id), format!("user{id}"))
    }

    pub(crate) fn track(encoded: &str) -> Track {
        Track::new(Some(raw(encoded, "Artist").into()), user(1)).unwrap()
    }

    #[test]
    fn test_build_preserves_metadata_and_sets_requester() {
        let source = raw("abc", "Daft Punk");
        let track = Track::new(Some(source.clone().into()), user(42)).unwrap();

        assert_eq!(track.encoded(), "abc");
        assert_eq!(track.info(), &source.info);
        assert_eq!(track.requester(), &user(42));
    }

    #[test]
    fn test_rewrap_replaces_requester_only() {
        let first = Track::new(Some(raw("abc", "Daft Punk").into()), user(1)).unwrap();
        let second = Track::new(Some(first.clone().into()), user(2)).unwrap();

        assert_eq!(second.info(), first.info());
        assert_eq!(second.encoded(), first.encoded());
        assert_eq!(second.requester().id, UserId::new(2));
    }

    #[test]
    fn test_missing_source_is_rejected() {
        assert!(matches!(Track::new(None, user(1)), Err(Error::InvalidTrack)));
    }

    #[test]
    fn test_empty_payload_is_rejected() {
        let result = Track::new(Some(raw("", "Nobody").into()), user(1));
        assert!(matches!(result, Err(Error::InvalidTrack)));
    }

    #[test]
    fn test_equality_uses_encoded_payload() {
        let a = Track::new(Some(raw("same", "A").into()), user(1)).unwrap();
        let mut other = raw("same", "B");
        other.info.title = "Different".to_string();
        let b = Track::new(Some(other.into()), user(2)).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, track("different"));
    }

    #[test]
    fn test_stream_has_no_duration() {
        let mut source = raw("live", "Radio");
        source.info.is_stream = true;
        let track = Track::new(Some(source.into()), user(1)).unwrap();

        assert_eq!(track.duration(), None);
        assert_eq!(track.formatted_duration(), "LIVE");
    }

    #[test]
    fn test_formatted_duration() {
        assert_eq!(track("abc").formatted_duration(), "3m 25s");
    }

    #[test]
    fn test_deserialize_lavalink_track() {
        let json = serde_json::json!({
            "encoded": "QAAA...",
            "info": {
                "identifier": "dQw4w9WgXcQ",
                "isSeekable": true,
                "author": "Rick Astley",
                "length": 212000,
                "isStream": false,
                "position": 0,
                "title": "Never Gonna Give You Up",
                "uri": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
                "artworkUrl": null,
                "isrc": null,
                "sourceName": "youtube"
            },
            "pluginInfo": {}
        });

        let raw: RawTrack = serde_json::from_value(json).unwrap();
        assert_eq!(raw.info.author, "Rick Astley");
        assert_eq!(raw.info.length, 212_000);
        assert_eq!(raw.info.artwork_url, None);
    }
}
