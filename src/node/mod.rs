//! # Node Module
//!
//! Seams between the dispatcher and the outside world:
//!
//! - [`RemotePlayer`]: the per-guild player living on the audio node
//! - [`TrackResolver`]: the node's search/resolve endpoint
//! - [`VoiceConnector`]: leaving the Discord voice channel
//!
//! [`lavalink`] implements the first two against a Lavalink v4 node and
//! [`voice`] implements the last one on top of songbird.

pub mod lavalink;
pub mod voice;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serenity::model::id::GuildId;
use tokio::sync::broadcast;

#[cfg(test)]
use mockall::automock;

use crate::{audio::track::RawTrack, error::Result};

pub use lavalink::{LavalinkNode, LavalinkPlayer};

/// Lifecycle notification emitted by a remote player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Start,
    End { reason: String },
    Stuck { threshold_ms: u64 },
    Closed { code: u16, reason: String, by_remote: bool },
}

/// Player on the audio node that actually streams to the voice channel.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemotePlayer: Send + Sync {
    async fn play_track(&self, encoded: &str) -> Result<()>;

    async fn set_paused(&self, paused: bool) -> Result<()>;

    async fn stop_track(&self) -> Result<()>;

    async fn seek_to(&self, position_ms: u64) -> Result<()>;

    /// Last pause state acknowledged by the node.
    fn is_paused(&self) -> bool;

    fn volume(&self) -> u16;

    /// New receiver for this player's lifecycle events.
    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadType {
    Track,
    Playlist,
    Search,
    Empty,
    Error,
}

/// Body of a `loadtracks` response. `data` is left untyped: its shape
/// depends on `load_type` and may be missing altogether.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResult {
    pub load_type: LoadType,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl LoadResult {
    /// Tracks of a search result, or `None` when `data` is not a sequence of
    /// tracks. Entries that do not parse as tracks are skipped.
    pub fn search_tracks(&self) -> Option<Vec<RawTrack>> {
        let entries = self.data.as_ref()?.as_array()?;
        Some(
            entries
                .iter()
                .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                .collect(),
        )
    }
}

/// Search/resolve endpoint of the audio node.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, identifier: &str) -> Result<LoadResult>;
}

/// Voice-gateway side of a session.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn leave(&self, guild_id: GuildId) -> Result<()>;
}
