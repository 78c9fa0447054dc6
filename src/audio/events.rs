use serenity::{model::id::GuildId, prelude::TypeMapKey};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use super::{dispatcher::Dispatcher, track::Track};

/// Notification published on the process-wide [`EventBus`].
///
/// Start/end/queue-end carry the dispatcher itself so that listeners can act
/// on the session without going back to the registry.
#[derive(Debug, Clone)]
pub enum DispatcherEvent {
    TrackStart {
        guild_id: GuildId,
        track: Option<Track>,
        dispatcher: Arc<Dispatcher>,
    },
    TrackEnd {
        guild_id: GuildId,
        track: Option<Track>,
        /// Lavalink end reason: finished, loadFailed, stopped, replaced, cleanup.
        reason: String,
        dispatcher: Arc<Dispatcher>,
    },
    QueueEnd {
        guild_id: GuildId,
        track: Option<Track>,
        /// Lavalink end reason: finished, loadFailed, stopped, replaced, cleanup.
        reason: String,
        dispatcher: Arc<Dispatcher>,
    },
    TrackStuck {
        guild_id: GuildId,
        track: Option<Track>,
    },
    SocketClosed {
        guild_id: GuildId,
        code: u16,
        reason: String,
        by_remote: bool,
    },
    PlayerDestroy {
        guild_id: GuildId,
    },
}

impl DispatcherEvent {
    pub fn guild_id(&self) -> GuildId {
        match self {
            Self::TrackStart { guild_id, .. }
            | Self::TrackEnd { guild_id, .. }
            | Self::QueueEnd { guild_id, .. }
            | Self::TrackStuck { guild_id, .. }
            | Self::SocketClosed { guild_id, .. }
            | Self::PlayerDestroy { guild_id } => *guild_id,
        }
    }

    /// Channel name, matching the names presentation code listens for.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TrackStart { .. } => "trackStart",
            Self::TrackEnd { .. } => "trackEnd",
            Self::QueueEnd { .. } => "queueEnd",
            Self::TrackStuck { .. } => "trackStuck",
            Self::SocketClosed { .. } => "socketClosed",
            Self::PlayerDestroy { .. } => "playerDestroy",
        }
    }
}

/// Typed publish/subscribe bus shared by every session.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DispatcherEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publica un evento; sin suscriptores se descarta
    pub fn emit(&self, event: DispatcherEvent) {
        debug!("📣 {} (guild {})", event.name(), event.guild_id());
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatcherEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl TypeMapKey for EventBus {
    type Value = EventBus;
}
