use dashmap::DashMap;
use serenity::{model::id::GuildId, prelude::TypeMapKey};
use std::sync::Arc;
use tracing::info;

use super::dispatcher::Dispatcher;

/// Active sessions, one dispatcher per guild.
///
/// Filled by whoever bootstraps voice sessions; a dispatcher only ever
/// checks its own membership and removes itself on `destroy()`.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<Dispatcher>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra una sesión, devolviendo la anterior si existía
    pub fn insert(&self, dispatcher: Arc<Dispatcher>) -> Option<Arc<Dispatcher>> {
        let guild_id = dispatcher.guild_id();
        info!("🎧 Sesión registrada para guild {}", guild_id);
        self.sessions.insert(guild_id, dispatcher)
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Dispatcher>> {
        self.sessions.get(&guild_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, guild_id: GuildId) -> bool {
        self.sessions.contains_key(&guild_id)
    }

    pub fn remove(&self, guild_id: GuildId) -> Option<Arc<Dispatcher>> {
        self.sessions.remove(&guild_id).map(|(_, dispatcher)| dispatcher)
    }

    /// Unregisters `dispatcher`, leaving a newer session for the same guild alone.
    pub fn remove_session(&self, dispatcher: &Dispatcher) -> bool {
        self.sessions
            .remove_if(&dispatcher.guild_id(), |_, registered| {
                std::ptr::eq(registered.as_ref(), dispatcher)
            })
            .is_some()
    }

    pub fn guild_ids(&self) -> Vec<GuildId> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl TypeMapKey for SessionRegistry {
    type Value = Arc<SessionRegistry>;
}
