use std::sync::Arc;
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{debug, error, info, warn};

use super::{
    events::{DispatcherEvent, EventBus},
    queue::LoopMode,
    registry::SessionRegistry,
};

/// Reasons after which the session should move on to the next track.
/// `replaced` means a new track already started; `cleanup` means the node
/// dropped the player.
fn should_advance(reason: &str) -> bool {
    !matches!(reason, "replaced" | "cleanup")
}

/// Subscribes to the bus and keeps every session moving: advances on
/// `trackEnd`, continues with autoplay on `queueEnd`, skips stuck tracks.
pub fn spawn_lifecycle_listener(events: &EventBus, registry: Arc<SessionRegistry>) -> JoinHandle<()> {
    let mut rx = events.subscribe();

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => handle_event(event, &registry).await,
                Err(RecvError::Lagged(missed)) => {
                    warn!("⚠️ Listener atrasado, {} eventos perdidos", missed);
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Listener de ciclo de vida terminado");
    })
}

async fn handle_event(event: DispatcherEvent, registry: &SessionRegistry) {
    match event {
        DispatcherEvent::TrackStart {
            guild_id, track, ..
        } => {
            if let Some(track) = track {
                info!("▶️ Reproduciendo: {} en guild {}", track, guild_id);
            }
        }
        DispatcherEvent::TrackEnd {
            reason, dispatcher, ..
        } => {
            if !should_advance(&reason) {
                return;
            }
            if let Err(e) = dispatcher.advance().await {
                error!("Error al reproducir siguiente track: {:?}", e);
            }
        }
        DispatcherEvent::QueueEnd {
            guild_id,
            track,
            reason,
            dispatcher,
        } => {
            let continue_with_autoplay = should_advance(&reason)
                && dispatcher.autoplay_enabled()
                && dispatcher.loop_mode() == LoopMode::Off;

            match track {
                Some(seed) if continue_with_autoplay => {
                    // La búsqueda no debe frenar los eventos de otros guilds
                    tokio::spawn(async move {
                        if let Err(e) = dispatcher.autoplay(&seed).await {
                            error!("Error en autoplay: {:?}", e);
                        }
                    });
                }
                _ => info!("📭 Cola terminada en guild {}", guild_id),
            }
        }
        DispatcherEvent::TrackStuck { guild_id, track } => {
            warn!(
                "⚠️ Track atascado en guild {}: {}",
                guild_id,
                track.map(|t| t.to_string()).unwrap_or_default()
            );
            if let Some(dispatcher) = registry.get(guild_id) {
                if let Err(e) = dispatcher.skip(1).await {
                    error!("Error al saltar track atascado: {:?}", e);
                }
            }
        }
        DispatcherEvent::SocketClosed {
            guild_id,
            code,
            reason,
            by_remote,
        } => {
            warn!(
                "🔌 Conexión de voz cerrada en guild {} (code {}, remoto: {}): {}",
                guild_id, code, by_remote, reason
            );
        }
        DispatcherEvent::PlayerDestroy { guild_id } => {
            info!("🗑️ Player destruido en guild {}", guild_id);
        }
    }
}
