use parking_lot::{Mutex, RwLock};
use serenity::model::id::{ChannelId, GuildId, MessageId};
use std::{fmt, sync::Arc};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    events::{DispatcherEvent, EventBus},
    queue::{LoopMode, MusicQueue, QueueSnapshot},
    registry::SessionRegistry,
    track::{Requester, Track, TrackInput},
};
use crate::{
    error::Result,
    node::{PlayerEvent, RemotePlayer, TrackResolver, VoiceConnector},
};

/// Everything a [`Dispatcher`] needs from the code that opens the session.
pub struct DispatcherOptions {
    pub guild_id: GuildId,
    /// Canal de texto donde se anuncian las canciones
    pub channel_id: ChannelId,
    pub voice_channel_id: ChannelId,
    pub player: Arc<dyn RemotePlayer>,
    pub resolver: Arc<dyn TrackResolver>,
    pub voice: Arc<dyn VoiceConnector>,
    pub registry: Arc<SessionRegistry>,
    pub events: EventBus,
    /// Search prefix used by autoplay, e.g. `ytsearch`.
    pub search_engine: String,
    /// Autoplay picks are queued on behalf of this user (the bot itself).
    pub autoplay_requester: Requester,
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) queue: MusicQueue,
    pub(crate) current: Option<Track>,
    pub(crate) previous: Option<Track>,
    pub(crate) loop_mode: LoopMode,
    pub(crate) repeat: u32,
    pub(crate) autoplay: bool,
    pub(crate) paused: bool,
    pub(crate) stopped: bool,
    pub(crate) destroyed: bool,
    pub(crate) now_playing_message: Option<MessageId>,
}

/// Playback state and control for one guild's voice session.
///
/// Owns the queue, the history ring and the mode flags, and drives the
/// remote player. State lives behind a mutex that is never held across an
/// `.await`: every operation sees the state as of the moment it resumes.
///
/// The only teardown path is [`Dispatcher::destroy`].
pub struct Dispatcher {
    guild_id: GuildId,
    channel_id: ChannelId,
    voice_channel_id: ChannelId,
    player: RwLock<Option<Arc<dyn RemotePlayer>>>,
    pub(crate) resolver: Arc<dyn TrackResolver>,
    voice: Arc<dyn VoiceConnector>,
    registry: Arc<SessionRegistry>,
    pub(crate) events: EventBus,
    pub(crate) search_engine: String,
    pub(crate) autoplay_requester: Requester,
    pub(crate) state: Mutex<SessionState>,
    /// Cancelado por `destroy()`: corta el reenvío de eventos y el autoplay en curso
    pub(crate) cancel: CancellationToken,
}

impl Dispatcher {
    /// Creates the dispatcher and starts forwarding the player's lifecycle
    /// events onto the bus. Must be called from within a Tokio runtime.
    ///
    /// The caller is responsible for inserting it into the registry.
    pub fn new(options: DispatcherOptions) -> Arc<Self> {
        let player_events = options.player.subscribe();

        let dispatcher = Arc::new(Self {
            guild_id: options.guild_id,
            channel_id: options.channel_id,
            voice_channel_id: options.voice_channel_id,
            player: RwLock::new(Some(options.player)),
            resolver: options.resolver,
            voice: options.voice,
            registry: options.registry,
            events: options.events,
            search_engine: options.search_engine,
            autoplay_requester: options.autoplay_requester,
            state: Mutex::new(SessionState::default()),
            cancel: CancellationToken::new(),
        });

        tokio::spawn(forward_player_events(
            Arc::downgrade(&dispatcher),
            player_events,
            dispatcher.cancel.clone(),
        ));

        dispatcher
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn voice_channel_id(&self) -> ChannelId {
        self.voice_channel_id
    }

    /// True while this dispatcher is the registered session for its guild.
    pub fn exists(&self) -> bool {
        self.registry
            .get(self.guild_id)
            .is_some_and(|registered| std::ptr::eq(registered.as_ref(), self))
    }

    fn player(&self) -> Option<Arc<dyn RemotePlayer>> {
        self.player.read().clone()
    }

    /// Player to start tracks on, only while this session is registered.
    fn startable_player(&self) -> Option<Arc<dyn RemotePlayer>> {
        if !self.exists() {
            debug!("Sesión no registrada para guild {}, play ignorado", self.guild_id);
            return None;
        }
        self.player()
    }

    async fn start(&self, player: &Arc<dyn RemotePlayer>, track: Track) -> Result<()> {
        info!("🎵 Reproduciendo: {} en guild {}", track, self.guild_id);
        player.play_track(track.encoded()).await
    }

    /// Volume reported by the remote player, if one is still bound.
    pub fn volume(&self) -> Option<u16> {
        self.player().map(|player| player.volume())
    }

    pub fn current(&self) -> Option<Track> {
        self.state.lock().current.clone()
    }

    pub fn previous(&self) -> Option<Track> {
        self.state.lock().previous.clone()
    }

    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn queued(&self) -> Vec<Track> {
        self.state.lock().queue.iter().cloned().collect()
    }

    pub fn history(&self) -> Vec<Track> {
        self.state.lock().queue.history().cloned().collect()
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.state.lock().loop_mode
    }

    pub fn repeat(&self) -> u32 {
        self.state.lock().repeat
    }

    pub fn autoplay_enabled(&self) -> bool {
        self.state.lock().autoplay
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock();
        QueueSnapshot::capture(
            &state.queue,
            state.current.as_ref(),
            state.loop_mode,
            state.autoplay,
            state.paused,
        )
    }

    /// Binds `source` to `requester`; see [`Track::new`].
    pub fn build_track(&self, source: Option<TrackInput>, requester: Requester) -> Result<Track> {
        Track::new(source, requester)
    }

    /// Agrega un track al final de la cola
    pub fn enqueue(&self, track: Track) {
        self.state.lock().queue.push_back(track);
    }

    /// Agrega múltiples tracks (playlist)
    pub fn enqueue_many(&self, tracks: impl IntoIterator<Item = Track>) -> usize {
        let mut state = self.state.lock();
        let before = state.queue.len();
        for track in tracks {
            state.queue.push_back(track);
        }
        let added = state.queue.len() - before;
        info!("➕ Agregadas {} canciones a la cola de {}", added, self.guild_id);
        added
    }

    pub fn set_repeat(&self, repeat: u32) {
        self.state.lock().repeat = repeat;
    }

    pub fn set_now_playing_message(&self, message_id: MessageId) {
        self.state.lock().now_playing_message = Some(message_id);
    }

    pub fn take_now_playing_message(&self) -> Option<MessageId> {
        self.state.lock().now_playing_message.take()
    }

    /// Starts the next track.
    ///
    /// Pops the queue head into `current` (or replays `current` when the
    /// queue is empty), tells the player to start it and records it in the
    /// history. Does nothing when the session is no longer registered or
    /// there is nothing to play.
    pub async fn play(&self) -> Result<()> {
        let Some(player) = self.startable_player() else {
            return Ok(());
        };

        let next = next_to_play(&mut self.state.lock());
        match next {
            Some(track) => self.start(&player, track).await,
            None => Ok(()),
        }
    }

    /// Alterna pausa/reanudar.
    ///
    /// The local flag only flips once the node accepted the change.
    pub async fn pause(&self) -> Result<()> {
        let Some(player) = self.player() else {
            return Ok(());
        };

        let paused = !self.state.lock().paused;
        player.set_paused(paused).await?;
        self.state.lock().paused = paused;

        if paused {
            info!("⏸️ Reproducción pausada");
        } else {
            info!("▶️ Reproducción reanudada");
        }
        Ok(())
    }

    /// Elimina el track en `index`; fuera de rango no hace nada
    pub fn remove(&self, index: usize) -> Option<Track> {
        self.player()?;
        self.state.lock().queue.remove(index)
    }

    /// Vuelve a poner el track anterior al frente y corta el actual.
    pub async fn previous_track(&self) -> Result<()> {
        let Some(player) = self.player() else {
            return Ok(());
        };

        {
            let mut state = self.state.lock();
            let Some(previous) = state.previous.clone() else {
                return Ok(());
            };
            state.queue.push_front(previous);
        }

        info!("⏮️ Volviendo al track anterior");
        player.stop_track().await
    }

    pub fn set_shuffle(&self) {
        if self.player().is_none() {
            return;
        }
        self.state.lock().queue.shuffle();
    }

    /// Salta `count` tracks: descarta `count - 1` de la cola y corta el actual.
    ///
    /// A pending single repeat (`repeat == 1`) is consumed by the skip.
    pub async fn skip(&self, count: usize) -> Result<()> {
        let Some(player) = self.player() else {
            return Ok(());
        };

        {
            let mut state = self.state.lock();
            if count > 1 {
                if count > state.queue.len() {
                    state.queue.clear();
                } else {
                    state.queue.drop_front(count - 1);
                }
            }
            if state.repeat == 1 {
                state.repeat = 0;
            }
        }

        info!("⏭️ Saltando {} canción(es)", count.max(1));
        player.stop_track().await
    }

    /// Posición absoluta en milisegundos.
    pub async fn seek(&self, position_ms: u64) -> Result<()> {
        let Some(player) = self.player() else {
            return Ok(());
        };
        player.seek_to(position_ms).await
    }

    /// Vacía cola e historial, restablece los modos y corta la reproducción.
    ///
    /// Latches `stopped`, so the next [`destroy`](Self::destroy) stays quiet.
    pub async fn stop(&self) -> Result<()> {
        let Some(player) = self.player() else {
            return Ok(());
        };

        {
            let mut state = self.state.lock();
            state.queue.clear();
            state.queue.clear_history();
            state.loop_mode = LoopMode::Off;
            state.autoplay = false;
            state.repeat = 0;
            state.stopped = true;
        }

        info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
        player.stop_track().await
    }

    pub fn set_loop(&self, mode: LoopMode) {
        self.state.lock().loop_mode = mode;
        match mode {
            LoopMode::Off => info!("➡️ Repetición desactivada"),
            LoopMode::Repeat => info!("🔂 Repetir canción activado"),
            LoopMode::Queue => info!("🔁 Repetir cola activado"),
        }
    }

    /// Tears the session down.
    ///
    /// Clears queue and history, cancels any autoplay resolution in flight,
    /// releases the player, leaves the voice channel and unregisters. Emits
    /// `PlayerDestroy` unless `stop()` latched `stopped` (the latch is
    /// consumed). Later calls do nothing.
    pub async fn destroy(&self) -> Result<()> {
        let was_stopped = {
            let mut state = self.state.lock();
            if state.destroyed {
                return Ok(());
            }
            state.destroyed = true;
            state.queue.clear();
            state.queue.clear_history();
            std::mem::take(&mut state.stopped)
        };

        self.cancel.cancel();
        self.player.write().take();

        let left = self.voice.leave(self.guild_id).await;
        self.registry.remove_session(self);
        info!("🗑️ Sesión destruida en guild {}", self.guild_id);

        if !was_stopped {
            self.events.emit(DispatcherEvent::PlayerDestroy {
                guild_id: self.guild_id,
            });
        }

        left
    }

    /// Starts playback when tracks are waiting, nothing is loaded and the
    /// player is not paused.
    pub async fn resume_if_idle(&self) -> Result<()> {
        let Some(player) = self.startable_player() else {
            return Ok(());
        };

        let next = {
            let mut state = self.state.lock();
            let idle = !state.queue.is_empty() && state.current.is_none() && !player.is_paused();
            if idle {
                next_to_play(&mut state)
            } else {
                None
            }
        };

        match next {
            Some(track) => self.start(&player, track).await,
            None => Ok(()),
        }
    }

    /// Natural advance after a track ended: the finished track becomes
    /// `previous`, is re-queued according to `repeat` / the loop mode, and
    /// the next one starts.
    ///
    /// Retiring the finished track and picking the next one happen under one
    /// lock, so a concurrent `resume_if_idle` cannot start a track in between.
    pub async fn advance(&self) -> Result<()> {
        let player = self.startable_player();

        let next = {
            let mut state = self.state.lock();
            if let Some(finished) = state.current.take() {
                state.previous = Some(finished.clone());
                if state.repeat > 0 {
                    state.repeat -= 1;
                    state.queue.push_front(finished);
                } else {
                    match state.loop_mode {
                        LoopMode::Repeat => state.queue.push_front(finished),
                        LoopMode::Queue => state.queue.push_back(finished),
                        LoopMode::Off => {}
                    }
                }
            }
            player.as_ref().and_then(|_| next_to_play(&mut state))
        };

        match (player, next) {
            (Some(player), Some(track)) => self.start(&player, track).await,
            _ => Ok(()),
        }
    }

    /// Republishes a remote-player notification on the event bus.
    pub fn handle_player_event(self: &Arc<Self>, event: PlayerEvent) {
        let (track, queue_empty) = {
            let state = self.state.lock();
            (state.current.clone(), state.queue.is_empty())
        };
        let guild_id = self.guild_id;

        match event {
            PlayerEvent::Start => self.events.emit(DispatcherEvent::TrackStart {
                guild_id,
                track,
                dispatcher: Arc::clone(self),
            }),
            PlayerEvent::End { reason } => {
                if queue_empty {
                    self.events.emit(DispatcherEvent::QueueEnd {
                        guild_id,
                        track: track.clone(),
                        reason: reason.clone(),
                        dispatcher: Arc::clone(self),
                    });
                }
                self.events.emit(DispatcherEvent::TrackEnd {
                    guild_id,
                    track,
                    reason,
                    dispatcher: Arc::clone(self),
                });
            }
            PlayerEvent::Stuck { threshold_ms } => {
                warn!("⚠️ Track atascado ({} ms) en guild {}", threshold_ms, guild_id);
                self.events.emit(DispatcherEvent::TrackStuck { guild_id, track });
            }
            PlayerEvent::Closed {
                code,
                reason,
                by_remote,
            } => self.events.emit(DispatcherEvent::SocketClosed {
                guild_id,
                code,
                reason,
                by_remote,
            }),
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("guild_id", &self.guild_id)
            .field("channel_id", &self.channel_id)
            .field("voice_channel_id", &self.voice_channel_id)
            .finish_non_exhaustive()
    }
}

/// Moves the queue head into `current` (keeping `current` when the queue is
/// empty) and records it in the history. `None` when there is nothing to play.
fn next_to_play(state: &mut SessionState) -> Option<Track> {
    if let Some(next) = state.queue.pop_front() {
        state.current = Some(next);
    }
    let current = state.current.clone()?;
    state.queue.record_history(current.clone());
    Some(current)
}

async fn forward_player_events(
    dispatcher: std::sync::Weak<Dispatcher>,
    mut events: broadcast::Receiver<PlayerEvent>,
    cancel: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = events.recv() => received,
        };

        match received {
            Ok(event) => {
                let Some(dispatcher) = dispatcher.upgrade() else {
                    break;
                };
                dispatcher.handle_player_event(event);
            }
            Err(RecvError::Lagged(missed)) => {
                warn!("⚠️ Se perdieron {} eventos del player", missed);
            }
            Err(RecvError::Closed) => break,
        }
    }
}
