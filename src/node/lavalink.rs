use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

use super::{LoadResult, PlayerEvent, RemotePlayer, TrackResolver};
use crate::{
    config::Config,
    error::{Error, Result},
};

const PLAYER_EVENT_CAPACITY: usize = 32;

/// REST half of a Lavalink v4 node, shared by the node and its players.
#[derive(Clone)]
struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    password: String,
    session_id: Arc<RwLock<Option<String>>>,
}

impl RestClient {
    fn session_id(&self) -> Result<String> {
        self.session_id.read().clone().ok_or(Error::NoSession)
    }

    fn player_url(&self, guild_id: GuildId) -> Result<Url> {
        let session_id = self.session_id()?;
        let path = format!("v4/sessions/{}/players/{}", session_id, guild_id);
        Ok(self.base_url.join(&path)?)
    }

    async fn update_player(&self, guild_id: GuildId, body: serde_json::Value) -> Result<()> {
        let url = self.player_url(guild_id)?;
        debug!("PATCH {} {}", url, body);

        let response = self
            .http
            .patch(url)
            .header("Authorization", &self.password)
            .json(&body)
            .send()
            .await?;

        check_status(response).await.map(|_| ())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(Error::Node {
        status: status.as_u16(),
        message,
    })
}

/// Connection to one Lavalink v4 node.
///
/// Owns the REST client and one [`LavalinkPlayer`] per guild. The websocket
/// transport lives outside this crate; it hands every text frame it receives
/// to [`LavalinkNode::handle_message`].
pub struct LavalinkNode {
    rest: RestClient,
    players: DashMap<GuildId, Arc<LavalinkPlayer>>,
    default_volume: u16,
}

impl LavalinkNode {
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = Url::parse(&config.lavalink_url())?;
        info!("🎼 Configurando Lavalink en {}", base_url);

        Ok(Self {
            rest: RestClient {
                http: reqwest::Client::new(),
                base_url,
                password: config.lavalink_password.clone(),
                session_id: Arc::new(RwLock::new(None)),
            },
            players: DashMap::new(),
            default_volume: config.default_volume,
        })
    }

    /// Version string reported by the node; used as a health check.
    pub async fn version(&self) -> Result<String> {
        let url = self.rest.base_url.join("version")?;
        let response = self
            .rest
            .http
            .get(url)
            .header("Authorization", &self.rest.password)
            .send()
            .await?;

        Ok(check_status(response).await?.text().await?)
    }

    pub fn session_id(&self) -> Option<String> {
        self.rest.session_id.read().clone()
    }

    /// Obtiene (o crea) el player de un guild
    pub fn player(&self, guild_id: GuildId) -> Arc<LavalinkPlayer> {
        self.players
            .entry(guild_id)
            .or_insert_with(|| {
                Arc::new(LavalinkPlayer::new(
                    guild_id,
                    self.rest.clone(),
                    self.default_volume,
                ))
            })
            .clone()
    }

    /// Olvida el player de un guild (no lo destruye en el nodo)
    pub fn remove_player(&self, guild_id: GuildId) -> Option<Arc<LavalinkPlayer>> {
        self.players.remove(&guild_id).map(|(_, player)| player)
    }

    /// Decodes one websocket frame from the node and routes it.
    ///
    /// `ready` stores the session id; player events are re-emitted by the
    /// matching guild's player. Stats and unknown ops are ignored.
    pub fn handle_message(&self, frame: &str) -> Result<()> {
        match serde_json::from_str::<NodeMessage>(frame)? {
            NodeMessage::Ready {
                session_id,
                resumed,
            } => {
                info!("✅ Sesión Lavalink lista: {} (resumed: {})", session_id, resumed);
                *self.rest.session_id.write() = Some(session_id);
            }
            NodeMessage::PlayerUpdate { guild_id, state } => {
                if let Some(player) = parse_guild(&guild_id).and_then(|id| self.players.get(&id)) {
                    player.state.write().position = state.position;
                }
            }
            NodeMessage::Event { guild_id, event } => {
                let Some(player) = parse_guild(&guild_id).and_then(|id| self.players.get(&id).map(|p| p.clone())) else {
                    debug!("Evento para guild sin player: {}", guild_id);
                    return Ok(());
                };
                if let Some(event) = event.into_player_event() {
                    player.emit(event);
                }
            }
            NodeMessage::Other => {}
        }

        Ok(())
    }
}

#[async_trait]
impl TrackResolver for LavalinkNode {
    async fn resolve(&self, identifier: &str) -> Result<LoadResult> {
        let mut url = self.rest.base_url.join("v4/loadtracks")?;
        url.query_pairs_mut().append_pair("identifier", identifier);

        let response = self
            .rest
            .http
            .get(url)
            .header("Authorization", &self.rest.password)
            .send()
            .await?;

        let result: LoadResult = check_status(response).await?.json().await?;
        debug!("🔎 '{}' -> {:?}", identifier, result.load_type);
        Ok(result)
    }
}

#[derive(Debug, Clone, Copy)]
struct PlayerState {
    paused: bool,
    volume: u16,
    position: u64,
}

/// A guild's player on the Lavalink node.
pub struct LavalinkPlayer {
    guild_id: GuildId,
    rest: RestClient,
    state: RwLock<PlayerState>,
    events: broadcast::Sender<PlayerEvent>,
}

impl LavalinkPlayer {
    fn new(guild_id: GuildId, rest: RestClient, volume: u16) -> Self {
        let (events, _) = broadcast::channel(PLAYER_EVENT_CAPACITY);
        Self {
            guild_id,
            rest,
            state: RwLock::new(PlayerState {
                paused: false,
                volume,
                position: 0,
            }),
            events,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Last position reported by a `playerUpdate` frame, in milliseconds.
    pub fn position(&self) -> u64 {
        self.state.read().position
    }

    fn emit(&self, event: PlayerEvent) {
        // Sin suscriptores no es un error
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl RemotePlayer for LavalinkPlayer {
    async fn play_track(&self, encoded: &str) -> Result<()> {
        self.rest
            .update_player(
                self.guild_id,
                json!({ "track": { "encoded": encoded }, "volume": self.volume() }),
            )
            .await?;

        let mut state = self.state.write();
        state.paused = false;
        state.position = 0;
        Ok(())
    }

    async fn set_paused(&self, paused: bool) -> Result<()> {
        self.rest
            .update_player(self.guild_id, json!({ "paused": paused }))
            .await?;
        self.state.write().paused = paused;
        Ok(())
    }

    async fn stop_track(&self) -> Result<()> {
        self.rest
            .update_player(self.guild_id, json!({ "track": { "encoded": null } }))
            .await
    }

    async fn seek_to(&self, position_ms: u64) -> Result<()> {
        self.rest
            .update_player(self.guild_id, json!({ "position": position_ms }))
            .await?;
        self.state.write().position = position_ms;
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.state.read().paused
    }

    fn volume(&self) -> u16 {
        self.state.read().volume
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }
}

fn parse_guild(raw: &str) -> Option<GuildId> {
    raw.parse::<u64>().ok().filter(|id| *id != 0).map(GuildId::new)
}

/// Websocket frames sent by a Lavalink v4 node.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
enum NodeMessage {
    #[serde(rename_all = "camelCase")]
    Ready { session_id: String, resumed: bool },
    #[serde(rename_all = "camelCase")]
    PlayerUpdate { guild_id: String, state: PlayerUpdateState },
    #[serde(rename_all = "camelCase")]
    Event {
        guild_id: String,
        #[serde(flatten)]
        event: NodeEvent,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct PlayerUpdateState {
    #[serde(default)]
    position: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum NodeEvent {
    TrackStartEvent,
    TrackEndEvent {
        reason: String,
    },
    TrackExceptionEvent {
        exception: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    TrackStuckEvent {
        threshold_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    WebSocketClosedEvent {
        code: u16,
        reason: String,
        by_remote: bool,
    },
}

impl NodeEvent {
    fn into_player_event(self) -> Option<PlayerEvent> {
        match self {
            Self::TrackStartEvent => Some(PlayerEvent::Start),
            Self::TrackEndEvent { reason } => Some(PlayerEvent::End { reason }),
            Self::TrackStuckEvent { threshold_ms } => Some(PlayerEvent::Stuck { threshold_ms }),
            Self::WebSocketClosedEvent {
                code,
                reason,
                by_remote,
            } => Some(PlayerEvent::Closed {
                code,
                reason,
                by_remote,
            }),
            // Lavalink envía un TrackEndEvent (loadFailed) justo después
            Self::TrackExceptionEvent { exception } => {
                warn!("⚠️ Excepción de track en Lavalink: {}", exception);
                None
            }
        }
    }
}
