use rand::Rng;
use tracing::{debug, info, warn};

use super::{
    dispatcher::Dispatcher,
    track::{RawTrack, Track},
};
use crate::error::Result;

/// Random draws allowed to find a candidate that is neither queued nor in
/// the history.
pub const AUTOPLAY_MAX_ATTEMPTS: usize = 10;

/// What one autoplay resolution did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum AutoplayOutcome {
    /// A fresh track was appended to the queue.
    Enqueued(Track),
    /// The node returned nothing usable; the session was torn down.
    NoResults,
    /// Every draw hit a duplicate; the session was torn down.
    Exhausted,
    /// The session was destroyed while resolving; nothing was touched.
    Cancelled,
}

impl Dispatcher {
    /// Turns autoplay on or off. Turning it on resolves a related track right
    /// away, seeded by the current track or else the queue head.
    pub async fn set_autoplay(&self, enabled: bool) -> Result<Option<AutoplayOutcome>> {
        let seed = {
            let mut state = self.state.lock();
            state.autoplay = enabled;
            if !enabled {
                info!("➡️ Autoplay desactivado");
                return Ok(None);
            }
            state.current.clone().or_else(|| state.queue.front().cloned())
        };

        info!("📻 Autoplay activado");
        match seed {
            Some(seed) => self.autoplay(&seed).await.map(Some),
            None => {
                debug!("Autoplay sin semilla en guild {}, nada que buscar", self.guild_id());
                Ok(None)
            }
        }
    }

    /// Extends the queue with a track related to `seed` (same author).
    ///
    /// On success playback is (re)started if the session is idle. An empty or
    /// malformed answer from the node, or running out of attempts, destroys
    /// the session.
    pub async fn autoplay(&self, seed: &Track) -> Result<AutoplayOutcome> {
        let outcome = self.resolve_autoplay(seed).await;

        match &outcome {
            AutoplayOutcome::Enqueued(track) => {
                info!("📻 Autoplay agregó: {}", track);
                self.resume_if_idle().await?;
            }
            AutoplayOutcome::NoResults | AutoplayOutcome::Exhausted => {
                warn!("📭 Autoplay sin candidatos para '{}', cerrando sesión", seed.author());
                self.destroy().await?;
            }
            AutoplayOutcome::Cancelled => {
                debug!("Autoplay cancelado en guild {}", self.guild_id());
            }
        }

        Ok(outcome)
    }

    async fn resolve_autoplay(&self, seed: &Track) -> AutoplayOutcome {
        if self.cancel.is_cancelled() {
            return AutoplayOutcome::Cancelled;
        }

        let query = format!("{}:{}", self.search_engine, seed.author());
        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return AutoplayOutcome::Cancelled,
            response = self.resolver.resolve(&query) => response,
        };

        let candidates = match response {
            Ok(result) => match result.search_tracks() {
                Some(tracks) if !tracks.is_empty() => tracks,
                _ => {
                    debug!("Respuesta vacía o inválida para '{}': {:?}", query, result.load_type);
                    return AutoplayOutcome::NoResults;
                }
            },
            Err(e) => {
                warn!("❌ Error al buscar '{}': {}", query, e);
                return AutoplayOutcome::NoResults;
            }
        };

        self.pick_candidate(&candidates)
    }

    fn pick_candidate(&self, candidates: &[RawTrack]) -> AutoplayOutcome {
        let mut rng = rand::thread_rng();
        self.pick_candidate_with(candidates, |len| rng.gen_range(0..len))
    }

    /// Draws up to [`AUTOPLAY_MAX_ATTEMPTS`] indices with `draw(len)` and
    /// queues the first candidate that is neither queued nor in the history.
    fn pick_candidate_with(
        &self,
        candidates: &[RawTrack],
        mut draw: impl FnMut(usize) -> usize,
    ) -> AutoplayOutcome {
        let mut state = self.state.lock();
        if state.destroyed {
            return AutoplayOutcome::Cancelled;
        }
        if candidates.is_empty() {
            return AutoplayOutcome::Exhausted;
        }

        for attempt in 1..=AUTOPLAY_MAX_ATTEMPTS {
            let Some(candidate) = candidates.get(draw(candidates.len())) else {
                continue;
            };
            if state.queue.has_seen(&candidate.encoded) {
                debug!("Intento {}: '{}' repetido", attempt, candidate.info.title);
                continue;
            }

            match Track::new(Some(candidate.clone().into()), self.autoplay_requester.clone()) {
                Ok(track) => {
                    state.queue.push_back(track.clone());
                    return AutoplayOutcome::Enqueued(track);
                }
                Err(e) => debug!("Intento {}: candidato descartado ({})", attempt, e),
            }
        }

        AutoplayOutcome::Exhausted
    }
}
