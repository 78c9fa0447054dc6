use rand::seq::SliceRandom;
use std::{collections::VecDeque, fmt, str::FromStr, time::Duration};
use tracing::{debug, info};

use super::track::Track;
use crate::error::Error;

/// Maximum number of tracks kept in a session's history.
pub const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Off,
    /// Repite el track actual
    Repeat,
    /// Vuelve a encolar cada track al terminar
    Queue,
}

impl FromStr for LoopMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Self::Off),
            "repeat" => Ok(Self::Repeat),
            "queue" => Ok(Self::Queue),
            other => Err(Error::InvalidLoopMode(other.to_string())),
        }
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Off => "off",
            Self::Repeat => "repeat",
            Self::Queue => "queue",
        };
        f.write_str(name)
    }
}

/// FIFO of upcoming tracks plus the bounded history of started ones.
#[derive(Debug, Default)]
pub struct MusicQueue {
    items: VecDeque<Track>,
    history: VecDeque<Track>,
}

impl MusicQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega un track al final de la cola
    pub fn push_back(&mut self, track: Track) {
        debug!("➕ Agregado a la cola: {}", track);
        self.items.push_back(track);
    }

    /// Agrega un track al principio de la cola
    pub fn push_front(&mut self, track: Track) {
        debug!("⏮️ Agregado al inicio de la cola: {}", track);
        self.items.push_front(track);
    }

    /// Obtiene el siguiente track (FIFO - First In, First Out)
    pub fn pop_front(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    pub fn front(&self) -> Option<&Track> {
        self.items.front()
    }

    /// Elimina un track específico, conservando el orden del resto
    pub fn remove(&mut self, index: usize) -> Option<Track> {
        let removed = self.items.remove(index);
        if removed.is_some() {
            debug!("❌ Track eliminado en posición {}", index);
        }
        removed
    }

    /// Descarta `amount` tracks del inicio; vacía la cola si no alcanzan
    pub fn drop_front(&mut self, amount: usize) -> usize {
        let dropped = amount.min(self.items.len());
        self.items.drain(..dropped);
        dropped
    }

    /// Limpia la cola
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Mezcla la cola (Fisher-Yates, todas las permutaciones equiprobables)
    pub fn shuffle(&mut self) {
        let mut rng = rand::thread_rng();
        self.items.make_contiguous().shuffle(&mut rng);
        info!("🔀 Cola mezclada");
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }

    /// Registra un track iniciado; descarta el más antiguo pasado el límite
    pub fn record_history(&mut self, track: Track) {
        self.history.push_back(track);
        if self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &Track> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// True if a track with this payload is queued or was already played.
    pub fn has_seen(&self, encoded: &str) -> bool {
        self.items.iter().any(|t| t.encoded() == encoded)
            || self.history.iter().any(|t| t.encoded() == encoded)
    }

    fn total_duration(&self) -> Duration {
        self.items.iter().filter_map(Track::duration).sum()
    }
}

/// Point-in-time copy of a session's queue, for presentation layers.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub current: Option<Track>,
    pub items: Vec<Track>,
    pub loop_mode: LoopMode,
    pub autoplay: bool,
    pub paused: bool,
    pub total_duration: Duration,
}

impl QueueSnapshot {
    pub(crate) fn capture(
        queue: &MusicQueue,
        current: Option<&Track>,
        loop_mode: LoopMode,
        autoplay: bool,
        paused: bool,
    ) -> Self {
        let current_duration = current.and_then(Track::duration).unwrap_or_default();
        Self {
            current: current.cloned(),
            items: queue.iter().cloned().collect(),
            loop_mode,
            autoplay,
            paused,
            total_duration: queue.total_duration() + current_duration,
        }
    }

    /// Obtiene una página específica de la cola (1-based)
    pub fn get_page(&self, page: usize, items_per_page: usize) -> QueuePage {
        let items_per_page = items_per_page.max(1);
        let safe_page = page.max(1);
        let start = (safe_page - 1) * items_per_page;
        let end = (start + items_per_page).min(self.items.len());
        let total_pages = if self.items.is_empty() {
            1
        } else {
            self.items.len().div_ceil(items_per_page)
        };

        QueuePage {
            items: if start < self.items.len() {
                self.items[start..end].to_vec()
            } else {
                Vec::new()
            },
            current_page: safe_page,
            total_pages,
            total_items: self.items.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<Track>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::tests::track;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn queue_of(ids: &[&str]) -> MusicQueue {
        let mut queue = MusicQueue::new();
        for id in ids {
            queue.push_back(track(id));
        }
        queue
    }

    fn ids(queue: &MusicQueue) -> Vec<String> {
        queue.iter().map(|t| t.encoded().to_string()).collect()
    }

    #[test]
    fn test_loop_mode_parsing() {
        assert_eq!("off".parse::<LoopMode>().unwrap(), LoopMode::Off);
        assert_eq!("repeat".parse::<LoopMode>().unwrap(), LoopMode::Repeat);
        assert_eq!("queue".parse::<LoopMode>().unwrap(), LoopMode::Queue);
        assert!(matches!(
            "track".parse::<LoopMode>(),
            Err(Error::InvalidLoopMode(mode)) if mode == "track"
        ));
        assert_eq!(LoopMode::Repeat.to_string(), "repeat");
    }

    #[test]
    fn test_history_is_bounded() {
        let mut queue = MusicQueue::new();
        for i in 0..=HISTORY_LIMIT {
            queue.record_history(track(&format!("t{i}")));
        }

        assert_eq!(queue.history_len(), HISTORY_LIMIT);
        // El primero fue descartado, el orden se mantiene
        assert_eq!(queue.history().next().unwrap().encoded(), "t1");
        assert_eq!(
            queue.history().last().unwrap().encoded(),
            format!("t{HISTORY_LIMIT}")
        );
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut queue = queue_of(&["a", "b", "c", "d"]);
        assert_eq!(queue.remove(1).unwrap().encoded(), "b");
        assert_eq!(ids(&queue), vec!["a", "c", "d"]);
        assert!(queue.remove(3).is_none());
        assert_eq!(ids(&queue), vec!["a", "c", "d"]);
    }

    #[test]
    fn test_drop_front() {
        let mut queue = queue_of(&["a", "b", "c", "d", "e"]);
        assert_eq!(queue.drop_front(2), 2);
        assert_eq!(ids(&queue), vec!["c", "d", "e"]);
        assert_eq!(queue.drop_front(10), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_has_seen_checks_queue_and_history() {
        let mut queue = queue_of(&["a"]);
        queue.record_history(track("h"));

        assert!(queue.has_seen("a"));
        assert!(queue.has_seen("h"));
        assert!(!queue.has_seen("z"));
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let mut queue = queue_of(&["a", "b", "c", "d", "e", "f"]);
        queue.shuffle();

        let mut shuffled = ids(&queue);
        shuffled.sort();
        assert_eq!(shuffled, vec!["a", "b", "c", "d", "e", "f"]);
    }

    #[test]
    fn test_shuffle_is_roughly_uniform() {
        const TRIALS: usize = 6000;
        let mut counts: HashMap<(usize, String), usize> = HashMap::new();

        for _ in 0..TRIALS {
            let mut queue = queue_of(&["a", "b", "c"]);
            queue.shuffle();
            for (position, id) in ids(&queue).into_iter().enumerate() {
                *counts.entry((position, id)).or_default() += 1;
            }
        }

        // 2000 esperados por celda; el margen cubre de sobra la varianza
        assert_eq!(counts.len(), 9);
        for (cell, count) in counts {
            assert!((1700..=2300).contains(&count), "{cell:?} appeared {count} times");
        }
    }

    #[test]
    fn test_snapshot_pages() {
        let queue = queue_of(&["a", "b", "c", "d", "e"]);
        let current = track("now");
        let snapshot = QueueSnapshot::capture(&queue, Some(&current), LoopMode::Off, false, false);

        assert_eq!(snapshot.total_duration, Duration::from_millis(205_000 * 6));

        let page = snapshot.get_page(2, 2);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_items, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].encoded(), "c");

        assert!(snapshot.get_page(9, 2).items.is_empty());
        assert_eq!(snapshot.get_page(0, 2).current_page, 1);
    }
}
