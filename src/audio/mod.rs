//! # Audio Module
//!
//! Playback control for every guild the bot is connected to.
//!
//! ## Architecture
//!
//! ### [`dispatcher`] - Session Dispatcher
//! - One [`Dispatcher`] per guild voice session
//! - Queue, history, loop/repeat modes and pause state
//! - Drives the remote player on the audio node
//!
//! ### [`autoplay`] - Autoplay
//! - Extends the queue with a track by the same author once it runs dry
//! - Never picks something already queued or recently played
//!
//! ### [`queue`] - Queue Management
//! - FIFO queue with a bounded history ring
//! - Unbiased shuffle, paged snapshots for presentation
//!
//! ### [`events`] / [`lifecycle`] - Event Flow
//! - Player notifications are republished on a typed [`EventBus`]
//! - The lifecycle listener advances sessions on `trackEnd` and continues
//!   with autoplay on `queueEnd`
//!
//! ### [`registry`] - Sessions
//! - Process-wide guild → dispatcher map
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use open_music_dispatcher::audio::{
//!     lifecycle::spawn_lifecycle_listener, EventBus, SessionRegistry,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let registry = Arc::new(SessionRegistry::new());
//! let events = EventBus::new(256);
//! let _listener = spawn_lifecycle_listener(&events, Arc::clone(&registry));
//! # }
//! ```

pub mod autoplay;
pub mod dispatcher;
pub mod events;
pub mod lifecycle;
pub mod queue;
pub mod registry;
pub mod track;

pub use autoplay::AutoplayOutcome;
pub use dispatcher::{Dispatcher, DispatcherOptions};
pub use events::{DispatcherEvent, EventBus};
pub use queue::{LoopMode, MusicQueue, QueuePage, QueueSnapshot};
pub use registry::SessionRegistry;
pub use track::{RawTrack, Requester, Track, TrackInput};
