//! # Open Music Dispatcher
//!
//! Per-guild playback dispatcher for a Lavalink-backed Discord music bot.
//!
//! - [`audio`]: tracks, the session dispatcher, autoplay, the event bus and
//!   the session registry
//! - [`node`]: the audio node (Lavalink v4) and voice connection seams
//! - [`config`]: environment-driven configuration
//! - [`error`]: library error type

pub mod audio;
pub mod config;
pub mod error;
pub mod node;

pub use error::{Error, Result};
