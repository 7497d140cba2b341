//! Data models for pideck.
//!
//! This module contains the core data structures used throughout the application:
//! - [`Settings`]: The static configuration loaded from `config.yaml`
//! - [`PlaybackState`]: The "now playing" record mirrored from VLC
//! - [`Action`]: A debounced user intent consumed by the dispatcher
//! - [`RawInputEvent`]: An undebounced edge from a GPIO pin or a touch region
//! - [`MetricsSample`]: One tick worth of CPU, memory and disk utilisation
//! - [`MAX_CONCURRENT_DISPATCHES`]: Concurrency limit for VLC commands (always 1)
//!
//! # Architecture Note
//!
//! The models are designed to be:
//! - **Serializable**: Config structs derive `Serialize`/`Deserialize` for YAML persistence
//! - **Cloneable**: PlaybackState is wrapped in `Arc<RwLock<>>` by [`StateManager`](crate::state::StateManager),
//!   readers only ever see clones
//! - **Ephemeral**: Actions and raw events are values passed through channels, never stored

pub mod action;
pub mod input;
pub mod playback;
pub mod sample;
pub mod settings;

pub use action::{Action, clamp_volume};
pub use input::{Edge, InputSource, RawInputEvent, TouchRegion};
pub use playback::{MAX_CONCURRENT_DISPATCHES, PlaybackState, PlaybackStatus};
pub use sample::MetricsSample;
pub use settings::{
    ButtonAction, DisplayInfo, GpioConfig, LoggingConfig, RawRange, ScreenConfig,
    ScreenGeometry, Settings, SystemConfig, TouchConfig, VlcConfig,
};
