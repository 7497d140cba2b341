// pideck - Raspberry Pi LCD dashboard and VLC remote
//
// This is the library crate containing the core logic and data structures.
// The binary crate (main.rs) acquires the hardware and runs the main loop.

pub mod app;
pub mod config;
pub mod display;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use app::App;
pub use config::ConfigManager;
pub use error::PiDeckError;
pub use models::{Action, PlaybackState, PlaybackStatus, Settings};
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
