//! Services module - the appliance's behaviour, independent of the hardware drivers.
//!
//! # Components
//!
//! - [`InputDebouncer`]: filters raw button and touch edges into [`Action`](crate::models::Action)s
//! - [`TouchTracker`]: calibrates touch reports, hit-tests them against the screen
//!   [`Layout`](crate::display::Layout) and throttles the volume slider
//! - [`ActionDispatcher`]: serialises actions into single VLC calls and is the only
//!   writer of the playback state
//! - [`RcClient`]: VLC's RC interface over TCP, behind the [`VlcControl`] trait
//! - [`MetricsSampler`]: CPU, memory and disk utilisation per tick
//! - [`Renderer`]: pure frame composition plus change-only submission to the display
//!
//! # Data flow
//!
//! ```text
//! GPIO interrupts ─┐
//!                  ├─> raw events ─> InputDebouncer ─┐
//! touch reader ────┘                                 ├─> actions ─> ActionDispatcher ─> VLC
//!        └─ slider VolumeSet ────────────────────────┘                    │
//!                                                                          v
//! tick ─> MetricsSampler + StateManager::snapshot ─> Renderer ─> LCD   StateManager
//! ```
//!
//! Every async service takes a `watch::Receiver<bool>` and returns when it flips.

pub mod debounce;
pub mod dispatcher;
pub mod metrics;
pub mod renderer;
pub mod touch;
pub mod vlc;

pub use debounce::{InputDebouncer, InputDecodeError, Rejection};
pub use dispatcher::{ActionDispatcher, PlayerCommand};
pub use metrics::{MetricsSampler, SampleReadError, SysinfoProbe, SystemProbe};
pub use renderer::{RenderOutcome, Renderer};
pub use touch::{Calibration, TouchOutput, TouchReport, TouchTracker};
pub use vlc::{RcClient, VlcControl, VlcError};
