// Runtime counters module
//
// Provides lightweight counters for monitoring the input, dispatch and render paths

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Process-wide runtime counters
///
/// Uses atomic operations for thread-safe tracking without locks. Shared as
/// `Arc<Metrics>` between the input tasks, the dispatcher and the tick loop, logged
/// periodically and on shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// VLC commands that completed successfully
    pub actions_dispatched: AtomicU64,

    /// VLC commands or status polls that failed or timed out
    pub vlc_failures: AtomicU64,

    /// Raw edges turned into actions
    pub events_accepted: AtomicU64,

    /// Raw edges dropped by the debounce filter
    pub events_rejected: AtomicU64,

    /// Raw edges from sources without a binding
    pub events_undecodable: AtomicU64,

    /// Frames submitted to the display
    pub frames_drawn: AtomicU64,

    /// Frames identical to the previous one and not submitted
    pub frames_skipped: AtomicU64,

    /// Display writes that failed
    pub draw_errors: AtomicU64,

    /// Tick loop iterations
    pub ticks: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            actions_dispatched: AtomicU64::new(0),
            vlc_failures: AtomicU64::new(0),
            events_accepted: AtomicU64::new(0),
            events_rejected: AtomicU64::new(0),
            events_undecodable: AtomicU64::new(0),
            frames_drawn: AtomicU64::new(0),
            frames_skipped: AtomicU64::new(0),
            draw_errors: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_action_dispatched(&self) {
        self.actions_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_vlc_failure(&self) {
        self.vlc_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_accepted(&self) {
        self.events_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_rejected(&self) {
        self.events_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_undecodable(&self) {
        self.events_undecodable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_drawn(&self) {
        self.frames_drawn.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_skipped(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_draw_error(&self) {
        self.draw_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a tick and return the new total
    pub fn record_tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Share of debounced-away edges among all decodable edges
    pub fn rejection_ratio(&self) -> f64 {
        let accepted = self.events_accepted.load(Ordering::Relaxed);
        let rejected = self.events_rejected.load(Ordering::Relaxed);
        let total = accepted + rejected;
        if total > 0 {
            rejected as f64 / total as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        let uptime = self.uptime();
        tracing::info!("=== Runtime Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s, ticks: {}", uptime.as_secs_f64(), self.ticks.load(Ordering::Relaxed));
        tracing::info!(
            "Input: {} accepted, {} debounced ({:.0}%), {} undecodable",
            self.events_accepted.load(Ordering::Relaxed),
            self.events_rejected.load(Ordering::Relaxed),
            self.rejection_ratio() * 100.0,
            self.events_undecodable.load(Ordering::Relaxed)
        );
        tracing::info!(
            "VLC: {} actions dispatched, {} failures",
            self.actions_dispatched.load(Ordering::Relaxed),
            self.vlc_failures.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Display: {} frames drawn, {} skipped, {} errors",
            self.frames_drawn.load(Ordering::Relaxed),
            self.frames_skipped.load(Ordering::Relaxed),
            self.draw_errors.load(Ordering::Relaxed)
        );
    }

    pub fn log_periodic(&self) {
        tracing::info!(
            "Metrics: {} actions, {} VLC failures, {} frames drawn, {} skipped, uptime {:.0}s",
            self.actions_dispatched.load(Ordering::Relaxed),
            self.vlc_failures.load(Ordering::Relaxed),
            self.frames_drawn.load(Ordering::Relaxed),
            self.frames_skipped.load(Ordering::Relaxed),
            self.uptime().as_secs_f64()
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
