use std::fmt;

/// Maximum number of VLC commands in flight at once.
///
/// **IMPORTANT:** This is hardcoded to 1. Every dispatch is a read-modify-write of
/// [`PlaybackState`] (the play/pause toggle and volume deltas read the last known
/// value), so two concurrent dispatches could interleave and leave the state behind
/// VLC's real status.
///
/// This constraint is enforced by [`crate::services::ActionDispatcher`] using a
/// `tokio::sync::Semaphore`.
pub const MAX_CONCURRENT_DISPATCHES: usize = 1;

/// Playback status as reported by VLC.
///
/// VLC itself knows more states (opening, buffering, ended, error). They are folded
/// into these three when the status is parsed, so nothing downstream ever sees an
/// intermediate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlaybackStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PlaybackStatus::Stopped => "Stopped",
            PlaybackStatus::Playing => "Playing",
            PlaybackStatus::Paused => "Paused",
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The "now playing" record.
///
/// # Thread Safety
///
/// `PlaybackState` is wrapped in `Arc<RwLock<PlaybackState>>` by
/// [`crate::state::StateManager`]. Only the
/// [`ActionDispatcher`](crate::services::ActionDispatcher) writes it; the renderer works
/// on snapshots (clones taken under the read lock).
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub track_name: Option<String>,
    /// Always within `0..=100`
    pub volume: u8,
    /// Fraction of the current track already played, `0.0..=1.0`
    pub position: Option<f32>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Stopped,
            track_name: None,
            volume: 50,
            position: None,
        }
    }
}

impl PlaybackState {
    /// Build a state, normalising the volume and position into their ranges.
    pub fn new(
        status: PlaybackStatus,
        track_name: Option<String>,
        volume: u8,
        position: Option<f32>,
    ) -> Self {
        let track_name = track_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        Self {
            status,
            track_name,
            volume: volume.min(100),
            position: position
                .filter(|p| p.is_finite())
                .map(|p| p.clamp(0.0, 1.0)),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    /// Track name for display, with a placeholder when nothing is loaded.
    pub fn display_title(&self) -> &str {
        self.track_name.as_deref().unwrap_or("No Track")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_stopped() {
        let state = PlaybackState::default();
        assert_eq!(state.status, PlaybackStatus::Stopped);
        assert_eq!(state.display_title(), "No Track");
        assert!(!state.is_playing());
    }

    #[test]
    fn test_new_normalises_fields() {
        let state = PlaybackState::new(
            PlaybackStatus::Playing,
            Some("   ".to_string()),
            250,
            Some(1.7),
        );

        assert_eq!(state.volume, 100);
        assert_eq!(state.position, Some(1.0));
        assert_eq!(state.track_name, None);

        let state = PlaybackState::new(PlaybackStatus::Paused, None, 10, Some(f32::NAN));
        assert_eq!(state.position, None);
    }
}
