/// A debounced user intent.
///
/// Actions are constructed by the input layer (buttons, touch regions, the volume
/// slider) and consumed immediately by the
/// [`ActionDispatcher`](crate::services::ActionDispatcher). They are never stored.
///
/// Volume levels are carried as `i32` so that out-of-range requests survive until the
/// dispatcher clamps them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Play,
    Pause,
    /// Resolved to `Play` or `Pause` against the last known playback status
    PlayPause,
    Stop,
    Next,
    Previous,
    /// Absolute volume, clamped into `0..=100` before dispatch
    VolumeSet(i32),
    /// Relative to the last known volume, result clamped into `0..=100`
    VolumeDelta(i32),
}

impl Action {
    /// Short lowercase name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Play => "play",
            Action::Pause => "pause",
            Action::PlayPause => "play_pause",
            Action::Stop => "stop",
            Action::Next => "next",
            Action::Previous => "previous",
            Action::VolumeSet(_) => "volume_set",
            Action::VolumeDelta(_) => "volume_delta",
        }
    }
}

/// Clamp an arbitrary volume request into VLC's user-facing range `0..=100`.
pub fn clamp_volume(level: i32) -> u8 {
    level.clamp(0, 100) as u8
}
