use super::Rect;
use crate::models::{ScreenGeometry, TouchRegion};

/// Positions of every widget on the player screen.
///
/// The same layout drives drawing ([`crate::services::Renderer`]) and touch hit-testing
/// ([`crate::services::TouchTracker`]), so a region is always touchable exactly where it
/// is drawn. Coordinates are designed for 240x320 and scaled proportionally for other
/// geometries.
///
/// ```text
/// ┌─────────────────────────┐
/// │ Track title       12:34 │  header
/// │ Playing                 │
/// ├─────────────────────────┤
/// │ ═══════════════════     │  progress
/// │                     42% │
/// │   <<      >/||     >>   │  controls
/// │ Vol ════════════O    50 │  volume slider
/// │ [Stop]   CPU / MEM / DSK│  stop + metrics
/// └─────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    pub padding: i32,
    pub header: Rect,
    pub progress: Rect,
    pub previous: Rect,
    pub play_pause: Rect,
    pub next: Rect,
    pub volume_track: Rect,
    pub stop: Rect,
    pub metrics: Rect,
}

const BASE_WIDTH: i32 = 240;
const BASE_HEIGHT: i32 = 320;

impl Layout {
    pub fn new(geometry: ScreenGeometry) -> Self {
        let w = geometry.width as i32;
        let h = geometry.height as i32;
        let sx = |v: i32| v * w / BASE_WIDTH;
        let sy = |v: i32| v * h / BASE_HEIGHT;

        let padding = sx(8).max(2);
        let button = sx(56).min(sy(56)).max(16);
        let center_x = w / 2;
        let button_y = sy(140);

        let previous = Rect::new(
            center_x - button - button / 2 - padding,
            button_y,
            button as u32,
            button as u32,
        );
        let play_size = button + sx(8);
        let play_pause = Rect::new(
            center_x - play_size / 2,
            button_y - (play_size - button) / 2,
            play_size as u32,
            play_size as u32,
        );
        let next = Rect::new(center_x + button / 2 + padding, button_y, button as u32, button as u32);

        let label_width = sx(30);
        let volume_track = Rect::new(
            padding + label_width,
            sy(230),
            (w - 2 * padding - label_width).max(1) as u32,
            sy(24).max(8) as u32,
        );

        let stop_y = sy(280);
        let stop = Rect::new(padding, stop_y, sx(60) as u32, sy(40).max(12) as u32);
        let metrics_x = stop.right() + padding;
        let metrics = Rect::new(
            metrics_x,
            stop_y - sy(4),
            (w - metrics_x - padding).max(1) as u32,
            (h - stop_y + sy(4) - padding / 2).max(1) as u32,
        );

        Self {
            width: geometry.width,
            height: geometry.height,
            padding,
            header: Rect::new(0, 0, geometry.width, sy(40) as u32),
            progress: Rect::new(padding, sy(80), (w - 2 * padding).max(1) as u32, sy(6).max(2) as u32),
            previous,
            play_pause,
            next,
            volume_track,
            stop,
            metrics,
        }
    }

    /// Region under a touch point, if any. Buttons win over the slider where they overlap.
    pub fn hit_test(&self, x: i32, y: i32) -> Option<TouchRegion> {
        let buttons = [
            (self.previous, TouchRegion::Previous),
            (self.play_pause, TouchRegion::PlayPause),
            (self.next, TouchRegion::Next),
            (self.stop, TouchRegion::Stop),
        ];

        buttons
            .iter()
            .find(|(rect, _)| rect.contains(x, y))
            .map(|(_, region)| *region)
            .or_else(|| {
                self.volume_track
                    .contains(x, y)
                    .then_some(TouchRegion::VolumeSlider)
            })
    }

    /// Volume level for a horizontal position on the slider, clamped to the track.
    pub fn slider_level(&self, x: i32) -> i32 {
        let track = self.volume_track;
        let offset = (x - track.x).clamp(0, track.width as i32);
        (offset * 100 + track.width as i32 / 2) / track.width as i32
    }

    /// Horizontal thumb position for a volume level.
    pub fn slider_x(&self, volume: u8) -> i32 {
        let track = self.volume_track;
        track.x + (track.width as i32 * volume.min(100) as i32) / 100
    }
}
