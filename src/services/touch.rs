use crate::display::Layout;
use crate::hardware::TouchSource;
use crate::models::{Action, Edge, InputSource, RawInputEvent, RawRange, ScreenGeometry, TouchConfig, TouchRegion};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

/// One synchronised touch controller report (everything up to `SYN_REPORT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchReport {
    pub raw_x: i32,
    pub raw_y: i32,
    pub pressed: bool,
}

/// What a report turned into, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchOutput {
    /// Button region edge, still to be debounced
    Edge(RawInputEvent),
    /// Slider position, already throttled
    Action(Action),
}

/// Linear mapping from raw ADC values to screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    pub raw_x: RawRange,
    pub raw_y: RawRange,
    pub swap_axes: bool,
    pub geometry: ScreenGeometry,
}

impl Calibration {
    pub fn new(config: &TouchConfig, geometry: ScreenGeometry) -> Self {
        Self {
            raw_x: config.raw_x,
            raw_y: config.raw_y,
            swap_axes: config.swap_axes,
            geometry,
        }
    }

    /// Raw values outside the calibrated range clamp to the screen edge.
    pub fn map(&self, raw_x: i32, raw_y: i32) -> (i32, i32) {
        fn normalize(value: i32, range: RawRange) -> f32 {
            let span = (range.max - range.min).max(1) as f32;
            (value.clamp(range.min, range.max) - range.min) as f32 / span
        }

        let norm_x = normalize(raw_x, self.raw_x);
        let norm_y = normalize(raw_y, self.raw_y);
        let (nx, ny) = if self.swap_axes {
            (norm_y, norm_x)
        } else {
            (norm_x, norm_y)
        };

        let w = self.geometry.width as i32;
        let h = self.geometry.height as i32;
        (
            ((nx * w as f32) as i32).min(w - 1),
            ((ny * h as f32) as i32).min(h - 1),
        )
    }
}

/// Follows one finger across reports and decides what each report means.
///
/// A touch is owned by the region it started in: dragging off a button does nothing,
/// dragging the slider keeps adjusting volume even outside the track.
pub struct TouchTracker {
    calibration: Calibration,
    layout: Layout,
    slider_interval: Duration,
    pressed: bool,
    active: Option<TouchRegion>,
    last_sent_at: Option<Instant>,
    last_sent_level: Option<i32>,
    pending_level: Option<i32>,
}

impl TouchTracker {
    pub fn new(config: &TouchConfig, geometry: ScreenGeometry) -> Self {
        Self {
            calibration: Calibration::new(config, geometry),
            layout: Layout::new(geometry),
            slider_interval: config.slider_interval(),
            pressed: false,
            active: None,
            last_sent_at: None,
            last_sent_level: None,
            pending_level: None,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn handle(&mut self, report: TouchReport, now: Instant) -> Option<TouchOutput> {
        let (x, y) = self.calibration.map(report.raw_x, report.raw_y);

        match (self.pressed, report.pressed) {
            (false, true) => {
                self.pressed = true;
                self.active = self.layout.hit_test(x, y);
                tracing::trace!("Touch down at ({}, {}) -> {:?}", x, y, self.active);

                match self.active? {
                    TouchRegion::VolumeSlider => self.slide(x, now),
                    region => Some(TouchOutput::Edge(RawInputEvent::new(
                        InputSource::Touch(region),
                        Edge::Falling,
                        now,
                    ))),
                }
            }
            (true, true) => match self.active? {
                TouchRegion::VolumeSlider => self.slide(x, now),
                _ => None,
            },
            (true, false) => self.release(now),
            (false, false) => None,
        }
    }

    fn release(&mut self, now: Instant) -> Option<TouchOutput> {
        self.pressed = false;
        let region = self.active.take()?;
        self.last_sent_at = None;

        match region {
            TouchRegion::VolumeSlider => {
                // The volume may change elsewhere before the next touch, which must send
                self.last_sent_level = None;
                let level = self.pending_level.take()?;
                Some(TouchOutput::Action(Action::VolumeSet(level)))
            }
            region => Some(TouchOutput::Edge(RawInputEvent::new(
                InputSource::Touch(region),
                Edge::Rising,
                now,
            ))),
        }
    }

    fn slide(&mut self, x: i32, now: Instant) -> Option<TouchOutput> {
        let level = self.layout.slider_level(x);

        if self.last_sent_level == Some(level) {
            self.pending_level = None;
            return None;
        }

        let due = self
            .last_sent_at
            .is_none_or(|last| now.saturating_duration_since(last) >= self.slider_interval);

        if due {
            self.last_sent_at = Some(now);
            self.last_sent_level = Some(level);
            self.pending_level = None;
            Some(TouchOutput::Action(Action::VolumeSet(level)))
        } else {
            self.pending_level = Some(level);
            None
        }
    }

    /// Read reports until shutdown or a device error.
    ///
    /// Button edges go to the debouncer, slider actions straight to the dispatcher.
    pub async fn run(
        mut self,
        mut source: Box<dyn TouchSource>,
        raw_events: mpsc::Sender<RawInputEvent>,
        actions: mpsc::Sender<Action>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!("Touch reader started");

        loop {
            let report = tokio::select! {
                _ = shutdown.changed() => break,
                report = source.next_report() => match report {
                    Ok(report) => report,
                    Err(e) => {
                        tracing::warn!("Touch input stopped: {}", e);
                        break;
                    }
                },
            };

            let delivered = match self.handle(report, Instant::now()) {
                Some(TouchOutput::Edge(event)) => raw_events.send(event).await.is_ok(),
                Some(TouchOutput::Action(action)) => actions.send(action).await.is_ok(),
                None => true,
            };
            if !delivered {
                break;
            }
        }

        tracing::info!("Touch reader stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GEOMETRY: ScreenGeometry = ScreenGeometry {
        width: 240,
        height: 320,
    };

    fn tracker() -> TouchTracker {
        TouchTracker::new(&TouchConfig::default(), GEOMETRY)
    }

    /// Raw report for a screen point, inverting the default swapped calibration
    fn report_at(x: i32, y: i32, pressed: bool) -> TouchReport {
        let config = TouchConfig::default();
        let raw_y = config.raw_y.min + (x * (config.raw_y.max - config.raw_y.min) + 120) / 240;
        let raw_x = config.raw_x.min + (y * (config.raw_x.max - config.raw_x.min) + 160) / 320;
        TouchReport {
            raw_x,
            raw_y,
            pressed,
        }
    }

    #[test]
    fn test_calibration_swaps_axes() {
        let calibration = Calibration::new(&TouchConfig::default(), GEOMETRY);

        assert_eq!(calibration.map(198, 292), (0, 0));
        assert_eq!(calibration.map(3679, 3800), (239, 319));
        assert_eq!(calibration.map(-100, 99999), (239, 0));
    }

    #[test]
    fn test_calibration_without_swap() {
        let config = TouchConfig {
            swap_axes: false,
            ..TouchConfig::default()
        };
        let calibration = Calibration::new(&config, GEOMETRY);
        assert_eq!(calibration.map(3679, 292), (239, 0));
    }

    #[test]
    fn test_button_touch_emits_press_then_release() {
        let mut tracker = tracker();
        let (x, y) = Layout::new(GEOMETRY).stop.center();
        let t0 = Instant::now();

        let down = tracker.handle(report_at(x, y, true), t0);
        assert!(matches!(
            down,
            Some(TouchOutput::Edge(RawInputEvent {
                source: InputSource::Touch(TouchRegion::Stop),
                edge: Edge::Falling,
                ..
            }))
        ));

        // Holding produces nothing further
        assert_eq!(tracker.handle(report_at(x, y, true), t0), None);

        let up = tracker.handle(report_at(x, y, false), t0);
        assert!(matches!(
            up,
            Some(TouchOutput::Edge(RawInputEvent { edge: Edge::Rising, .. }))
        ));
        assert!(!tracker.is_pressed());
    }

    #[test]
    fn test_touch_outside_regions_is_ignored() {
        let mut tracker = tracker();
        let t0 = Instant::now();
        assert_eq!(tracker.handle(report_at(120, 10, true), t0), None);
        assert_eq!(tracker.handle(report_at(120, 10, false), t0), None);
    }

    #[test]
    fn test_slider_drag_is_throttled_and_flushed_on_release() {
        let layout = Layout::new(GEOMETRY);
        let track = layout.volume_track;
        let (_, y) = track.center();
        let mut tracker = tracker();
        let t0 = Instant::now();

        let first = tracker.handle(report_at(track.x + 20, y, true), t0);
        let Some(TouchOutput::Action(Action::VolumeSet(first_level))) = first else {
            panic!("expected a volume action, got {:?}", first);
        };

        // Inside the throttle interval: swallowed but remembered
        let dragged = tracker.handle(
            report_at(track.x + 150, y, true),
            t0 + Duration::from_millis(30),
        );
        assert_eq!(dragged, None);

        let released = tracker.handle(
            report_at(track.x + 150, y, false),
            t0 + Duration::from_millis(60),
        );
        let Some(TouchOutput::Action(Action::VolumeSet(final_level))) = released else {
            panic!("expected the pending level on release, got {:?}", released);
        };
        assert!(final_level > first_level);
    }

    #[test]
    fn test_slider_sends_again_after_interval() {
        let track = Layout::new(GEOMETRY).volume_track;
        let (_, y) = track.center();
        let mut tracker = tracker();
        let t0 = Instant::now();

        assert!(tracker.handle(report_at(track.x + 10, y, true), t0).is_some());
        assert!(tracker
            .handle(report_at(track.x + 100, y, true), t0 + Duration::from_millis(100))
            .is_some());
        // Nothing pending, so release is silent
        assert_eq!(
            tracker.handle(report_at(track.x + 100, y, false), t0 + Duration::from_millis(120)),
            None
        );
    }

    #[test]
    fn test_new_touch_on_same_slider_spot_sends_again() {
        let track = Layout::new(GEOMETRY).volume_track;
        let (_, y) = track.center();
        let x = track.x + 30;
        let mut tracker = tracker();
        let t0 = Instant::now();

        let first = tracker.handle(report_at(x, y, true), t0);
        let Some(TouchOutput::Action(Action::VolumeSet(level))) = first else {
            panic!("expected a volume action, got {:?}", first);
        };
        assert_eq!(tracker.handle(report_at(x, y, false), t0), None);

        // Volume buttons may have moved the level meanwhile
        let later = t0 + Duration::from_secs(5);
        assert_eq!(
            tracker.handle(report_at(x, y, true), later),
            Some(TouchOutput::Action(Action::VolumeSet(level)))
        );
    }
}
