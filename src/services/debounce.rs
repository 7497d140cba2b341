use crate::metrics::Metrics;
use crate::models::{Action, Edge, InputSource, RawInputEvent, Settings, TouchRegion};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// Raw events that cannot be turned into an action
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputDecodeError {
    #[error("No binding for input source {0}")]
    UnknownSource(InputSource),
}

/// Per-source debounce state
#[derive(Debug, Clone)]
struct Binding {
    action: Action,
    press_edge: Edge,
    last_accepted: Option<Instant>,
}

/// Why an event was dropped without producing an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Release edge (or press edge of an active-high button read the wrong way round)
    NotPress,
    /// Inside the debounce window of the last accepted press
    TooSoon,
    /// Timestamp older than the last accepted press
    OutOfOrder,
}

/// Turns raw button and touch edges into discrete actions.
///
/// The binding map is built once from the configuration and never grows: one entry per
/// configured GPIO pin plus one per touch button region.
pub struct InputDebouncer {
    bindings: HashMap<InputSource, Binding>,
    window: Duration,
}

impl InputDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            bindings: HashMap::new(),
            window,
        }
    }

    /// Register a source. Only called while building the debouncer.
    pub fn with_binding(mut self, source: InputSource, press_edge: Edge, action: Action) -> Self {
        self.bindings.insert(
            source,
            Binding {
                action,
                press_edge,
                last_accepted: None,
            },
        );
        self
    }

    /// Bindings for every configured button pin and every touch button region
    pub fn from_settings(settings: &Settings) -> Self {
        let gpio = &settings.gpio;
        // Buttons wired to ground with pull-ups read low while held
        let press_edge = if gpio.active_low {
            Edge::Falling
        } else {
            Edge::Rising
        };

        let mut debouncer = Self::new(gpio.debounce_window());

        for (button, pin) in &gpio.buttons {
            debouncer = debouncer.with_binding(
                InputSource::Gpio(*pin),
                press_edge,
                button.to_action(gpio.volume_step),
            );
        }

        // Touch-down is always reported as a falling edge
        for region in TouchRegion::BUTTONS {
            let action = match region {
                TouchRegion::Previous => Action::Previous,
                TouchRegion::PlayPause => Action::PlayPause,
                TouchRegion::Next => Action::Next,
                TouchRegion::Stop => Action::Stop,
                TouchRegion::VolumeSlider => continue,
            };
            debouncer = debouncer.with_binding(InputSource::Touch(region), Edge::Falling, action);
        }

        debouncer
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn sources(&self) -> impl Iterator<Item = &InputSource> {
        self.bindings.keys()
    }

    /// Decide whether `event` is a new press.
    ///
    /// # Returns
    /// - `Ok(Ok(action))` when the event is accepted
    /// - `Ok(Err(rejection))` when it is filtered out
    /// - `Err(InputDecodeError)` when the source has no binding
    pub fn accept(&mut self, event: &RawInputEvent) -> Result<Result<Action, Rejection>, InputDecodeError> {
        let binding = self
            .bindings
            .get_mut(&event.source)
            .ok_or(InputDecodeError::UnknownSource(event.source))?;

        if event.edge != binding.press_edge {
            return Ok(Err(Rejection::NotPress));
        }

        if let Some(last) = binding.last_accepted {
            match event.timestamp.checked_duration_since(last) {
                None => return Ok(Err(Rejection::OutOfOrder)),
                Some(elapsed) if elapsed < self.window => return Ok(Err(Rejection::TooSoon)),
                Some(_) => {}
            }
        }

        binding.last_accepted = Some(event.timestamp);
        Ok(Ok(binding.action))
    }

    /// Filter `events` into `actions` until shutdown or until either channel closes.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<RawInputEvent>,
        actions: mpsc::Sender<Action>,
        mut shutdown: watch::Receiver<bool>,
        metrics: Arc<Metrics>,
    ) {
        tracing::info!(
            "Input debouncer started: {} sources, {:?} window",
            self.bindings.len(),
            self.window
        );

        loop {
            let event = tokio::select! {
                _ = shutdown.changed() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match self.accept(&event) {
                Ok(Ok(action)) => {
                    metrics.record_event_accepted();
                    tracing::debug!("{} -> {}", event.source, action.name());
                    if actions.send(action).await.is_err() {
                        break;
                    }
                }
                Ok(Err(rejection)) => {
                    metrics.record_event_rejected();
                    tracing::trace!("{} {:?} rejected: {:?}", event.source, event.edge, rejection);
                }
                Err(e) => {
                    metrics.record_event_undecodable();
                    tracing::debug!("{}", e);
                }
            }
        }

        tracing::info!("Input debouncer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIN: u8 = 4;

    fn debouncer() -> InputDebouncer {
        InputDebouncer::new(Duration::from_millis(300)).with_binding(
            InputSource::Gpio(PIN),
            Edge::Falling,
            Action::PlayPause,
        )
    }

    fn press(at: Instant) -> RawInputEvent {
        RawInputEvent::new(InputSource::Gpio(PIN), Edge::Falling, at)
    }

    #[test]
    fn test_first_press_is_accepted() {
        let mut debouncer = debouncer();
        let result = debouncer.accept(&press(Instant::now())).unwrap();
        assert_eq!(result, Ok(Action::PlayPause));
    }

    #[test]
    fn test_release_edge_is_ignored() {
        let mut debouncer = debouncer();
        let event = RawInputEvent::new(InputSource::Gpio(PIN), Edge::Rising, Instant::now());
        assert_eq!(debouncer.accept(&event).unwrap(), Err(Rejection::NotPress));
    }

    #[test]
    fn test_press_inside_window_is_rejected() {
        let mut debouncer = debouncer();
        let t0 = Instant::now();

        assert!(debouncer.accept(&press(t0)).unwrap().is_ok());
        assert_eq!(
            debouncer.accept(&press(t0 + Duration::from_millis(50))).unwrap(),
            Err(Rejection::TooSoon)
        );
        assert!(debouncer
            .accept(&press(t0 + Duration::from_millis(300)))
            .unwrap()
            .is_ok());
    }

    #[test]
    fn test_rejected_press_does_not_extend_window() {
        let mut debouncer = debouncer();
        let t0 = Instant::now();

        debouncer.accept(&press(t0)).unwrap().unwrap();
        debouncer
            .accept(&press(t0 + Duration::from_millis(250)))
            .unwrap()
            .unwrap_err();
        assert!(debouncer
            .accept(&press(t0 + Duration::from_millis(310)))
            .unwrap()
            .is_ok());
    }

    #[test]
    fn test_out_of_order_timestamp_is_rejected() {
        let mut debouncer = debouncer();
        let t0 = Instant::now() + Duration::from_secs(1);

        debouncer.accept(&press(t0)).unwrap().unwrap();
        assert_eq!(
            debouncer.accept(&press(t0 - Duration::from_millis(500))).unwrap(),
            Err(Rejection::OutOfOrder)
        );
    }

    #[test]
    fn test_unknown_source_is_decode_error() {
        let mut debouncer = debouncer();
        let event = RawInputEvent::new(InputSource::Gpio(17), Edge::Falling, Instant::now());
        assert_eq!(
            debouncer.accept(&event),
            Err(InputDecodeError::UnknownSource(InputSource::Gpio(17)))
        );
    }

    #[test]
    fn test_sources_are_independent() {
        let mut debouncer = debouncer().with_binding(
            InputSource::Touch(TouchRegion::Stop),
            Edge::Falling,
            Action::Stop,
        );
        let t0 = Instant::now();

        debouncer.accept(&press(t0)).unwrap().unwrap();
        let touch = RawInputEvent::new(InputSource::Touch(TouchRegion::Stop), Edge::Falling, t0);
        assert_eq!(debouncer.accept(&touch).unwrap(), Ok(Action::Stop));
    }

    #[test]
    fn test_from_default_settings() {
        let debouncer = InputDebouncer::from_settings(&Settings::default());

        // 4 default buttons + 4 touch buttons, no slider binding
        assert_eq!(debouncer.sources().count(), 8);
        assert!(debouncer.sources().any(|s| *s == InputSource::Gpio(23)));
        assert!(!debouncer
            .sources()
            .any(|s| *s == InputSource::Touch(TouchRegion::VolumeSlider)));
        assert_eq!(debouncer.window(), Duration::from_millis(300));
    }

    #[test]
    fn test_active_high_presses_on_rising_edge() {
        let mut settings = Settings::default();
        settings.gpio.active_low = false;
        let mut debouncer = InputDebouncer::from_settings(&settings);

        let rising = RawInputEvent::new(InputSource::Gpio(4), Edge::Rising, Instant::now());
        assert_eq!(debouncer.accept(&rising).unwrap(), Ok(Action::PlayPause));
    }
}
