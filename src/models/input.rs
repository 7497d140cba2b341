use std::fmt;
use std::time::Instant;

/// Logical touch targets on the player screen.
///
/// The discriminants double as the region ids used for debouncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TouchRegion {
    Previous,
    PlayPause,
    Next,
    Stop,
    VolumeSlider,
}

impl TouchRegion {
    /// Every region that behaves like a push button (the slider does not).
    pub const BUTTONS: [TouchRegion; 4] = [
        TouchRegion::Previous,
        TouchRegion::PlayPause,
        TouchRegion::Next,
        TouchRegion::Stop,
    ];
}

/// Where a raw edge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InputSource {
    /// BCM GPIO pin number
    Gpio(u8),
    Touch(TouchRegion),
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Gpio(pin) => write!(f, "gpio{}", pin),
            InputSource::Touch(region) => write!(f, "touch:{:?}", region),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Rising,
    Falling,
}

/// An undebounced transition reported by the GPIO or touch collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInputEvent {
    pub source: InputSource,
    pub edge: Edge,
    pub timestamp: Instant,
}

impl RawInputEvent {
    pub fn new(source: InputSource, edge: Edge, timestamp: Instant) -> Self {
        Self {
            source,
            edge,
            timestamp,
        }
    }
}
