use super::{HardwareError, TouchSource};
use crate::services::TouchReport;
use async_trait::async_trait;
use evdev::{AbsoluteAxisType, EventStream, InputEventKind, Key};

/// Resistive touch controller (ADS7846) read through evdev.
///
/// Axis and button events are accumulated until `SYN_REPORT`, which yields one
/// [`TouchReport`].
pub struct EvdevTouch {
    stream: EventStream,
    raw_x: i32,
    raw_y: i32,
    pressed: bool,
}

impl EvdevTouch {
    /// Open the first input device whose name contains `name_filter`, ignoring case.
    pub fn open(name_filter: &str) -> Result<Self, HardwareError> {
        let needle = name_filter.to_ascii_lowercase();

        let (path, device) = evdev::enumerate()
            .find(|(_, device)| {
                device
                    .name()
                    .map(|name| name.to_ascii_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                HardwareError::Unavailable(format!("no input device matching {:?}", name_filter))
            })?;

        tracing::info!(
            "Touchscreen: {} at {}",
            device.name().unwrap_or("unnamed"),
            path.display()
        );

        Ok(Self {
            stream: device.into_event_stream()?,
            raw_x: 0,
            raw_y: 0,
            pressed: false,
        })
    }
}

#[async_trait]
impl TouchSource for EvdevTouch {
    async fn next_report(&mut self) -> Result<TouchReport, HardwareError> {
        loop {
            let event = self.stream.next_event().await?;
            match event.kind() {
                InputEventKind::AbsAxis(AbsoluteAxisType::ABS_X) => self.raw_x = event.value(),
                InputEventKind::AbsAxis(AbsoluteAxisType::ABS_Y) => self.raw_y = event.value(),
                InputEventKind::Key(Key::BTN_TOUCH) => self.pressed = event.value() != 0,
                InputEventKind::Synchronization(_) => {
                    return Ok(TouchReport {
                        raw_x: self.raw_x,
                        raw_y: self.raw_y,
                        pressed: self.pressed,
                    });
                }
                _ => {}
            }
        }
    }
}
