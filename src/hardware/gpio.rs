use super::{ButtonInput, HardwareError};
use crate::models::{Edge, GpioConfig, InputSource, RawInputEvent};
use rppal::gpio::{Event, Gpio, InputPin, Trigger};
use std::time::Instant;
use tokio::sync::mpsc;

/// Button pins with both-edge interrupts forwarding into the raw event channel.
///
/// rppal runs one interrupt thread per pin. Callbacks only timestamp and forward;
/// debouncing happens downstream. Dropping the pins clears the interrupts.
pub struct GpioButtons {
    pins: Vec<InputPin>,
}

impl GpioButtons {
    pub fn watch(config: &GpioConfig, raw_events: mpsc::Sender<RawInputEvent>) -> Result<Self, HardwareError> {
        let gpio = Gpio::new()?;
        let mut pins = Vec::with_capacity(config.buttons.len());

        for (action, pin_number) in &config.buttons {
            let pin_number = *pin_number;
            let mut pin = if config.active_low {
                gpio.get(pin_number)?.into_input_pullup()
            } else {
                gpio.get(pin_number)?.into_input_pulldown()
            };

            let tx = raw_events.clone();
            pin.set_async_interrupt(Trigger::Both, None, move |event: Event| {
                let edge = match event.trigger {
                    Trigger::RisingEdge => Edge::Rising,
                    _ => Edge::Falling,
                };
                let raw = RawInputEvent::new(InputSource::Gpio(pin_number), edge, Instant::now());
                // Blocks this pin's interrupt thread only; a closed channel means shutdown
                let _ = tx.blocking_send(raw);
            })?;

            tracing::debug!("GPIO{} bound to {:?}", pin_number, action);
            pins.push(pin);
        }

        Ok(Self { pins })
    }
}

impl ButtonInput for GpioButtons {
    fn pins(&self) -> Vec<u8> {
        self.pins.iter().map(|pin| pin.pin()).collect()
    }
}

impl Drop for GpioButtons {
    fn drop(&mut self) {
        for pin in &mut self.pins {
            if let Err(e) = pin.clear_async_interrupt() {
                tracing::debug!("Failed to clear interrupt on GPIO{}: {}", pin.pin(), e);
            }
        }
        tracing::debug!("GPIO buttons released");
    }
}
