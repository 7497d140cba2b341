//! Hardware collaborators: the SPI LCD, the GPIO buttons and the touch controller.
//!
//! Everything the rest of the crate needs is expressed as a trait here so the app can
//! run against fakes. The real drivers live behind the `hardware` feature and use
//! `rppal` (SPI, GPIO) and `evdev` (touch).
//!
//! [`Hardware`] owns every acquired handle. Handles are released by `Drop`, in reverse
//! acquisition order, including when a later acquisition step fails.

#[cfg(feature = "hardware")]
pub mod gpio;
#[cfg(feature = "hardware")]
pub mod ili9341;
#[cfg(feature = "hardware")]
pub mod touch;

use crate::display::Frame;
use crate::models::{RawInputEvent, Settings};
use crate::services::TouchReport;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors raised while acquiring or driving hardware
#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("Hardware unavailable: {0}")]
    Unavailable(String),

    #[cfg(feature = "hardware")]
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[cfg(feature = "hardware")]
    #[error("SPI error: {0}")]
    Spi(#[from] rppal::spi::Error),

    #[error("Input device error: {0}")]
    Input(#[from] std::io::Error),

    #[error("Frame is {frame_width}x{frame_height} but the panel expects {panel_width}x{panel_height}")]
    FrameSize {
        frame_width: u32,
        frame_height: u32,
        panel_width: u32,
        panel_height: u32,
    },
}

/// The LCD. Calls block on SPI and must run on the blocking pool.
#[cfg_attr(test, mockall::automock)]
pub trait DisplaySink: Send {
    /// Rasterise and push a full frame.
    fn draw(&mut self, frame: &Frame) -> Result<(), HardwareError>;

    /// Fill the panel with black.
    fn clear(&mut self) -> Result<(), HardwareError>;

    fn set_backlight(&mut self, on: bool) -> Result<(), HardwareError>;
}

/// Live button interrupt registrations. Dropping the value stops event delivery.
pub trait ButtonInput: Send {
    /// BCM pins being watched
    fn pins(&self) -> Vec<u8>;
}

/// Source of synchronised touch reports
#[async_trait]
pub trait TouchSource: Send {
    async fn next_report(&mut self) -> Result<TouchReport, HardwareError>;
}

/// Every acquired hardware handle.
///
/// Field order is drop order: inputs stop before the display goes dark.
pub struct Hardware {
    pub buttons: Option<Box<dyn ButtonInput>>,
    pub touch: Option<Box<dyn TouchSource>>,
    pub display: Box<dyn DisplaySink>,
}

impl Hardware {
    pub fn new(
        display: Box<dyn DisplaySink>,
        buttons: Option<Box<dyn ButtonInput>>,
        touch: Option<Box<dyn TouchSource>>,
    ) -> Self {
        Self {
            buttons,
            touch,
            display,
        }
    }

    /// Open the LCD, register button interrupts and find the touch controller.
    ///
    /// The display and the buttons are required. A missing touch controller is logged
    /// and the appliance runs with buttons only.
    #[cfg(feature = "hardware")]
    pub fn acquire(settings: &Settings, raw_events: mpsc::Sender<RawInputEvent>) -> Result<Self, HardwareError> {
        let mut display = ili9341::Ili9341::open(&settings.screen)?;
        display.set_backlight(true)?;
        tracing::info!(
            "ILI9341 ready on spidev{}.{} ({}x{}, rotation {})",
            settings.screen.spi_bus,
            settings.screen.spi_device,
            settings.screen.width,
            settings.screen.height,
            settings.screen.rotation
        );

        let buttons = gpio::GpioButtons::watch(&settings.gpio, raw_events)?;
        tracing::info!("Watching GPIO buttons on pins {:?}", buttons.pins());

        let touch: Option<Box<dyn TouchSource>> = if settings.touch.enabled {
            match touch::EvdevTouch::open(&settings.touch.device_name) {
                Ok(device) => Some(Box::new(device)),
                Err(e) => {
                    tracing::warn!("Touchscreen disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self::new(Box::new(display), Some(Box::new(buttons)), touch))
    }

    #[cfg(not(feature = "hardware"))]
    pub fn acquire(_settings: &Settings, _raw_events: mpsc::Sender<RawInputEvent>) -> Result<Self, HardwareError> {
        Err(HardwareError::Unavailable(
            "pideck was built without the `hardware` feature".to_string(),
        ))
    }
}
