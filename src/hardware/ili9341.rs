use super::{DisplaySink, HardwareError};
use crate::display::{Frame, raster};
use crate::models::{ScreenConfig, ScreenGeometry};
use rppal::gpio::{Gpio, OutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use std::thread;
use std::time::Duration;

/// spidev transfers are capped at 4096 bytes by default
const CHUNK_SIZE: usize = 4096;

mod command {
    pub const SOFT_RESET: u8 = 0x01;
    pub const SLEEP_OUT: u8 = 0x11;
    pub const GAMMA_SET: u8 = 0x26;
    pub const DISPLAY_OFF: u8 = 0x28;
    pub const DISPLAY_ON: u8 = 0x29;
    pub const COLUMN_ADDRESS_SET: u8 = 0x2A;
    pub const PAGE_ADDRESS_SET: u8 = 0x2B;
    pub const MEMORY_WRITE: u8 = 0x2C;
    pub const MEMORY_ACCESS_CONTROL: u8 = 0x36;
    pub const PIXEL_FORMAT_SET: u8 = 0x3A;
    pub const FRAME_RATE_CONTROL: u8 = 0xB1;
    pub const POWER_CONTROL_1: u8 = 0xC0;
    pub const POWER_CONTROL_2: u8 = 0xC1;
    pub const VCOM_CONTROL_1: u8 = 0xC5;
    pub const VCOM_CONTROL_2: u8 = 0xC7;
    pub const POWER_CONTROL_B: u8 = 0xCF;
    pub const POWER_ON_SEQUENCE: u8 = 0xED;
    pub const DRIVER_TIMING_A: u8 = 0xE8;
    pub const POWER_CONTROL_A: u8 = 0xCB;
    pub const PUMP_RATIO_CONTROL: u8 = 0xF7;
    pub const DRIVER_TIMING_B: u8 = 0xEA;
    pub const ENABLE_3G: u8 = 0xF2;
}

/// Vendor power-up sequence, sent after the software reset.
const INIT_SEQUENCE: &[(u8, &[u8])] = &[
    (command::DISPLAY_OFF, &[]),
    (command::POWER_CONTROL_B, &[0x00, 0x83, 0x30]),
    (command::POWER_ON_SEQUENCE, &[0x64, 0x03, 0x12, 0x81]),
    (command::DRIVER_TIMING_A, &[0x85, 0x01, 0x79]),
    (command::POWER_CONTROL_A, &[0x39, 0x2C, 0x00, 0x34, 0x02]),
    (command::PUMP_RATIO_CONTROL, &[0x20]),
    (command::DRIVER_TIMING_B, &[0x00, 0x00]),
    (command::POWER_CONTROL_1, &[0x26]),
    (command::POWER_CONTROL_2, &[0x11]),
    (command::VCOM_CONTROL_1, &[0x35, 0x3E]),
    (command::VCOM_CONTROL_2, &[0xBE]),
];

/// MADCTL byte for a rotation; every value keeps BGR colour order.
pub fn memory_access_control(rotation: u16) -> u8 {
    match rotation {
        90 => 0x28,
        180 => 0x88,
        270 => 0xE8,
        _ => 0x48,
    }
}

/// ILI9341 panel on the Pi's SPI bus with DC/RST/backlight lines.
pub struct Ili9341 {
    spi: Spi,
    dc: OutputPin,
    reset: OutputPin,
    backlight: OutputPin,
    geometry: ScreenGeometry,
    rotation: u16,
}

impl Ili9341 {
    pub fn open(config: &ScreenConfig) -> Result<Self, HardwareError> {
        let bus = match config.spi_bus {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            2 => Bus::Spi2,
            other => return Err(HardwareError::Unavailable(format!("no SPI bus {}", other))),
        };
        let slave_select = match config.spi_device {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            2 => SlaveSelect::Ss2,
            other => {
                return Err(HardwareError::Unavailable(format!("no SPI chip select {}", other)));
            }
        };

        let spi = Spi::new(bus, slave_select, config.spi_speed_hz, Mode::Mode0)?;
        let gpio = Gpio::new()?;
        let dc = gpio.get(config.dc_pin)?.into_output_low();
        let reset = gpio.get(config.reset_pin)?.into_output_high();
        let backlight = gpio.get(config.backlight_pin)?.into_output_low();

        let mut panel = Self {
            spi,
            dc,
            reset,
            backlight,
            geometry: config.geometry(),
            rotation: config.rotation,
        };
        panel.hard_reset();
        panel.initialize()?;
        Ok(panel)
    }

    pub fn geometry(&self) -> ScreenGeometry {
        self.geometry
    }

    fn hard_reset(&mut self) {
        self.reset.set_high();
        thread::sleep(Duration::from_millis(100));
        self.reset.set_low();
        thread::sleep(Duration::from_millis(100));
        self.reset.set_high();
        thread::sleep(Duration::from_millis(100));
    }

    fn initialize(&mut self) -> Result<(), HardwareError> {
        self.command(command::SOFT_RESET, &[])?;
        thread::sleep(Duration::from_millis(150));

        for (cmd, data) in INIT_SEQUENCE {
            self.command(*cmd, data)?;
        }

        self.command(
            command::MEMORY_ACCESS_CONTROL,
            &[memory_access_control(self.rotation)],
        )?;
        // 16 bits per pixel
        self.command(command::PIXEL_FORMAT_SET, &[0x55])?;
        self.command(command::FRAME_RATE_CONTROL, &[0x00, 0x1B])?;
        self.command(command::ENABLE_3G, &[0x08])?;
        self.command(command::GAMMA_SET, &[0x01])?;

        self.command(command::SLEEP_OUT, &[])?;
        thread::sleep(Duration::from_millis(150));
        self.command(command::DISPLAY_ON, &[])?;
        Ok(())
    }

    fn command(&mut self, cmd: u8, data: &[u8]) -> Result<(), HardwareError> {
        self.dc.set_low();
        self.spi.write(&[cmd])?;
        if !data.is_empty() {
            self.data(data)?;
        }
        Ok(())
    }

    fn data(&mut self, data: &[u8]) -> Result<(), HardwareError> {
        self.dc.set_high();
        for chunk in data.chunks(CHUNK_SIZE) {
            self.spi.write(chunk)?;
        }
        Ok(())
    }

    /// Address the whole panel for the next `MEMORY_WRITE`.
    fn full_window(&mut self) -> Result<(), HardwareError> {
        let [x_hi, x_lo] = (self.geometry.width.saturating_sub(1) as u16).to_be_bytes();
        let [y_hi, y_lo] = (self.geometry.height.saturating_sub(1) as u16).to_be_bytes();

        self.command(command::COLUMN_ADDRESS_SET, &[0, 0, x_hi, x_lo])?;
        self.command(command::PAGE_ADDRESS_SET, &[0, 0, y_hi, y_lo])?;
        self.command(command::MEMORY_WRITE, &[])
    }
}

impl DisplaySink for Ili9341 {
    fn draw(&mut self, frame: &Frame) -> Result<(), HardwareError> {
        if frame.width != self.geometry.width || frame.height != self.geometry.height {
            return Err(HardwareError::FrameSize {
                frame_width: frame.width,
                frame_height: frame.height,
                panel_width: self.geometry.width,
                panel_height: self.geometry.height,
            });
        }

        let pixels = raster::rasterize(frame).to_be_bytes();
        self.full_window()?;
        self.data(&pixels)
    }

    fn clear(&mut self) -> Result<(), HardwareError> {
        let total = (self.geometry.width * self.geometry.height * 2) as usize;
        let black = [0u8; CHUNK_SIZE];

        self.full_window()?;
        self.dc.set_high();
        let mut remaining = total;
        while remaining > 0 {
            let n = remaining.min(CHUNK_SIZE);
            self.spi.write(&black[..n])?;
            remaining -= n;
        }
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> Result<(), HardwareError> {
        if on {
            self.backlight.set_high();
        } else {
            self.backlight.set_low();
        }
        Ok(())
    }
}

impl Drop for Ili9341 {
    fn drop(&mut self) {
        self.backlight.set_low();
        tracing::debug!("ILI9341 released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_access_control_per_rotation() {
        assert_eq!(memory_access_control(0), 0x48);
        assert_eq!(memory_access_control(90), 0x28);
        assert_eq!(memory_access_control(180), 0x88);
        assert_eq!(memory_access_control(270), 0xE8);
    }

    #[test]
    fn test_init_sequence_has_no_display_on() {
        assert!(INIT_SEQUENCE.iter().all(|(cmd, _)| *cmd != command::DISPLAY_ON));
        assert_eq!(INIT_SEQUENCE[0].0, command::DISPLAY_OFF);
    }
}
