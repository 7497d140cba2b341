use crate::config::ConfigError;
use crate::models::Action;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Static configuration from `config.yaml`.
///
/// Every section and key has a default, so a missing file or a missing key falls back
/// to the values of the Waveshare 2.8" LCD (A) on a Raspberry Pi. Values that are
/// present but malformed abort startup (see [`Settings::validate`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub screen: ScreenConfig,
    pub vlc: VlcConfig,
    pub system: SystemConfig,
    pub gpio: GpioConfig,
    pub touch: TouchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub width: u32,
    pub height: u32,
    /// Degrees clockwise: 0, 90, 180 or 270
    pub rotation: u16,
    pub spi_bus: u8,
    pub spi_device: u8,
    pub spi_speed_hz: u32,
    pub dc_pin: u8,
    pub reset_pin: u8,
    pub backlight_pin: u8,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 240,
            height: 320,
            rotation: 0,
            spi_bus: 0,
            spi_device: 0,
            spi_speed_hz: 32_000_000,
            dc_pin: 15,
            reset_pin: 13,
            backlight_pin: 18,
        }
    }
}

/// Logical drawing area after rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScreenGeometry {
    pub width: u32,
    pub height: u32,
}

impl ScreenConfig {
    /// Width and height as seen by the renderer. A quarter turn swaps the panel axes.
    pub fn geometry(&self) -> ScreenGeometry {
        match self.rotation {
            90 | 270 => ScreenGeometry {
                width: self.height,
                height: self.width,
            },
            _ => ScreenGeometry {
                width: self.width,
                height: self.height,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VlcConfig {
    /// Directory enqueued at startup; `~` is expanded
    pub media_path: String,
    pub volume: u8,
    pub autoplay: bool,
    /// Address of VLC's RC interface (`vlc -I rc --rc-host <addr>`)
    pub rc_host: String,
    pub command_timeout_ms: u64,
}

impl Default for VlcConfig {
    fn default() -> Self {
        Self {
            media_path: "~/media".to_string(),
            volume: 50,
            autoplay: false,
            rc_host: "127.0.0.1:4212".to_string(),
            command_timeout_ms: 2000,
        }
    }
}

impl VlcConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn expanded_media_path(&self) -> String {
        shellexpand::tilde(&self.media_path).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Seconds between ticks (sampling + redraw)
    pub update_interval: f64,
    /// Mount point whose usage is reported as the disk metric
    pub disk_mount: String,
    pub display_info: DisplayInfo,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            update_interval: 1.0,
            disk_mount: "/".to_string(),
            display_info: DisplayInfo::default(),
        }
    }
}

/// Accepted range for `system.update_interval`
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_millis(10);
pub const MAX_UPDATE_INTERVAL: Duration = Duration::from_secs(3600);

impl SystemConfig {
    /// Tick period, held inside the accepted range even for unvalidated values.
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.update_interval)
            .unwrap_or(MAX_UPDATE_INTERVAL)
            .clamp(MIN_UPDATE_INTERVAL, MAX_UPDATE_INTERVAL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayInfo {
    pub cpu_usage: bool,
    pub memory_usage: bool,
    pub disk_space: bool,
}

impl Default for DisplayInfo {
    fn default() -> Self {
        Self {
            cpu_usage: true,
            memory_usage: true,
            disk_space: true,
        }
    }
}

/// What a physical button does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAction {
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Previous,
    VolumeUp,
    VolumeDown,
}

impl ButtonAction {
    pub fn to_action(self, volume_step: u8) -> Action {
        match self {
            ButtonAction::Play => Action::Play,
            ButtonAction::Pause => Action::Pause,
            ButtonAction::PlayPause => Action::PlayPause,
            ButtonAction::Stop => Action::Stop,
            ButtonAction::Next => Action::Next,
            ButtonAction::Previous => Action::Previous,
            ButtonAction::VolumeUp => Action::VolumeDelta(volume_step as i32),
            ButtonAction::VolumeDown => Action::VolumeDelta(-(volume_step as i32)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    /// Button action -> BCM pin
    pub buttons: IndexMap<ButtonAction, u8>,
    /// Buttons pull the line to ground when pressed (falling edge = press)
    pub active_low: bool,
    pub debounce_ms: u64,
    pub volume_step: u8,
}

impl Default for GpioConfig {
    fn default() -> Self {
        // Waveshare 2.8" LCD (A) onboard keys: KEY1..KEY4
        let mut buttons = IndexMap::new();
        buttons.insert(ButtonAction::PlayPause, 4);
        buttons.insert(ButtonAction::Stop, 23);
        buttons.insert(ButtonAction::Next, 24);
        buttons.insert(ButtonAction::Previous, 25);

        Self {
            buttons,
            active_low: true,
            debounce_ms: 300,
            volume_step: 5,
        }
    }
}

impl GpioConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Raw ADC range reported by the touch controller on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRange {
    pub min: i32,
    pub max: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchConfig {
    pub enabled: bool,
    /// Substring matched (case-insensitively) against evdev device names
    pub device_name: String,
    pub swap_axes: bool,
    pub raw_x: RawRange,
    pub raw_y: RawRange,
    /// Minimum spacing between volume updates while dragging the slider
    pub slider_interval_ms: u64,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device_name: "ADS7846".to_string(),
            swap_axes: true,
            raw_x: RawRange { min: 198, max: 3679 },
            raw_y: RawRange { min: 292, max: 3800 },
            slider_interval_ms: 100,
        }
    }
}

impl TouchConfig {
    pub fn slider_interval(&self) -> Duration {
        Duration::from_millis(self.slider_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: String,
    pub debug: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: "/var/log/pideck".to_string(),
            debug: false,
        }
    }
}

impl Settings {
    /// Reject values that parse but cannot drive the hardware.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                key: key.to_string(),
                reason: reason.into(),
            }
        }

        let screen = &self.screen;
        if !(64..=1024).contains(&screen.width) {
            return Err(invalid("screen.width", format!("{} is outside 64..=1024", screen.width)));
        }
        if !(64..=1024).contains(&screen.height) {
            return Err(invalid(
                "screen.height",
                format!("{} is outside 64..=1024", screen.height),
            ));
        }
        if ![0, 90, 180, 270].contains(&screen.rotation) {
            return Err(invalid(
                "screen.rotation",
                format!("{} is not one of 0, 90, 180, 270", screen.rotation),
            ));
        }
        if screen.spi_speed_hz == 0 {
            return Err(invalid("screen.spi_speed_hz", "must be greater than zero"));
        }

        if self.vlc.volume > 100 {
            return Err(invalid("vlc.volume", format!("{} is above 100", self.vlc.volume)));
        }
        if self.vlc.rc_host.trim().is_empty() {
            return Err(invalid("vlc.rc_host", "must not be empty"));
        }
        if self.vlc.command_timeout_ms == 0 {
            return Err(invalid("vlc.command_timeout_ms", "must be greater than zero"));
        }

        let interval = self.system.update_interval;
        let range = MIN_UPDATE_INTERVAL.as_secs_f64()..=MAX_UPDATE_INTERVAL.as_secs_f64();
        if !range.contains(&interval) {
            return Err(invalid(
                "system.update_interval",
                format!(
                    "{} is outside {}..={} seconds",
                    interval,
                    range.start(),
                    range.end()
                ),
            ));
        }

        if self.gpio.debounce_ms == 0 {
            return Err(invalid("gpio.debounce_ms", "must be greater than zero"));
        }
        let mut seen = HashSet::new();
        let reserved = [screen.dc_pin, screen.reset_pin, screen.backlight_pin];
        for (action, pin) in &self.gpio.buttons {
            if *pin > 27 {
                return Err(invalid(
                    "gpio.buttons",
                    format!("pin {} for {:?} is not a BCM GPIO (0..=27)", pin, action),
                ));
            }
            if !seen.insert(*pin) {
                return Err(invalid(
                    "gpio.buttons",
                    format!("pin {} is assigned to more than one button", pin),
                ));
            }
            if reserved.contains(pin) {
                return Err(invalid(
                    "gpio.buttons",
                    format!("pin {} is already used by the display", pin),
                ));
            }
        }

        for (key, range) in [("touch.raw_x", self.touch.raw_x), ("touch.raw_y", self.touch.raw_y)] {
            if range.min >= range.max {
                return Err(invalid(
                    key,
                    format!("min {} must be below max {}", range.min, range.max),
                ));
            }
        }

        Ok(())
    }
}
