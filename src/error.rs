//! Error taxonomy.
//!
//! Each component owns a typed error next to its code; [`PiDeckError`] groups them by
//! how the application reacts:
//!
//! | Variant        | Fatal | Reaction                                         |
//! |----------------|-------|--------------------------------------------------|
//! | `Config`       | yes   | startup aborts, exit code 1                      |
//! | `HardwareInit` | yes   | startup aborts, exit code 2                      |
//! | `VlcCommand`   | no    | logged, playback state left unchanged            |
//! | `SampleRead`   | no    | metric shown as unavailable for that tick        |
//! | `InputDecode`  | no    | event dropped                                    |

use crate::config::ConfigError;
use crate::hardware::HardwareError;
use crate::services::{InputDecodeError, SampleReadError, VlcError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PiDeckError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Hardware initialisation failed: {0}")]
    HardwareInit(#[from] HardwareError),

    #[error("VLC command failed: {0}")]
    VlcCommand(#[from] VlcError),

    #[error("Metric unavailable: {0}")]
    SampleRead(#[from] SampleReadError),

    #[error("Input event dropped: {0}")]
    InputDecode(#[from] InputDecodeError),
}

impl PiDeckError {
    /// Fatal errors stop the process; the rest are logged and the loop continues.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PiDeckError::Config(_) | PiDeckError::HardwareInit(_))
    }

    /// Process exit code for errors that reach `main`.
    pub fn exit_code(&self) -> u8 {
        match self {
            PiDeckError::Config(_) => 1,
            PiDeckError::HardwareInit(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_and_exit_codes() {
        let config = PiDeckError::from(ConfigError::Invalid {
            key: "screen.width".to_string(),
            reason: "too small".to_string(),
        });
        assert!(config.is_fatal());
        assert_eq!(config.exit_code(), 1);

        let hardware = PiDeckError::from(HardwareError::Unavailable("built without hardware".into()));
        assert!(hardware.is_fatal());
        assert_eq!(hardware.exit_code(), 2);

        let vlc = PiDeckError::from(VlcError::NotRunning("connection refused".into()));
        assert!(!vlc.is_fatal());
    }
}
