use chrono::{DateTime, Local};

/// One tick of system utilisation.
///
/// A field is `None` when the metric could not be read this tick; the renderer shows
/// it as unavailable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSample {
    pub cpu_percent: Option<f32>,
    pub mem_percent: Option<f32>,
    pub disk_percent: Option<f32>,
    pub timestamp: DateTime<Local>,
}

impl MetricsSample {
    /// A sample with every metric unavailable.
    pub fn unavailable(timestamp: DateTime<Local>) -> Self {
        Self {
            cpu_percent: None,
            mem_percent: None,
            disk_percent: None,
            timestamp,
        }
    }
}
