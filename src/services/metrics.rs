use crate::models::{DisplayInfo, MetricsSample, SystemConfig};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System};
use thiserror::Error;

/// A metric that could not be read this tick
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SampleReadError {
    #[error("No disk mounted at {0}")]
    MountNotFound(Utf8PathBuf),

    #[error("{metric} unavailable: {reason}")]
    Unavailable { metric: &'static str, reason: String },

    #[error("{metric} reading is not a percentage: {value}")]
    OutOfRange { metric: &'static str, value: f32 },
}

/// Source of raw utilisation numbers.
///
/// Implementations may keep whatever history they need for delta-based readings (CPU).
pub trait SystemProbe: Send {
    fn cpu_percent(&mut self) -> Result<f32, SampleReadError>;
    fn mem_percent(&mut self) -> Result<f32, SampleReadError>;
    fn disk_percent(&mut self, mount: &Utf8Path) -> Result<f32, SampleReadError>;
}

/// [`SystemProbe`] backed by `sysinfo`
pub struct SysinfoProbe {
    sys: System,
    disks: Disks,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut sys = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::new().with_cpu_usage())
                .with_memory(MemoryRefreshKind::new().with_ram()),
        );
        // CPU usage is a delta between refreshes; take the baseline now
        sys.refresh_cpu_usage();

        Self {
            sys,
            disks: Disks::new_with_refreshed_list(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProbe for SysinfoProbe {
    fn cpu_percent(&mut self) -> Result<f32, SampleReadError> {
        self.sys.refresh_cpu_usage();
        if self.sys.cpus().is_empty() {
            return Err(SampleReadError::Unavailable {
                metric: "cpu",
                reason: "no CPUs reported".to_string(),
            });
        }
        Ok(self.sys.global_cpu_info().cpu_usage())
    }

    fn mem_percent(&mut self) -> Result<f32, SampleReadError> {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        if total == 0 {
            return Err(SampleReadError::Unavailable {
                metric: "memory",
                reason: "total memory is zero".to_string(),
            });
        }
        Ok((self.sys.used_memory() as f64 / total as f64 * 100.0) as f32)
    }

    fn disk_percent(&mut self, mount: &Utf8Path) -> Result<f32, SampleReadError> {
        self.disks.refresh();
        if self.disks.list().is_empty() {
            self.disks.refresh_list();
        }

        let disk = self
            .disks
            .list()
            .iter()
            .find(|disk| disk.mount_point() == mount.as_std_path())
            .ok_or_else(|| SampleReadError::MountNotFound(mount.to_path_buf()))?;

        let total = disk.total_space();
        if total == 0 {
            return Err(SampleReadError::Unavailable {
                metric: "disk",
                reason: format!("{} reports zero size", mount),
            });
        }
        let used = total.saturating_sub(disk.available_space());
        Ok((used as f64 / total as f64 * 100.0) as f32)
    }
}

/// Reads CPU, memory and disk utilisation once per tick.
///
/// Disabled metrics (`system.display_info`) are not read at all. A failed reading
/// becomes `None` for that tick only.
pub struct MetricsSampler {
    probe: Box<dyn SystemProbe>,
    disk_mount: Utf8PathBuf,
    enabled: DisplayInfo,
    failures: u64,
}

impl MetricsSampler {
    pub fn new(probe: Box<dyn SystemProbe>, config: &SystemConfig) -> Self {
        Self {
            probe,
            disk_mount: Utf8PathBuf::from(&config.disk_mount),
            enabled: config.display_info,
            failures: 0,
        }
    }

    pub fn with_sysinfo(config: &SystemConfig) -> Self {
        Self::new(Box::new(SysinfoProbe::new()), config)
    }

    /// Total readings that failed since startup
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn sample(&mut self, timestamp: DateTime<Local>) -> MetricsSample {
        let mut sample = MetricsSample::unavailable(timestamp);

        if self.enabled.cpu_usage {
            let reading = self.probe.cpu_percent();
            sample.cpu_percent = self.accept("cpu", reading);
        }
        if self.enabled.memory_usage {
            let reading = self.probe.mem_percent();
            sample.mem_percent = self.accept("memory", reading);
        }
        if self.enabled.disk_space {
            let reading = self.probe.disk_percent(&self.disk_mount);
            sample.disk_percent = self.accept("disk", reading);
        }

        sample
    }

    fn accept(&mut self, metric: &'static str, reading: Result<f32, SampleReadError>) -> Option<f32> {
        let checked = reading.and_then(|value| {
            if value.is_finite() {
                Ok(value.clamp(0.0, 100.0))
            } else {
                Err(SampleReadError::OutOfRange { metric, value })
            }
        });

        match checked {
            Ok(value) => Some(value),
            Err(e) => {
                self.failures += 1;
                tracing::debug!("{}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe {
        cpu: Result<f32, SampleReadError>,
        mem: Result<f32, SampleReadError>,
        disk: Result<f32, SampleReadError>,
    }

    impl SystemProbe for FixedProbe {
        fn cpu_percent(&mut self) -> Result<f32, SampleReadError> {
            self.cpu.clone()
        }

        fn mem_percent(&mut self) -> Result<f32, SampleReadError> {
            self.mem.clone()
        }

        fn disk_percent(&mut self, mount: &Utf8Path) -> Result<f32, SampleReadError> {
            assert_eq!(mount.as_str(), "/");
            self.disk.clone()
        }
    }

    fn probe(cpu: f32, mem: f32, disk: f32) -> FixedProbe {
        FixedProbe {
            cpu: Ok(cpu),
            mem: Ok(mem),
            disk: Ok(disk),
        }
    }

    #[test]
    fn test_sample_reads_all_enabled_metrics() {
        let mut sampler = MetricsSampler::new(Box::new(probe(12.5, 40.0, 75.0)), &SystemConfig::default());
        let now = Local::now();

        let sample = sampler.sample(now);
        assert_eq!(sample.cpu_percent, Some(12.5));
        assert_eq!(sample.mem_percent, Some(40.0));
        assert_eq!(sample.disk_percent, Some(75.0));
        assert_eq!(sample.timestamp, now);
        assert_eq!(sampler.failures(), 0);
    }

    #[test]
    fn test_failed_reading_is_unavailable_for_that_metric_only() {
        let mut fixed = probe(10.0, 20.0, 30.0);
        fixed.disk = Err(SampleReadError::MountNotFound(Utf8PathBuf::from("/")));
        let mut sampler = MetricsSampler::new(Box::new(fixed), &SystemConfig::default());

        let sample = sampler.sample(Local::now());
        assert_eq!(sample.cpu_percent, Some(10.0));
        assert_eq!(sample.disk_percent, None);
        assert_eq!(sampler.failures(), 1);
    }

    #[test]
    fn test_readings_are_kept_in_percentage_range() {
        let mut sampler = MetricsSampler::new(Box::new(probe(100.4, f32::NAN, -1.0)), &SystemConfig::default());

        let sample = sampler.sample(Local::now());
        assert_eq!(sample.cpu_percent, Some(100.0));
        assert_eq!(sample.mem_percent, None);
        assert_eq!(sample.disk_percent, Some(0.0));
    }

    #[test]
    fn test_disabled_metrics_are_not_read() {
        let mut config = SystemConfig::default();
        config.display_info.disk_space = false;
        let mut sampler = MetricsSampler::new(Box::new(probe(1.0, 2.0, 3.0)), &config);

        let sample = sampler.sample(Local::now());
        assert_eq!(sample.disk_percent, None);
        assert_eq!(sampler.failures(), 0);
    }
}
