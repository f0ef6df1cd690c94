//! Host resource sampling via sysinfo.

use std::thread;
use std::time::Duration;

use chrono::Utc;
use sysinfo::{ComponentExt, CpuExt, System, SystemExt};
use tracing::debug;
use uuid::Uuid;

use vitals_core::model::ResourceSample;

use crate::collector::SampleSource;

/// Substituted when no CPU temperature sensor is readable.
const FALLBACK_CPU_TEMP: f64 = 0.0;

/// CPU usage is a delta between two refreshes; this is the gap between them.
const CPU_SAMPLE_DELAY: Duration = Duration::from_millis(250);

pub struct ResourceSampler {
    sys: System,
    group_key: String,
}

impl ResourceSampler {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu();
        let group_key = derive_group_key(&sys);
        Self { sys, group_key }
    }

    /// Host identity attached to every sample, stable for the process
    /// lifetime.
    pub fn group_key(&self) -> &str {
        &self.group_key
    }

    fn cpu_usage(&mut self) -> f64 {
        self.sys.refresh_cpu();
        thread::sleep(CPU_SAMPLE_DELAY);
        self.sys.refresh_cpu();
        f64::from(self.sys.global_cpu_info().cpu_usage())
    }

    fn memory_usage(&mut self) -> f64 {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        if total == 0 {
            return 0.0;
        }
        self.sys.used_memory() as f64 / total as f64 * 100.0
    }

    /// Reads CPU temperature from hardware sensors.
    ///
    /// Prefers a CPU-labeled component, falls back to the hottest sensor,
    /// then to [`FALLBACK_CPU_TEMP`]. Never fails.
    fn cpu_temp(&mut self) -> f64 {
        self.sys.refresh_components_list();
        let components = self.sys.components();

        let cpu_sensor = components.iter().find(|c| {
            let label = c.label().to_ascii_lowercase();
            label.contains("cpu") || label.contains("core") || label.contains("package")
        });

        let temp = match cpu_sensor {
            Some(sensor) => Some(sensor.temperature()),
            None => components
                .iter()
                .map(ComponentExt::temperature)
                .fold(None, |hottest: Option<f32>, t| {
                    Some(hottest.map_or(t, |h| h.max(t)))
                }),
        };

        temp.map_or(FALLBACK_CPU_TEMP, f64::from)
    }
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for ResourceSampler {
    type Sample = ResourceSample;

    fn collect(&mut self) -> Option<ResourceSample> {
        let sample = ResourceSample {
            group_key: self.group_key.clone(),
            cpu_usage: self.cpu_usage(),
            memory_usage: self.memory_usage(),
            cpu_temp: self.cpu_temp(),
            timestamp: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        debug!(
            cpu = sample.cpu_usage,
            mem = sample.memory_usage,
            temp = sample.cpu_temp,
            "host sample gathered"
        );
        Some(sample)
    }
}

/// Host identity: hostname when available, otherwise a random id.
/// Derived once at sampler construction.
fn derive_group_key(sys: &System) -> String {
    sys.host_name()
        .unwrap_or_else(|| format!("host-{}", Uuid::new_v4()))
}
