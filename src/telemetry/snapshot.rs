//! Telemetry wire types and derived utilization percentages

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One stats reading from the telemetry endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub cpu: CpuStats,
    pub memory: MemoryStats,
    /// Host uptime in seconds
    #[serde(default)]
    pub uptime: f64,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub gpu: GpuStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub cores: u32,
    /// 1, 5 and 15 minute load averages
    #[serde(default)]
    pub loadavg: [f64; 3],
}

/// Memory figures in bytes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub free: u64,
    #[serde(default)]
    pub used: u64,
    #[serde(default)]
    pub used_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuStats {
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub devices: Vec<GpuDevice>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuDevice {
    #[serde(default)]
    pub name: String,
    /// Busy percentage, if the host reports one
    #[serde(default, alias = "utilizationGpu", alias = "load")]
    pub utilization: Option<f64>,
    #[serde(default)]
    pub memory_used: Option<u64>,
    #[serde(default)]
    pub memory_total: Option<u64>,
}

/// Percentages derived from a single snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UsageSample {
    pub cpu: f64,
    pub memory: f64,
    pub gpu: f64,
}

impl StatsSnapshot {
    /// One-minute load spread over all cores
    pub fn cpu_percent(&self) -> f64 {
        if self.cpu.cores == 0 {
            return 0.0;
        }
        clamp_percent(self.cpu.loadavg[0] / f64::from(self.cpu.cores) * 100.0)
    }

    pub fn memory_percent(&self) -> f64 {
        clamp_percent(self.memory.used_percent)
    }

    /// First device's utilization, zero when no GPU is reported
    pub fn gpu_percent(&self) -> f64 {
        if !self.gpu.available {
            return 0.0;
        }
        self.gpu
            .devices
            .first()
            .and_then(|device| device.utilization)
            .map(clamp_percent)
            .unwrap_or(0.0)
    }

    pub fn usage(&self) -> UsageSample {
        UsageSample {
            cpu: self.cpu_percent(),
            memory: self.memory_percent(),
            gpu: self.gpu_percent(),
        }
    }
}

/// Clamp to 0..=100, mapping NaN and infinities to zero
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// One row of the history endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(deserialize_with = "timestamp_from_millis_or_rfc3339")]
    pub timestamp: DateTime<Utc>,
    pub stats: StatsSnapshot,
}

/// History timestamps come either as unix milliseconds or ISO strings
fn timestamp_from_millis_or_rfc3339<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Millis(i64),
        Text(String),
    }

    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Millis(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {ms}"))),
        RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
pub(crate) fn sample_snapshot(load: f64, cores: u32, mem_percent: f64, gpu: Option<f64>) -> StatsSnapshot {
    StatsSnapshot {
        cpu: CpuStats {
            model: "Test CPU".to_string(),
            cores,
            loadavg: [load, load, load],
        },
        memory: MemoryStats {
            total: 16_000,
            free: 8_000,
            used: 8_000,
            used_percent: mem_percent,
        },
        uptime: 100.0,
        platform: "linux".to_string(),
        arch: "x64".to_string(),
        gpu: GpuStats {
            available: gpu.is_some(),
            devices: gpu
                .map(|utilization| {
                    vec![GpuDevice {
                        name: "Test GPU".to_string(),
                        utilization: Some(utilization),
                        ..Default::default()
                    }]
                })
                .unwrap_or_default(),
        },
    }
}
