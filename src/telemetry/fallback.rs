//! Best-effort stats from the local machine when the endpoint is unreachable

use std::fs;
use std::thread;

use crate::util::time::process_uptime_secs;

use super::snapshot::{CpuStats, GpuStats, MemoryStats, StatsSnapshot};

/// Build a snapshot from whatever the host exposes. GPU is never reported.
pub fn local_snapshot() -> StatsSnapshot {
    let cores = thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1);

    let loadavg = fs::read_to_string("/proc/loadavg")
        .ok()
        .and_then(|raw| parse_loadavg(&raw))
        .unwrap_or([0.0; 3]);

    let memory = fs::read_to_string("/proc/meminfo")
        .ok()
        .and_then(|raw| parse_meminfo(&raw))
        .unwrap_or_default();

    let uptime = fs::read_to_string("/proc/uptime")
        .ok()
        .and_then(|raw| parse_uptime(&raw))
        .unwrap_or_else(|| process_uptime_secs() as f64);

    let model = fs::read_to_string("/proc/cpuinfo")
        .ok()
        .and_then(|raw| parse_cpu_model(&raw))
        .unwrap_or_else(|| "unknown".to_string());

    StatsSnapshot {
        cpu: CpuStats {
            model,
            cores,
            loadavg,
        },
        memory,
        uptime,
        platform: platform_name(std::env::consts::OS).to_string(),
        arch: arch_name(std::env::consts::ARCH).to_string(),
        gpu: GpuStats {
            available: false,
            devices: Vec::new(),
        },
    }
}

/// First three fields of `/proc/loadavg`
pub fn parse_loadavg(raw: &str) -> Option<[f64; 3]> {
    let mut fields = raw.split_whitespace().map(str::parse::<f64>);
    let one = fields.next()?.ok()?;
    let five = fields.next()?.ok()?;
    let fifteen = fields.next()?.ok()?;
    Some([one, five, fifteen])
}

/// Total and available memory from `/proc/meminfo`, converted to bytes
pub fn parse_meminfo(raw: &str) -> Option<MemoryStats> {
    let mut total_kb = None;
    let mut available_kb = None;
    let mut free_kb = None;

    for line in raw.lines() {
        let mut parts = line.split_whitespace();
        let key = parts.next();
        let value = parts.next().and_then(|v| v.parse::<u64>().ok());
        match key {
            Some("MemTotal:") => total_kb = value,
            Some("MemAvailable:") => available_kb = value,
            Some("MemFree:") => free_kb = value,
            _ => {}
        }
    }

    let total = total_kb? * 1024;
    let free = available_kb.or(free_kb)? * 1024;
    let used = total.saturating_sub(free);
    let used_percent = if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    };

    Some(MemoryStats {
        total,
        free,
        used,
        used_percent,
    })
}

pub fn parse_uptime(raw: &str) -> Option<f64> {
    raw.split_whitespace().next()?.parse().ok()
}

pub fn parse_cpu_model(raw: &str) -> Option<String> {
    raw.lines()
        .find(|line| line.starts_with("model name"))
        .and_then(|line| line.split_once(':'))
        .map(|(_, model)| model.trim().to_string())
}

/// Platform names as the telemetry service reports them
fn platform_name(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}

fn arch_name(arch: &str) -> &str {
    match arch {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        "x86" => "ia32",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_snapshot_never_reports_gpu() {
        let snapshot = local_snapshot();
        assert!(!snapshot.gpu.available);
        assert!(snapshot.gpu.devices.is_empty());
        assert!(snapshot.cpu.cores >= 1);
        assert!(!snapshot.platform.is_empty());
    }

    #[test]
    fn parses_proc_loadavg() {
        assert_eq!(
            parse_loadavg("0.52 0.58 0.59 1/389 12345\n"),
            Some([0.52, 0.58, 0.59])
        );
        assert_eq!(parse_loadavg("garbage"), None);
    }

    #[test]
    fn parses_proc_meminfo() {
        let raw = "MemTotal:       16000000 kB\nMemFree:         2000000 kB\nMemAvailable:    4000000 kB\n";
        let memory = parse_meminfo(raw).unwrap();
        assert_eq!(memory.total, 16_000_000 * 1024);
        assert_eq!(memory.free, 4_000_000 * 1024);
        assert_eq!(memory.used, 12_000_000 * 1024);
        assert_eq!(memory.used_percent, 75.0);
    }

    #[test]
    fn meminfo_without_total_is_rejected() {
        assert!(parse_meminfo("MemFree: 10 kB\n").is_none());
    }

    #[test]
    fn parses_uptime_and_model() {
        assert_eq!(parse_uptime("350735.47 234388.90\n"), Some(350735.47));
        assert_eq!(
            parse_cpu_model("processor\t: 0\nmodel name\t: AMD Ryzen 7 5800X\n"),
            Some("AMD Ryzen 7 5800X".to_string())
        );
    }

    #[test]
    fn maps_rust_names_to_service_names() {
        assert_eq!(platform_name("macos"), "darwin");
        assert_eq!(platform_name("linux"), "linux");
        assert_eq!(arch_name("x86_64"), "x64");
        assert_eq!(arch_name("riscv64"), "riscv64");
    }
}
