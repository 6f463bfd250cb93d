//! Time utilities for the client loop

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Client start time, used when the host exposes no uptime of its own
static CLIENT_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize client start time (call once at startup)
pub fn init_client_time() {
    CLIENT_START.get_or_init(Instant::now);
}

/// Seconds since `init_client_time` was first called
pub fn process_uptime_secs() -> u64 {
    CLIENT_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Frame rate of the simulation loop
pub const TICKS_PER_SECOND: u32 = 60;
pub const DEFAULT_TICK_MILLIS: u64 = 1_000 / TICKS_PER_SECOND as u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_millis_is_monotonic_enough() {
        let a = unix_millis();
        std::thread::sleep(Duration::from_millis(2));
        assert!(unix_millis() > a);
    }

    #[test]
    fn uptime_starts_near_zero() {
        init_client_time();
        assert!(process_uptime_secs() < 5);
    }
}
