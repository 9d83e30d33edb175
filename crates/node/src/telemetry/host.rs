use sysinfo::System;

use super::TelemetryError;
use crate::types::{HostStats, round_to};

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Source of host CPU and memory usage
#[async_trait::async_trait]
pub trait HostProbe: Send + Sync {
    async fn sample(&self) -> Result<HostStats, TelemetryError>;
}

/// [`HostProbe`] reading the local machine through `sysinfo`
#[derive(Debug, Default)]
pub struct SysinfoProbe;

#[async_trait::async_trait]
impl HostProbe for SysinfoProbe {
    async fn sample(&self) -> Result<HostStats, TelemetryError> {
        tokio::task::spawn_blocking(|| {
            let mut system = System::new();

            // CPU usage is a delta between two refreshes
            system.refresh_cpu_usage();
            std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            system.refresh_cpu_usage();
            system.refresh_memory();

            host_stats(system.global_cpu_usage(), system.used_memory(), system.total_memory())
        })
        .await
        .map_err(|e| TelemetryError::HostStatsUnavailable(format!("sampling task failed: {e}")))?
    }
}

/// Convert raw readings (percent, bytes) into rounded [`HostStats`]
pub(crate) fn host_stats(
    cpu_percent: f32,
    used_bytes: u64,
    total_bytes: u64,
) -> Result<HostStats, TelemetryError> {
    if total_bytes == 0 {
        return Err(TelemetryError::HostStatsUnavailable("total memory reported as 0".to_string()));
    }

    Ok(HostStats {
        cpu_load_percent: round_to(f64::from(cpu_percent), 2),
        ram_used_gib: round_to(used_bytes as f64 / BYTES_PER_GIB, 2),
        ram_total_gib: round_to(total_bytes as f64 / BYTES_PER_GIB, 2),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_gib() {
        let gib = 1024 * 1024 * 1024;
        let stats = host_stats(12.345, 3 * gib + gib / 4, 16 * gib).unwrap();

        assert!((stats.cpu_load_percent - 12.35).abs() < 1e-9);
        assert!((stats.ram_used_gib - 3.25).abs() < 1e-9);
        assert!((stats.ram_total_gib - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_total_memory() {
        assert!(matches!(host_stats(1.0, 0, 0), Err(TelemetryError::HostStatsUnavailable(_))));
    }

    #[tokio::test]
    async fn test_sysinfo_probe_reads_host() {
        let stats = SysinfoProbe.sample().await.unwrap();

        assert!(stats.ram_total_gib > 0.0);
        assert!(stats.ram_used_gib <= stats.ram_total_gib);
        assert!((0.0..=100.0).contains(&stats.cpu_load_percent));
    }
}
