use crate::collectors::{
    CpuStat, DisksStat, InterfaceStat, LoadAverage, MemoryStat, MetricSampler, NetworkStat,
    PartitionStat, SampleError, SystemStat,
};
use crate::config::SettingsConfig;
use crate::logging::{trace, Status};
use sysinfo::{CpuExt, DiskExt, NetworkExt, NetworksExt, System, SystemExt, UserExt};
use tracing::debug;

/// Samples the local host through `sysinfo`. The `System` handle is kept
/// between calls so CPU usage and network deltas are measured since the
/// previous sample.
pub struct SysinfoSampler {
    system: System,
    include_partition_data: bool,
    include_users: bool,
}

impl SysinfoSampler {
    pub fn new(settings: &SettingsConfig) -> Self {
        let mut system = System::new_all();
        system.refresh_cpu();
        Self {
            system,
            include_partition_data: settings.disk.include_partition_data,
            include_users: settings.system.include_users,
        }
    }
}

impl MetricSampler for SysinfoSampler {
    fn cpu(&mut self) -> Result<CpuStat, SampleError> {
        self.system.refresh_cpu();
        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return Err(SampleError::Unavailable {
                family: "cpu",
                reason: "no cpus reported".to_string(),
            });
        }

        let per_core_usage_percent: Vec<f64> = cpus.iter().map(|c| c.cpu_usage() as f64).collect();
        let usage_percent =
            per_core_usage_percent.iter().sum::<f64>() / per_core_usage_percent.len() as f64;
        let first = &cpus[0];

        Ok(CpuStat {
            brand: first.brand().trim().to_string(),
            vendor_id: first.vendor_id().to_string(),
            core_count: cpus.len() as u32,
            physical_core_count: self.system.physical_core_count().map(|n| n as u32),
            usage_percent: usage_percent.clamp(0.0, 100.0),
            per_core_usage_percent,
            frequency_mhz: first.frequency(),
        })
    }

    fn disks(&mut self) -> Result<DisksStat, SampleError> {
        self.system.refresh_disks_list();
        self.system.refresh_disks();

        let partitions: Vec<PartitionStat> = self
            .system
            .disks()
            .iter()
            .map(|d| {
                let total = d.total_space();
                let available = d.available_space();
                PartitionStat {
                    name: d.name().to_string_lossy().to_string(),
                    mount: d.mount_point().to_string_lossy().to_string(),
                    file_system: String::from_utf8_lossy(d.file_system()).to_string(),
                    kind: format!("{:?}", d.kind()),
                    removable: d.is_removable(),
                    total_bytes: total,
                    available_bytes: available,
                    used_bytes: total.saturating_sub(available),
                }
            })
            .collect();

        let total_bytes = partitions.iter().map(|p| p.total_bytes).sum();
        let available_bytes = partitions.iter().map(|p| p.available_bytes).sum();
        let used_bytes = partitions.iter().map(|p| p.used_bytes).sum();
        debug!(
            partitions = partitions.len(),
            "{}",
            trace("Disks sampled.", Status::Ok)
        );

        Ok(DisksStat {
            total_bytes,
            available_bytes,
            used_bytes,
            partitions: self.include_partition_data.then_some(partitions),
        })
    }

    fn memory(&mut self) -> Result<MemoryStat, SampleError> {
        self.system.refresh_memory();
        let total_bytes = self.system.total_memory();
        if total_bytes == 0 {
            return Err(SampleError::Unavailable {
                family: "memory",
                reason: "total memory reported as 0".to_string(),
            });
        }

        Ok(MemoryStat {
            total_bytes,
            used_bytes: self.system.used_memory(),
            available_bytes: self.system.available_memory(),
            free_bytes: self.system.free_memory(),
            swap_total_bytes: self.system.total_swap(),
            swap_used_bytes: self.system.used_swap(),
        })
    }

    fn network(&mut self) -> Result<NetworkStat, SampleError> {
        self.system.refresh_networks_list();
        self.system.refresh_networks();

        let mut interfaces: Vec<InterfaceStat> = self
            .system
            .networks()
            .iter()
            .map(|(name, data)| InterfaceStat {
                iface: name.clone(),
                rx_bytes: data.received(),
                tx_bytes: data.transmitted(),
                rx_bytes_total: data.total_received(),
                tx_bytes_total: data.total_transmitted(),
                rx_packets_total: data.total_packets_received(),
                tx_packets_total: data.total_packets_transmitted(),
                rx_errors_total: data.total_errors_on_received(),
                tx_errors_total: data.total_errors_on_transmitted(),
            })
            .collect();
        interfaces.sort_by(|a, b| a.iface.cmp(&b.iface));

        Ok(NetworkStat { interfaces })
    }

    fn system(&mut self) -> Result<SystemStat, SampleError> {
        self.system.refresh_processes();
        let users = if self.include_users {
            self.system.refresh_users_list();
            Some(
                self.system
                    .users()
                    .iter()
                    .map(|u| u.name().to_string())
                    .collect(),
            )
        } else {
            None
        };
        let load = self.system.load_average();

        Ok(SystemStat {
            host_name: self.system.host_name(),
            os_name: self.system.name(),
            os_version: self.system.os_version(),
            kernel_version: self.system.kernel_version(),
            uptime_seconds: self.system.uptime(),
            boot_time_unix: self.system.boot_time(),
            load_average: LoadAverage {
                one: load.one,
                five: load.five,
                fifteen: load.fifteen,
            },
            process_count: self.system.processes().len() as u64,
            users,
        })
    }
}
