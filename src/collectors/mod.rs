pub mod system;

use serde::Serialize;
use thiserror::Error;

/// One sampling routine per metric family. Each call reads current OS state
/// and either returns a value object or a tagged failure; none of them keep
/// scheduling state of their own.
pub trait MetricSampler {
    fn cpu(&mut self) -> Result<CpuStat, SampleError>;
    fn disks(&mut self) -> Result<DisksStat, SampleError>;
    fn memory(&mut self) -> Result<MemoryStat, SampleError>;
    fn network(&mut self) -> Result<NetworkStat, SampleError>;
    fn system(&mut self) -> Result<SystemStat, SampleError>;
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("{family} data unavailable: {reason}")]
    Unavailable {
        family: &'static str,
        reason: String,
    },
}

impl SampleError {
    pub fn family(&self) -> &'static str {
        match self {
            SampleError::Unavailable { family, .. } => *family,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CpuStat {
    pub brand: String,
    pub vendor_id: String,
    pub core_count: u32,
    pub physical_core_count: Option<u32>,
    pub usage_percent: f64,
    pub per_core_usage_percent: Vec<f64>,
    pub frequency_mhz: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisksStat {
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub used_bytes: u64,
    /// Only populated when partition data is enabled in the settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partitions: Option<Vec<PartitionStat>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartitionStat {
    pub name: String,
    pub mount: String,
    pub file_system: String,
    pub kind: String,
    pub removable: bool,
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub used_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryStat {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    pub free_bytes: u64,
    pub swap_total_bytes: u64,
    pub swap_used_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkStat {
    pub interfaces: Vec<InterfaceStat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterfaceStat {
    pub iface: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_bytes_total: u64,
    pub tx_bytes_total: u64,
    pub rx_packets_total: u64,
    pub tx_packets_total: u64,
    pub rx_errors_total: u64,
    pub tx_errors_total: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStat {
    pub host_name: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub kernel_version: Option<String>,
    pub uptime_seconds: u64,
    pub boot_time_unix: u64,
    pub load_average: LoadAverage,
    pub process_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}
