use crate::collectors::{
    CpuStat, DisksStat, MemoryStat, MetricSampler, NetworkStat, SampleError, SystemStat,
};
use serde::{Serialize, Serializer};
use std::time::SystemTime;

/// One point-in-time bundle of every metric family. A family whose sampler
/// failed is `None` and goes over the wire as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub cpu: Option<CpuStat>,
    pub disks: Option<DisksStat>,
    pub memory: Option<MemoryStat>,
    pub network: Option<NetworkStat>,
    pub system: Option<SystemStat>,
    #[serde(rename = "system_time", serialize_with = "serialize_rfc3339")]
    pub captured_at: SystemTime,
}

impl Snapshot {
    /// Calls each sampler once. Failures never abort the build: the family is
    /// left empty and the error handed back for the caller to log.
    pub fn build<S: MetricSampler>(
        sampler: &mut S,
        captured_at: SystemTime,
    ) -> (Self, Vec<SampleError>) {
        let mut failures = Vec::new();
        let snapshot = Self {
            cpu: keep(sampler.cpu(), &mut failures),
            disks: keep(sampler.disks(), &mut failures),
            memory: keep(sampler.memory(), &mut failures),
            network: keep(sampler.network(), &mut failures),
            system: keep(sampler.system(), &mut failures),
            captured_at,
        };
        (snapshot, failures)
    }
}

fn keep<T>(result: Result<T, SampleError>, failures: &mut Vec<SampleError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            failures.push(err);
            None
        }
    }
}

fn serialize_rfc3339<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&humantime::format_rfc3339_seconds(*time))
}
