//! Fixtures shared by the unit tests.

use crate::cache::Identity;
use crate::collectors::{
    CpuStat, DisksStat, InterfaceStat, LoadAverage, MemoryStat, MetricSampler, NetworkStat,
    SampleError, SystemStat,
};
use axum::Router;
use tokio::net::TcpListener;

pub fn identity() -> Identity {
    Identity {
        account_id: "A1".to_string(),
        organization_id: "O1".to_string(),
        organization_name: "Acme".to_string(),
        machine_nickname: "web-01".to_string(),
    }
}

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn spawn_server(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

/// Deterministic sampler; `fail` names the families that should error.
#[derive(Default)]
pub struct FakeSampler {
    pub fail: Vec<&'static str>,
    pub calls: u32,
}

impl FakeSampler {
    fn check(&mut self, family: &'static str) -> Result<(), SampleError> {
        if family == "cpu" {
            self.calls += 1;
        }
        if self.fail.contains(&family) {
            return Err(SampleError::Unavailable {
                family,
                reason: "fake failure".to_string(),
            });
        }
        Ok(())
    }
}

impl MetricSampler for FakeSampler {
    fn cpu(&mut self) -> Result<CpuStat, SampleError> {
        self.check("cpu")?;
        Ok(CpuStat {
            brand: "Fake CPU".to_string(),
            vendor_id: "FakeVendor".to_string(),
            core_count: 2,
            physical_core_count: Some(1),
            usage_percent: f64::from(self.calls),
            per_core_usage_percent: vec![f64::from(self.calls); 2],
            frequency_mhz: 2400,
        })
    }

    fn disks(&mut self) -> Result<DisksStat, SampleError> {
        self.check("disks")?;
        Ok(DisksStat {
            total_bytes: 100,
            available_bytes: 40,
            used_bytes: 60,
            partitions: None,
        })
    }

    fn memory(&mut self) -> Result<MemoryStat, SampleError> {
        self.check("memory")?;
        Ok(MemoryStat {
            total_bytes: 1024,
            used_bytes: 512,
            available_bytes: 512,
            free_bytes: 256,
            swap_total_bytes: 0,
            swap_used_bytes: 0,
        })
    }

    fn network(&mut self) -> Result<NetworkStat, SampleError> {
        self.check("network")?;
        Ok(NetworkStat {
            interfaces: vec![InterfaceStat {
                iface: "eth0".to_string(),
                rx_bytes: 10,
                tx_bytes: 20,
                rx_bytes_total: 1000,
                tx_bytes_total: 2000,
                rx_packets_total: 5,
                tx_packets_total: 6,
                rx_errors_total: 0,
                tx_errors_total: 0,
            }],
        })
    }

    fn system(&mut self) -> Result<SystemStat, SampleError> {
        self.check("system")?;
        Ok(SystemStat {
            host_name: Some("fake-host".to_string()),
            os_name: Some("FakeOS".to_string()),
            os_version: Some("1".to_string()),
            kernel_version: None,
            uptime_seconds: 60,
            boot_time_unix: 0,
            load_average: LoadAverage {
                one: 0.1,
                five: 0.2,
                fifteen: 0.3,
            },
            process_count: 42,
            users: None,
        })
    }
}
