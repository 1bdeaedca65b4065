use reqwest::Url;
use std::net::{IpAddr, SocketAddr};
use sysinfo::{System, SystemExt};
use thiserror::Error;
use tokio::net::{lookup_host, UdpSocket};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("invalid mothership url {url}: {reason}")]
    Url { url: String, reason: String },
    #[error("could not resolve {host}: {source}")]
    Resolve {
        host: String,
        source: std::io::Error,
    },
    #[error("no route to {addr}: {source}")]
    Route {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("IP address unattainable")]
    Unattainable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub hostname: String,
    pub ip_address: IpAddr,
}

impl HostIdentity {
    /// Hostname from the OS and the local address this host would use to
    /// reach the mothership.
    pub async fn discover(mothership_url: &str) -> Result<Self, HostError> {
        let ip_address = outbound_ip(mothership_url).await?;
        let hostname = System::new().host_name().unwrap_or_default();
        Ok(Self {
            hostname,
            ip_address,
        })
    }
}

async fn outbound_ip(mothership_url: &str) -> Result<IpAddr, HostError> {
    let url = Url::parse(mothership_url).map_err(|err| HostError::Url {
        url: mothership_url.to_string(),
        reason: err.to_string(),
    })?;
    let host = url.host_str().ok_or_else(|| HostError::Url {
        url: mothership_url.to_string(),
        reason: "missing host".to_string(),
    })?;
    let port = url.port_or_known_default().unwrap_or(80);

    let target = lookup_host((host, port))
        .await
        .map_err(|source| HostError::Resolve {
            host: host.to_string(),
            source,
        })?
        .next()
        .ok_or(HostError::Unattainable)?;

    // Connecting a UDP socket sends nothing; it only selects the route.
    let bind: SocketAddr = if target.is_ipv4() {
        SocketAddr::from(([0u8; 4], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };
    let route_err = |source| HostError::Route {
        addr: target,
        source,
    };
    let socket = UdpSocket::bind(bind).await.map_err(route_err)?;
    socket.connect(target).await.map_err(route_err)?;
    let local = socket.local_addr().map_err(route_err)?.ip();

    if local.is_unspecified() {
        return Err(HostError::Unattainable);
    }
    Ok(local)
}
