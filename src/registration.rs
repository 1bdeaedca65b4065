use crate::config::Config;
use crate::host::HostIdentity;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("mothership unreachable at {url} - check your internet connection: {source}")]
    Unreachable {
        url: String,
        source: reqwest::Error,
    },
    #[error("mothership status check at {url} answered {status}")]
    StatusCheck { url: String, status: StatusCode },
    #[error("could not encode registration payload: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("unable to register this machine ({status}): {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("registration reply from {url} could not be read: {source}")]
    Body {
        url: String,
        source: reqwest::Error,
    },
}

/// Opaque value returned by the mothership on successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationToken(pub String);

/// Everything the mothership learns about this agent at startup.
#[derive(Debug, Serialize)]
pub struct RegistrationRequest<'a> {
    pub configuration: &'a Config,
    pub mothership_url: &'a str,
    pub register_uri: &'a str,
    pub version: &'a str,
    pub collect_frequency: u64,
    pub report_frequency: u64,
    pub hostname: &'a str,
    pub ip_address: String,
    pub log_file: &'a str,
    pub config_file: &'a str,
}

impl<'a> RegistrationRequest<'a> {
    pub fn new(
        config: &'a Config,
        host: &'a HostIdentity,
        version: &'a str,
        log_file: &'a str,
        config_file: &'a str,
    ) -> Self {
        Self {
            configuration: config,
            mothership_url: &config.mothership.url,
            register_uri: &config.mothership.register_uri,
            version,
            collect_frequency: config.settings.reporting.collect_interval_secs,
            report_frequency: config.settings.reporting.report_every_n_collections,
            hostname: &host.hostname,
            ip_address: host.ip_address.to_string(),
            log_file,
            config_file,
        }
    }
}

/// Probes the mothership before anything else talks to it.
pub async fn check_status(client: &Client, url: &str) -> Result<(), RegistrationError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| RegistrationError::Unreachable {
            url: url.to_string(),
            source,
        })?;
    let status = response.status();
    if !status.is_success() {
        return Err(RegistrationError::StatusCheck {
            url: url.to_string(),
            status,
        });
    }
    Ok(())
}

pub async fn register(
    client: &Client,
    url: &str,
    request: &RegistrationRequest<'_>,
) -> Result<RegistrationToken, RegistrationError> {
    let body = serde_json::to_vec(request).map_err(RegistrationError::Encode)?;
    let response = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
        .map_err(|source| RegistrationError::Unreachable {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RegistrationError::Rejected { status, body });
    }

    let text = response
        .text()
        .await
        .map_err(|source| RegistrationError::Body {
            url: url.to_string(),
            source,
        })?;
    Ok(RegistrationToken(text.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::build_client;
    use crate::testing::spawn_server;
    use axum::body::Bytes;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use axum::Router;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config() -> Config {
        serde_json::from_str(
            r#"{"identification": {
                "account_id": "A1",
                "organization_id": "O1",
                "organization_name": "Acme",
                "machine_nickname": "web-01"
            }}"#,
        )
        .unwrap()
    }

    fn host() -> HostIdentity {
        HostIdentity {
            hostname: "web-01.local".to_string(),
            ip_address: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)),
        }
    }

    #[tokio::test]
    async fn register_posts_payload_and_returns_token() {
        let received = Arc::new(Mutex::new(serde_json::Value::Null));
        let sink = received.clone();
        let app = Router::new().route(
            "/register/1.0.1",
            post(move |body: Bytes| {
                let sink = sink.clone();
                async move {
                    *sink.lock().unwrap() = serde_json::from_slice(&body).unwrap_or_default();
                    "token-123\n"
                }
            }),
        );
        let base = spawn_server(app).await;
        let cfg = config();
        let host = host();
        let request = RegistrationRequest::new(
            &cfg,
            &host,
            "1.0.1",
            "/var/log/sphire-sse.log",
            "/etc/sse/config.json",
        );

        let token = register(
            &build_client("1.0.1"),
            &format!("{base}/register/1.0.1"),
            &request,
        )
        .await
        .unwrap();

        assert_eq!(token, RegistrationToken("token-123".to_string()));
        let payload = received.lock().unwrap().clone();
        assert_eq!(payload["version"], "1.0.1");
        assert_eq!(payload["hostname"], "web-01.local");
        assert_eq!(payload["ip_address"], "10.0.0.7");
        assert_eq!(payload["collect_frequency"], 1);
        assert_eq!(payload["report_frequency"], 2);
        assert_eq!(payload["register_uri"], "/register");
        assert_eq!(payload["configuration"]["identification"]["account_id"], "A1");
        assert_eq!(payload["config_file"], "/etc/sse/config.json");
    }

    #[tokio::test]
    async fn rejected_registration_carries_body() {
        let app = Router::new().route(
            "/register/1.0.1",
            post(|| async { (AxumStatus::FORBIDDEN, "unknown account") }),
        );
        let base = spawn_server(app).await;
        let cfg = config();
        let host = host();
        let request = RegistrationRequest::new(&cfg, &host, "1.0.1", "log", "cfg");

        let err = register(
            &build_client("1.0.1"),
            &format!("{base}/register/1.0.1"),
            &request,
        )
        .await
        .unwrap_err();

        match err {
            RegistrationError::Rejected { status, body } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(body, "unknown account");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    /// True once `raw` holds the request head and its full declared body.
    fn request_complete(raw: &[u8]) -> bool {
        let Some(head_end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let head = String::from_utf8_lossy(&raw[..head_end]);
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() >= head_end + 4 + length
    }

    /// Answers one request with a 200 that declares 100 body bytes, sends 3,
    /// then closes.
    async fn truncated_reply_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            while !request_complete(&raw) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\nabc")
                .await
                .unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn truncated_registration_reply_is_an_error() {
        let base = truncated_reply_server().await;
        let cfg = config();
        let host = host();
        let request = RegistrationRequest::new(&cfg, &host, "1.0.1", "log", "cfg");

        let err = register(
            &build_client("1.0.1"),
            &format!("{base}/register/1.0.1"),
            &request,
        )
        .await
        .unwrap_err();

        assert!(
            matches!(err, RegistrationError::Body { .. }),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn status_check_requires_success() {
        let app = Router::new()
            .route("/status", get(|| async { "ok" }))
            .route(
                "/down",
                get(|| async { AxumStatus::INTERNAL_SERVER_ERROR }),
            );
        let base = spawn_server(app).await;
        let client = build_client("1.0.1");

        check_status(&client, &format!("{base}/status")).await.unwrap();
        let err = check_status(&client, &format!("{base}/down"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::StatusCheck { .. }));
    }
}
