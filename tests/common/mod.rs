//! Shared utilities for the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use app_service::apps::{DependencyLifecycleError, ManagedApps};
use app_service::config::AppConfig;
use app_service::lifecycle::{BoundAddrs, ServiceHooks};
use futures_util::future::BoxFuture;

/// Shared, ordered log of lifecycle events.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// A managed-app subsystem that records calls and, when given a probe
/// address, whether anything was listening there at the time.
#[derive(Clone, Default)]
pub struct RecordingApps {
    pub log: EventLog,
    pub probe: Option<SocketAddr>,
    pub fail_start: bool,
    pub fail_stop: bool,
}

impl RecordingApps {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    async fn probe_state(&self) -> &'static str {
        match self.probe {
            Some(addr) => match tokio::net::TcpStream::connect(addr).await {
                Ok(_) => "listening",
                Err(_) => "closed",
            },
            None => "unprobed",
        }
    }
}

impl ManagedApps for RecordingApps {
    fn start_all(&self) -> BoxFuture<'_, Result<(), DependencyLifecycleError>> {
        Box::pin(async move {
            // Yield a few times so a lifecycle that does not wait would race ahead.
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail_start {
                self.log.push("start_all:failed");
                return Err(DependencyLifecycleError::Other("app refused to start".into()));
            }
            let state = self.probe_state().await;
            self.log.push(format!("start_all:{state}"));
            Ok(())
        })
    }

    fn stop_all(&self) -> BoxFuture<'_, Result<(), DependencyLifecycleError>> {
        Box::pin(async move {
            let state = self.probe_state().await;
            self.log.push(format!("stop_all:{state}"));
            if self.fail_stop {
                return Err(DependencyLifecycleError::Other("app refused to stop".into()));
            }
            Ok(())
        })
    }
}

/// Hooks that append to the same event log.
pub struct RecordingHooks(pub EventLog);

impl ServiceHooks for RecordingHooks {
    fn started(&self, unit: &str, addrs: &BoundAddrs) {
        self.0.push(format!("started:{unit}:tls={}", addrs.tls.is_some()));
    }

    fn stopped(&self, unit: &str) {
        self.0.push(format!("stopped:{unit}"));
    }
}

/// Loopback config on an ephemeral port with a short drain period.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.server.http_host = "127.0.0.1".to_string();
    config.server.http_port = 0;
    config.server.shutdown_grace_secs = 1;
    config.domain = "webida.test".to_string();
    config
}

/// A port that was free a moment ago.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .danger_accept_invalid_certs(true)
        .build()
        .unwrap()
}

pub async fn is_listening(addr: SocketAddr) -> bool {
    tokio::net::TcpStream::connect(addr).await.is_ok()
}
