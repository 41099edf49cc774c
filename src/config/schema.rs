//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the app service unit.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the app service unit.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Identity of this unit inside the platform.
    pub unit: UnitConfig,

    /// Listener configuration (plain and TLS).
    pub server: ServerConfig,

    /// URLs of the sibling platform services.
    pub hosts: HostsConfig,

    /// Domain the service-location cookies are scoped to.
    pub domain: String,

    /// Whether the platform sits behind a reverse proxy (widens cookie scope to subdomains).
    pub use_reverse_proxy: bool,

    /// Deployment metadata advertised to clients.
    pub deploy: DeployConfig,

    /// Managed application processes.
    pub apps: AppsConfig,

    /// Request profiling.
    pub profiler: ProfilerConfig,

    /// Logging output.
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            unit: UnitConfig::default(),
            server: ServerConfig::default(),
            hosts: HostsConfig::default(),
            domain: "localhost".to_string(),
            use_reverse_proxy: false,
            deploy: DeployConfig::default(),
            apps: AppsConfig::default(),
            profiler: ProfilerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Domain attribute for service-location cookies.
    ///
    /// Behind a reverse proxy the cookie is made visible to every subdomain.
    pub fn cookie_domain(&self) -> String {
        if self.use_reverse_proxy {
            format!(".{}", self.domain)
        } else {
            self.domain.clone()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UnitConfig {
    pub name: String,
    pub svc_type: String,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            name: "app0".to_string(),
            svc_type: "app".to_string(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host the plain listener binds to.
    pub http_host: String,

    /// Port of the plain listener (0 picks an ephemeral port).
    pub http_port: u16,

    /// Host the TLS listener binds to.
    pub https_host: Option<String>,

    /// Port of the TLS listener.
    pub https_port: Option<u16>,

    /// Path to the private key file (PEM).
    pub ssl_key_path: Option<PathBuf>,

    /// Path to the certificate chain file (PEM).
    pub ssl_cert_path: Option<PathBuf>,

    /// Grace period for in-flight connections when a listener closes.
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_host: "0.0.0.0".to_string(),
            http_port: 5001,
            https_host: None,
            https_port: None,
            ssl_key_path: None,
            ssl_cert_path: None,
            shutdown_grace_secs: 10,
        }
    }
}

impl ServerConfig {
    /// TLS listener settings, present only when host and port are both configured.
    pub fn tls_endpoint(&self) -> Option<TlsEndpoint<'_>> {
        let host = self.https_host.as_deref()?;
        let port = self.https_port?;
        Some(TlsEndpoint {
            host,
            port,
            key_path: self.ssl_key_path.as_ref(),
            cert_path: self.ssl_cert_path.as_ref(),
        })
    }
}

/// Borrowed view of the TLS listener settings.
#[derive(Debug, Clone, Copy)]
pub struct TlsEndpoint<'a> {
    pub host: &'a str,
    pub port: u16,
    pub key_path: Option<&'a PathBuf>,
    pub cert_path: Option<&'a PathBuf>,
}

/// Sibling service URLs, advertised to the browser through cookies.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostsConfig {
    pub app: String,
    pub auth: String,
    pub fs: String,
    pub build: String,
    pub ntf: String,
    pub cors: String,
    pub conn: String,
    pub mon: String,
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            app: "http://localhost:5001".to_string(),
            auth: "http://localhost:5002".to_string(),
            fs: "http://localhost:5003".to_string(),
            build: "http://localhost:5004".to_string(),
            ntf: "http://localhost:5005".to_string(),
            cors: "http://localhost:5006".to_string(),
            conn: "http://localhost:5010".to_string(),
            mon: "http://localhost:5008".to_string(),
        }
    }
}

impl HostsConfig {
    /// (field name, url) pairs, in cookie order.
    pub fn entries(&self) -> [(&'static str, &str); 8] {
        [
            ("app", self.app.as_str()),
            ("auth", self.auth.as_str()),
            ("fs", self.fs.as_str()),
            ("build", self.build.as_str()),
            ("ntf", self.ntf.as_str()),
            ("cors", self.cors.as_str()),
            ("conn", self.conn.as_str()),
            ("mon", self.mon.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Deployment kind, e.g. "domain" or "path".
    #[serde(rename = "type")]
    pub kind: String,

    /// Path prefix deployed apps are served under.
    pub path_prefix: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            kind: "domain".to_string(),
            path_prefix: "-".to_string(),
        }
    }
}

/// Managed application processes.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppsConfig {
    /// Start every managed app before accepting connections.
    pub start_on_startup: bool,

    /// Processes launched by the process manager.
    pub processes: Vec<ProcessConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessConfig {
    /// Name used in logs.
    pub name: String,

    /// Executable to launch.
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Attach the profiling stage to the pipeline.
    pub enabled: bool,

    /// Fraction of matching requests that are recorded.
    pub sample_rate: f64,

    /// Address of the Prometheus scrape endpoint (e.g., "0.0.0.0:9100").
    pub metrics_address: Option<String>,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sample_rate: 1.0,
            metrics_address: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "app_service=info,tower_http=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
