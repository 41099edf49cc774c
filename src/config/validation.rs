//! Configuration validation.
//!
//! Semantic checks on top of what serde enforces. Every problem is reported,
//! not just the first, so a broken config file can be fixed in one pass.

use std::fmt;
use std::net::IpAddr;

use url::{Host, Url};

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.domain.trim().is_empty() {
        errors.push(ValidationError::new("domain", "must not be empty"));
    }

    for (name, value) in config.hosts.entries() {
        let field = format!("hosts.{name}");
        if value.trim().is_empty() {
            errors.push(ValidationError::new(field, "must not be empty"));
        } else if let Err(e) = Url::parse(value) {
            errors.push(ValidationError::new(field, format!("invalid url {value:?}: {e}")));
        }
    }

    let server = &config.server;
    if let Err(message) = check_listener_host(&server.http_host) {
        errors.push(ValidationError::new("server.http_host", message));
    }

    match (&server.https_host, server.https_port) {
        (Some(host), Some(_)) => {
            if let Err(message) = check_listener_host(host) {
                errors.push(ValidationError::new("server.https_host", message));
            }
            if server.ssl_key_path.is_none() {
                errors.push(ValidationError::new(
                    "server.ssl_key_path",
                    "required when the TLS listener is configured",
                ));
            }
            if server.ssl_cert_path.is_none() {
                errors.push(ValidationError::new(
                    "server.ssl_cert_path",
                    "required when the TLS listener is configured",
                ));
            }
        }
        (Some(_), None) => errors.push(ValidationError::new(
            "server.https_port",
            "https_host is set but https_port is missing",
        )),
        (None, Some(_)) => errors.push(ValidationError::new(
            "server.https_host",
            "https_port is set but https_host is missing",
        )),
        (None, None) => {}
    }

    if !(0.0..=1.0).contains(&config.profiler.sample_rate) {
        errors.push(ValidationError::new(
            "profiler.sample_rate",
            format!("must be within 0.0..=1.0, got {}", config.profiler.sample_rate),
        ));
    }

    for (i, process) in config.apps.processes.iter().enumerate() {
        if process.command.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("apps.processes[{i}].command"),
                format!("empty command for process {:?}", process.name),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A listener host is a bare IP (v4 or unbracketed v6) or a domain name.
fn check_listener_host(host: &str) -> Result<(), String> {
    if host.trim().is_empty() {
        return Err("must not be empty".to_string());
    }
    if host.parse::<IpAddr>().is_ok() {
        return Ok(());
    }
    Host::parse(host)
        .map(|_| ())
        .map_err(|e| format!("invalid host {host:?}: {e}"))
}
