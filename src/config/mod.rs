//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → shared via Arc with the pipeline, listeners and lifecycle
//! ```
//!
//! # Design Decisions
//! - Config is immutable for the lifetime of the process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AppConfig, AppsConfig, DeployConfig, HostsConfig, LogFormat, LoggingConfig, ProcessConfig,
    ProfilerConfig, ServerConfig, TlsEndpoint, UnitConfig,
};
pub use validation::{validate_config, ValidationError};
