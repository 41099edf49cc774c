//! App service unit of the Webida platform.
//!
//! Wires the request pipeline, serves it on a plain and an optional TLS
//! listener, and brackets the listeners with the managed-app subsystem.

pub mod apps;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::AppConfig;
pub use http::PipelineBuilder;
pub use lifecycle::{ServiceLifecycle, ServiceUnit};
pub use net::ListenerSet;
