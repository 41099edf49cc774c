//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (service.rs):
//!     Assemble pipeline → [start managed apps] → open plain listener → [open TLS listener]
//!
//! Shutdown (service.rs):
//!     Close listeners → stop managed apps
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → stop the service unit
//! ```
//!
//! # Design Decisions
//! - Transitions are sequential and driven by `&mut self`; no locks needed
//! - Fail fast: a failed start leaves nothing bound and the unit `Stopped`
//! - Usage errors (double start/stop) are rejected, never ignored

pub mod service;
pub mod signals;
pub mod unit;

pub use service::{BoundAddrs, LifecycleError, LifecycleState, ServiceLifecycle};
pub use signals::shutdown_signal;
pub use unit::{LogHooks, NoHooks, ServiceHooks, ServiceUnit};
