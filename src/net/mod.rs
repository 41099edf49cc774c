//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ServiceLifecycle
//!     → listener.rs (bind plain / TLS, serve the pipeline, close)
//!     → tls.rs (read and check key/cert material before binding)
//! ```
//!
//! # Design Decisions
//! - Both listeners serve the same pipeline
//! - TLS is optional; it exists only when host and port are configured

pub mod listener;
pub mod tls;

pub use listener::{ListenerError, ListenerKind, ListenerSet};
pub use tls::{TlsError, TlsMaterial};
