//! Managed application subsystem.
//!
//! # Data Flow
//! ```text
//! ServiceLifecycle::start
//!     → ManagedApps::start_all (awaited to completion)
//!     → listeners open
//!
//! ServiceLifecycle::stop
//!     → listeners close
//!     → ManagedApps::stop_all (awaited to completion)
//! ```
//!
//! # Design Decisions
//! - The returned future is the completion signal; it resolves exactly once
//! - Failures surface as `DependencyLifecycleError`, never silently ignored
//! - No timeout: a hung start/stop blocks the owning service unit

pub mod process;

use futures_util::future::{self, BoxFuture};

pub use process::ProcessManager;

/// Failure of the managed application subsystem to start or stop.
#[derive(Debug, thiserror::Error)]
pub enum DependencyLifecycleError {
    #[error("failed to spawn managed app {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to stop managed app {name}: {source}")]
    Stop {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("managed apps failed: {0}")]
    Other(String),
}

/// The external process manager whose start/stop brackets the listeners.
pub trait ManagedApps: Send + Sync {
    /// Start every managed application. Resolves once all of them are up.
    fn start_all(&self) -> BoxFuture<'_, Result<(), DependencyLifecycleError>>;

    /// Stop every managed application. Resolves once all of them are gone.
    fn stop_all(&self) -> BoxFuture<'_, Result<(), DependencyLifecycleError>>;
}

/// A subsystem with nothing to manage.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoManagedApps;

impl ManagedApps for NoManagedApps {
    fn start_all(&self) -> BoxFuture<'_, Result<(), DependencyLifecycleError>> {
        Box::pin(future::ready(Ok(())))
    }

    fn stop_all(&self) -> BoxFuture<'_, Result<(), DependencyLifecycleError>> {
        Box::pin(future::ready(Ok(())))
    }
}
