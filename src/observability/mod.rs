//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → profiler.rs (sampled per-request timings for the app API)
//!     → metrics.rs (Prometheus exposition of profiler samples)
//! ```
//!
//! # Design Decisions
//! - Access logging is the pipeline's TraceLayer, not a custom stage
//! - Profiling is opt-in; the stage is absent from the pipeline when disabled

pub mod logging;
pub mod metrics;
pub mod profiler;

pub use logging::init_logging;
pub use profiler::{MetricsSink, ProfileSample, ProfileSink, Profiler, APP_API_PATTERN};
