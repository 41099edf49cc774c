//! HTTP request pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! listener (plain or TLS)
//!     → pipeline.rs (ordered cross-cutting stages)
//!     → request.rs (parsed URL attached to the request)
//!     → cookies.rs (service-location cookies on the response)
//!     → response.rs (uniform bodies, connection-error handling)
//!     → application router
//! ```

pub mod cookies;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod routes;

pub use cookies::LocationCookies;
pub use pipeline::{PipelineBuilder, PipelineError};
pub use request::ParsedUrl;
pub use response::{Senders, ServiceError};
