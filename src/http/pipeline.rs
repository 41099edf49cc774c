//! Request pipeline assembly.
//!
//! # Stage order (outermost first)
//! ```text
//!  0. fingerprint stripping (Server / X-Powered-By never leave the process)
//!  1. response compression
//!  2. X-Frame-Options: SAMEORIGIN
//!  3. CORS policy
//!  4. access logging
//!  5. URL parsing
//!  6. service-location cookies
//!  7. request profiling (only when enabled)
//!  8. response helpers
//!  9. panic recovery (uniform 500)
//! 10. connection-error handler
//! 11. application router
//! ```
//!
//! Axum applies `.layer()` calls inside-out, so the stages are attached in
//! reverse. Building is pure assembly: nothing here performs I/O.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state, map_response},
    Router,
};
use regex::Regex;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::Level;

use crate::config::AppConfig;
use crate::http::cookies::{set_location_cookies, CookieError, LocationCookies};
use crate::http::request::parse_url;
use crate::http::response::{attach_senders, handle_connect_errors, render_panic, strip_fingerprint};
use crate::observability::profiler::{profile_requests, MetricsSink, ProfileSink, Profiler, APP_API_PATTERN};

/// Preflight cache lifetime advertised to browsers.
pub const CORS_MAX_AGE: Duration = Duration::from_secs(86_400);

/// Methods allowed cross-origin.
pub const CORS_METHODS: [Method; 3] = [Method::GET, Method::POST, Method::DELETE];

/// Request headers allowed cross-origin.
pub const CORS_REQUEST_HEADERS: [HeaderName; 7] = [
    header::AUTHORIZATION,
    header::ACCEPT,
    header::ACCEPT_LANGUAGE,
    header::CONTENT_LANGUAGE,
    header::CONTENT_TYPE,
    HeaderName::from_static("last-event-id"),
    HeaderName::from_static("x-requested-with"),
];

/// Error assembling the pipeline from configuration.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("service-location cookies: {0}")]
    Cookies(#[from] CookieError),
    #[error("invalid profiler path pattern: {0}")]
    ProfilePattern(#[from] regex::Error),
}

/// Builds the handler every listener of the unit serves.
pub struct PipelineBuilder {
    config: Arc<AppConfig>,
    profile_sink: Arc<dyn ProfileSink>,
}

impl PipelineBuilder {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            profile_sink: Arc::new(MetricsSink),
        }
    }

    /// Replace the default metrics-backed profile sink.
    pub fn with_profile_sink(mut self, sink: Arc<dyn ProfileSink>) -> Self {
        self.profile_sink = sink;
        self
    }

    /// Wrap `app` in the cross-cutting stages.
    pub fn build(&self, app: Router) -> Result<Router, PipelineError> {
        let config = &self.config;
        let cookies = LocationCookies::from_config(config)?;

        let mut router = app
            .layer(from_fn(handle_connect_errors))
            .layer(CatchPanicLayer::custom(render_panic))
            .layer(from_fn(attach_senders));

        if config.profiler.enabled {
            let profiler = Profiler::new(
                &config.unit.name,
                &config.unit.svc_type,
                Regex::new(APP_API_PATTERN)?,
                config.profiler.sample_rate,
                Arc::clone(&self.profile_sink),
            );
            router = router.layer(from_fn_with_state(profiler, profile_requests));
        }

        let router = router
            .layer(from_fn_with_state(cookies, set_location_cookies))
            .layer(from_fn(parse_url))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(LatencyUnit::Millis),
                    ),
            )
            .layer(cors_layer())
            .layer(SetResponseHeaderLayer::overriding(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("SAMEORIGIN"),
            ))
            .layer(CompressionLayer::new())
            .layer(map_response(strip_fingerprint));

        tracing::debug!(
            unit = %config.unit.name,
            profiler = config.profiler.enabled,
            "Request pipeline assembled"
        );
        Ok(router)
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(CORS_METHODS.to_vec())
        .allow_headers(CORS_REQUEST_HEADERS.to_vec())
        .allow_credentials(true)
        .max_age(CORS_MAX_AGE)
}
