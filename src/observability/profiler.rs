//! Request profiling stage.
//!
//! # Responsibilities
//! - Match request paths against the profiled API pattern
//! - Sample a fraction of matching requests
//! - Hand each sample to a [`ProfileSink`] (metrics by default)

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use regex::Regex;

/// Paths of the app service API that are profiled.
pub const APP_API_PATTERN: &str = r"^/webida/api/app/[^/]*";

/// One profiled request.
#[derive(Debug, Clone)]
pub struct ProfileSample {
    pub unit_name: Arc<str>,
    pub svc_type: Arc<str>,
    /// The portion of the path matched by the pattern.
    pub endpoint: String,
    pub method: Method,
    pub status: StatusCode,
    pub elapsed: Duration,
}

/// Receiver of profile samples.
pub trait ProfileSink: Send + Sync {
    fn record(&self, sample: &ProfileSample);
}

/// Records samples through the `metrics` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSink;

impl ProfileSink for MetricsSink {
    fn record(&self, sample: &ProfileSample) {
        let labels = [
            ("unit", sample.unit_name.to_string()),
            ("svc_type", sample.svc_type.to_string()),
            ("endpoint", sample.endpoint.clone()),
            ("method", sample.method.to_string()),
            ("status", sample.status.as_u16().to_string()),
        ];
        metrics::counter!("app_profiled_requests_total", &labels).increment(1);
        metrics::histogram!("app_profiled_request_duration_seconds", &labels)
            .record(sample.elapsed.as_secs_f64());
    }
}

/// Profiling middleware state, built once per pipeline.
#[derive(Clone)]
pub struct Profiler {
    unit_name: Arc<str>,
    svc_type: Arc<str>,
    pattern: Regex,
    sample_rate: f64,
    sink: Arc<dyn ProfileSink>,
}

impl Profiler {
    pub fn new(
        unit_name: &str,
        svc_type: &str,
        pattern: Regex,
        sample_rate: f64,
        sink: Arc<dyn ProfileSink>,
    ) -> Self {
        Self {
            unit_name: Arc::from(unit_name),
            svc_type: Arc::from(svc_type),
            pattern,
            sample_rate,
            sink,
        }
    }

    /// The matched endpoint if `path` is profiled and this request is sampled.
    fn select(&self, path: &str) -> Option<String> {
        let endpoint = self.pattern.find(path)?.as_str().to_string();
        if self.sample_rate >= 1.0 || fastrand::f64() < self.sample_rate {
            Some(endpoint)
        } else {
            None
        }
    }
}

pub async fn profile_requests(
    State(profiler): State<Profiler>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(endpoint) = profiler.select(req.uri().path()) else {
        return next.run(req).await;
    };

    let method = req.method().clone();
    let start = Instant::now();
    let response = next.run(req).await;

    profiler.sink.record(&ProfileSample {
        unit_name: profiler.unit_name.clone(),
        svc_type: profiler.svc_type.clone(),
        endpoint,
        method,
        status: response.status(),
        elapsed: start.elapsed(),
    });
    response
}
