//! Uniform response bodies and the terminal connection-error stage.
//!
//! # Responsibilities
//! - `Senders`: helpers handlers use to send `ok` / `failed` bodies
//! - `ServiceError`: per-request errors rendered into the same shape
//! - `handle_connect_errors`: rewrites connection failures reported by
//!   handlers into a uniform 503 instead of letting them escape
//! - `render_panic`: the uniform 500 for a handler that panicked

use std::any::Any;

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{request::Parts, HeaderName, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// Headers that would fingerprint the server technology.
pub const FINGERPRINT_HEADERS: [HeaderName; 2] = [
    axum::http::header::SERVER,
    HeaderName::from_static("x-powered-by"),
];

/// Per-request error rendered as a uniform `failed` body.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{message}")]
    Client { status: StatusCode, message: String },
    #[error("{0}")]
    Server(String),
    /// Terminal form of a connection failure, named by its target.
    #[error("service unavailable: {0}")]
    Unavailable(String),
    /// A sibling service or managed app could not be reached.
    #[error("connection to {target} failed: {reason}")]
    Connect { target: String, reason: String },
}

impl ServiceError {
    pub fn client(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Client {
            status,
            message: message.into(),
        }
    }

    pub fn connect(target: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Connect {
            target: target.into(),
            reason: err.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Client { status, .. } => *status,
            ServiceError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Connect { .. } | ServiceError::Unavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

/// Marker left on responses produced from `ServiceError::Connect`.
#[derive(Debug, Clone)]
pub struct ConnectFailure {
    pub target: String,
    pub reason: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let connect = match &self {
            ServiceError::Connect { target, reason } => Some(ConnectFailure {
                target: target.clone(),
                reason: reason.clone(),
            }),
            _ => None,
        };

        let mut response = (status, failed_body(&self)).into_response();
        if let Some(failure) = connect {
            response.extensions_mut().insert(failure);
        }
        response
    }
}

fn failed_body(err: &ServiceError) -> Json<serde_json::Value> {
    Json(json!({ "result": "failed", "reason": err.to_string() }))
}

/// Response helpers bound to the current request.
#[derive(Debug, Clone)]
pub struct Senders {
    method: Method,
    path: String,
}

impl Senders {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }

    /// `200 {"result":"ok","data":...}`
    pub fn ok<T: Serialize>(&self, data: T) -> Response {
        Json(json!({ "result": "ok", "data": data })).into_response()
    }

    /// Render `err` as a `failed` body and log it against this request.
    pub fn fail(&self, err: ServiceError) -> Response {
        let status = err.status();
        if status.is_server_error() {
            tracing::warn!(method = %self.method, path = %self.path, %status, error = %err, "Request failed");
        } else {
            tracing::debug!(method = %self.method, path = %self.path, %status, error = %err, "Request rejected");
        }
        err.into_response()
    }
}

impl<S> FromRequestParts<S> for Senders
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Senders>()
            .cloned()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "response helper stage missing"))
    }
}

pub async fn attach_senders(mut req: Request<Body>, next: Next) -> Response {
    let senders = Senders::new(req.method().clone(), req.uri().path());
    req.extensions_mut().insert(senders);
    next.run(req).await
}

pub async fn handle_connect_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;
    let Some(failure) = response.extensions().get::<ConnectFailure>().cloned() else {
        return response;
    };

    tracing::warn!(
        method = %method,
        path = %path,
        target = %failure.target,
        reason = %failure.reason,
        "Connection failure converted to 503"
    );

    let err = ServiceError::Unavailable(failure.target);
    let mut uniform = (err.status(), failed_body(&err)).into_response();
    uniform
        .headers_mut()
        .insert("retry-after", HeaderValue::from_static("1"));
    uniform
}

/// Response for a handler that panicked. The panic payload is logged, never sent.
pub fn render_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    tracing::error!(panic = detail, "Handler panicked");

    ServiceError::Server("internal server error".to_string()).into_response()
}

/// Drop headers that would reveal the server technology.
pub async fn strip_fingerprint(mut response: Response) -> Response {
    for name in &FINGERPRINT_HEADERS {
        response.headers_mut().remove(name);
    }
    response
}
