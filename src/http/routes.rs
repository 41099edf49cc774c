//! Built-in application routes.
//!
//! The real application router is supplied by the embedding platform; the
//! binary mounts this one so a bare unit still answers status probes.

use axum::{extract::State, response::Response, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::http::response::Senders;

#[derive(Debug, Serialize)]
pub struct UnitStatus {
    pub unit: String,
    pub svc_type: String,
    pub version: &'static str,
}

async fn get_status(State(config): State<Arc<AppConfig>>, senders: Senders) -> Response {
    senders.ok(UnitStatus {
        unit: config.unit.name.clone(),
        svc_type: config.unit.svc_type.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn status_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/webida/api/app/status", get(get_status))
        .with_state(config)
}
