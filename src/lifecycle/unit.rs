//! Composition root handed to the platform's process supervisor.

use std::sync::Arc;

use axum::Router;

use crate::apps::ManagedApps;
use crate::config::AppConfig;
use crate::http::pipeline::PipelineBuilder;
use crate::lifecycle::service::{BoundAddrs, LifecycleError, LifecycleState, ServiceLifecycle};

/// Notifications for the supervisor. Both default to doing nothing.
pub trait ServiceHooks: Send + Sync {
    fn started(&self, _unit: &str, _addrs: &BoundAddrs) {}
    fn stopped(&self, _unit: &str) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl ServiceHooks for NoHooks {}

/// Hooks that only log the transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogHooks;

impl ServiceHooks for LogHooks {
    fn started(&self, unit: &str, addrs: &BoundAddrs) {
        tracing::info!(unit, http = %addrs.plain, https = ?addrs.tls, "app service started");
    }

    fn stopped(&self, unit: &str) {
        tracing::info!(unit, "app service stopped");
    }
}

/// One app service unit: lifecycle plus the configuration it was built from.
pub struct ServiceUnit {
    config: Arc<AppConfig>,
    lifecycle: ServiceLifecycle,
    hooks: Arc<dyn ServiceHooks>,
}

impl ServiceUnit {
    pub fn new(config: Arc<AppConfig>, apps: Arc<dyn ManagedApps>, app_router: Router) -> Self {
        let pipeline = PipelineBuilder::new(Arc::clone(&config));
        let lifecycle = ServiceLifecycle::new(Arc::clone(&config), pipeline, apps, app_router);
        Self::with_lifecycle(config, lifecycle)
    }

    /// Build around a lifecycle assembled by the caller (e.g. a custom pipeline).
    pub fn with_lifecycle(config: Arc<AppConfig>, lifecycle: ServiceLifecycle) -> Self {
        Self {
            config,
            lifecycle,
            hooks: Arc::new(NoHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ServiceHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn unit_name(&self) -> &str {
        &self.config.unit.name
    }

    pub fn svc_type(&self) -> &str {
        &self.config.unit.svc_type
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn lifecycle(&self) -> &ServiceLifecycle {
        &self.lifecycle
    }

    pub async fn start(&mut self) -> Result<BoundAddrs, LifecycleError> {
        let addrs = self.lifecycle.start().await?;
        self.hooks.started(&self.config.unit.name, &addrs);
        Ok(addrs)
    }

    pub async fn stop(&mut self) -> Result<(), LifecycleError> {
        let result = self.lifecycle.stop().await;
        // Listeners are gone even if the managed apps failed to stop.
        if self.lifecycle.state() == LifecycleState::Stopped
            && !matches!(result, Err(LifecycleError::InvalidState { .. }))
        {
            self.hooks.stopped(&self.config.unit.name);
        }
        result
    }
}
