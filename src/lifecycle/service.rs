//! Start/stop state machine of a service unit.
//!
//! ```text
//! Stopped ──start()──▶ Starting ──listeners bound──▶ Running
//!    ▲                    │ failure                     │
//!    └────────────────────┘                          stop()
//!    ▲                                                  ▼
//!    └──────────── stop-all done ◀── listeners closed ◀ Stopping
//! ```
//!
//! Ordering contract: managed apps finish starting before any listener
//! binds; listeners close before managed apps are asked to stop.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;

use crate::apps::{DependencyLifecycleError, ManagedApps};
use crate::config::AppConfig;
use crate::http::pipeline::{PipelineBuilder, PipelineError};
use crate::net::listener::{ListenerError, ListenerSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// `start` outside `Stopped` or `stop` outside `Running`.
    #[error("cannot {op} service unit while {state}")]
    InvalidState {
        op: &'static str,
        state: LifecycleState,
    },
    #[error("failed to assemble request pipeline: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("TLS listener configured without {0}")]
    MissingTlsMaterial(&'static str),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("managed apps: {0}")]
    Dependency(#[from] DependencyLifecycleError),
}

/// Addresses the unit is serving on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundAddrs {
    pub plain: SocketAddr,
    pub tls: Option<SocketAddr>,
}

pub struct ServiceLifecycle {
    config: Arc<AppConfig>,
    pipeline: PipelineBuilder,
    app_router: Router,
    apps: Arc<dyn ManagedApps>,
    listeners: ListenerSet,
    state: LifecycleState,
}

impl ServiceLifecycle {
    pub fn new(
        config: Arc<AppConfig>,
        pipeline: PipelineBuilder,
        apps: Arc<dyn ManagedApps>,
        app_router: Router,
    ) -> Self {
        let grace = std::time::Duration::from_secs(config.server.shutdown_grace_secs);
        Self {
            config,
            pipeline,
            app_router,
            apps,
            listeners: ListenerSet::new(grace),
            state: LifecycleState::Stopped,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    /// Start managed apps (if configured), then open the listeners.
    ///
    /// On failure every listener opened so far is closed again and the
    /// state returns to `Stopped`.
    pub async fn start(&mut self) -> Result<BoundAddrs, LifecycleError> {
        if self.state != LifecycleState::Stopped {
            return Err(LifecycleError::InvalidState {
                op: "start",
                state: self.state,
            });
        }

        self.state = LifecycleState::Starting;
        tracing::info!(unit = %self.config.unit.name, "Service unit starting");

        match self.run_start().await {
            Ok(addrs) => {
                self.state = LifecycleState::Running;
                tracing::info!(
                    unit = %self.config.unit.name,
                    http = %addrs.plain,
                    https = ?addrs.tls,
                    "Service unit running"
                );
                Ok(addrs)
            }
            Err(e) => {
                self.state = LifecycleState::Stopped;
                tracing::error!(unit = %self.config.unit.name, error = %e, "Service unit failed to start");
                Err(e)
            }
        }
    }

    async fn run_start(&mut self) -> Result<BoundAddrs, LifecycleError> {
        // Pure assembly; fails before any managed app is launched.
        let handler = self.pipeline.build(self.app_router.clone())?;

        let apps_started = self.config.apps.start_on_startup;
        if apps_started {
            self.apps.start_all().await?;
            tracing::info!(unit = %self.config.unit.name, "Started all managed apps");
        }

        match self.open_listeners(handler).await {
            Ok(addrs) => Ok(addrs),
            Err(e) => {
                self.listeners.close_all().await;
                if apps_started {
                    if let Err(stop_err) = self.apps.stop_all().await {
                        tracing::warn!(error = %stop_err, "Failed to stop managed apps after aborted start");
                    }
                }
                Err(e)
            }
        }
    }

    async fn open_listeners(&mut self, handler: Router) -> Result<BoundAddrs, LifecycleError> {
        let server = &self.config.server;

        let plain = self
            .listeners
            .open_plain(handler.clone(), &server.http_host, server.http_port)
            .await?;

        let tls = match server.tls_endpoint() {
            Some(endpoint) => {
                let key_path = endpoint
                    .key_path
                    .ok_or(LifecycleError::MissingTlsMaterial("ssl_key_path"))?;
                let cert_path = endpoint
                    .cert_path
                    .ok_or(LifecycleError::MissingTlsMaterial("ssl_cert_path"))?;
                let addr = self
                    .listeners
                    .open_tls(handler, endpoint.host, endpoint.port, key_path, cert_path)
                    .await?;
                Some(addr)
            }
            None => None,
        };

        Ok(BoundAddrs { plain, tls })
    }

    /// Close the listeners, then stop managed apps.
    pub async fn stop(&mut self) -> Result<(), LifecycleError> {
        if self.state != LifecycleState::Running {
            return Err(LifecycleError::InvalidState {
                op: "stop",
                state: self.state,
            });
        }

        self.state = LifecycleState::Stopping;
        tracing::info!(unit = %self.config.unit.name, "Service unit stopping");

        self.listeners.close_all().await;
        let result = self.apps.stop_all().await;
        self.state = LifecycleState::Stopped;

        match result {
            Ok(()) => {
                tracing::info!(unit = %self.config.unit.name, "Service unit stopped");
                Ok(())
            }
            Err(e) => {
                tracing::error!(unit = %self.config.unit.name, error = %e, "Managed apps failed to stop");
                Err(e.into())
            }
        }
    }
}
