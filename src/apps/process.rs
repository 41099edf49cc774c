//! Child process manager for managed applications.
//!
//! # Responsibilities
//! - Spawn every configured app process on `start_all`
//! - Forward child stdout/stderr into the tracing stream
//! - Kill and reap every child on `stop_all`

use std::process::Stdio;

use futures_util::future::BoxFuture;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::apps::{DependencyLifecycleError, ManagedApps};
use crate::config::ProcessConfig;

struct RunningApp {
    name: String,
    child: Child,
}

/// Launches the configured processes as children of the service unit.
pub struct ProcessManager {
    processes: Vec<ProcessConfig>,
    running: Mutex<Vec<RunningApp>>,
}

impl ProcessManager {
    pub fn new(processes: Vec<ProcessConfig>) -> Self {
        Self {
            processes,
            running: Mutex::new(Vec::new()),
        }
    }

    /// Number of children currently owned by the manager.
    pub async fn running_count(&self) -> usize {
        self.running.lock().await.len()
    }

    fn spawn(config: &ProcessConfig) -> Result<RunningApp, DependencyLifecycleError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);

        if let Some(ref wd) = config.working_dir {
            cmd.current_dir(wd);
        }

        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| DependencyLifecycleError::Spawn {
            name: config.name.clone(),
            source,
        })?;

        if let Some(stdout) = child.stdout.take() {
            forward_output(config.name.clone(), "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_output(config.name.clone(), "stderr", stderr);
        }

        tracing::info!(app = %config.name, pid = ?child.id(), "Managed app spawned");
        Ok(RunningApp {
            name: config.name.clone(),
            child,
        })
    }

    async fn stop_running(running: &mut Vec<RunningApp>) -> Result<(), DependencyLifecycleError> {
        let mut first_error = None;

        for mut app in running.drain(..) {
            let result = match app.child.try_wait() {
                Ok(Some(status)) => {
                    tracing::debug!(app = %app.name, %status, "Managed app already exited");
                    Ok(())
                }
                _ => app.child.kill().await,
            };

            match result {
                Ok(()) => tracing::info!(app = %app.name, "Managed app stopped"),
                Err(source) => {
                    tracing::error!(app = %app.name, error = %source, "Failed to stop managed app");
                    if first_error.is_none() {
                        first_error = Some(DependencyLifecycleError::Stop {
                            name: app.name,
                            source,
                        });
                    }
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl ManagedApps for ProcessManager {
    fn start_all(&self) -> BoxFuture<'_, Result<(), DependencyLifecycleError>> {
        Box::pin(async move {
            let mut running = self.running.lock().await;

            for config in &self.processes {
                match Self::spawn(config) {
                    Ok(app) => running.push(app),
                    Err(e) => {
                        tracing::error!(app = %config.name, error = %e, "Managed app failed to start");
                        // Partial start is rolled back; the error from spawning wins.
                        let _ = Self::stop_running(&mut running).await;
                        return Err(e);
                    }
                }
            }

            tracing::info!(count = running.len(), "All managed apps started");
            Ok(())
        })
    }

    fn stop_all(&self) -> BoxFuture<'_, Result<(), DependencyLifecycleError>> {
        Box::pin(async move {
            let mut running = self.running.lock().await;
            let count = running.len();
            Self::stop_running(&mut running).await?;
            tracing::info!(count, "All managed apps stopped");
            Ok(())
        })
    }
}

fn forward_output<R>(name: String, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::info!(app = %name, stream, "{}", line);
        }
    });
}
