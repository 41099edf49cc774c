//! Plain and TLS listeners serving the request pipeline.
//!
//! # Responsibilities
//! - Bind to configured address(es) before reporting success
//! - Serve the pipeline on a background task per listener
//! - Close every listener on `close_all`, never just one
//!
//! # Design Decisions
//! - At most one plain and one TLS listener; opening twice is rejected
//! - TLS material is read and checked before the socket is bound
//! - Drain of in-flight connections is left to axum-server's graceful shutdown

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use axum::Router;
use axum_server::Handle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::net::tls::{TlsError, TlsMaterial};

/// Which listener of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    Plain,
    Tls,
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerKind::Plain => f.write_str("http"),
            ListenerKind::Tls => f.write_str("https"),
        }
    }
}

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("{0} listener is already open")]
    AlreadyOpen(ListenerKind),
    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("no address found for {host}:{port}")]
    NoAddress { host: String, port: u16 },
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Tls(#[from] TlsError),
}

/// One bound listener and the task serving it.
pub struct ListenerHandle {
    kind: ListenerKind,
    local_addr: SocketAddr,
    handle: Handle,
    task: JoinHandle<std::io::Result<()>>,
}

impl ListenerHandle {
    pub fn kind(&self) -> ListenerKind {
        self.kind
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, let in-flight connections drain for `grace`, and wait for the task.
    async fn close(self, grace: Duration) {
        self.handle.graceful_shutdown(Some(grace));
        match self.task.await {
            Ok(Ok(())) => {
                tracing::info!(listener = %self.kind, address = %self.local_addr, "Listener closed")
            }
            Ok(Err(e)) => tracing::error!(
                listener = %self.kind,
                address = %self.local_addr,
                error = %e,
                "Listener stopped with error"
            ),
            Err(e) => tracing::error!(
                listener = %self.kind,
                address = %self.local_addr,
                error = %e,
                "Listener task failed"
            ),
        }
    }
}

/// The unit's plain and TLS listeners.
pub struct ListenerSet {
    plain: Option<ListenerHandle>,
    tls: Option<ListenerHandle>,
    grace: Duration,
}

impl ListenerSet {
    pub fn new(grace: Duration) -> Self {
        Self {
            plain: None,
            tls: None,
            grace,
        }
    }

    /// Bind the plain listener and start serving `handler` on it.
    pub async fn open_plain(
        &mut self,
        handler: Router,
        host: &str,
        port: u16,
    ) -> Result<SocketAddr, ListenerError> {
        if self.plain.is_some() {
            return Err(ListenerError::AlreadyOpen(ListenerKind::Plain));
        }

        let listener = bind(host, port).await?;
        let local_addr = local_addr(&listener)?;
        let handle = Handle::new();
        let server = axum_server::from_tcp(listener).handle(handle.clone());
        let task = tokio::spawn(async move { server.serve(handler.into_make_service()).await });

        tracing::info!(listener = %ListenerKind::Plain, address = %local_addr, "Listener bound");
        self.plain = Some(ListenerHandle {
            kind: ListenerKind::Plain,
            local_addr,
            handle,
            task,
        });
        Ok(local_addr)
    }

    /// Read TLS material, bind the TLS listener and start serving `handler` on it.
    pub async fn open_tls(
        &mut self,
        handler: Router,
        host: &str,
        port: u16,
        key_path: &Path,
        cert_path: &Path,
    ) -> Result<SocketAddr, ListenerError> {
        if self.tls.is_some() {
            return Err(ListenerError::AlreadyOpen(ListenerKind::Tls));
        }

        let material = TlsMaterial::read(key_path, cert_path)?;
        let tls_config = material.into_config().await?;

        let listener = bind(host, port).await?;
        let local_addr = local_addr(&listener)?;
        let handle = Handle::new();
        let server = axum_server::from_tcp_rustls(listener, tls_config).handle(handle.clone());
        let task = tokio::spawn(async move { server.serve(handler.into_make_service()).await });

        tracing::info!(listener = %ListenerKind::Tls, address = %local_addr, "Listener bound");
        self.tls = Some(ListenerHandle {
            kind: ListenerKind::Tls,
            local_addr,
            handle,
            task,
        });
        Ok(local_addr)
    }

    /// Close every open listener. A no-op when none are open.
    pub async fn close_all(&mut self) {
        // Both handles leave the set before either close is awaited.
        let plain = self.plain.take();
        let tls = self.tls.take();

        if let Some(listener) = plain {
            listener.close(self.grace).await;
        }
        if let Some(listener) = tls {
            listener.close(self.grace).await;
        }
    }

    pub fn plain_addr(&self) -> Option<SocketAddr> {
        self.plain.as_ref().map(ListenerHandle::local_addr)
    }

    pub fn tls_addr(&self) -> Option<SocketAddr> {
        self.tls.as_ref().map(ListenerHandle::local_addr)
    }

    pub fn is_empty(&self) -> bool {
        self.plain.is_none() && self.tls.is_none()
    }
}

async fn bind(host: &str, port: u16) -> Result<std::net::TcpListener, ListenerError> {
    let addr = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| ListenerError::Resolve {
            host: host.to_string(),
            port,
            source,
        })?
        .next()
        .ok_or_else(|| ListenerError::NoAddress {
            host: host.to_string(),
            port,
        })?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Bind { addr, source })?;

    // into_std keeps the socket non-blocking, as axum-server expects.
    listener
        .into_std()
        .map_err(|source| ListenerError::Bind { addr, source })
}

fn local_addr(listener: &std::net::TcpListener) -> Result<SocketAddr, ListenerError> {
    listener.local_addr().map_err(|source| ListenerError::Bind {
        addr: SocketAddr::from(([0, 0, 0, 0], 0)),
        source,
    })
}
