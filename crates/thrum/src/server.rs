//! `ThriftServer` builder and accept loop.
//!
//! This is the entry point for serving a thrum service over TCP. It ties
//! the layers together: framed transport → service dispatch → handlers.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use thrum_transport::{FramedConfig, FramedListener, Service};

use crate::ThrumError;

/// Builder for configuring and starting a server.
///
/// # Example
///
/// ```rust,ignore
/// use thrum::prelude::*;
///
/// let server = ThriftServer::builder()
///     .bind("0.0.0.0:9090")
///     .build(service)
///     .await?;
/// server.run().await
/// ```
pub struct ThriftServerBuilder {
    bind_addr: String,
    framed_config: FramedConfig,
}

impl ThriftServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:9090".to_string(),
            framed_config: FramedConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the framing configuration.
    pub fn framed_config(mut self, config: FramedConfig) -> Self {
        self.framed_config = config;
        self
    }

    /// Binds the listener for `service`.
    pub async fn build<S: Service>(self, service: S) -> Result<ThriftServer<S>, ThrumError> {
        let listener = FramedListener::bind(&self.bind_addr, self.framed_config).await?;

        Ok(ThriftServer {
            listener,
            service: Arc::new(service),
        })
    }
}

impl Default for ThriftServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ThriftServer<S> {
    listener: FramedListener,
    service: Arc<S>,
}

impl ThriftServer<()> {
    /// Creates a new builder.
    pub fn builder() -> ThriftServerBuilder {
        ThriftServerBuilder::new()
    }
}

impl<S: Service> ThriftServer<S> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ThrumError> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs the server accept loop.
    ///
    /// Spawns a task per accepted connection. Runs until the process is
    /// terminated.
    pub async fn run(self) -> Result<(), ThrumError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// Connections already accepted keep being served by their tasks.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<(), ThrumError> {
        tracing::info!("thrum server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("thrum server shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => {
                        let service = Arc::clone(&self.service);
                        tokio::spawn(async move {
                            let id = conn.id();
                            if let Err(e) = conn.serve(service).await {
                                tracing::debug!(%id, error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }
    }
}
