//! Serving a synchronous implementation through the async interface.
//!
//! Generated code implements each service's async trait for
//! `Blocking<T>` whenever `T` implements the service's synchronous `Iface`
//! trait. Every call runs on tokio's blocking pool, so a slow sync handler
//! never stalls the reactor.

use std::sync::Arc;

use crate::method::HandlerError;

/// Adapts a synchronous service implementation to the async one.
#[derive(Debug)]
pub struct Blocking<T> {
    inner: Arc<T>,
}

impl<T> Clone for Blocking<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> Blocking<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Runs `f` against the implementation on the blocking pool.
    ///
    /// A panic inside `f` becomes [`HandlerError::Internal`].
    pub async fn run<R, E, F>(&self, f: F) -> Result<R, HandlerError<E>>
    where
        R: Send + 'static,
        E: Send + 'static,
        F: FnOnce(&T) -> Result<R, HandlerError<E>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        match tokio::task::spawn_blocking(move || f(&inner)).await {
            Ok(result) => result,
            Err(e) => Err(HandlerError::internal(format!("blocking handler failed: {e}"))),
        }
    }
}
