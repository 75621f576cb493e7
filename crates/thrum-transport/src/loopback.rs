//! In-memory transport.

use std::sync::Arc;

use bytes::Bytes;

use crate::{Service, Transport, TransportError};

/// A [`Transport`] that hands each request frame directly to a
/// [`Service`] in the same process.
///
/// Calls run concurrently; nothing is serialized on a connection. A frame
/// the service can't answer is reported the way a TCP peer closing the
/// connection would be.
pub struct Loopback<S> {
    service: Arc<S>,
}

impl<S: Service> Loopback<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }
}

impl<S> Clone for Loopback<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl<S: Service> Transport for Loopback<S> {
    async fn call(&self, request: Bytes) -> Result<Bytes, TransportError> {
        self.service
            .apply(request)
            .await
            .map_err(|e| TransportError::ConnectionClosed(e.to_string()))
    }
}
