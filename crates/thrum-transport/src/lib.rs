//! Transport abstraction layer for thrum.
//!
//! Provides the [`Transport`] trait (a client sends one request frame and
//! gets one reply frame back) and the [`Service`] trait (a server turns one
//! request frame into one reply frame), plus two implementations:
//!
//! - [`FramedClient`] / [`FramedListener`]: TCP with a 4-byte big-endian
//!   length prefix per frame, compatible with Thrift's `TFramedTransport`.
//! - [`Loopback`]: hands frames straight to an in-process [`Service`].
//!
//! Transports move opaque bytes. They don't look inside frames, so
//! sequence ids, method names and errors are the RPC layer's business.

mod error;
mod framed;
mod loopback;

pub use error::TransportError;
pub use framed::{FramedClient, FramedConfig, FramedConnection, FramedListener};
pub use loopback::Loopback;

use std::fmt;
use std::future::Future;

use bytes::Bytes;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The client side of a connection: one request frame in, one reply frame
/// out.
///
/// The returned future must be `Send` so calls can be driven from spawned
/// tasks. Dropping it does not retract a request that was already written.
pub trait Transport: Send + Sync + 'static {
    /// Sends `request` and waits for the matching reply frame.
    fn call(
        &self,
        request: Bytes,
    ) -> impl Future<Output = Result<Bytes, TransportError>> + Send;

    /// Sends a request that gets no reply (a ONEWAY message).
    ///
    /// Resolves once the frame is written. The default goes through
    /// [`call`](Self::call) and drops whatever comes back, which suits
    /// transports that answer every frame.
    fn send(
        &self,
        request: Bytes,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        async move { self.call(request).await.map(|_| ()) }
    }
}

/// The server side: turns a request frame into a reply frame.
///
/// An `Err` means the frame could not be answered at all; transports close
/// the connection it arrived on.
pub trait Service: Send + Sync + 'static {
    /// The error type for frames that can't be answered.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Handles one request frame.
    fn apply(
        &self,
        request: Bytes,
    ) -> impl Future<Output = Result<Bytes, Self::Error>> + Send;
}
