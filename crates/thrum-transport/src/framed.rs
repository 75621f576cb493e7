//! Length-prefixed TCP transport using `tokio-util`'s `LengthDelimitedCodec`.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{Framed, LengthDelimitedCodec, LengthDelimitedCodecError};

use crate::{ConnectionId, Service, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Default largest frame accepted in either direction: 16 MiB.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// Framing settings shared by clients and listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramedConfig {
    /// Largest frame body, excluding the 4-byte prefix.
    pub max_frame_length: usize,
    /// Sets `TCP_NODELAY` on every socket.
    pub nodelay: bool,
}

impl Default for FramedConfig {
    fn default() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            nodelay: true,
        }
    }
}

impl FramedConfig {
    fn codec(&self) -> LengthDelimitedCodec {
        LengthDelimitedCodec::builder()
            .length_field_length(4)
            .big_endian()
            .max_frame_length(self.max_frame_length)
            .new_codec()
    }

    fn framed(&self, stream: TcpStream) -> Framed<TcpStream, LengthDelimitedCodec> {
        if self.nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(error = %e, "failed to set TCP_NODELAY");
            }
        }
        Framed::new(stream, self.codec())
    }
}

fn next_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

fn receive_error(e: std::io::Error, max: usize) -> TransportError {
    let too_large = e
        .get_ref()
        .is_some_and(|inner| inner.is::<LengthDelimitedCodecError>());
    if too_large {
        TransportError::FrameTooLarge { max }
    } else {
        TransportError::ReceiveFailed(e)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Depth of the queue between callers and the connection task.
const COMMAND_QUEUE: usize = 64;

/// A framed TCP connection used as a client [`Transport`].
///
/// The socket is owned by a background task. Requests are written in the
/// order calls reach it and replies are handed back in the same order,
/// which is the order a framed server answers in. A call dropped while
/// its reply is still in flight doesn't shift later replies: the task
/// reads that reply and discards it.
pub struct FramedClient {
    id: ConnectionId,
    peer: SocketAddr,
    commands: mpsc::Sender<Command>,
}

/// What callers ask the connection task to do.
enum Command {
    /// Write `request`, then deliver the next unclaimed reply to `reply`.
    Call {
        request: Bytes,
        reply: oneshot::Sender<Result<Bytes, TransportError>>,
    },
    /// Write `request` and expect no reply.
    Send {
        request: Bytes,
        written: oneshot::Sender<Result<(), TransportError>>,
    },
}

impl FramedClient {
    /// Connects to `addr` and starts the connection task.
    pub async fn connect(addr: &str, config: &FramedConfig) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::ConnectFailed)?;
        let peer = stream.peer_addr().map_err(TransportError::ConnectFailed)?;
        let id = next_id();
        tracing::debug!(%id, %peer, "connected");

        let (commands, inbound) = mpsc::channel(COMMAND_QUEUE);
        let task = ClientTask {
            id,
            peer,
            max_frame_length: config.max_frame_length,
            framed: config.framed(stream),
            inbound,
            pending: VecDeque::new(),
        };
        tokio::spawn(task.run());

        Ok(Self { id, peer, commands })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn closed(&self) -> TransportError {
        TransportError::ConnectionClosed(format!("{} to {} is closed", self.id, self.peer))
    }
}

impl Transport for FramedClient {
    async fn call(&self, request: Bytes) -> Result<Bytes, TransportError> {
        let (reply, replied) = oneshot::channel();
        self.commands
            .send(Command::Call { request, reply })
            .await
            .map_err(|_| self.closed())?;
        replied.await.map_err(|_| self.closed())?
    }

    async fn send(&self, request: Bytes) -> Result<(), TransportError> {
        let (written, done) = oneshot::channel();
        self.commands
            .send(Command::Send { request, written })
            .await
            .map_err(|_| self.closed())?;
        done.await.map_err(|_| self.closed())?
    }
}

/// Owns the client socket: writes queued requests and pairs incoming
/// frames with the calls waiting for them, oldest first.
struct ClientTask {
    id: ConnectionId,
    peer: SocketAddr,
    max_frame_length: usize,
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    inbound: mpsc::Receiver<Command>,
    pending: VecDeque<oneshot::Sender<Result<Bytes, TransportError>>>,
}

impl ClientTask {
    async fn run(mut self) {
        let failure = loop {
            tokio::select! {
                command = self.inbound.recv() => match command {
                    Some(command) => {
                        if let Err(e) = self.write(command).await {
                            break Some(e);
                        }
                    }
                    // Every handle is gone.
                    None => break None,
                },
                frame = self.framed.next() => match frame {
                    Some(Ok(frame)) => self.deliver(frame.freeze()),
                    Some(Err(e)) => break Some(receive_error(e, self.max_frame_length)),
                    None => {
                        break Some(TransportError::ConnectionClosed(format!(
                            "{} closed by {}",
                            self.id, self.peer
                        )));
                    }
                },
            }
        };

        if let Some(e) = &failure {
            tracing::debug!(id = %self.id, error = %e, pending = self.pending.len(), "client connection failed");
        }
        self.fail_pending(failure);
    }

    async fn write(&mut self, command: Command) -> Result<(), TransportError> {
        match command {
            Command::Call { request, reply } => match self.framed.send(request).await {
                Ok(()) => {
                    self.pending.push_back(reply);
                    Ok(())
                }
                Err(e) => {
                    let _ = reply.send(Err(TransportError::SendFailed(e)));
                    Err(self.broken())
                }
            },
            Command::Send { request, written } => match self.framed.send(request).await {
                Ok(()) => {
                    let _ = written.send(Ok(()));
                    Ok(())
                }
                Err(e) => {
                    let _ = written.send(Err(TransportError::SendFailed(e)));
                    Err(self.broken())
                }
            },
        }
    }

    fn deliver(&mut self, frame: Bytes) {
        match self.pending.pop_front() {
            Some(waiter) => {
                // The caller may have given up; its reply is dropped here.
                if waiter.send(Ok(frame)).is_err() {
                    tracing::debug!(id = %self.id, "reply for a cancelled call discarded");
                }
            }
            None => {
                tracing::warn!(id = %self.id, bytes = frame.len(), "unsolicited frame discarded");
            }
        }
    }

    fn broken(&self) -> TransportError {
        TransportError::ConnectionClosed(format!("{} to {} broke on write", self.id, self.peer))
    }

    /// Answers every waiting call once the connection is unusable. The
    /// first waiter gets the actual error, the rest a closed connection.
    fn fail_pending(&mut self, failure: Option<TransportError>) {
        let mut failure = failure;
        while let Some(waiter) = self.pending.pop_front() {
            let error = failure.take().unwrap_or_else(|| {
                TransportError::ConnectionClosed(format!("{} to {} is closed", self.id, self.peer))
            });
            let _ = waiter.send(Err(error));
        }
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Accepts framed TCP connections.
pub struct FramedListener {
    listener: TcpListener,
    config: FramedConfig,
}

impl FramedListener {
    /// Binds a listener to the given address.
    pub async fn bind(addr: &str, config: FramedConfig) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "framed transport listening");
        Ok(Self { listener, config })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }

    /// Waits for and accepts the next incoming connection.
    pub async fn accept(&self) -> Result<FramedConnection, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        let id = next_id();
        tracing::debug!(%id, %peer, "accepted framed connection");

        Ok(FramedConnection {
            id,
            peer,
            max_frame_length: self.config.max_frame_length,
            framed: self.config.framed(stream),
        })
    }
}

/// One accepted connection, served frame by frame.
pub struct FramedConnection {
    id: ConnectionId,
    peer: SocketAddr,
    max_frame_length: usize,
    framed: Framed<TcpStream, LengthDelimitedCodec>,
}

impl FramedConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Answers frames with `service` until the peer disconnects.
    ///
    /// An empty reply is not sent.
    ///
    /// A frame the service can't answer closes the connection; the error
    /// is logged, not returned, because the peer is the one at fault.
    pub async fn serve<S: Service>(mut self, service: Arc<S>) -> Result<(), TransportError> {
        while let Some(frame) = self.framed.next().await {
            let frame = frame.map_err(|e| receive_error(e, self.max_frame_length))?;

            let reply = match service.apply(frame.freeze()).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::debug!(id = %self.id, error = %e, "unanswerable frame, closing");
                    return Ok(());
                }
            };
            // Oneway requests are answered with nothing.
            if reply.is_empty() {
                continue;
            }

            self.framed
                .send(reply)
                .await
                .map_err(TransportError::SendFailed)?;
        }

        tracing::debug!(id = %self.id, peer = %self.peer, "connection closed by peer");
        Ok(())
    }
}
