/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed by the peer, or the service behind an
    /// in-memory transport refused the frame.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Connecting to the remote address failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// Sending a frame failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// A frame's length prefix exceeded the configured maximum.
    #[error("frame exceeds maximum length of {max} bytes")]
    FrameTooLarge { max: usize },
}

impl TransportError {
    /// A short snake_case label, used as a stats category.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ConnectionClosed(_) => "connection_closed",
            Self::ConnectFailed(_) => "connect_failed",
            Self::SendFailed(_) => "send_failed",
            Self::ReceiveFailed(_) => "receive_failed",
            Self::AcceptFailed(_) => "accept_failed",
            Self::FrameTooLarge { .. } => "frame_too_large",
        }
    }
}
