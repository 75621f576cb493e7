//! Unified error type for the thrum runtime.

use thrum_protocol::{ApplicationException, ProtocolError};
use thrum_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Per-call failures are typed ([`CallError`](crate::CallError)); this is
/// what setup and serving code returns. The `#[from]` attribute on each
/// variant auto-generates `From` impls, so the `?` operator converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ThrumError {
    /// A transport-level error (bind, connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, malformed frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An application exception reported by a peer.
    #[error(transparent)]
    Application(#[from] ApplicationException),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let thrum_err: ThrumError = err.into();
        assert!(matches!(thrum_err, ThrumError::Transport(_)));
        assert!(thrum_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::NegativeSize(-1);
        let thrum_err: ThrumError = err.into();
        assert!(matches!(thrum_err, ThrumError::Protocol(_)));
    }

    #[test]
    fn test_from_application_exception() {
        let err = ApplicationException::unknown_method("x");
        let thrum_err: ThrumError = err.into();
        assert!(thrum_err.to_string().contains("Invalid method name"));
    }
}
