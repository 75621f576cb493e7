//! The client side of an RPC: encode, send, decode, count.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use bytes::Bytes;
use thrum_protocol::{
    ApplicationException, Codec, MessageType, ProtocolError, ProtocolReader,
    ServiceSpec, TMessage, ThriftStruct,
};
use thrum_transport::{Transport, TransportError};

use crate::method::{DeclaredException, MethodResult, Outcome, ThriftMethod};
use crate::stats::{MethodStats, ScopedStats, StatsReceiver};

/// An error annotated with the name of the service that produced it.
///
/// The client attaches it to application exceptions and transport
/// failures, so a caller talking to several services can tell them apart.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{inner} (service: {service_name})")]
pub struct Sourced<T> {
    service_name: Arc<str>,
    #[source]
    inner: T,
}

impl<T> Sourced<T> {
    pub fn new(service_name: Arc<str>, inner: T) -> Self {
        Self {
            service_name,
            inner,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

/// Why a call failed.
#[derive(Debug, thiserror::Error)]
pub enum CallError<E> {
    /// The server answered with one of the method's declared exceptions.
    #[error(transparent)]
    Declared(E),

    /// The server answered with an EXCEPTION frame, or the reply held no
    /// result.
    #[error(transparent)]
    Application(Sourced<ApplicationException>),

    /// The request or reply never made it across.
    #[error(transparent)]
    Transport(Sourced<TransportError>),

    /// The request couldn't be encoded or the reply couldn't be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl<E: DeclaredException> CallError<E> {
    /// The `failures/<category>` stats label of this error.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Declared(e) => e.exception_name(),
            Self::Application(ex) => ex.inner().kind.label(),
            Self::Transport(e) => e.inner().label(),
            Self::Protocol(_) => "protocol",
        }
    }
}

impl<E> CallError<E> {
    /// The application exception, if the server sent one.
    pub fn application(&self) -> Option<&ApplicationException> {
        match self {
            Self::Application(ex) => Some(ex.inner()),
            _ => None,
        }
    }

    /// The declared exception, if the server sent one.
    pub fn declared(&self) -> Option<&E> {
        match self {
            Self::Declared(e) => Some(e),
            _ => None,
        }
    }
}

/// A typed RPC client over a [`Transport`].
///
/// Generated service clients wrap one of these and call
/// [`call`](Self::call) once per IDL method. Any number of calls may be in
/// flight at once; the only state they share is the sequence id counter
/// and the stats counters.
pub struct ThriftClient<T, C> {
    transport: T,
    codec: C,
    service_name: Arc<str>,
    stats: HashMap<&'static str, MethodStats>,
    unknown_stats: ScopedStats,
    next_seq_id: AtomicI32,
}

impl<T: Transport, C: Codec> ThriftClient<T, C> {
    /// Creates a client for `spec`'s methods (including inherited ones).
    ///
    /// `service_name` labels errors and is the first stats path segment.
    pub fn new(
        transport: T,
        codec: C,
        service_name: impl Into<String>,
        stats: Arc<dyn StatsReceiver>,
        spec: &'static ServiceSpec,
    ) -> Self {
        let service_name: Arc<str> = Arc::from(service_name.into());
        let scope = ScopedStats::new(stats).scope(&service_name);
        let stats = spec
            .all_methods()
            .into_iter()
            .map(|method| (method.name, MethodStats::new(&scope, method.name)))
            .collect();

        Self {
            transport,
            codec,
            service_name,
            stats,
            unknown_stats: scope,
            next_seq_id: AtomicI32::new(1),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Calls method `M` and waits for its outcome.
    ///
    /// Counts one request, then exactly one success or failure (plus the
    /// failure's category).
    pub async fn call<M: ThriftMethod>(&self, args: M::Args) -> Result<M::Success, CallError<M::Error>> {
        let stats = self.method_stats(M::NAME);
        stats.requests.incr();

        let result = self.dispatch::<M>(&args).await;

        match &result {
            Ok(_) => stats.record(None),
            Err(e) => {
                tracing::debug!(
                    service = %self.service_name,
                    method = M::NAME,
                    error = %e,
                    "call failed"
                );
                stats.record(Some(e.category()));
            }
        }
        result
    }

    fn method_stats(&self, method: &'static str) -> MethodStats {
        match self.stats.get(method) {
            Some(stats) => stats.clone(),
            None => MethodStats::new(&self.unknown_stats, method),
        }
    }

    fn next_seq_id(&self) -> i32 {
        self.next_seq_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn dispatch<M: ThriftMethod>(&self, args: &M::Args) -> Result<M::Success, CallError<M::Error>> {
        let seq_id = self.next_seq_id();
        let kind = if M::ONEWAY {
            MessageType::Oneway
        } else {
            MessageType::Call
        };
        let request = self
            .codec
            .encode_message(&TMessage::new(M::NAME, kind, seq_id), args)?;

        tracing::debug!(
            service = %self.service_name,
            method = M::NAME,
            seq_id,
            bytes = request.len(),
            "sending call"
        );

        let transport_error =
            |e: TransportError| CallError::Transport(Sourced::new(Arc::clone(&self.service_name), e));

        if M::ONEWAY {
            self.transport.send(request).await.map_err(transport_error)?;
            return self.resolve::<M>(M::Result::default());
        }

        let reply = self.transport.call(request).await.map_err(transport_error)?;
        self.decode_reply::<M>(&reply, seq_id)
    }

    /// Decodes the reply to the call of `M` sent with `seq_id`.
    ///
    /// A reply naming another method or carrying another sequence id
    /// belongs to a different call and is rejected before its body is read.
    fn decode_reply<M: ThriftMethod>(&self, reply: &Bytes, seq_id: i32) -> Result<M::Success, CallError<M::Error>> {
        let mut input = self.codec.reader(reply);
        let header = input.read_message_begin()?;

        if header.name != M::NAME {
            tracing::warn!(
                service = %self.service_name,
                method = M::NAME,
                got = %header.name,
                "reply names another method"
            );
            return Err(self.application(ApplicationException::wrong_method_name(M::NAME, &header.name)));
        }
        if header.seq_id != seq_id {
            tracing::warn!(
                service = %self.service_name,
                method = M::NAME,
                expected = seq_id,
                got = header.seq_id,
                "reply carries another sequence id"
            );
            return Err(self.application(ApplicationException::bad_sequence_id(M::NAME)));
        }

        match header.kind {
            MessageType::Reply => {
                let result = M::Result::read(&mut input)?;
                input.read_message_end()?;
                self.resolve::<M>(result)
            }
            MessageType::Exception => {
                let ex = ApplicationException::read(&mut input)?;
                input.read_message_end()?;
                Err(self.application(ex))
            }
            other => Err(self.application(ApplicationException::invalid_message_type(
                format!("{} failed: invalid message type {other:?}", M::NAME),
            ))),
        }
    }

    fn resolve<M: ThriftMethod>(&self, result: M::Result) -> Result<M::Success, CallError<M::Error>> {
        match result.into_outcome() {
            Outcome::Success(value) => Ok(value),
            Outcome::Declared(e) => Err(CallError::Declared(e)),
            Outcome::Missing => Err(self.application(ApplicationException::missing_result(M::NAME))),
        }
    }

    fn application<E>(&self, ex: ApplicationException) -> CallError<E> {
        CallError::Application(Sourced::new(Arc::clone(&self.service_name), ex))
    }
}

impl<T, C> fmt::Debug for ThriftClient<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThriftClient")
            .field("service_name", &self.service_name)
            .field("methods", &self.stats.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::InMemoryStatsReceiver;
    use crate::testing::{ECHO_SERVICE, Echo, EchoArgs, EchoResult};
    use thrum_protocol::{ApplicationExceptionKind, BinaryCodec};

    /// Answers every call with a fixed frame built from the request's
    /// header.
    struct Scripted<F>(F);

    impl<F> Transport for Scripted<F>
    where
        F: Fn(TMessage) -> Bytes + Send + Sync + 'static,
    {
        async fn call(&self, request: Bytes) -> Result<Bytes, TransportError> {
            let codec = BinaryCodec::default();
            let header = codec
                .reader(&request)
                .read_message_begin()
                .map_err(|e| TransportError::ConnectionClosed(e.to_string()))?;
            Ok((self.0)(header))
        }
    }

    fn client<F>(f: F) -> (ThriftClient<Scripted<F>, BinaryCodec>, Arc<InMemoryStatsReceiver>)
    where
        F: Fn(TMessage) -> Bytes + Send + Sync + 'static,
    {
        let stats = Arc::new(InMemoryStatsReceiver::new());
        let client = ThriftClient::new(
            Scripted(f),
            BinaryCodec::default(),
            "echo",
            stats.clone(),
            &ECHO_SERVICE,
        );
        (client, stats)
    }

    fn reply(header: TMessage, kind: MessageType, body: &impl ThriftStruct) -> Bytes {
        BinaryCodec::default()
            .encode_message(&TMessage::new(header.name, kind, header.seq_id), body)
            .unwrap()
    }

    fn args(msg: &str) -> EchoArgs {
        EchoArgs {
            msg: msg.to_string(),
        }
    }

    #[tokio::test]
    async fn test_success_counts_once() {
        let (client, stats) = client(|header| {
            reply(header, MessageType::Reply, &EchoResult {
                success: Some("hi".into()),
            })
        });

        assert_eq!(client.call::<Echo>(args("hi")).await.unwrap(), "hi");
        assert_eq!(stats.get("echo/echo/requests"), 1);
        assert_eq!(stats.get("echo/echo/success"), 1);
        assert_eq!(stats.get("echo/echo/failures"), 0);
    }

    #[tokio::test]
    async fn test_empty_result_is_missing_result() {
        let (client, stats) =
            client(|header| reply(header, MessageType::Reply, &EchoResult::default()));

        let err = client.call::<Echo>(args("x")).await.unwrap_err();
        let ex = err.application().unwrap();
        assert_eq!(ex.kind, ApplicationExceptionKind::MissingResult);
        assert_eq!(ex.message, "echo failed: unknown result");
        assert_eq!(stats.get("echo/echo/failures/missing_result"), 1);
    }

    #[tokio::test]
    async fn test_exception_frame_is_sourced() {
        let (client, _) = client(|header| {
            reply(
                header,
                MessageType::Exception,
                &ApplicationException::internal_error("boom"),
            )
        });

        let err = client.call::<Echo>(args("x")).await.unwrap_err();
        match err {
            CallError::Application(sourced) => {
                assert_eq!(sourced.service_name(), "echo");
                assert_eq!(sourced.inner().message, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unexpected_kind_is_invalid_message_type() {
        let (client, stats) = client(|header| {
            reply(header, MessageType::Call, &EchoResult::default())
        });

        let err = client.call::<Echo>(args("x")).await.unwrap_err();
        assert_eq!(
            err.application().map(|ex| ex.kind),
            Some(ApplicationExceptionKind::InvalidMessageType)
        );
        assert_eq!(stats.get("echo/echo/failures/invalid_message_type"), 1);
    }

    #[tokio::test]
    async fn test_truncated_reply_is_protocol_error() {
        let (client, stats) = client(|header| {
            let full = reply(header, MessageType::Reply, &EchoResult {
                success: Some("hi".into()),
            });
            full.slice(..full.len() - 1)
        });

        let err = client.call::<Echo>(args("x")).await.unwrap_err();
        assert!(matches!(err, CallError::Protocol(ProtocolError::Truncated { .. })));
        assert_eq!(stats.get("echo/echo/failures/protocol"), 1);
    }

    #[tokio::test]
    async fn test_reply_with_other_seq_id_is_rejected() {
        let (client, stats) = client(|header| {
            let stale = TMessage::new(header.name, MessageType::Reply, header.seq_id - 1);
            reply(stale, MessageType::Reply, &EchoResult {
                success: Some("old".into()),
            })
        });

        let err = client.call::<Echo>(args("new")).await.unwrap_err();
        let ex = err.application().unwrap();
        assert_eq!(ex.kind, ApplicationExceptionKind::BadSequenceId);
        assert_eq!(ex.message, "echo failed: out of sequence response");
        assert_eq!(stats.get("echo/echo/failures/bad_sequence_id"), 1);
        assert_eq!(stats.get("echo/echo/success"), 0);
    }

    #[tokio::test]
    async fn test_reply_for_other_method_is_rejected() {
        let (client, stats) = client(|header| {
            let other = TMessage::new("frob", MessageType::Exception, header.seq_id);
            reply(other, MessageType::Exception, &ApplicationException::unknown_method("frob"))
        });

        let err = client.call::<Echo>(args("x")).await.unwrap_err();
        assert_eq!(
            err.application().map(|ex| ex.kind),
            Some(ApplicationExceptionKind::WrongMethodName)
        );
        assert_eq!(stats.get("echo/echo/failures/wrong_method_name"), 1);
    }

    #[tokio::test]
    async fn test_sequence_ids_increase() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        let (client, _) = client(move |header| {
            record.lock().unwrap().push(header.seq_id);
            reply(header, MessageType::Reply, &EchoResult {
                success: Some(String::new()),
            })
        });

        for _ in 0..3 {
            client.call::<Echo>(args("")).await.unwrap();
        }
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }
}
