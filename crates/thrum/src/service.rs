//! Server-side dispatch: one request frame in, one reply frame out.
//!
//! A [`ThriftService`] owns an immutable method-name → handler table, built
//! once by [`ServiceBuilder`] and shared by every connection. The flow for
//! each frame is:
//!   1. Read the message header (the only step whose failure drops the
//!      frame without a reply)
//!   2. Look up the handler; unknown names get UNKNOWN_METHOD
//!   3. Decode the args; failures get PROTOCOL_ERROR
//!   4. Run the handler and turn its outcome into a REPLY or EXCEPTION
//!
//! A ONEWAY request is never answered: every step above produces an empty
//! frame for it instead.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use thrum_protocol::{
    ApplicationException, Codec, MessageType, ProtocolError, ProtocolReader,
    ServiceSpec, TMessage, TType,
};
use thrum_transport::Service;

use crate::method::{DeclaredException, HandlerError, MethodResult, ThriftMethod};
use crate::stats::{MethodStats, NullStatsReceiver, ScopedStats, StatsReceiver};

/// What a handler produced: the reply frame and, for failed calls, the
/// stats category.
struct Dispatched {
    frame: Bytes,
    failure: Option<&'static str>,
}

/// A type-erased method handler: gets the whole frame, the offset of the
/// args struct and the already-read header.
type HandlerFn = Box<dyn Fn(Bytes, usize, TMessage) -> BoxFuture<'static, Dispatched> + Send + Sync>;

struct Handler {
    call: HandlerFn,
    stats: MethodStats,
}

/// Builds a [`ThriftService`] method by method.
///
/// Generated `register_*` functions add every method of a service; a
/// service that extends another registers its parent's methods first into
/// the same builder.
pub struct ServiceBuilder<C> {
    codec: Arc<C>,
    service_name: String,
    scope: ScopedStats,
    handlers: HashMap<&'static str, Handler>,
}

impl<C: Codec> ServiceBuilder<C> {
    pub fn new(codec: C, service_name: impl Into<String>) -> Self {
        let service_name = service_name.into();
        let scope = ScopedStats::new(Arc::new(NullStatsReceiver)).scope(&service_name);
        Self {
            codec: Arc::new(codec),
            service_name,
            scope,
            handlers: HashMap::new(),
        }
    }

    /// Counts requests under `<service_name>/<method>/...` in `stats`.
    ///
    /// Call before adding methods; handlers added earlier keep the
    /// previous receiver.
    pub fn stats(mut self, stats: Arc<dyn StatsReceiver>) -> Self {
        self.scope = ScopedStats::new(stats).scope(&self.service_name);
        self
    }

    /// Adds the handler for method `M`, replacing any earlier one.
    pub fn method<M, F, Fut>(mut self, handler: F) -> Self
    where
        M: ThriftMethod,
        F: Fn(M::Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<M::Success, HandlerError<M::Error>>> + Send + 'static,
    {
        let codec = Arc::clone(&self.codec);
        let handler = Arc::new(handler);

        let call: HandlerFn = Box::new(
            move |frame: Bytes, offset: usize, header: TMessage| -> BoxFuture<'static, Dispatched> {
                let codec = Arc::clone(&codec);
                let handler = Arc::clone(&handler);
                async move {
                    run_method::<M, C, F, Fut>(&*codec, &*handler, &frame[offset..], header).await
                }
                .boxed()
            },
        );

        self.handlers.insert(
            M::NAME,
            Handler {
                call,
                stats: MethodStats::new(&self.scope, M::NAME),
            },
        );
        self
    }

    /// Freezes the table.
    ///
    /// `spec` is checked against the table: a method it declares with no
    /// handler is logged, and answered with UNKNOWN_METHOD at runtime.
    pub fn build(self, spec: &'static ServiceSpec) -> ThriftService<C> {
        for method in spec.all_methods() {
            if !self.handlers.contains_key(method.name) {
                tracing::warn!(
                    service = %self.service_name,
                    method = method.name,
                    "no handler registered"
                );
            }
        }

        ThriftService {
            codec: self.codec,
            service_name: self.service_name,
            handlers: Arc::new(self.handlers),
        }
    }
}

/// Answers request frames for one service.
///
/// Cheap to clone; clones share the handler table.
pub struct ThriftService<C> {
    codec: Arc<C>,
    service_name: String,
    handlers: Arc<HashMap<&'static str, Handler>>,
}

impl<C> Clone for ThriftService<C> {
    fn clone(&self) -> Self {
        Self {
            codec: Arc::clone(&self.codec),
            service_name: self.service_name.clone(),
            handlers: Arc::clone(&self.handlers),
        }
    }
}

impl<C> fmt::Debug for ThriftService<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.handlers.keys().collect();
        methods.sort();
        f.debug_struct("ThriftService")
            .field("service_name", &self.service_name)
            .field("methods", &methods)
            .finish_non_exhaustive()
    }
}

impl<C: Codec> ThriftService<C> {
    pub fn builder(codec: C, service_name: impl Into<String>) -> ServiceBuilder<C> {
        ServiceBuilder::new(codec, service_name)
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Handles one request frame.
    ///
    /// ONEWAY requests always get an empty reply, whatever happened to
    /// them.
    ///
    /// # Errors
    /// Only if the message header can't be read. Every other failure is
    /// answered with an EXCEPTION frame.
    pub async fn handle(&self, frame: Bytes) -> Result<Bytes, ProtocolError> {
        let (header, offset) = {
            let mut input = self.codec.reader(&frame);
            let header = input.read_message_begin()?;
            (header, input.position())
        };

        if !matches!(header.kind, MessageType::Call | MessageType::Oneway) {
            tracing::debug!(
                service = %self.service_name,
                method = %header.name,
                kind = ?header.kind,
                "unexpected message type"
            );
            let ex = ApplicationException::invalid_message_type(format!(
                "{} expected CALL or ONEWAY, got {:?}",
                header.name, header.kind
            ));
            return Ok(exception_frame(&*self.codec, &header, &ex));
        }

        let Some(handler) = self.handlers.get(header.name.as_str()) else {
            tracing::debug!(
                service = %self.service_name,
                method = %header.name,
                seq_id = header.seq_id,
                "unknown method"
            );
            let mut input = self.codec.reader(&frame[offset..]);
            if let Err(e) = input.skip(TType::Struct) {
                tracing::debug!(error = %e, "failed to skip args of unknown method");
            }
            if header.kind == MessageType::Oneway {
                return Ok(Bytes::new());
            }
            let ex = ApplicationException::unknown_method(&header.name);
            return Ok(exception_frame(&*self.codec, &header, &ex));
        };

        handler.stats.requests.incr();
        let seq_id = header.seq_id;
        let oneway = header.kind == MessageType::Oneway;
        let dispatched = (handler.call)(frame, offset, header).await;
        handler.stats.record(dispatched.failure);

        if let Some(category) = dispatched.failure {
            tracing::debug!(service = %self.service_name, seq_id, oneway, category, "call failed");
        }
        // The caller of a oneway method reads nothing back, not even an
        // exception.
        if oneway {
            return Ok(Bytes::new());
        }
        Ok(dispatched.frame)
    }
}

impl<C: Codec> Service for ThriftService<C> {
    type Error = ProtocolError;

    async fn apply(&self, request: Bytes) -> Result<Bytes, ProtocolError> {
        self.handle(request).await
    }
}

// ---------------------------------------------------------------------------
// Per-method pipeline
// ---------------------------------------------------------------------------

async fn run_method<M, C, F, Fut>(codec: &C, handler: &F, args: &[u8], header: TMessage) -> Dispatched
where
    M: ThriftMethod,
    C: Codec,
    F: Fn(M::Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<M::Success, HandlerError<M::Error>>> + Send + 'static,
{
    let args = match codec.decode::<M::Args>(args) {
        Ok(args) => args,
        Err(e) => {
            tracing::debug!(method = M::NAME, error = %e, "failed to decode args");
            let ex = ApplicationException::protocol_error(e.to_string());
            return Dispatched {
                frame: exception_frame(codec, &header, &ex),
                failure: Some("protocol_error"),
            };
        }
    };

    let outcome = AssertUnwindSafe(async { handler(args).await })
        .catch_unwind()
        .await;

    let result = match outcome {
        Ok(Ok(value)) => M::Result::from_success(value),
        Ok(Err(HandlerError::Declared(e))) => {
            let category = e.exception_name();
            return match reply_frame::<M, C>(codec, &header, &M::Result::from_error(e)) {
                Ok(frame) => Dispatched {
                    frame,
                    failure: Some(category),
                },
                Err(dispatched) => dispatched,
            };
        }
        Ok(Err(HandlerError::Internal(message))) => {
            return internal_error(codec, &header, message);
        }
        Err(panic) => {
            let message = format!("handler panicked: {}", panic_message(&*panic));
            tracing::error!(method = M::NAME, %message, "handler panicked");
            return internal_error(codec, &header, message);
        }
    };

    match reply_frame::<M, C>(codec, &header, &result) {
        Ok(frame) => Dispatched {
            frame,
            failure: None,
        },
        Err(dispatched) => dispatched,
    }
}

fn reply_frame<M: ThriftMethod, C: Codec>(
    codec: &C,
    header: &TMessage,
    result: &M::Result,
) -> Result<Bytes, Dispatched> {
    let reply = TMessage::new(header.name.clone(), MessageType::Reply, header.seq_id);
    codec.encode_message(&reply, result).map_err(|e| {
        tracing::error!(method = M::NAME, error = %e, "failed to encode result");
        internal_error(codec, header, e.to_string())
    })
}

fn internal_error<C: Codec>(codec: &C, header: &TMessage, message: String) -> Dispatched {
    let ex = ApplicationException::internal_error(message);
    Dispatched {
        frame: exception_frame(codec, header, &ex),
        failure: Some("internal_error"),
    }
}

/// Encodes an EXCEPTION reply echoing the request's name and sequence id.
fn exception_frame<C: Codec>(codec: &C, header: &TMessage, ex: &ApplicationException) -> Bytes {
    let reply = TMessage::new(header.name.clone(), MessageType::Exception, header.seq_id);
    match codec.encode_message(&reply, ex) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode application exception");
            Bytes::new()
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
