//! The per-method contract between generated code and the RPC runtime.
//!
//! Every IDL method becomes a zero-sized type implementing [`ThriftMethod`].
//! It ties together the method's wire name, its args struct, its result
//! struct and the Rust types a caller sees: the success value and an enum
//! of the method's declared exceptions.

use std::fmt;

use thrum_protocol::ThriftStruct;

/// A service method.
pub trait ThriftMethod: Send + Sync + 'static {
    /// The name sent in the message header.
    const NAME: &'static str;

    /// Oneway methods send ONEWAY and don't wait for a result.
    const ONEWAY: bool = false;

    /// One required field per parameter.
    type Args: ThriftStruct + Send + Sync + 'static;

    /// Field 0 for the success value (absent for void methods), then one
    /// optional field per declared exception.
    type Result: ThriftStruct
        + MethodResult<Success = Self::Success, Error = Self::Error>
        + Default
        + Send
        + 'static;

    /// What a successful call returns; `()` for void methods.
    type Success: Send + 'static;

    /// The method's declared exceptions, or [`NoExceptions`].
    type Error: DeclaredException;
}

/// The outcome of a call, read from a result struct.
///
/// A result struct has at most one field set, so exactly one of these
/// applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<S, E> {
    Success(S),
    Declared(E),
    /// Neither success nor a declared exception on a non-void method.
    Missing,
}

/// Conversions between a result struct and an [`Outcome`].
pub trait MethodResult: Sized {
    type Success;
    type Error;

    fn from_success(value: Self::Success) -> Self;
    fn from_error(error: Self::Error) -> Self;

    /// The set field, if any. Void methods never report
    /// [`Outcome::Missing`]: an empty result means success.
    fn into_outcome(self) -> Outcome<Self::Success, Self::Error>;
}

/// The declared-exception enum of a method.
pub trait DeclaredException: std::error::Error + Send + Sync + 'static {
    /// IDL name of the exception held, used as a stats category.
    fn exception_name(&self) -> &'static str;
}

/// The error type of a method that declares no exceptions.
///
/// Uninhabited: a value of this type can never exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoExceptions {}

impl fmt::Display for NoExceptions {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl std::error::Error for NoExceptions {}

impl DeclaredException for NoExceptions {
    fn exception_name(&self) -> &'static str {
        match *self {}
    }
}

/// What a service handler fails with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerError<E> {
    /// One of the method's declared exceptions, sent back in a REPLY.
    Declared(E),
    /// Anything else, sent back as an INTERNAL_ERROR application
    /// exception carrying this message.
    Internal(String),
}

impl<E> HandlerError<E> {
    pub fn internal(message: impl fmt::Display) -> Self {
        Self::Internal(message.to_string())
    }
}

impl<E> From<E> for HandlerError<E> {
    fn from(error: E) -> Self {
        Self::Declared(error)
    }
}

impl<E: fmt::Display> fmt::Display for HandlerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declared(e) => write!(f, "{e}"),
            Self::Internal(message) => write!(f, "internal error: {message}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for HandlerError<E> {}
