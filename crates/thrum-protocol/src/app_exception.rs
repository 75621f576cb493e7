//! The application exception carried by EXCEPTION frames.
//!
//! When a server can't produce a REPLY (unknown method, bad args, a
//! handler fault) it answers with an EXCEPTION message whose body is this
//! struct: `{1: string message, 2: i32 type}`.

use std::fmt;

use crate::{
    FieldSpec, ProtocolReader, ProtocolWriter, Requiredness, Result,
    StructKind, StructSpec, TType, ThriftStruct, TypeSpec, read_struct,
    write_field, write_struct,
};

/// The error code of an [`ApplicationException`].
///
/// Codes a peer sends that we don't know are kept as [`Other`](Self::Other)
/// so they round-trip unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ApplicationExceptionKind {
    #[default]
    Unknown,
    UnknownMethod,
    InvalidMessageType,
    WrongMethodName,
    BadSequenceId,
    MissingResult,
    InternalError,
    ProtocolError,
    InvalidTransform,
    InvalidProtocol,
    UnsupportedClientType,
    Other(i32),
}

impl ApplicationExceptionKind {
    pub fn from_i32(code: i32) -> Self {
        match code {
            0 => Self::Unknown,
            1 => Self::UnknownMethod,
            2 => Self::InvalidMessageType,
            3 => Self::WrongMethodName,
            4 => Self::BadSequenceId,
            5 => Self::MissingResult,
            6 => Self::InternalError,
            7 => Self::ProtocolError,
            8 => Self::InvalidTransform,
            9 => Self::InvalidProtocol,
            10 => Self::UnsupportedClientType,
            other => Self::Other(other),
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::UnknownMethod => 1,
            Self::InvalidMessageType => 2,
            Self::WrongMethodName => 3,
            Self::BadSequenceId => 4,
            Self::MissingResult => 5,
            Self::InternalError => 6,
            Self::ProtocolError => 7,
            Self::InvalidTransform => 8,
            Self::InvalidProtocol => 9,
            Self::UnsupportedClientType => 10,
            Self::Other(code) => code,
        }
    }

    /// A short snake_case label, used as a stats category.
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::UnknownMethod => "unknown_method",
            Self::InvalidMessageType => "invalid_message_type",
            Self::WrongMethodName => "wrong_method_name",
            Self::BadSequenceId => "bad_sequence_id",
            Self::MissingResult => "missing_result",
            Self::InternalError => "internal_error",
            Self::ProtocolError => "protocol_error",
            Self::InvalidTransform => "invalid_transform",
            Self::InvalidProtocol => "invalid_protocol",
            Self::UnsupportedClientType => "unsupported_client_type",
            Self::Other(_) => "other",
        }
    }
}

impl fmt::Display for ApplicationExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(code) => write!(f, "{code}"),
            kind => f.write_str(&kind.label().to_ascii_uppercase()),
        }
    }
}

/// A transport-level failure reported by the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, thiserror::Error)]
#[error("application exception ({kind}): {message}")]
pub struct ApplicationException {
    pub kind: ApplicationExceptionKind,
    pub message: String,
}

pub static APPLICATION_EXCEPTION_SPEC: StructSpec = StructSpec {
    name: "TApplicationException",
    kind: StructKind::Exception,
    fields: &[
        FieldSpec {
            id: 1,
            name: "message",
            ty: TypeSpec::String,
            requiredness: Requiredness::Optional,
        },
        FieldSpec {
            id: 2,
            name: "type",
            ty: TypeSpec::I32,
            requiredness: Requiredness::Optional,
        },
    ],
};

impl ApplicationException {
    pub fn new(kind: ApplicationExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The server has no handler for `method`.
    pub fn unknown_method(method: &str) -> Self {
        Self::new(
            ApplicationExceptionKind::UnknownMethod,
            format!("Invalid method name: '{method}'"),
        )
    }

    /// A non-void `method` replied with no success and no declared
    /// exception.
    pub fn missing_result(method: &str) -> Self {
        Self::new(
            ApplicationExceptionKind::MissingResult,
            format!("{method} failed: unknown result"),
        )
    }

    /// The reply to a `method` call named a different method.
    pub fn wrong_method_name(method: &str, got: &str) -> Self {
        Self::new(
            ApplicationExceptionKind::WrongMethodName,
            format!("{method} failed: wrong method name '{got}'"),
        )
    }

    /// The reply to a `method` call carried another call's sequence id.
    pub fn bad_sequence_id(method: &str) -> Self {
        Self::new(
            ApplicationExceptionKind::BadSequenceId,
            format!("{method} failed: out of sequence response"),
        )
    }

    pub fn invalid_message_type(message: impl Into<String>) -> Self {
        Self::new(ApplicationExceptionKind::InvalidMessageType, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ApplicationExceptionKind::InternalError, message)
    }

    pub fn protocol_error(message: impl Into<String>) -> Self {
        Self::new(ApplicationExceptionKind::ProtocolError, message)
    }
}

impl ThriftStruct for ApplicationException {
    fn spec() -> &'static StructSpec {
        &APPLICATION_EXCEPTION_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, APPLICATION_EXCEPTION_SPEC.name, |out| {
            write_field(out, 1, &self.message)?;
            write_field(out, 2, &self.kind.as_i32())
        })
    }

    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let mut ex = Self::default();
        read_struct(input, |input, field| match field.id {
            1 if field.ttype == TType::String => {
                ex.message = input.read_string()?;
                Ok(())
            }
            2 if TType::I32.accepts(field.ttype) => {
                ex.kind = ApplicationExceptionKind::from_i32(input.read_i32()?);
                Ok(())
            }
            _ => input.skip(field.ttype),
        })?;
        Ok(ex)
    }
}
