//! Error types for the protocol layer.
//!
//! Every failure that can happen while turning typed values into Thrift
//! bytes (or back) ends up as a [`ProtocolError`]. When you see one, you
//! know the problem is in the codec and not in the network or in a
//! service handler.

use std::string::FromUtf8Error;

/// The TProtocolException category an error belongs to.
///
/// Thrift peers report protocol failures with a small integer code. We
/// keep the same numbering so that an error message produced here means
/// the same thing to a Java or Python peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolErrorKind {
    Unknown = 0,
    InvalidData = 1,
    NegativeSize = 2,
    SizeLimit = 3,
    BadVersion = 4,
    NotImplemented = 5,
    DepthLimit = 6,
}

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The input ended before a value was fully read.
    ///
    /// This is always fatal: a truncated frame can never be decoded into
    /// a correct value, so decoding aborts instead of guessing.
    #[error("unexpected end of input: need {needed} bytes, have {remaining}")]
    Truncated { needed: usize, remaining: usize },

    /// A length or element count on the wire was negative.
    #[error("negative size: {0}")]
    NegativeSize(i32),

    /// A length or element count exceeded the configured limit.
    #[error("size {size} exceeds limit {limit}")]
    SizeLimit { size: usize, limit: usize },

    /// A strict message header carried an unknown version.
    #[error("bad version in message header: {0:#010x}")]
    BadVersion(u32),

    /// A non-strict message header was read with `strict_read` enabled.
    #[error("missing version in message header, old client?")]
    MissingVersion,

    /// A byte that should have been a wire type tag was not one.
    #[error("invalid type tag: {0}")]
    InvalidType(u8),

    /// A byte that should have been a message kind was not one.
    #[error("invalid message type: {0}")]
    InvalidMessageType(u8),

    /// A string field did not contain valid UTF-8.
    #[error("invalid UTF-8 in string: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),

    /// Skipping or decoding nested values went deeper than allowed.
    #[error("maximum nesting depth {0} exceeded")]
    DepthLimit(usize),

    /// A required field was never set (at decode completion, in a
    /// builder, or during pre-encode validation).
    #[error("Required field '{field}' was not found for struct {struct_name}")]
    RequiredFieldMissing {
        field: &'static str,
        struct_name: &'static str,
    },

    /// A union was read with no field set.
    #[error("Cannot read a TUnion with no set value! ({0})")]
    UnionNoValue(&'static str),

    /// A union was read with more than one field set.
    #[error("Cannot read a TUnion with more than one set value! ({0})")]
    UnionMultipleValues(&'static str),

    /// An enum value was read that has no matching declared variant.
    ///
    /// Struct and collection decoding never surface this: they treat an
    /// unknown value as "no value". It only comes out of a direct
    /// [`WireValue::read_value`](crate::WireValue::read_value) call.
    #[error("no matching {enum_name} value for {value}")]
    UnknownEnumValue {
        enum_name: &'static str,
        value: i32,
    },

    /// Any other structural problem with the data.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl ProtocolError {
    /// Returns the TProtocolException category for this error.
    pub fn kind(&self) -> ProtocolErrorKind {
        match self {
            ProtocolError::NegativeSize(_) => ProtocolErrorKind::NegativeSize,
            ProtocolError::SizeLimit { .. } => ProtocolErrorKind::SizeLimit,
            ProtocolError::BadVersion(_) | ProtocolError::MissingVersion => {
                ProtocolErrorKind::BadVersion
            }
            ProtocolError::DepthLimit(_) => ProtocolErrorKind::DepthLimit,
            ProtocolError::Truncated { .. } => ProtocolErrorKind::Unknown,
            _ => ProtocolErrorKind::InvalidData,
        }
    }

    /// Returns `true` if this error is a schema violation (required field,
    /// union exclusivity) rather than malformed bytes.
    pub fn is_schema_violation(&self) -> bool {
        matches!(
            self,
            ProtocolError::RequiredFieldMissing { .. }
                | ProtocolError::UnionNoValue(_)
                | ProtocolError::UnionMultipleValues(_)
        )
    }
}

/// Shorthand used throughout the protocol crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;
