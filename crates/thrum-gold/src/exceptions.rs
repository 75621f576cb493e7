//! Exceptions from `gold.thrift`.

use thrum_protocol::{
    FailureFlags, FieldSpec, ProtocolReader, ProtocolWriter, Requiredness,
    Result, StructKind, StructSpec, ThriftException, ThriftStruct, TypeSpec,
    read_field, read_struct, struct_wire_value, write_field, write_struct,
};

// ---------------------------------------------------------------------------
// UserNotFound
// ---------------------------------------------------------------------------

pub static USER_NOT_FOUND_SPEC: StructSpec = StructSpec {
    name: "UserNotFound",
    kind: StructKind::Exception,
    fields: &[
        FieldSpec {
            id: 1,
            name: "id",
            ty: TypeSpec::I32,
            requiredness: Requiredness::Default,
        },
        FieldSpec {
            id: 2,
            name: "message",
            ty: TypeSpec::String,
            requiredness: Requiredness::Default,
        },
    ],
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, thiserror::Error)]
#[error("UserNotFound(id={id}, message={message:?})")]
pub struct UserNotFound {
    id: i32,
    message: String,
    flags: FailureFlags,
}

impl UserNotFound {
    pub fn new(id: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
            flags: FailureFlags::empty(),
        }
    }

    pub fn builder() -> UserNotFoundBuilder {
        UserNotFoundBuilder::default()
    }

    /// A builder holding this value's fields. Flags are not carried over.
    pub fn copy(&self) -> UserNotFoundBuilder {
        UserNotFoundBuilder {
            id: Some(self.id),
            message: Some(self.message.clone()),
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserNotFoundBuilder {
    id: Option<i32>,
    message: Option<String>,
}

impl UserNotFoundBuilder {
    pub fn id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn unset_id(mut self) -> Self {
        self.id = None;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn unset_message(mut self) -> Self {
        self.message = None;
        self
    }

    pub fn build(self) -> Result<UserNotFound> {
        Ok(UserNotFound {
            id: self.id.unwrap_or_default(),
            message: self.message.unwrap_or_default(),
            flags: FailureFlags::empty(),
        })
    }
}

impl ThriftStruct for UserNotFound {
    fn spec() -> &'static StructSpec {
        &USER_NOT_FOUND_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, "UserNotFound", |out| {
            write_field(out, 1, &self.id)?;
            write_field(out, 2, &self.message)
        })
    }

    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let mut builder = UserNotFoundBuilder::default();
        read_struct(input, |input, field| match field.id {
            1 => read_field(input, field, &mut builder.id),
            2 => read_field(input, field, &mut builder.message),
            _ => input.skip(field.ttype),
        })?;
        builder.build()
    }
}

impl ThriftException for UserNotFound {
    fn message(&self) -> String {
        self.message.clone()
    }

    fn flags(&self) -> FailureFlags {
        self.flags
    }

    fn with_flags(mut self, flags: FailureFlags) -> Self {
        self.flags = flags;
        self
    }
}

// ---------------------------------------------------------------------------
// InvalidRequest
// ---------------------------------------------------------------------------

pub static INVALID_REQUEST_SPEC: StructSpec = StructSpec {
    name: "InvalidRequest",
    kind: StructKind::Exception,
    fields: &[FieldSpec {
        id: 1,
        name: "reason",
        ty: TypeSpec::String,
        requiredness: Requiredness::Default,
    }],
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, thiserror::Error)]
#[error("InvalidRequest(reason={reason:?})")]
pub struct InvalidRequest {
    reason: String,
    flags: FailureFlags,
}

impl InvalidRequest {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            flags: FailureFlags::empty(),
        }
    }

    pub fn builder() -> InvalidRequestBuilder {
        InvalidRequestBuilder::default()
    }

    pub fn copy(&self) -> InvalidRequestBuilder {
        InvalidRequestBuilder {
            reason: Some(self.reason.clone()),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[derive(Debug, Clone, Default)]
pub struct InvalidRequestBuilder {
    reason: Option<String>,
}

impl InvalidRequestBuilder {
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn unset_reason(mut self) -> Self {
        self.reason = None;
        self
    }

    pub fn build(self) -> Result<InvalidRequest> {
        Ok(InvalidRequest {
            reason: self.reason.unwrap_or_default(),
            flags: FailureFlags::empty(),
        })
    }
}

impl ThriftStruct for InvalidRequest {
    fn spec() -> &'static StructSpec {
        &INVALID_REQUEST_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, "InvalidRequest", |out| write_field(out, 1, &self.reason))
    }

    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let mut builder = InvalidRequestBuilder::default();
        read_struct(input, |input, field| match field.id {
            1 => read_field(input, field, &mut builder.reason),
            _ => input.skip(field.ttype),
        })?;
        builder.build()
    }
}

impl ThriftException for InvalidRequest {
    fn message(&self) -> String {
        self.reason.clone()
    }

    fn flags(&self) -> FailureFlags {
        self.flags
    }

    fn with_flags(mut self, flags: FailureFlags) -> Self {
        self.flags = flags;
        self
    }
}

struct_wire_value!(UserNotFound, InvalidRequest);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_message_comes_from_designated_field() {
        let ex = InvalidRequest::new("name too long");
        assert_eq!(ThriftException::message(&ex), "name too long");
        let ex = UserNotFound::new(4, "no user 4");
        assert_eq!(ThriftException::message(&ex), "no user 4");
    }

    #[test]
    fn test_flags_take_part_in_equality_and_hash() {
        let plain = UserNotFound::new(1, "gone");
        let flagged = plain.clone().flagged(FailureFlags::RETRYABLE);
        assert_ne!(plain, flagged);
        assert_ne!(hash_of(&plain), hash_of(&flagged));
        assert_eq!(plain.fingerprint().unwrap(), flagged.fingerprint().unwrap());

        let cleared = flagged.unflagged();
        assert_eq!(plain, cleared);
        assert_eq!(hash_of(&plain), hash_of(&cleared));
    }

    #[test]
    fn test_retryable_needs_flag_without_veto() {
        let ex = InvalidRequest::new("busy").flagged(FailureFlags::RETRYABLE);
        assert!(ex.is_retryable());
        let ex = ex.flagged(FailureFlags::NON_RETRYABLE);
        assert!(!ex.is_retryable());
    }

    #[test]
    fn test_display_lists_fields() {
        let ex = UserNotFound::new(9, "missing");
        assert_eq!(ex.to_string(), r#"UserNotFound(id=9, message="missing")"#);
    }

    #[test]
    fn test_unset_default_fields_take_defaults() {
        let ex = UserNotFound::builder().message("x").build().unwrap();
        assert_eq!(ex.id(), 0);
        assert_eq!(ex.copy().unset_message().build().unwrap().message(), "");
    }
}
