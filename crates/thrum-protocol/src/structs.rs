//! Structured types: structs, unions and exceptions.
//!
//! Generated code implements [`ThriftStruct`] for every struct, union and
//! exception, and for the synthetic args/result structs of service methods.
//! The helpers in this module hold the parts of the codec that are the same
//! for every struct, so that generated `read`/`write` bodies only contain
//! the per-field decisions:
//!
//! - [`write_struct`], [`write_field`], [`write_optional_field`] for encode;
//! - [`read_struct`] for the field loop of a struct decode (unknown and
//!   mismatched fields are the callback's `skip` arm);
//! - [`read_union`] for the one-field-exactly rule of unions.

use std::fmt;

use bitflags::bitflags;

use crate::{
    FingerprintWriter, ProtocolError, ProtocolReader, ProtocolWriter, Result,
    StructSpec, TField, WireValue,
};

/// A generated struct, union or exception.
pub trait ThriftStruct: Sized {
    /// The type's descriptor: name, kind and declared fields.
    fn spec() -> &'static StructSpec;

    /// Validates and writes the struct body (no message header).
    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()>;

    /// Reads a struct body and finalizes it.
    ///
    /// # Errors
    /// Fails on malformed input and on schema violations (a required field
    /// never seen, a union with zero or several fields).
    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self>;

    /// Checks the value before it's written.
    ///
    /// Generated types enforce their required fields through the type
    /// system, so the default accepts everything.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// A stable structural hash of the value.
    ///
    /// FNV-1a over the value's canonical binary encoding, which visits
    /// fields in declaration order (absent optional fields contribute
    /// nothing). Equal values always have equal fingerprints, across
    /// processes and releases, as long as collections iterate
    /// deterministically (`BTreeMap`/`BTreeSet`/`Vec`/`EnumSet`).
    ///
    /// # Errors
    /// Whatever [`write`](Self::write) fails with, such as a
    /// [`validate`](Self::validate) failure. The hasher itself never fails.
    fn fingerprint(&self) -> Result<u64> {
        let mut hasher = FingerprintWriter::new();
        self.write(&mut hasher)?;
        Ok(hasher.finish())
    }
}

/// Implements [`WireValue`](crate::WireValue) for generated structs, so
/// they can be used as field values and collection elements.
#[macro_export]
macro_rules! struct_wire_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::WireValue for $ty {
                const TTYPE: $crate::TType = $crate::TType::Struct;

                fn write_value<W: $crate::ProtocolWriter + ?Sized>(
                    &self,
                    out: &mut W,
                ) -> $crate::Result<()> {
                    <$ty as $crate::ThriftStruct>::write(self, out)
                }

                fn read_value<R: $crate::ProtocolReader + ?Sized>(
                    input: &mut R,
                ) -> $crate::Result<Self> {
                    <$ty as $crate::ThriftStruct>::read(input)
                }
            }
        )+
    };
}

// ---------------------------------------------------------------------------
// Encode helpers
// ---------------------------------------------------------------------------

/// Writes struct-begin, the body, the STOP marker and struct-end.
pub fn write_struct<W, F>(out: &mut W, name: &str, body: F) -> Result<()>
where
    W: ProtocolWriter + ?Sized,
    F: FnOnce(&mut W) -> Result<()>,
{
    out.write_struct_begin(name)?;
    body(out)?;
    out.write_field_stop()?;
    out.write_struct_end()
}

/// Writes one field: header with the value's tag and the literal id, then
/// the value.
pub fn write_field<W, T>(out: &mut W, id: i16, value: &T) -> Result<()>
where
    W: ProtocolWriter + ?Sized,
    T: WireValue,
{
    out.write_field_begin(TField::new(T::TTYPE, id))?;
    value.write_value(out)?;
    out.write_field_end()
}

/// Writes a field only if it is present.
pub fn write_optional_field<W, T>(out: &mut W, id: i16, value: &Option<T>) -> Result<()>
where
    W: ProtocolWriter + ?Sized,
    T: WireValue,
{
    match value {
        Some(value) => write_field(out, id, value),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Decode helpers
// ---------------------------------------------------------------------------

/// Runs the field loop of a struct decode.
///
/// `on_field` is called once per field header until STOP and must consume
/// the field's value: decode it if the id and tag match a declared field,
/// otherwise `input.skip(field.ttype)`.
pub fn read_struct<R, F>(input: &mut R, mut on_field: F) -> Result<()>
where
    R: ProtocolReader + ?Sized,
    F: FnMut(&mut R, TField) -> Result<()>,
{
    input.read_struct_begin()?;
    loop {
        let field = input.read_field_begin()?;
        if field.is_stop() {
            break;
        }
        on_field(input, field)?;
        input.read_field_end()?;
    }
    input.read_struct_end()
}

/// Decodes one field into its builder slot.
///
/// A field whose wire tag doesn't match `T` is skipped, as is an enum
/// value `T` doesn't declare; either way the slot keeps its previous
/// value.
pub fn read_field<R, T>(input: &mut R, field: TField, slot: &mut Option<T>) -> Result<()>
where
    R: ProtocolReader + ?Sized,
    T: WireValue,
{
    if !T::TTYPE.accepts(field.ttype) {
        return input.skip(field.ttype);
    }
    if let Some(value) = T::read_lenient(input)? {
        *slot = Some(value);
    }
    Ok(())
}

/// Runs the decode of a union.
///
/// `on_field` sees the first field only and must consume it, returning the
/// union value if the field is one of the union's members (or `None` after
/// skipping it). Any later field before STOP is skipped and then reported
/// as [`ProtocolError::UnionMultipleValues`]; no recognized field at all is
/// [`ProtocolError::UnionNoValue`].
pub fn read_union<U, R, F>(input: &mut R, name: &'static str, on_field: F) -> Result<U>
where
    R: ProtocolReader + ?Sized,
    F: FnOnce(&mut R, TField) -> Result<Option<U>>,
{
    input.read_struct_begin()?;
    let first = input.read_field_begin()?;
    let mut result = None;
    if !first.is_stop() {
        result = on_field(input, first)?;
        input.read_field_end()?;

        let mut more_than_one = false;
        loop {
            let field = input.read_field_begin()?;
            if field.is_stop() {
                break;
            }
            more_than_one = true;
            input.skip(field.ttype)?;
            input.read_field_end()?;
        }
        if more_than_one {
            input.read_struct_end()?;
            return Err(ProtocolError::UnionMultipleValues(name));
        }
    }
    input.read_struct_end()?;
    result.ok_or(ProtocolError::UnionNoValue(name))
}

/// Returns the builder slot's value or a [`ProtocolError::RequiredFieldMissing`]
/// naming the field and struct.
pub fn require<T>(slot: Option<T>, field: &'static str, struct_name: &'static str) -> Result<T> {
    slot.ok_or(ProtocolError::RequiredFieldMissing { field, struct_name })
}

// ---------------------------------------------------------------------------
// Exceptions
// ---------------------------------------------------------------------------

bitflags! {
    /// Semantic flags attached to an exception value by higher layers.
    ///
    /// Flags never travel on the wire. They take part in equality and
    /// hashing of the exception carrying them and can be cleared again.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FailureFlags: u64 {
        /// The request may safely be retried.
        const RETRYABLE     = 1 << 0;
        /// The request was interrupted before completing.
        const INTERRUPTED   = 1 << 1;
        /// The request was rejected without being processed.
        const REJECTED      = 1 << 2;
        /// The request must not be retried.
        const NON_RETRYABLE = 1 << 3;
    }
}

impl Default for FailureFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for FailureFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}

/// A generated exception type.
pub trait ThriftException:
    ThriftStruct + std::error::Error + Clone + Send + Sync + 'static
{
    /// The human-readable message, sourced from the field the IDL
    /// designates (or the first string field).
    fn message(&self) -> String;

    /// Flags currently attached to this value.
    fn flags(&self) -> FailureFlags;

    /// Returns the value with its flags replaced.
    fn with_flags(self, flags: FailureFlags) -> Self;

    /// Returns the value with `flags` added to the existing ones.
    fn flagged(self, flags: FailureFlags) -> Self {
        let merged = self.flags() | flags;
        self.with_flags(merged)
    }

    /// Returns the value with every flag cleared.
    fn unflagged(self) -> Self {
        self.with_flags(FailureFlags::empty())
    }

    fn is_retryable(&self) -> bool {
        let flags = self.flags();
        flags.contains(FailureFlags::RETRYABLE)
            && !flags.contains(FailureFlags::NON_RETRYABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BinaryReader, BinaryWriter, ProtocolConfig, TType};

    fn config() -> ProtocolConfig {
        ProtocolConfig::default()
    }

    /// Writes `{1: i32 <a>, 2: i32 <b>}` then STOP.
    fn two_fields(a: i32, b: i32) -> bytes::Bytes {
        let mut w = BinaryWriter::new(&config());
        write_struct(&mut w, "Pair", |w| {
            write_field(w, 1, &a)?;
            write_field(w, 2, &b)
        })
        .unwrap();
        w.into_bytes()
    }

    #[test]
    fn test_write_optional_field_skips_none() {
        let mut w = BinaryWriter::new(&config());
        write_optional_field::<_, i32>(&mut w, 1, &None).unwrap();
        assert!(w.is_empty());
        write_optional_field(&mut w, 1, &Some(3i32)).unwrap();
        assert_eq!(w.as_bytes(), &[8, 0, 1, 0, 0, 0, 3]);
    }

    #[test]
    fn test_read_struct_visits_every_field() {
        let bytes = two_fields(4, 5);
        let mut seen = Vec::new();
        read_struct(&mut BinaryReader::new(&bytes, &config()), |input, field| {
            seen.push((field.id, input.read_i32()?));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![(1, 4), (2, 5)]);
    }

    #[test]
    fn test_read_field_skips_mismatched_tag() {
        // {1: i64 7, 2: i32 5}
        let mut w = BinaryWriter::new(&config());
        write_struct(&mut w, "Mixed", |w| {
            write_field(w, 1, &7i64)?;
            write_field(w, 2, &5i32)
        })
        .unwrap();
        let bytes = w.into_bytes();

        let mut first: Option<i32> = None;
        let mut second: Option<i32> = None;
        read_struct(&mut BinaryReader::new(&bytes, &config()), |input, field| {
            match field.id {
                1 => read_field(input, field, &mut first),
                2 => read_field(input, field, &mut second),
                _ => input.skip(field.ttype),
            }
        })
        .unwrap();
        assert_eq!(first, None);
        assert_eq!(second, Some(5));
    }

    #[test]
    fn test_read_union_rejects_second_field() {
        let bytes = two_fields(4, 5);
        let result: Result<i32> = read_union(
            &mut BinaryReader::new(&bytes, &config()),
            "Pair",
            |input, _| input.read_i32().map(Some),
        );
        assert!(matches!(result, Err(ProtocolError::UnionMultipleValues("Pair"))));
    }

    #[test]
    fn test_read_union_rejects_empty() {
        let bytes = [0u8];
        let result: Result<i32> = read_union(
            &mut BinaryReader::new(&bytes, &config()),
            "Empty",
            |input, _| input.read_i32().map(Some),
        );
        assert!(matches!(result, Err(ProtocolError::UnionNoValue("Empty"))));
    }

    #[test]
    fn test_read_union_unknown_only_field_is_no_value() {
        let bytes = [TType::I64.as_u8(), 0, 9, 0, 0, 0, 0, 0, 0, 0, 1, 0];
        let result: Result<i32> = read_union(
            &mut BinaryReader::new(&bytes, &config()),
            "U",
            |input, field| {
                input.skip(field.ttype)?;
                Ok(None)
            },
        );
        assert!(matches!(result, Err(ProtocolError::UnionNoValue("U"))));
    }

    #[test]
    fn test_require_names_field() {
        assert_eq!(require(Some(1), "id", "User").unwrap(), 1);
        let err = require::<i32>(None, "id", "User").unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::RequiredFieldMissing { field: "id", struct_name: "User" }
        ));
    }

    #[test]
    fn test_failure_flags_display() {
        let flags = FailureFlags::RETRYABLE | FailureFlags::REJECTED;
        assert_eq!(flags.to_string(), "RETRYABLE | REJECTED");
        assert_eq!(FailureFlags::default(), FailureFlags::empty());
    }
}
