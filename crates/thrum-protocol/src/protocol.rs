//! The reader/writer traits every protocol implements.
//!
//! Generated code never talks to bytes directly. It calls
//! `write_field_begin`, `write_i32`, `read_list_begin` and friends on a
//! [`ProtocolWriter`] or [`ProtocolReader`], and the concrete protocol
//! (today only [`BinaryWriter`](crate::BinaryWriter) /
//! [`BinaryReader`](crate::BinaryReader)) decides how those calls look on
//! the wire.

use bytes::Bytes;

use crate::{
    Result, TField, TListHeader, TMapHeader, TMessage, TSetHeader, TType,
};

/// Writes Thrift values in some wire format.
///
/// Every `*_begin` call must be paired with its `*_end` call, even when the
/// format does not emit anything for the end marker.
pub trait ProtocolWriter {
    fn write_message_begin(&mut self, message: &TMessage) -> Result<()>;
    fn write_message_end(&mut self) -> Result<()>;

    /// `name` is diagnostic only; the binary format doesn't carry it.
    fn write_struct_begin(&mut self, name: &str) -> Result<()>;
    fn write_struct_end(&mut self) -> Result<()>;

    fn write_field_begin(&mut self, field: TField) -> Result<()>;
    fn write_field_end(&mut self) -> Result<()>;
    fn write_field_stop(&mut self) -> Result<()>;

    fn write_list_begin(&mut self, header: TListHeader) -> Result<()>;
    fn write_list_end(&mut self) -> Result<()>;
    fn write_set_begin(&mut self, header: TSetHeader) -> Result<()>;
    fn write_set_end(&mut self) -> Result<()>;
    fn write_map_begin(&mut self, header: TMapHeader) -> Result<()>;
    fn write_map_end(&mut self) -> Result<()>;

    fn write_bool(&mut self, value: bool) -> Result<()>;
    fn write_byte(&mut self, value: i8) -> Result<()>;
    fn write_i16(&mut self, value: i16) -> Result<()>;
    fn write_i32(&mut self, value: i32) -> Result<()>;
    fn write_i64(&mut self, value: i64) -> Result<()>;
    fn write_double(&mut self, value: f64) -> Result<()>;
    fn write_string(&mut self, value: &str) -> Result<()>;
    fn write_binary(&mut self, value: &[u8]) -> Result<()>;

    /// Consumes the writer and returns everything written so far.
    fn into_bytes(self) -> Bytes
    where
        Self: Sized;
}

/// Reads Thrift values from some wire format.
pub trait ProtocolReader {
    fn read_message_begin(&mut self) -> Result<TMessage>;
    fn read_message_end(&mut self) -> Result<()>;

    fn read_struct_begin(&mut self) -> Result<()>;
    fn read_struct_end(&mut self) -> Result<()>;

    /// Reads the next field header. A header with [`TType::Stop`] ends
    /// the struct and has no matching `read_field_end`.
    fn read_field_begin(&mut self) -> Result<TField>;
    fn read_field_end(&mut self) -> Result<()>;

    fn read_list_begin(&mut self) -> Result<TListHeader>;
    fn read_list_end(&mut self) -> Result<()>;
    fn read_set_begin(&mut self) -> Result<TSetHeader>;
    fn read_set_end(&mut self) -> Result<()>;
    fn read_map_begin(&mut self) -> Result<TMapHeader>;
    fn read_map_end(&mut self) -> Result<()>;

    fn read_bool(&mut self) -> Result<bool>;
    fn read_byte(&mut self) -> Result<i8>;
    fn read_i16(&mut self) -> Result<i16>;
    fn read_i32(&mut self) -> Result<i32>;
    fn read_i64(&mut self) -> Result<i64>;
    fn read_double(&mut self) -> Result<f64>;
    fn read_string(&mut self) -> Result<String>;
    fn read_binary(&mut self) -> Result<Bytes>;

    /// Number of bytes consumed so far.
    fn position(&self) -> usize;

    /// Reads and discards one value of the given type.
    ///
    /// This is how unknown fields are stepped over: the reader only needs
    /// the tag to know how many bytes (recursively) belong to the value.
    /// Nesting is bounded by the reader's depth limit.
    fn skip(&mut self, ttype: TType) -> Result<()> {
        skip_value(self, ttype)
    }
}

fn skip_value<R: ProtocolReader + ?Sized>(
    reader: &mut R,
    ttype: TType,
) -> Result<()> {
    match ttype {
        TType::Bool => reader.read_bool().map(drop),
        TType::Byte => reader.read_byte().map(drop),
        TType::I16 => reader.read_i16().map(drop),
        TType::I32 | TType::Enum => reader.read_i32().map(drop),
        TType::I64 => reader.read_i64().map(drop),
        TType::Double => reader.read_double().map(drop),
        TType::String => reader.read_binary().map(drop),
        TType::Struct => {
            reader.read_struct_begin()?;
            loop {
                let field = reader.read_field_begin()?;
                if field.is_stop() {
                    break;
                }
                skip_value(reader, field.ttype)?;
                reader.read_field_end()?;
            }
            reader.read_struct_end()
        }
        TType::Map => {
            let header = reader.read_map_begin()?;
            for _ in 0..header.size {
                skip_value(reader, header.key_type)?;
                skip_value(reader, header.value_type)?;
            }
            reader.read_map_end()
        }
        TType::Set => {
            let header = reader.read_set_begin()?;
            for _ in 0..header.size {
                skip_value(reader, header.element_type)?;
            }
            reader.read_set_end()
        }
        TType::List => {
            let header = reader.read_list_begin()?;
            for _ in 0..header.size {
                skip_value(reader, header.element_type)?;
            }
            reader.read_list_end()
        }
        TType::Stop | TType::Void => Err(crate::ProtocolError::InvalidData(
            format!("cannot skip a value of type {ttype}"),
        )),
    }
}
