//! The Thrift binary protocol (TBinaryProtocol).
//!
//! Every integer is big-endian. Strings and binaries are an `i32` length
//! followed by the bytes. A struct is a run of field headers (tag byte +
//! `i16` id), each followed by its value, and ends with a single STOP
//! byte. Collections start with their element tag(s) and an `i32` count.
//!
//! ```text
//! strict message header:   i32(0x8001_0000 | kind)  name  i32(seq_id)
//! old message header:      name  u8(kind)  i32(seq_id)
//! field header:            u8(tag)  i16(id)
//! list / set header:       u8(elem tag)  i32(count)
//! map header:              u8(key tag)  u8(value tag)  i32(count)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    MessageType, ProtocolConfig, ProtocolError, ProtocolReader,
    ProtocolWriter, Result, TField, TListHeader, TMapHeader, TMessage,
    TSetHeader, TType,
};

/// Version word of a strict message header.
pub const VERSION_1: u32 = 0x8001_0000;

/// Mask selecting the version bits of a strict message header.
pub const VERSION_MASK: u32 = 0xffff_0000;

// ---------------------------------------------------------------------------
// BinaryWriter
// ---------------------------------------------------------------------------

/// Writes the binary protocol into an in-memory buffer.
#[derive(Debug, Default)]
pub struct BinaryWriter {
    buf: BytesMut,
    strict_write: bool,
}

impl BinaryWriter {
    /// Creates a writer using the given config's `strict_write` setting.
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(512),
            strict_write: config.strict_write,
        }
    }

    /// Returns the bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn write_size(&mut self, size: usize) -> Result<()> {
        let size = i32::try_from(size).map_err(|_| ProtocolError::SizeLimit {
            size,
            limit: i32::MAX as usize,
        })?;
        self.buf.put_i32(size);
        Ok(())
    }
}

impl ProtocolWriter for BinaryWriter {
    fn write_message_begin(&mut self, message: &TMessage) -> Result<()> {
        if self.strict_write {
            let version = VERSION_1 | message.kind as u32;
            self.buf.put_i32(version as i32);
            self.write_string(&message.name)?;
        } else {
            self.write_string(&message.name)?;
            self.buf.put_u8(message.kind as u8);
        }
        self.buf.put_i32(message.seq_id);
        Ok(())
    }

    fn write_message_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_struct_begin(&mut self, _name: &str) -> Result<()> {
        Ok(())
    }

    fn write_struct_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_field_begin(&mut self, field: TField) -> Result<()> {
        self.buf.put_u8(field.ttype.as_u8());
        self.buf.put_i16(field.id);
        Ok(())
    }

    fn write_field_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_field_stop(&mut self) -> Result<()> {
        self.buf.put_u8(TType::Stop.as_u8());
        Ok(())
    }

    fn write_list_begin(&mut self, header: TListHeader) -> Result<()> {
        self.buf.put_u8(header.element_type.as_u8());
        self.write_size(header.size)
    }

    fn write_list_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_set_begin(&mut self, header: TSetHeader) -> Result<()> {
        self.buf.put_u8(header.element_type.as_u8());
        self.write_size(header.size)
    }

    fn write_set_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_map_begin(&mut self, header: TMapHeader) -> Result<()> {
        self.buf.put_u8(header.key_type.as_u8());
        self.buf.put_u8(header.value_type.as_u8());
        self.write_size(header.size)
    }

    fn write_map_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.buf.put_u8(u8::from(value));
        Ok(())
    }

    fn write_byte(&mut self, value: i8) -> Result<()> {
        self.buf.put_i8(value);
        Ok(())
    }

    fn write_i16(&mut self, value: i16) -> Result<()> {
        self.buf.put_i16(value);
        Ok(())
    }

    fn write_i32(&mut self, value: i32) -> Result<()> {
        self.buf.put_i32(value);
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> Result<()> {
        self.buf.put_i64(value);
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> Result<()> {
        self.buf.put_u64(value.to_bits());
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_binary(value.as_bytes())
    }

    fn write_binary(&mut self, value: &[u8]) -> Result<()> {
        self.write_size(value.len())?;
        self.buf.put_slice(value);
        Ok(())
    }

    fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

// ---------------------------------------------------------------------------
// BinaryReader
// ---------------------------------------------------------------------------

/// Reads the binary protocol from a borrowed byte slice.
///
/// Every read checks that enough bytes remain first, so a truncated frame
/// always produces [`ProtocolError::Truncated`] instead of a short value.
#[derive(Debug)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    total: usize,
    depth: usize,
    config: ProtocolConfig,
}

impl<'a> BinaryReader<'a> {
    /// Creates a reader over `data`.
    pub fn new(data: &'a [u8], config: &ProtocolConfig) -> Self {
        Self {
            data,
            total: data.len(),
            depth: 0,
            config: config.clone(),
        }
    }

    /// Returns the number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.remaining()
    }

    fn ensure_remaining(&self, needed: usize) -> Result<()> {
        let remaining = self.data.remaining();
        if remaining < needed {
            Err(ProtocolError::Truncated { needed, remaining })
        } else {
            Ok(())
        }
    }

    fn read_u8(&mut self) -> Result<u8> {
        self.ensure_remaining(1)?;
        Ok(self.data.get_u8())
    }

    fn read_ttype(&mut self) -> Result<TType> {
        TType::from_u8(self.read_u8()?)
    }

    fn read_size(&mut self, limit: Option<usize>) -> Result<usize> {
        let raw = self.read_i32()?;
        let size = usize::try_from(raw)
            .map_err(|_| ProtocolError::NegativeSize(raw))?;
        if let Some(limit) = limit {
            if size > limit {
                return Err(ProtocolError::SizeLimit { size, limit });
            }
        }
        Ok(size)
    }

    fn read_container_size(&mut self) -> Result<usize> {
        let size = self.read_size(self.config.container_length_limit)?;
        // Every element takes at least one byte, so a count larger than
        // what's left can only mean a truncated or corrupt frame.
        self.ensure_remaining(size)?;
        Ok(size)
    }

    fn read_raw(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure_remaining(len)?;
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    fn read_string_body(&mut self, len: usize) -> Result<String> {
        if let Some(limit) = self.config.string_length_limit {
            if len > limit {
                return Err(ProtocolError::SizeLimit { size: len, limit });
            }
        }
        let raw = self.read_raw(len)?;
        Ok(String::from_utf8(raw.to_vec())?)
    }

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.config.max_depth {
            return Err(ProtocolError::DepthLimit(self.config.max_depth));
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

impl ProtocolReader for BinaryReader<'_> {
    fn read_message_begin(&mut self) -> Result<TMessage> {
        let size = self.read_i32()?;
        if size < 0 {
            let word = size as u32;
            if word & VERSION_MASK != VERSION_1 {
                return Err(ProtocolError::BadVersion(word));
            }
            let kind = MessageType::from_u8((word & 0xff) as u8)?;
            let name = self.read_string()?;
            let seq_id = self.read_i32()?;
            Ok(TMessage { name, kind, seq_id })
        } else {
            if self.config.strict_read {
                return Err(ProtocolError::MissingVersion);
            }
            let name = self.read_string_body(size as usize)?;
            let kind = MessageType::from_u8(self.read_u8()?)?;
            let seq_id = self.read_i32()?;
            Ok(TMessage { name, kind, seq_id })
        }
    }

    fn read_message_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_struct_begin(&mut self) -> Result<()> {
        self.descend()
    }

    fn read_struct_end(&mut self) -> Result<()> {
        self.ascend();
        Ok(())
    }

    fn read_field_begin(&mut self) -> Result<TField> {
        let ttype = self.read_ttype()?;
        if ttype == TType::Stop {
            return Ok(TField::stop());
        }
        let id = self.read_i16()?;
        Ok(TField { ttype, id })
    }

    fn read_field_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_list_begin(&mut self) -> Result<TListHeader> {
        let element_type = self.read_ttype()?;
        let size = self.read_container_size()?;
        self.descend()?;
        Ok(TListHeader { element_type, size })
    }

    fn read_list_end(&mut self) -> Result<()> {
        self.ascend();
        Ok(())
    }

    fn read_set_begin(&mut self) -> Result<TSetHeader> {
        let element_type = self.read_ttype()?;
        let size = self.read_container_size()?;
        self.descend()?;
        Ok(TSetHeader { element_type, size })
    }

    fn read_set_end(&mut self) -> Result<()> {
        self.ascend();
        Ok(())
    }

    fn read_map_begin(&mut self) -> Result<TMapHeader> {
        let key_type = self.read_ttype()?;
        let value_type = self.read_ttype()?;
        let size = self.read_container_size()?;
        self.descend()?;
        Ok(TMapHeader {
            key_type,
            value_type,
            size,
        })
    }

    fn read_map_end(&mut self) -> Result<()> {
        self.ascend();
        Ok(())
    }

    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    fn read_byte(&mut self) -> Result<i8> {
        self.ensure_remaining(1)?;
        Ok(self.data.get_i8())
    }

    fn read_i16(&mut self) -> Result<i16> {
        self.ensure_remaining(2)?;
        Ok(self.data.get_i16())
    }

    fn read_i32(&mut self) -> Result<i32> {
        self.ensure_remaining(4)?;
        Ok(self.data.get_i32())
    }

    fn read_i64(&mut self) -> Result<i64> {
        self.ensure_remaining(8)?;
        Ok(self.data.get_i64())
    }

    fn read_double(&mut self) -> Result<f64> {
        self.ensure_remaining(8)?;
        Ok(f64::from_bits(self.data.get_u64()))
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_size(None)?;
        self.read_string_body(len)
    }

    fn read_binary(&mut self) -> Result<Bytes> {
        let len = self.read_size(self.config.string_length_limit)?;
        let raw = self.read_raw(len)?;
        Ok(Bytes::copy_from_slice(raw))
    }

    fn position(&self) -> usize {
        self.total - self.data.len()
    }
}
