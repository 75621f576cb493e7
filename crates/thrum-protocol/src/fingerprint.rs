//! Structural fingerprints.
//!
//! [`FingerprintWriter`] is a [`ProtocolWriter`] that hashes instead of
//! buffering. It feeds 64-bit FNV-1a with exactly the bytes the strict
//! binary protocol would produce, so a value's fingerprint is a hash of its
//! canonical wire form: fields in declaration order, each as tag, id and
//! payload. Doubles are the one exception: `-0.0` hashes as `0.0` and all
//! NaNs hash alike.

use bytes::Bytes;

use crate::{
    ProtocolWriter, Result, TField, TListHeader, TMapHeader, TMessage,
    TSetHeader, TType,
};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hashes a value's canonical binary encoding with FNV-1a.
#[derive(Debug, Clone)]
pub struct FingerprintWriter {
    state: u64,
}

impl FingerprintWriter {
    pub fn new() -> Self {
        Self {
            state: FNV_OFFSET_BASIS,
        }
    }

    /// Returns the hash of everything written so far.
    pub fn finish(&self) -> u64 {
        self.state
    }

    fn feed(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.state ^= u64::from(*byte);
            self.state = self.state.wrapping_mul(FNV_PRIME);
        }
    }

    fn feed_len(&mut self, len: usize) {
        self.feed(&(len as i32).to_be_bytes());
    }
}

impl Default for FingerprintWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolWriter for FingerprintWriter {
    fn write_message_begin(&mut self, message: &TMessage) -> Result<()> {
        self.feed(&(crate::binary::VERSION_1 | message.kind as u32).to_be_bytes());
        self.write_string(&message.name)?;
        self.feed(&message.seq_id.to_be_bytes());
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
        self.feed(&[field.ttype.as_u8()]);
        self.feed(&field.id.to_be_bytes());
        Ok(())
    }

    fn write_field_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_field_stop(&mut self) -> Result<()> {
        self.feed(&[TType::Stop.as_u8()]);
        Ok(())
    }

    fn write_list_begin(&mut self, header: TListHeader) -> Result<()> {
        self.feed(&[header.element_type.as_u8()]);
        self.feed_len(header.size);
        Ok(())
    }

    fn write_list_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_set_begin(&mut self, header: TSetHeader) -> Result<()> {
        self.feed(&[header.element_type.as_u8()]);
        self.feed_len(header.size);
        Ok(())
    }

    fn write_set_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_map_begin(&mut self, header: TMapHeader) -> Result<()> {
        self.feed(&[header.key_type.as_u8(), header.value_type.as_u8()]);
        self.feed_len(header.size);
        Ok(())
    }

    fn write_map_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.feed(&[u8::from(value)]);
        Ok(())
    }

    fn write_byte(&mut self, value: i8) -> Result<()> {
        self.feed(&value.to_be_bytes());
        Ok(())
    }

    fn write_i16(&mut self, value: i16) -> Result<()> {
        self.feed(&value.to_be_bytes());
        Ok(())
    }

    fn write_i32(&mut self, value: i32) -> Result<()> {
        self.feed(&value.to_be_bytes());
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> Result<()> {
        self.feed(&value.to_be_bytes());
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> Result<()> {
        self.feed(&canonical_bits(value).to_be_bytes());
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_binary(value.as_bytes())
    }

    fn write_binary(&mut self, value: &[u8]) -> Result<()> {
        self.feed_len(value.len());
        self.feed(value);
        Ok(())
    }

    fn into_bytes(self) -> Bytes {
        Bytes::copy_from_slice(&self.state.to_be_bytes())
    }
}

/// The bits of `value`, with `-0.0` folded into `0.0` and every NaN into
/// one NaN, so doubles that compare equal hash alike.
pub fn canonical_bits(value: f64) -> u64 {
    if value == 0.0 {
        0
    } else if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}
