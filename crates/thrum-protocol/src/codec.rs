//! Codec trait and the binary codec.
//!
//! A "codec" here is a protocol factory: it hands out a fresh
//! [`ProtocolWriter`] for every outgoing message and a [`ProtocolReader`]
//! over every incoming frame. The RPC layer only sees the [`Codec`] trait,
//! so a different wire format can be swapped in without touching clients,
//! services or generated code.

use bytes::Bytes;

use crate::{
    BinaryReader, BinaryWriter, ProtocolConfig, ProtocolReader,
    ProtocolWriter, Result, TMessage, ThriftStruct,
};

/// A factory for protocol readers and writers.
///
/// `Send + Sync + 'static` because one codec is shared by every in-flight
/// call of a client and every dispatched request of a service.
pub trait Codec: Send + Sync + 'static {
    /// The writer produced by this codec.
    type Writer: ProtocolWriter;

    /// The reader produced by this codec, borrowing the frame it reads.
    type Reader<'a>: ProtocolReader
    where
        Self: 'a;

    /// Returns an empty writer.
    fn writer(&self) -> Self::Writer;

    /// Returns a reader positioned at the start of `data`.
    fn reader<'a>(&'a self, data: &'a [u8]) -> Self::Reader<'a>;

    /// Encodes a single struct with no message header.
    ///
    /// # Errors
    /// Returns the struct's validation or write error.
    fn encode<T: ThriftStruct>(&self, value: &T) -> Result<Bytes> {
        let mut writer = self.writer();
        value.write(&mut writer)?;
        Ok(writer.into_bytes())
    }

    /// Decodes a single struct with no message header.
    ///
    /// Trailing bytes after the struct's STOP marker are ignored.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`](crate::ProtocolError) if the bytes are
    /// malformed, truncated, or violate the struct's schema.
    fn decode<T: ThriftStruct>(&self, data: &[u8]) -> Result<T> {
        let mut reader = self.reader(data);
        T::read(&mut reader)
    }

    /// Encodes a whole RPC message: header, then `body` as the payload.
    fn encode_message<T: ThriftStruct>(&self, header: &TMessage, body: &T) -> Result<Bytes> {
        let mut writer = self.writer();
        writer.write_message_begin(header)?;
        body.write(&mut writer)?;
        writer.write_message_end()?;
        Ok(writer.into_bytes())
    }
}

// ---------------------------------------------------------------------------
// BinaryCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] for the Thrift binary protocol.
///
/// ## Example
///
/// ```rust
/// use thrum_protocol::{BinaryCodec, Codec, ApplicationException, ApplicationExceptionKind};
///
/// let codec = BinaryCodec::default();
/// let ex = ApplicationException::new(ApplicationExceptionKind::UnknownMethod, "nope");
///
/// let bytes = codec.encode(&ex).unwrap();
/// let decoded: ApplicationException = codec.decode(&bytes).unwrap();
/// assert_eq!(ex, decoded);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BinaryCodec {
    config: ProtocolConfig,
}

impl BinaryCodec {
    /// Creates a binary codec with the given config.
    pub fn new(config: ProtocolConfig) -> Self {
        Self { config }
    }

    /// Returns the codec's config.
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }
}

impl Codec for BinaryCodec {
    type Writer = BinaryWriter;
    type Reader<'a> = BinaryReader<'a>;

    fn writer(&self) -> BinaryWriter {
        BinaryWriter::new(&self.config)
    }

    fn reader<'a>(&'a self, data: &'a [u8]) -> BinaryReader<'a> {
        BinaryReader::new(data, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ApplicationException, MessageType};

    #[test]
    fn test_encode_message_layout() {
        let codec = BinaryCodec::default();
        let header = TMessage::new("ping", MessageType::Exception, 7);
        let body = ApplicationException::internal_error("");
        let bytes = codec.encode_message(&header, &body).unwrap();

        assert_eq!(&bytes[..4], &[0x80, 0x01, 0x00, 0x03]);
        assert_eq!(&bytes[4..12], &[0, 0, 0, 4, b'p', b'i', b'n', b'g']);
        assert_eq!(&bytes[12..16], &[0, 0, 0, 7]);

        let mut reader = codec.reader(&bytes);
        let read = reader.read_message_begin().unwrap();
        assert_eq!(read, header);
        let decoded = ApplicationException::read(&mut reader).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn test_decode_truncated_struct_fails() {
        let codec = BinaryCodec::default();
        let bytes = codec.encode(&ApplicationException::internal_error("x")).unwrap();
        let err = codec
            .decode::<ApplicationException>(&bytes[..bytes.len() - 1])
            .unwrap_err();
        assert!(matches!(err, crate::ProtocolError::Truncated { .. }));
    }
}
