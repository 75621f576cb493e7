//! Wire type tags and the small header records the protocol reads and
//! writes around every value.
//!
//! These are the "nouns" of the Thrift binary format. A [`TType`] is the
//! one-byte tag in front of every field and collection element; the header
//! structs ([`TMessage`], [`TField`], [`TListHeader`], …) are what a
//! protocol writer emits before the payload they describe.

use std::fmt;

use crate::{ProtocolError, Result};

// ---------------------------------------------------------------------------
// TType
// ---------------------------------------------------------------------------

/// A one-byte wire type tag.
///
/// The numeric values are fixed by the Thrift binary protocol and must
/// never change. Gaps (5, 7, 9) are historical and unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TType {
    Stop = 0,
    Void = 1,
    Bool = 2,
    Byte = 3,
    Double = 4,
    I16 = 6,
    I32 = 8,
    I64 = 10,
    String = 11,
    Struct = 12,
    Map = 13,
    Set = 14,
    List = 15,
    /// Enum tag. Enums are written as [`TType::I32`]; this tag is only
    /// ever accepted on read, for peers that emit it.
    Enum = 16,
}

impl TType {
    /// Parses a tag byte.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidType`] for bytes that aren't tags.
    pub fn from_u8(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => TType::Stop,
            1 => TType::Void,
            2 => TType::Bool,
            3 => TType::Byte,
            4 => TType::Double,
            6 => TType::I16,
            8 => TType::I32,
            10 => TType::I64,
            11 => TType::String,
            12 => TType::Struct,
            13 => TType::Map,
            14 => TType::Set,
            15 => TType::List,
            16 => TType::Enum,
            other => return Err(ProtocolError::InvalidType(other)),
        })
    }

    /// Returns the tag byte.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns `true` if a value declared as `self` may be decoded from a
    /// field whose header carries `wire`.
    ///
    /// Tags must match exactly, except that I32 and ENUM are
    /// interchangeable.
    pub fn accepts(self, wire: TType) -> bool {
        self == wire
            || matches!(
                (self, wire),
                (TType::I32, TType::Enum) | (TType::Enum, TType::I32)
            )
    }
}

impl fmt::Display for TType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TType::Stop => "STOP",
            TType::Void => "VOID",
            TType::Bool => "BOOL",
            TType::Byte => "BYTE",
            TType::Double => "DOUBLE",
            TType::I16 => "I16",
            TType::I32 => "I32",
            TType::I64 => "I64",
            TType::String => "STRING",
            TType::Struct => "STRUCT",
            TType::Map => "MAP",
            TType::Set => "SET",
            TType::List => "LIST",
            TType::Enum => "ENUM",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Message header
// ---------------------------------------------------------------------------

/// The kind of an RPC message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Call = 1,
    Reply = 2,
    Exception = 3,
    Oneway = 4,
}

impl MessageType {
    /// Parses a message kind byte.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessageType`] for unknown kinds.
    pub fn from_u8(kind: u8) -> Result<Self> {
        match kind {
            1 => Ok(MessageType::Call),
            2 => Ok(MessageType::Reply),
            3 => Ok(MessageType::Exception),
            4 => Ok(MessageType::Oneway),
            other => Err(ProtocolError::InvalidMessageType(other)),
        }
    }
}

/// The header in front of every RPC frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TMessage {
    /// Method name.
    pub name: String,
    /// CALL, REPLY, EXCEPTION or ONEWAY.
    pub kind: MessageType,
    /// Sequence id, echoed by the server. Correlation is the transport's job.
    pub seq_id: i32,
}

impl TMessage {
    pub fn new(name: impl Into<String>, kind: MessageType, seq_id: i32) -> Self {
        Self {
            name: name.into(),
            kind,
            seq_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Field and collection headers
// ---------------------------------------------------------------------------

/// A field header: type tag plus field id.
///
/// The binary protocol does not carry field names, so neither does this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TField {
    pub ttype: TType,
    pub id: i16,
}

impl TField {
    pub fn new(ttype: TType, id: i16) -> Self {
        Self { ttype, id }
    }

    /// The STOP marker that terminates a struct body.
    pub fn stop() -> Self {
        Self {
            ttype: TType::Stop,
            id: 0,
        }
    }

    pub fn is_stop(&self) -> bool {
        self.ttype == TType::Stop
    }
}

/// A list header: element tag and element count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TListHeader {
    pub element_type: TType,
    pub size: usize,
}

/// A set header. Same layout as a list header on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TSetHeader {
    pub element_type: TType,
    pub size: usize,
}

/// A map header: key tag, value tag and entry count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TMapHeader {
    pub key_type: TType,
    pub value_type: TType,
    pub size: usize,
}
