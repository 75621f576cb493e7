//! Thrift binary protocol for thrum.
//!
//! This crate is everything between typed values and bytes:
//!
//! - **Wire model** ([`TType`], [`TMessage`], [`TField`], collection
//!   headers): the tags and headers of the binary protocol.
//! - **Protocols** ([`ProtocolWriter`], [`ProtocolReader`],
//!   [`BinaryWriter`], [`BinaryReader`]): how those tags and values are
//!   laid out as bytes.
//! - **Codec** ([`Codec`] trait, [`BinaryCodec`]): the factory the RPC
//!   layer uses to get readers and writers.
//! - **Values** ([`WireValue`], [`ThriftStruct`], [`ThriftEnum`],
//!   [`EnumSet`]): the traits generated code implements, plus helpers that
//!   hold the shared parts of every struct codec.
//! - **Descriptors** ([`StructSpec`], [`ServiceSpec`], ...) and
//!   [`DynamicStruct`] for working with a schema at runtime.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding or
//!   decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (frames of bytes) and the RPC
//! layer (method calls). It doesn't know about connections or services;
//! it only knows how to turn messages into bytes and back.
//!
//! ```text
//! Transport (frames) → Protocol (TMessage + struct) → RPC (typed calls)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod app_exception;
mod binary;
mod codec;
mod config;
mod enums;
mod error;
mod fingerprint;
mod protocol;
mod schema;
mod structs;
mod ttype;
mod value;
mod wire;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

// Generated code and the RPC crate import everything from the crate root,
// so each module's public items are re-exported here.

pub use app_exception::{
    APPLICATION_EXCEPTION_SPEC, ApplicationException, ApplicationExceptionKind,
};
pub use binary::{BinaryReader, BinaryWriter, VERSION_1, VERSION_MASK};
pub use codec::{BinaryCodec, Codec};
pub use config::{DEFAULT_MAX_DEPTH, ProtocolConfig};
pub use enums::{ENUM_SET_CAPACITY, EnumSet, ThriftEnum};
pub use error::{ProtocolError, ProtocolErrorKind, Result};
pub use fingerprint::{FingerprintWriter, canonical_bits};
pub use protocol::{ProtocolReader, ProtocolWriter};
pub use schema::{
    EnumSpec, FieldSpec, MethodSpec, Requiredness, ServiceSpec, StructKind,
    StructSpec, TypeSpec,
};
pub use structs::{
    FailureFlags, ThriftException, ThriftStruct, read_field, read_struct,
    read_union, require, write_field, write_optional_field, write_struct,
};
pub use ttype::{
    MessageType, TField, TListHeader, TMapHeader, TMessage, TSetHeader, TType,
};
pub use value::{DynamicStruct, Value};
pub use wire::{WireValue, write_list, write_map, write_set};

// Re-exported for generated code, so it only has to depend on this crate.
pub use bytes::Bytes;
