//! Protocol configuration.

use serde::{Deserialize, Serialize};

/// Default limit on how deeply structs and collections may nest.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Knobs for the binary protocol.
///
/// The defaults match Apache Thrift's `TBinaryProtocol.Factory()`:
/// strict headers are written, both header forms are accepted on read,
/// and lengths are only bounded by the bytes actually present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Reject message headers that don't carry a version word.
    pub strict_read: bool,

    /// Write message headers with a version word.
    pub strict_write: bool,

    /// Maximum length of a string or binary value, in bytes.
    pub string_length_limit: Option<usize>,

    /// Maximum element count of a list, set or map.
    pub container_length_limit: Option<usize>,

    /// Maximum nesting of structs and collections while reading.
    pub max_depth: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            strict_read: false,
            strict_write: true,
            string_length_limit: None,
            container_length_limit: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ProtocolConfig {
    /// A config that rejects non-strict message headers.
    pub fn strict() -> Self {
        Self {
            strict_read: true,
            ..Self::default()
        }
    }
}
