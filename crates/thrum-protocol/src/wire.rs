//! Per-type value codecs.
//!
//! [`WireValue`] is implemented by every type that can appear as a field
//! value or collection element: the primitives, `String`, [`Bytes`] for
//! `binary`, the standard collections, and (through the
//! [`struct_wire_value!`](crate::struct_wire_value) and
//! [`enum_wire_value!`](crate::enum_wire_value) macros) generated structs
//! and enums.
//!
//! Collections are generic over their element codecs, so
//! `BTreeMap<String, Vec<HashSet<i32>>>` encodes without any extra code.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use bytes::Bytes;

use crate::{
    ProtocolError, ProtocolReader, ProtocolWriter, Result, TListHeader,
    TMapHeader, TSetHeader, TType,
};

/// A value with a fixed wire type tag and its own encode/decode routine.
pub trait WireValue: Sized {
    /// The tag written in front of this value in field and collection
    /// headers.
    const TTYPE: TType;

    /// Writes the value's payload (no field header).
    fn write_value<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()>;

    /// Reads a value's payload.
    fn read_value<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self>;

    /// Reads a value, mapping "well-formed but unrecognized" to `None`.
    ///
    /// Only enums override this: an unknown enum value consumes its four
    /// bytes and yields `None`, so struct fields stay unset and collection
    /// elements are dropped instead of failing the whole decode.
    fn read_lenient<R: ProtocolReader + ?Sized>(
        input: &mut R,
    ) -> Result<Option<Self>> {
        Self::read_value(input).map(Some)
    }
}

macro_rules! primitive_wire_value {
    ($ty:ty, $ttype:expr, $write:ident, $read:ident) => {
        impl WireValue for $ty {
            const TTYPE: TType = $ttype;

            fn write_value<W: ProtocolWriter + ?Sized>(
                &self,
                out: &mut W,
            ) -> Result<()> {
                out.$write(*self)
            }

            fn read_value<R: ProtocolReader + ?Sized>(
                input: &mut R,
            ) -> Result<Self> {
                input.$read()
            }
        }
    };
}

primitive_wire_value!(bool, TType::Bool, write_bool, read_bool);
primitive_wire_value!(i8, TType::Byte, write_byte, read_byte);
primitive_wire_value!(i16, TType::I16, write_i16, read_i16);
primitive_wire_value!(i32, TType::I32, write_i32, read_i32);
primitive_wire_value!(i64, TType::I64, write_i64, read_i64);
primitive_wire_value!(f64, TType::Double, write_double, read_double);

impl WireValue for String {
    const TTYPE: TType = TType::String;

    fn write_value<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        out.write_string(self)
    }

    fn read_value<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        input.read_string()
    }
}

/// `binary` fields. Same tag as strings; no UTF-8 requirement.
impl WireValue for Bytes {
    const TTYPE: TType = TType::String;

    fn write_value<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        out.write_binary(self)
    }

    fn read_value<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        input.read_binary()
    }
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

fn check_element(
    container: &str,
    expected: TType,
    actual: TType,
    size: usize,
) -> Result<()> {
    // Empty collections carry whatever tag the peer felt like writing.
    if size == 0 || expected.accepts(actual) {
        Ok(())
    } else {
        Err(ProtocolError::InvalidData(format!(
            "{container} element type mismatch: expected {expected}, got {actual}"
        )))
    }
}

fn read_list_elements<T, R>(input: &mut R) -> Result<Vec<T>>
where
    T: WireValue,
    R: ProtocolReader + ?Sized,
{
    let header = input.read_list_begin()?;
    check_element("list", T::TTYPE, header.element_type, header.size)?;
    let mut items = Vec::with_capacity(header.size);
    for _ in 0..header.size {
        if let Some(item) = T::read_lenient(input)? {
            items.push(item);
        }
    }
    input.read_list_end()?;
    Ok(items)
}

fn read_set_elements<T, R, F>(input: &mut R, mut insert: F) -> Result<()>
where
    T: WireValue,
    R: ProtocolReader + ?Sized,
    F: FnMut(T),
{
    let header = input.read_set_begin()?;
    check_element("set", T::TTYPE, header.element_type, header.size)?;
    for _ in 0..header.size {
        if let Some(item) = T::read_lenient(input)? {
            insert(item);
        }
    }
    input.read_set_end()
}

fn read_map_entries<K, V, R, F>(input: &mut R, mut insert: F) -> Result<()>
where
    K: WireValue,
    V: WireValue,
    R: ProtocolReader + ?Sized,
    F: FnMut(K, V),
{
    let header = input.read_map_begin()?;
    check_element("map key", K::TTYPE, header.key_type, header.size)?;
    check_element("map value", V::TTYPE, header.value_type, header.size)?;
    for _ in 0..header.size {
        // Key first, then value. Both are always consumed so that an
        // unknown enum on either side drops the entry, not the stream.
        let key = K::read_lenient(input)?;
        let value = V::read_lenient(input)?;
        if let (Some(key), Some(value)) = (key, value) {
            insert(key, value);
        }
    }
    input.read_map_end()
}

/// Writes a list header followed by the elements.
pub fn write_list<'a, T, W, I>(out: &mut W, len: usize, items: I) -> Result<()>
where
    T: WireValue + 'a,
    W: ProtocolWriter + ?Sized,
    I: IntoIterator<Item = &'a T>,
{
    out.write_list_begin(TListHeader {
        element_type: T::TTYPE,
        size: len,
    })?;
    for item in items {
        item.write_value(out)?;
    }
    out.write_list_end()
}

/// Writes a set header followed by the elements.
pub fn write_set<'a, T, W, I>(out: &mut W, len: usize, items: I) -> Result<()>
where
    T: WireValue + 'a,
    W: ProtocolWriter + ?Sized,
    I: IntoIterator<Item = &'a T>,
{
    out.write_set_begin(TSetHeader {
        element_type: T::TTYPE,
        size: len,
    })?;
    for item in items {
        item.write_value(out)?;
    }
    out.write_set_end()
}

/// Writes a map header followed by key/value pairs.
pub fn write_map<'a, K, V, W, I>(out: &mut W, len: usize, entries: I) -> Result<()>
where
    K: WireValue + 'a,
    V: WireValue + 'a,
    W: ProtocolWriter + ?Sized,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    out.write_map_begin(TMapHeader {
        key_type: K::TTYPE,
        value_type: V::TTYPE,
        size: len,
    })?;
    for (key, value) in entries {
        key.write_value(out)?;
        value.write_value(out)?;
    }
    out.write_map_end()
}

impl<T: WireValue> WireValue for Vec<T> {
    const TTYPE: TType = TType::List;

    fn write_value<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_list(out, self.len(), self)
    }

    fn read_value<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        read_list_elements(input)
    }
}

/// Written in ascending order, like `BTreeSet`, so the encoding (and the
/// fingerprint) doesn't depend on the hasher's iteration order.
impl<T: WireValue + Eq + Hash + Ord> WireValue for HashSet<T> {
    const TTYPE: TType = TType::Set;

    fn write_value<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        let mut items: Vec<&T> = self.iter().collect();
        items.sort_unstable();
        write_set(out, items.len(), items)
    }

    fn read_value<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let mut set = HashSet::new();
        read_set_elements(input, |item| {
            set.insert(item);
        })?;
        Ok(set)
    }
}

impl<T: WireValue + Ord> WireValue for BTreeSet<T> {
    const TTYPE: TType = TType::Set;

    fn write_value<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_set(out, self.len(), self)
    }

    fn read_value<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let mut set = BTreeSet::new();
        read_set_elements(input, |item| {
            set.insert(item);
        })?;
        Ok(set)
    }
}

/// Written in ascending key order, like `BTreeMap`.
impl<K, V> WireValue for HashMap<K, V>
where
    K: WireValue + Eq + Hash + Ord,
    V: WireValue,
{
    const TTYPE: TType = TType::Map;

    fn write_value<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        let mut entries: Vec<(&K, &V)> = self.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        write_map(out, entries.len(), entries)
    }

    fn read_value<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let mut map = HashMap::new();
        read_map_entries(input, |k, v| {
            map.insert(k, v);
        })?;
        Ok(map)
    }
}

impl<K, V> WireValue for BTreeMap<K, V>
where
    K: WireValue + Ord,
    V: WireValue,
{
    const TTYPE: TType = TType::Map;

    fn write_value<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_map(out, self.len(), self)
    }

    fn read_value<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let mut map = BTreeMap::new();
        read_map_entries(input, |k, v| {
            map.insert(k, v);
        })?;
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BinaryReader, BinaryWriter, ProtocolConfig};

    fn encode<T: WireValue>(value: &T) -> Bytes {
        let mut w = BinaryWriter::new(&ProtocolConfig::default());
        value.write_value(&mut w).unwrap();
        w.into_bytes()
    }

    fn decode<T: WireValue>(bytes: &[u8]) -> Result<T> {
        let mut r = BinaryReader::new(bytes, &ProtocolConfig::default());
        T::read_value(&mut r)
    }

    #[test]
    fn test_list_header_and_elements() {
        let bytes = encode(&vec![1i16, 2]);
        assert_eq!(&bytes[..], &[6, 0, 0, 0, 2, 0, 1, 0, 2]);
        assert_eq!(decode::<Vec<i16>>(&bytes).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_list_keeps_duplicates_set_collapses_them() {
        let bytes = encode(&vec![7i32, 7, 8]);
        assert_eq!(decode::<Vec<i32>>(&bytes).unwrap(), vec![7, 7, 8]);

        // List and set headers share a layout, so the same bytes decode as
        // a set, where the duplicate collapses.
        let set = decode::<BTreeSet<i32>>(&bytes).unwrap();
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![7, 8]);
    }

    #[test]
    fn test_map_reads_key_then_value() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), 1i64);
        map.insert("b".to_string(), 2i64);
        let bytes = encode(&map);
        assert_eq!(&bytes[..6], &[11, 10, 0, 0, 0, 2]);
        assert_eq!(decode::<BTreeMap<String, i64>>(&bytes).unwrap(), map);
    }

    #[test]
    fn test_nested_collections_depth_three() {
        let mut inner = HashMap::new();
        inner.insert("k".to_string(), HashSet::from([1i32, 2, 3]));
        let value = vec![inner.clone(), HashMap::new(), inner];
        let bytes = encode(&value);
        assert_eq!(
            decode::<Vec<HashMap<String, HashSet<i32>>>>(&bytes).unwrap(),
            value
        );
    }

    #[test]
    fn test_hash_collections_encode_in_order() {
        let hashed: HashSet<i32> = (0..50).rev().collect();
        let sorted: BTreeSet<i32> = (0..50).collect();
        assert_eq!(encode(&hashed), encode(&sorted));

        let hashed: HashMap<String, i32> = (0..20).map(|i| (format!("k{i:02}"), i)).collect();
        let sorted: BTreeMap<String, i32> = hashed.clone().into_iter().collect();
        assert_eq!(encode(&hashed), encode(&sorted));
    }

    #[test]
    fn test_element_type_mismatch_is_an_error() {
        let bytes = encode(&vec![1i64]);
        assert!(matches!(
            decode::<Vec<i32>>(&bytes),
            Err(ProtocolError::InvalidData(_))
        ));
    }

    #[test]
    fn test_empty_collection_ignores_element_tag() {
        // An empty list claiming STRING elements still decodes as list<i32>.
        let bytes = [11, 0, 0, 0, 0];
        assert!(decode::<Vec<i32>>(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_binary_has_string_tag() {
        assert_eq!(<Bytes as WireValue>::TTYPE, TType::String);
        let bytes = encode(&Bytes::from_static(&[0xff, 0x00]));
        assert_eq!(&bytes[..], &[0, 0, 0, 2, 0xff, 0x00]);
    }
}
