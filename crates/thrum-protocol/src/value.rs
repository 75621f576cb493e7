//! Descriptor-driven dynamic values.
//!
//! [`DynamicStruct`] encodes and decodes any struct given only its
//! [`StructSpec`], with the same rules generated code follows. It is used
//! to look at payloads written by a newer or older schema without having
//! that schema's generated types at hand.

use std::collections::BTreeMap;
use std::fmt;

use crate::{
    FingerprintWriter, ProtocolError, ProtocolReader, ProtocolWriter, Requiredness, Result,
    StructKind, StructSpec, TField, TListHeader, TMapHeader, TSetHeader,
    TType, TypeSpec,
};

/// A single value of any Thrift type.
///
/// Enums are held as their `I32` wire value. Sets and maps keep insertion
/// order; set elements and map keys are deduplicated on decode.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Double(f64),
    String(String),
    Binary(Vec<u8>),
    Struct(DynamicStruct),
    List(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Writes the value as `ty`.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidData`] if the value's shape doesn't match
    /// `ty`; nested struct errors as-is.
    pub fn write<W: ProtocolWriter + ?Sized>(&self, ty: &TypeSpec, out: &mut W) -> Result<()> {
        match (ty, self) {
            (TypeSpec::Bool, Value::Bool(v)) => out.write_bool(*v),
            (TypeSpec::Byte, Value::Byte(v)) => out.write_byte(*v),
            (TypeSpec::I16, Value::I16(v)) => out.write_i16(*v),
            (TypeSpec::I32 | TypeSpec::Enum(_), Value::I32(v)) => out.write_i32(*v),
            (TypeSpec::I64, Value::I64(v)) => out.write_i64(*v),
            (TypeSpec::Double, Value::Double(v)) => out.write_double(*v),
            (TypeSpec::String, Value::String(v)) => out.write_string(v),
            (TypeSpec::Binary, Value::Binary(v)) => out.write_binary(v),
            (TypeSpec::Struct(_), Value::Struct(v)) => v.write(out),
            (TypeSpec::List(elem), Value::List(items)) => {
                out.write_list_begin(TListHeader {
                    element_type: elem.ttype(),
                    size: items.len(),
                })?;
                for item in items {
                    item.write(elem, out)?;
                }
                out.write_list_end()
            }
            (TypeSpec::Set(elem), Value::Set(items)) => {
                out.write_set_begin(TSetHeader {
                    element_type: elem.ttype(),
                    size: items.len(),
                })?;
                for item in items {
                    item.write(elem, out)?;
                }
                out.write_set_end()
            }
            (TypeSpec::Map(key_ty, value_ty), Value::Map(entries)) => {
                out.write_map_begin(TMapHeader {
                    key_type: key_ty.ttype(),
                    value_type: value_ty.ttype(),
                    size: entries.len(),
                })?;
                for (key, value) in entries {
                    key.write(key_ty, out)?;
                    value.write(value_ty, out)?;
                }
                out.write_map_end()
            }
            (ty, value) => Err(ProtocolError::InvalidData(format!(
                "value {value} does not match declared type {}",
                ty.ttype()
            ))),
        }
    }

    /// Reads a value of type `ty`.
    ///
    /// Returns `None` for an enum value `ty` doesn't declare; the bytes are
    /// still consumed.
    pub fn read<R: ProtocolReader + ?Sized>(ty: &TypeSpec, input: &mut R) -> Result<Option<Value>> {
        let value = match ty {
            TypeSpec::Bool => Value::Bool(input.read_bool()?),
            TypeSpec::Byte => Value::Byte(input.read_byte()?),
            TypeSpec::I16 => Value::I16(input.read_i16()?),
            TypeSpec::I32 => Value::I32(input.read_i32()?),
            TypeSpec::Enum(spec) => {
                let value = input.read_i32()?;
                if !spec.contains(value) {
                    return Ok(None);
                }
                Value::I32(value)
            }
            TypeSpec::I64 => Value::I64(input.read_i64()?),
            TypeSpec::Double => Value::Double(input.read_double()?),
            TypeSpec::String => Value::String(input.read_string()?),
            TypeSpec::Binary => Value::Binary(input.read_binary()?.to_vec()),
            TypeSpec::Struct(spec) => Value::Struct(DynamicStruct::read(spec, input)?),
            TypeSpec::List(elem) => {
                let header = input.read_list_begin()?;
                check_element_type(elem.ttype(), header.element_type, header.size)?;
                let mut items = Vec::with_capacity(header.size);
                for _ in 0..header.size {
                    if let Some(item) = Value::read(elem, input)? {
                        items.push(item);
                    }
                }
                input.read_list_end()?;
                Value::List(items)
            }
            TypeSpec::Set(elem) => {
                let header = input.read_set_begin()?;
                check_element_type(elem.ttype(), header.element_type, header.size)?;
                let mut items: Vec<Value> = Vec::with_capacity(header.size);
                for _ in 0..header.size {
                    if let Some(item) = Value::read(elem, input)? {
                        if !items.contains(&item) {
                            items.push(item);
                        }
                    }
                }
                input.read_set_end()?;
                Value::Set(items)
            }
            TypeSpec::Map(key_ty, value_ty) => {
                let header = input.read_map_begin()?;
                check_element_type(key_ty.ttype(), header.key_type, header.size)?;
                check_element_type(value_ty.ttype(), header.value_type, header.size)?;
                let mut entries: Vec<(Value, Value)> = Vec::with_capacity(header.size);
                for _ in 0..header.size {
                    let key = Value::read(key_ty, input)?;
                    let value = Value::read(value_ty, input)?;
                    if let (Some(key), Some(value)) = (key, value) {
                        match entries.iter_mut().find(|(k, _)| *k == key) {
                            Some(entry) => entry.1 = value,
                            None => entries.push((key, value)),
                        }
                    }
                }
                input.read_map_end()?;
                Value::Map(entries)
            }
        };
        Ok(Some(value))
    }
}

fn check_element_type(expected: TType, wire: TType, size: usize) -> Result<()> {
    if size > 0 && !expected.accepts(wire) {
        return Err(ProtocolError::InvalidData(format!(
            "collection element type mismatch: expected {expected}, got {wire}"
        )));
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v:?}"),
            Value::String(v) => write!(f, "{v:?}"),
            Value::Binary(v) => {
                f.write_str("0x")?;
                for byte in v {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Value::Struct(v) => write!(f, "{v}"),
            Value::List(items) => write_seq(f, "[", items, "]"),
            Value::Set(items) => write_seq(f, "{", items, "}"),
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(close)
}

// ---------------------------------------------------------------------------
// DynamicStruct
// ---------------------------------------------------------------------------

/// A struct, union or exception held as a field-id → value map.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicStruct {
    spec: &'static StructSpec,
    fields: BTreeMap<i16, Value>,
}

impl DynamicStruct {
    /// Creates a value with no fields set.
    pub fn new(spec: &'static StructSpec) -> Self {
        Self {
            spec,
            fields: BTreeMap::new(),
        }
    }

    pub fn spec(&self) -> &'static StructSpec {
        self.spec
    }

    pub fn get(&self, id: i16) -> Option<&Value> {
        self.fields.get(&id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.spec
            .field_by_name(name)
            .and_then(|field| self.fields.get(&field.id))
    }

    /// Returns the field's value, or its type's default for an unset
    /// `Default` field.
    pub fn get_or_default(&self, id: i16) -> Option<Value> {
        match self.fields.get(&id) {
            Some(value) => Some(value.clone()),
            None => self
                .spec
                .field_by_id(id)
                .filter(|field| field.requiredness == Requiredness::Default)
                .map(|field| field.ty.default_value()),
        }
    }

    pub fn is_set(&self, id: i16) -> bool {
        self.fields.contains_key(&id)
    }

    /// Sets a declared field. Returns the previous value.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidData`] if `id` isn't declared.
    pub fn set(&mut self, id: i16, value: Value) -> Result<Option<Value>> {
        if self.spec.field_by_id(id).is_none() {
            return Err(ProtocolError::InvalidData(format!(
                "{} has no field {id}",
                self.spec.name
            )));
        }
        Ok(self.fields.insert(id, value))
    }

    pub fn unset(&mut self, id: i16) -> Option<Value> {
        self.fields.remove(&id)
    }

    /// Checks required fields and, for unions, that exactly one field is
    /// set.
    pub fn validate(&self) -> Result<()> {
        if self.spec.kind == StructKind::Union {
            return match self.fields.len() {
                0 => Err(ProtocolError::UnionNoValue(self.spec.name)),
                1 => Ok(()),
                _ => Err(ProtocolError::UnionMultipleValues(self.spec.name)),
            };
        }
        for field in self.spec.required_fields() {
            if !self.fields.contains_key(&field.id) {
                return Err(ProtocolError::RequiredFieldMissing {
                    field: field.name,
                    struct_name: self.spec.name,
                });
            }
        }
        Ok(())
    }

    /// The same fingerprint generated code computes for this value.
    ///
    /// # Errors
    /// Fails like [`write`](Self::write): a missing required field or a
    /// union without exactly one field has no fingerprint.
    pub fn fingerprint(&self) -> Result<u64> {
        let mut hasher = FingerprintWriter::new();
        self.write(&mut hasher)?;
        Ok(hasher.finish())
    }

    /// Validates, then writes the set fields in declaration order.
    pub fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        self.validate()?;
        out.write_struct_begin(self.spec.name)?;
        for field in self.spec.fields {
            if let Some(value) = self.fields.get(&field.id) {
                out.write_field_begin(TField::new(field.ty.ttype(), field.id))?;
                value.write(&field.ty, out)?;
                out.write_field_end()?;
            }
        }
        out.write_field_stop()?;
        out.write_struct_end()
    }

    /// Reads a struct described by `spec`.
    ///
    /// Fields with an undeclared id, or a declared id but the wrong tag,
    /// are skipped. A union with a second field fails after the whole
    /// struct has been consumed.
    pub fn read<R: ProtocolReader + ?Sized>(spec: &'static StructSpec, input: &mut R) -> Result<Self> {
        let mut value = Self::new(spec);
        let mut seen = 0usize;
        crate::read_struct(input, |input, header| {
            seen += 1;
            if spec.kind == StructKind::Union && seen > 1 {
                return input.skip(header.ttype);
            }
            match spec.field_by_id(header.id) {
                Some(field) if field.ty.ttype().accepts(header.ttype) => {
                    if let Some(v) = Value::read(&field.ty, input)? {
                        value.fields.insert(field.id, v);
                    }
                    Ok(())
                }
                _ => input.skip(header.ttype),
            }
        })?;
        if spec.kind == StructKind::Union && seen > 1 {
            return Err(ProtocolError::UnionMultipleValues(spec.name));
        }
        value.validate()?;
        Ok(value)
    }
}

impl fmt::Display for DynamicStruct {
    /// `Name(field=value, ...)` over the set fields in declaration order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.spec.name)?;
        let mut first = true;
        for field in self.spec.fields {
            if let Some(value) = self.fields.get(&field.id) {
                if !first {
                    f.write_str(", ")?;
                }
                first = false;
                write!(f, "{}={value}", field.name)?;
            }
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BinaryReader, BinaryWriter, FieldSpec, ProtocolConfig};

    static USER: StructSpec = StructSpec {
        name: "User",
        kind: StructKind::Struct,
        fields: &[
            FieldSpec {
                id: 1,
                name: "id",
                ty: TypeSpec::I32,
                requiredness: Requiredness::Required,
            },
            FieldSpec {
                id: 2,
                name: "name",
                ty: TypeSpec::String,
                requiredness: Requiredness::Optional,
            },
        ],
    };

    // The same struct as a newer schema would see it: one extra field.
    static USER_V2: StructSpec = StructSpec {
        name: "User",
        kind: StructKind::Struct,
        fields: &[
            FieldSpec {
                id: 1,
                name: "id",
                ty: TypeSpec::I32,
                requiredness: Requiredness::Required,
            },
            FieldSpec {
                id: 2,
                name: "name",
                ty: TypeSpec::String,
                requiredness: Requiredness::Optional,
            },
            FieldSpec {
                id: 3,
                name: "tags",
                ty: TypeSpec::Map(&TypeSpec::String, &TypeSpec::List(&TypeSpec::I64)),
                requiredness: Requiredness::Default,
            },
        ],
    };

    static CHOICE: StructSpec = StructSpec {
        name: "Choice",
        kind: StructKind::Union,
        fields: &[
            FieldSpec {
                id: 1,
                name: "a",
                ty: TypeSpec::I32,
                requiredness: Requiredness::Optional,
            },
            FieldSpec {
                id: 2,
                name: "b",
                ty: TypeSpec::String,
                requiredness: Requiredness::Optional,
            },
        ],
    };

    fn encode(value: &DynamicStruct) -> Vec<u8> {
        let mut w = BinaryWriter::new(&ProtocolConfig::default());
        value.write(&mut w).unwrap();
        w.as_bytes().to_vec()
    }

    fn decode(spec: &'static StructSpec, bytes: &[u8]) -> Result<DynamicStruct> {
        DynamicStruct::read(spec, &mut BinaryReader::new(bytes, &ProtocolConfig::default()))
    }

    #[test]
    fn test_user_round_trip_and_display() {
        let mut user = DynamicStruct::new(&USER);
        user.set(1, Value::I32(7)).unwrap();
        user.set(2, Value::String("ann".into())).unwrap();

        let decoded = decode(&USER, &encode(&user)).unwrap();
        assert_eq!(decoded, user);
        assert_eq!(decoded.to_string(), r#"User(id=7, name="ann")"#);
    }

    #[test]
    fn test_old_reader_skips_new_field() {
        let mut v2 = DynamicStruct::new(&USER_V2);
        v2.set(1, Value::I32(1)).unwrap();
        v2.set(
            3,
            Value::Map(vec![(
                Value::String("k".into()),
                Value::List(vec![Value::I64(1), Value::I64(2)]),
            )]),
        )
        .unwrap();

        let old = decode(&USER, &encode(&v2)).unwrap();
        assert_eq!(old.get(1), Some(&Value::I32(1)));
        assert!(!old.is_set(2));
    }

    #[test]
    fn test_required_field_enforced_both_ways() {
        let user = DynamicStruct::new(&USER);
        let mut w = BinaryWriter::new(&ProtocolConfig::default());
        assert!(matches!(
            user.write(&mut w),
            Err(ProtocolError::RequiredFieldMissing { field: "id", struct_name: "User" })
        ));

        // Only the STOP byte: `id` never arrives.
        assert!(matches!(
            decode(&USER, &[0]),
            Err(ProtocolError::RequiredFieldMissing { field: "id", .. })
        ));
    }

    #[test]
    fn test_fingerprint_needs_required_fields() {
        let mut user = DynamicStruct::new(&USER);
        assert!(matches!(
            user.fingerprint(),
            Err(ProtocolError::RequiredFieldMissing { field: "id", .. })
        ));

        user.set(1, Value::I32(7)).unwrap();
        let same = user.clone();
        assert_eq!(user.fingerprint().unwrap(), same.fingerprint().unwrap());
        user.set(1, Value::I32(8)).unwrap();
        assert_ne!(user.fingerprint().unwrap(), same.fingerprint().unwrap());
    }

    #[test]
    fn test_mismatched_tag_is_skipped() {
        // field 1 declared as i32, sent as i64.
        let bytes = [10, 0, 1, 0, 0, 0, 0, 0, 0, 0, 5, 8, 0, 1, 0, 0, 0, 6, 0];
        let user = decode(&USER, &bytes).unwrap();
        assert_eq!(user.get(1), Some(&Value::I32(6)));
    }

    #[test]
    fn test_union_rules() {
        let mut choice = DynamicStruct::new(&CHOICE);
        let mut w = BinaryWriter::new(&ProtocolConfig::default());
        assert!(matches!(choice.write(&mut w), Err(ProtocolError::UnionNoValue("Choice"))));

        choice.set(1, Value::I32(1)).unwrap();
        choice.set(2, Value::String("x".into())).unwrap();
        assert!(matches!(
            choice.validate(),
            Err(ProtocolError::UnionMultipleValues("Choice"))
        ));

        // Two fields on the wire.
        let bytes = [8, 0, 1, 0, 0, 0, 1, 8, 0, 9, 0, 0, 0, 2, 0];
        assert!(matches!(
            decode(&CHOICE, &bytes),
            Err(ProtocolError::UnionMultipleValues("Choice"))
        ));
    }

    #[test]
    fn test_get_or_default() {
        let user = DynamicStruct::new(&USER_V2);
        assert_eq!(user.get_or_default(3), Some(Value::Map(Vec::new())));
        assert_eq!(user.get_or_default(2), None);
    }

    #[test]
    fn test_set_rejects_undeclared_field() {
        let mut user = DynamicStruct::new(&USER);
        assert!(user.set(9, Value::Bool(true)).is_err());
    }
}
