//! Static type descriptors.
//!
//! Every generated struct, enum and service carries a descriptor built
//! from these types, declared as a `static` next to the generated code.
//! Descriptors are what the RPC layer walks to pre-build per-method stats,
//! and what [`DynamicStruct`](crate::DynamicStruct) uses to decode a
//! struct without its generated type.

use crate::{TType, Value};

/// How a field must be handled when it is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requiredness {
    /// Must be present on encode and on decode.
    Required,
    /// May be absent; absence is observable.
    Optional,
    /// Written when set; a missing value reads back as the declared
    /// default.
    Default,
}

/// The declared type of a field, collection element or map entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypeSpec {
    Bool,
    Byte,
    I16,
    I32,
    I64,
    Double,
    String,
    Binary,
    Enum(&'static EnumSpec),
    Struct(&'static StructSpec),
    List(&'static TypeSpec),
    Set(&'static TypeSpec),
    Map(&'static TypeSpec, &'static TypeSpec),
}

impl TypeSpec {
    /// The wire tag values of this type are written with.
    pub fn ttype(&self) -> TType {
        match self {
            TypeSpec::Bool => TType::Bool,
            TypeSpec::Byte => TType::Byte,
            TypeSpec::I16 => TType::I16,
            TypeSpec::I32 | TypeSpec::Enum(_) => TType::I32,
            TypeSpec::I64 => TType::I64,
            TypeSpec::Double => TType::Double,
            TypeSpec::String | TypeSpec::Binary => TType::String,
            TypeSpec::Struct(_) => TType::Struct,
            TypeSpec::List(_) => TType::List,
            TypeSpec::Set(_) => TType::Set,
            TypeSpec::Map(_, _) => TType::Map,
        }
    }

    /// The canonical default of this type: zero, false, empty, a struct
    /// with nothing set, or an enum's first declared value.
    pub fn default_value(&self) -> Value {
        match self {
            TypeSpec::Bool => Value::Bool(false),
            TypeSpec::Byte => Value::Byte(0),
            TypeSpec::I16 => Value::I16(0),
            TypeSpec::I32 => Value::I32(0),
            TypeSpec::Enum(spec) => {
                Value::I32(spec.values.first().map_or(0, |(_, value)| *value))
            }
            TypeSpec::I64 => Value::I64(0),
            TypeSpec::Double => Value::Double(0.0),
            TypeSpec::String => Value::String(String::new()),
            TypeSpec::Binary => Value::Binary(Vec::new()),
            TypeSpec::Struct(spec) => Value::Struct(crate::DynamicStruct::new(spec)),
            TypeSpec::List(_) => Value::List(Vec::new()),
            TypeSpec::Set(_) => Value::Set(Vec::new()),
            TypeSpec::Map(_, _) => Value::Map(Vec::new()),
        }
    }
}

/// One declared field of a struct.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub id: i16,
    pub name: &'static str,
    pub ty: TypeSpec,
    pub requiredness: Requiredness,
}

/// Which flavor of structured type a [`StructSpec`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructKind {
    Struct,
    Union,
    Exception,
}

/// A struct, union or exception descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructSpec {
    pub name: &'static str,
    pub kind: StructKind,
    pub fields: &'static [FieldSpec],
}

impl StructSpec {
    pub fn field_by_id(&self, id: i16) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields that must be present, in declaration order.
    pub fn required_fields(&self) -> impl Iterator<Item = &'static FieldSpec> {
        self.fields
            .iter()
            .filter(|f| f.requiredness == Requiredness::Required)
    }
}

/// An enum descriptor: its IDL name and `(name, value)` pairs in
/// declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumSpec {
    pub name: &'static str,
    pub values: &'static [(&'static str, i32)],
}

impl EnumSpec {
    pub fn contains(&self, value: i32) -> bool {
        self.values.iter().any(|(_, v)| *v == value)
    }

    pub fn name_of(&self, value: i32) -> Option<&'static str> {
        self.values
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| *name)
    }
}

/// A service method: the args struct sent with CALL and the result struct
/// sent back with REPLY.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MethodSpec {
    pub name: &'static str,
    pub args: &'static StructSpec,
    pub result: &'static StructSpec,
    pub oneway: bool,
}

impl MethodSpec {
    /// `true` if the method returns nothing (its result struct has no
    /// field 0).
    pub fn is_void(&self) -> bool {
        self.result.field_by_id(0).is_none()
    }

    /// Names of the declared exceptions, in result-field order.
    pub fn exceptions(&self) -> impl Iterator<Item = &'static str> {
        self.result
            .fields
            .iter()
            .filter(|f| f.id != 0)
            .filter_map(|f| match f.ty {
                TypeSpec::Struct(spec) => Some(spec.name),
                _ => None,
            })
    }
}

/// A service descriptor.
///
/// `parent` is the service this one extends. Method names are unique
/// across the whole chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceSpec {
    pub name: &'static str,
    pub parent: Option<&'static ServiceSpec>,
    pub methods: &'static [MethodSpec],
}

impl ServiceSpec {
    /// Every method the service answers, inherited ones first.
    pub fn all_methods(&self) -> Vec<&'static MethodSpec> {
        let mut methods = match self.parent {
            Some(parent) => parent.all_methods(),
            None => Vec::new(),
        };
        methods.extend(self.methods.iter());
        methods
    }

    pub fn method(&self, name: &str) -> Option<&'static MethodSpec> {
        self.methods
            .iter()
            .find(|m| m.name == name)
            .or_else(|| self.parent.and_then(|p| p.method(name)))
    }
}
