//! Thrift enums and enum sets.
//!
//! A Thrift enum is a named `i32`. Generated enums implement [`ThriftEnum`]
//! (the lookup table between variants and wire values) and get their
//! [`WireValue`] impl from [`enum_wire_value!`](crate::enum_wire_value).
//!
//! [`EnumSet`] is a bitset specialization of `set<SomeEnum>`: one bit per
//! declared variant, so membership tests and inserts never allocate. The
//! bitset is purely an in-memory choice; on the wire it is still an
//! ordinary SET of I32.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use crate::{
    ProtocolReader, ProtocolWriter, Result, TSetHeader, TType, WireValue,
};

/// A generated Thrift enum.
pub trait ThriftEnum: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// The enum's IDL name, for diagnostics.
    const NAME: &'static str;

    /// Every declared variant, in declaration order.
    const VALUES: &'static [Self];

    /// The variant's wire value, as declared in the IDL.
    fn value(self) -> i32;

    /// The variant's IDL name.
    fn name(self) -> &'static str;

    /// Finds the variant with the given wire value.
    ///
    /// Returns `None` for values the enum doesn't declare.
    fn find_by_value(value: i32) -> Option<Self> {
        Self::VALUES.iter().copied().find(|v| v.value() == value)
    }

    /// Finds the variant with the given IDL name.
    fn find_by_name(name: &str) -> Option<Self> {
        Self::VALUES.iter().copied().find(|v| v.name() == name)
    }

    /// The variant's position in [`VALUES`](Self::VALUES).
    fn ordinal(self) -> usize {
        Self::VALUES
            .iter()
            .position(|v| *v == self)
            .unwrap_or(usize::MAX)
    }
}

/// Implements [`WireValue`](crate::WireValue) for generated enums.
///
/// Enums are written as I32. A strict [`read_value`](crate::WireValue::read_value)
/// fails on unknown values; [`read_lenient`](crate::WireValue::read_lenient),
/// which struct and collection decoding use, returns `None` instead.
#[macro_export]
macro_rules! enum_wire_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::WireValue for $ty {
                const TTYPE: $crate::TType = $crate::TType::I32;

                fn write_value<W: $crate::ProtocolWriter + ?Sized>(
                    &self,
                    out: &mut W,
                ) -> $crate::Result<()> {
                    out.write_i32(<$ty as $crate::ThriftEnum>::value(*self))
                }

                fn read_value<R: $crate::ProtocolReader + ?Sized>(
                    input: &mut R,
                ) -> $crate::Result<Self> {
                    let value = input.read_i32()?;
                    <$ty as $crate::ThriftEnum>::find_by_value(value).ok_or(
                        $crate::ProtocolError::UnknownEnumValue {
                            enum_name: <$ty as $crate::ThriftEnum>::NAME,
                            value,
                        },
                    )
                }

                fn read_lenient<R: $crate::ProtocolReader + ?Sized>(
                    input: &mut R,
                ) -> $crate::Result<Option<Self>> {
                    let value = input.read_i32()?;
                    Ok(<$ty as $crate::ThriftEnum>::find_by_value(value))
                }
            }
        )+
    };
}

// ---------------------------------------------------------------------------
// EnumSet
// ---------------------------------------------------------------------------

/// Largest enum (in declared variants) an [`EnumSet`] can hold.
pub const ENUM_SET_CAPACITY: usize = 128;

/// A set of enum variants stored as a bitset over their ordinals.
///
/// Only usable for enums with at most [`ENUM_SET_CAPACITY`] variants;
/// generated code falls back to `BTreeSet` for bigger ones. Iteration is
/// in declaration order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumSet<E: ThriftEnum> {
    bits: u128,
    _marker: PhantomData<E>,
}

impl<E: ThriftEnum> EnumSet<E> {
    /// Evaluated by [`new`](Self::new), so an `EnumSet` of an enum that
    /// doesn't fit fails to compile.
    const FITS: () = assert!(
        E::VALUES.len() <= ENUM_SET_CAPACITY,
        "enum has too many variants for EnumSet"
    );

    /// Creates an empty set.
    pub fn new() -> Self {
        let () = Self::FITS;
        Self {
            bits: 0,
            _marker: PhantomData,
        }
    }

    /// Creates a set holding every declared variant.
    pub fn all() -> Self {
        E::VALUES.iter().copied().collect()
    }

    /// `None` for a variant missing from `E::VALUES`, which has no bit.
    fn bit(variant: E) -> Option<u128> {
        let ordinal = u32::try_from(variant.ordinal()).ok()?;
        1u128.checked_shl(ordinal)
    }

    /// Adds a variant. Returns `true` if it wasn't already present, and
    /// `false` for a variant the set can't hold.
    pub fn insert(&mut self, variant: E) -> bool {
        let Some(bit) = Self::bit(variant) else {
            return false;
        };
        let added = self.bits & bit == 0;
        self.bits |= bit;
        added
    }

    /// Removes a variant. Returns `true` if it was present.
    pub fn remove(&mut self, variant: E) -> bool {
        let Some(bit) = Self::bit(variant) else {
            return false;
        };
        let present = self.bits & bit != 0;
        self.bits &= !bit;
        present
    }

    pub fn contains(&self, variant: E) -> bool {
        Self::bit(variant).is_some_and(|bit| self.bits & bit != 0)
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn clear(&mut self) {
        self.bits = 0;
    }

    /// Iterates the members in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = E> + '_ {
        E::VALUES
            .iter()
            .copied()
            .filter(move |variant| self.contains(*variant))
    }
}

impl<E: ThriftEnum> Default for EnumSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ThriftEnum> FromIterator<E> for EnumSet<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<E: ThriftEnum> Extend<E> for EnumSet<E> {
    fn extend<I: IntoIterator<Item = E>>(&mut self, iter: I) {
        for variant in iter {
            self.insert(variant);
        }
    }
}

impl<E: ThriftEnum> fmt::Debug for EnumSet<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<E: ThriftEnum + WireValue> WireValue for EnumSet<E> {
    const TTYPE: TType = TType::Set;

    fn write_value<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        out.write_set_begin(TSetHeader {
            element_type: TType::I32,
            size: self.len(),
        })?;
        for variant in self.iter() {
            out.write_i32(variant.value())?;
        }
        out.write_set_end()
    }

    fn read_value<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let header = input.read_set_begin()?;
        if header.size > 0 && !TType::I32.accepts(header.element_type) {
            return Err(crate::ProtocolError::InvalidData(format!(
                "set<{}> element type mismatch: got {}",
                E::NAME,
                header.element_type
            )));
        }
        let mut set = Self::new();
        for _ in 0..header.size {
            if let Some(variant) = E::read_lenient(input)? {
                set.insert(variant);
            }
        }
        input.read_set_end()?;
        Ok(set)
    }
}
