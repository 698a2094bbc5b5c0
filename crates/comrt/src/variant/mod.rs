//! Tagged-union values
//!
//! [`Variant`] is the owned Rust view; [`RawVariant`] is the binary layout
//! passed across the boundary. Encoding moves string and object ownership
//! into the raw value; decoding moves it back out, so every payload is freed
//! or released exactly once.
//!
//! Only the scalar, string, date and object tags are supported. Any other
//! tag, or any modifier flag (by-reference, array, vector), is rejected with
//! [`ComError::UnsupportedVariant`].

mod raw;

pub use raw::{var_type, RawVariant, VariantBool, VariantData, VariantDate};

use std::slice;
use std::time::SystemTime;
use tracing::debug;
use crate::interfaces::{IUnknown, InterfaceHandle};
use crate::strings::{self, BString, RawBStr};
use crate::types::{ComError, Result};

/// Owned tagged value
#[derive(Debug, Default, PartialEq)]
pub enum Variant {
    #[default]
    Empty,
    Null,
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Date(VariantDate),
    String(BString),
    Object(InterfaceHandle<IUnknown>),
}

impl Variant {
    /// The tag this value encodes to
    pub fn var_type(&self) -> u16 {
        match self {
            Self::Empty => var_type::EMPTY,
            Self::Null => var_type::NULL,
            Self::I8(_) => var_type::I1,
            Self::I16(_) => var_type::I2,
            Self::I32(_) => var_type::I4,
            Self::I64(_) => var_type::I8,
            Self::U8(_) => var_type::UI1,
            Self::U16(_) => var_type::UI2,
            Self::U32(_) => var_type::UI4,
            Self::U64(_) => var_type::UI8,
            Self::F32(_) => var_type::R4,
            Self::F64(_) => var_type::R8,
            Self::Bool(_) => var_type::BOOL,
            Self::Date(_) => var_type::DATE,
            Self::String(_) => var_type::BSTR,
            Self::Object(_) => var_type::UNKNOWN,
        }
    }

    /// Convert to the binary layout, moving any string or object into it
    pub fn encode(self) -> RawVariant {
        let vt = self.var_type();
        let data = match self {
            Self::Empty | Self::Null => VariantData { record: [0; 2] },
            Self::I8(v) => VariantData { char_val: v },
            Self::I16(v) => VariantData { short_val: v },
            Self::I32(v) => VariantData { long_val: v },
            Self::I64(v) => VariantData { llong_val: v },
            Self::U8(v) => VariantData { byte_val: v },
            Self::U16(v) => VariantData { ushort_val: v },
            Self::U32(v) => VariantData { ulong_val: v },
            Self::U64(v) => VariantData { ullong_val: v },
            Self::F32(v) => VariantData { float_val: v },
            Self::F64(v) => VariantData { double_val: v },
            Self::Bool(v) => VariantData { bool_val: v.into() },
            Self::Date(v) => VariantData { date: v },
            Self::String(s) => VariantData { bstr: s.into_raw() },
            Self::Object(o) => VariantData { punk: o.into_raw() },
        };
        let mut raw = RawVariant::empty();
        raw.vt = vt;
        raw.data = data;
        raw
    }

    /// Take ownership of a raw value's payload
    ///
    /// On success `raw` is left empty. On failure `raw` is untouched and
    /// still owns whatever it held.
    ///
    /// # Safety
    ///
    /// The payload must match the tag, and string or object payloads must be
    /// owned by `raw`.
    pub unsafe fn decode(raw: &mut RawVariant) -> Result<Self> {
        let value = Self::read(raw, Ownership::Take)?;
        *raw = RawVariant::empty();
        Ok(value)
    }

    /// Copy a borrowed raw value, duplicating strings and adding object
    /// references
    ///
    /// # Safety
    ///
    /// The payload must match the tag and stay alive for the call.
    pub unsafe fn copy_from(raw: &RawVariant) -> Result<Self> {
        Self::read(raw, Ownership::Borrow)
    }

    unsafe fn read(raw: &RawVariant, ownership: Ownership) -> Result<Self> {
        let data = &raw.data;
        let value = match raw.vt {
            var_type::EMPTY => Self::Empty,
            var_type::NULL => Self::Null,
            var_type::I1 => Self::I8(data.char_val),
            var_type::I2 => Self::I16(data.short_val),
            var_type::I4 => Self::I32(data.long_val),
            var_type::I8 => Self::I64(data.llong_val),
            var_type::UI1 => Self::U8(data.byte_val),
            var_type::UI2 => Self::U16(data.ushort_val),
            var_type::UI4 => Self::U32(data.ulong_val),
            var_type::UI8 => Self::U64(data.ullong_val),
            var_type::R4 => Self::F32(data.float_val),
            var_type::R8 => Self::F64(data.double_val),
            var_type::BOOL => Self::Bool(data.bool_val.as_bool()),
            var_type::DATE => Self::Date(data.date),
            var_type::BSTR => Self::String(match ownership {
                Ownership::Take => BString::from_raw(data.bstr),
                Ownership::Borrow => copy_string(data.bstr)?,
            }),
            var_type::UNKNOWN => Self::Object(match ownership {
                Ownership::Take => InterfaceHandle::attach(data.punk),
                Ownership::Borrow => InterfaceHandle::from_raw(data.punk),
            }),
            other if other & !var_type::TYPEMASK != 0 => {
                debug!(vt = other, base = other & var_type::TYPEMASK, "variant modifier flags are not supported");
                return Err(ComError::UnsupportedVariant(other));
            }
            other => return Err(ComError::UnsupportedVariant(other)),
        };
        Ok(value)
    }

    /// Deep copy: strings are duplicated, objects gain a reference
    pub fn try_clone(&self) -> Result<Self> {
        Ok(match self {
            Self::String(s) => Self::String(s.try_clone()?),
            Self::Object(o) => Self::Object(o.clone()),
            Self::Empty => Self::Empty,
            Self::Null => Self::Null,
            Self::I8(v) => Self::I8(*v),
            Self::I16(v) => Self::I16(*v),
            Self::I32(v) => Self::I32(*v),
            Self::I64(v) => Self::I64(*v),
            Self::U8(v) => Self::U8(*v),
            Self::U16(v) => Self::U16(*v),
            Self::U32(v) => Self::U32(*v),
            Self::U64(v) => Self::U64(*v),
            Self::F32(v) => Self::F32(*v),
            Self::F64(v) => Self::F64(*v),
            Self::Bool(v) => Self::Bool(*v),
            Self::Date(v) => Self::Date(*v),
        })
    }
}

#[derive(Clone, Copy)]
enum Ownership {
    Take,
    Borrow,
}

unsafe fn copy_string(ptr: RawBStr) -> Result<BString> {
    if ptr.is_null() {
        return Ok(BString::new());
    }
    BString::from_units(slice::from_raw_parts(ptr, strings::character_count(ptr)))
}

fn mismatch(expected: &str, found: &Variant) -> ComError {
    ComError::InvalidArgument(format!(
        "expected {} value, found variant type 0x{:04x}",
        expected,
        found.var_type()
    ))
}

macro_rules! variant_conversions {
    ($($ty:ty => $case:ident),* $(,)?) => {
        $(
            impl From<$ty> for Variant {
                fn from(value: $ty) -> Self {
                    Variant::$case(value)
                }
            }

            impl TryFrom<Variant> for $ty {
                type Error = ComError;

                fn try_from(value: Variant) -> Result<Self> {
                    match value {
                        Variant::$case(v) => Ok(v),
                        other => Err(mismatch(stringify!($ty), &other)),
                    }
                }
            }
        )*
    };
}

variant_conversions! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    bool => Bool,
    VariantDate => Date,
    BString => String,
    InterfaceHandle<IUnknown> => Object,
}

impl TryFrom<&str> for Variant {
    type Error = ComError;

    fn try_from(value: &str) -> Result<Self> {
        Ok(Self::String(value.parse()?))
    }
}

impl TryFrom<Variant> for String {
    type Error = ComError;

    fn try_from(value: Variant) -> Result<Self> {
        match value {
            Variant::String(s) => s.to_utf8(),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl TryFrom<SystemTime> for Variant {
    type Error = ComError;

    fn try_from(value: SystemTime) -> Result<Self> {
        Ok(Self::Date(VariantDate::from_system_time(value)?))
    }
}

impl TryFrom<Variant> for SystemTime {
    type Error = ComError;

    fn try_from(value: Variant) -> Result<Self> {
        match value {
            Variant::Date(date) => date.to_system_time(),
            other => Err(mismatch("date", &other)),
        }
    }
}
