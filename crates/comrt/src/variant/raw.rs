//! Binary layout of the tagged value

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use bytes::{Buf, BufMut};
use crate::interfaces::{self, RawComPtr};
use crate::strings::{self, RawBStr};
use crate::types::{ComError, Result};

/// Type tags
pub mod var_type {
    pub const EMPTY: u16 = 0;
    pub const NULL: u16 = 1;
    pub const I2: u16 = 2;
    pub const I4: u16 = 3;
    pub const R4: u16 = 4;
    pub const R8: u16 = 5;
    pub const DATE: u16 = 7;
    pub const BSTR: u16 = 8;
    pub const BOOL: u16 = 11;
    pub const UNKNOWN: u16 = 13;
    pub const I1: u16 = 16;
    pub const UI1: u16 = 17;
    pub const UI2: u16 = 18;
    pub const UI4: u16 = 19;
    pub const I8: u16 = 20;
    pub const UI8: u16 = 21;

    /// Modifier flags; none are supported by the codec
    pub const ARRAY: u16 = 0x2000;
    pub const BYREF: u16 = 0x4000;

    /// Bits holding the base type; the rest are modifiers
    pub const TYPEMASK: u16 = 0x0fff;
}

/// 16-bit boolean: all bits set for true
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct VariantBool(pub i16);

impl VariantBool {
    pub const TRUE: Self = Self(-1);
    pub const FALSE: Self = Self(0);

    /// Any non-zero value reads as true
    pub fn as_bool(self) -> bool {
        self.0 != 0
    }
}

impl From<bool> for VariantBool {
    fn from(value: bool) -> Self {
        if value { Self::TRUE } else { Self::FALSE }
    }
}

impl From<VariantBool> for bool {
    fn from(value: VariantBool) -> Self {
        value.as_bool()
    }
}

const TICKS_PER_DAY: i128 = 864_000_000_000;
const NANOS_PER_TICK: i128 = 100;
const EPOCH_BEFORE_UNIX_SECS: u64 = 2_209_161_600;

/// Fractional days since 1899-12-30 00:00:00 UTC
///
/// The integral part counts days and the fractional part is the time of day.
/// Before the epoch both count away from it: `-1.25` is 1899-12-29 06:00.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct VariantDate(pub f64);

impl VariantDate {
    /// 1899-12-30 00:00:00 UTC
    pub fn epoch() -> Result<SystemTime> {
        UNIX_EPOCH
            .checked_sub(Duration::from_secs(EPOCH_BEFORE_UNIX_SECS))
            .ok_or_else(|| ComError::InvalidArgument("date epoch not representable".into()))
    }

    /// Convert to a point in time with 100ns precision
    pub fn to_system_time(self) -> Result<SystemTime> {
        if !self.0.is_finite() {
            return Err(ComError::InvalidArgument(format!("invalid date {}", self.0)));
        }
        let out_of_range = || ComError::InvalidArgument(format!("date {} out of range", self.0));
        let days = self.0.trunc();
        let time = self.0.fract().abs();
        // `as` saturates, so huge values fail the checked multiply instead of wrapping.
        let ticks = (days as i128)
            .checked_mul(TICKS_PER_DAY)
            .and_then(|ticks| ticks.checked_add((time * TICKS_PER_DAY as f64).round() as i128))
            .ok_or_else(out_of_range)?;
        let nanos = ticks.checked_mul(NANOS_PER_TICK).ok_or_else(out_of_range)?;
        let offset = u64::try_from(nanos.unsigned_abs())
            .map(Duration::from_nanos)
            .map_err(|_| out_of_range())?;

        let epoch = Self::epoch()?;
        let moment = if ticks >= 0 {
            epoch.checked_add(offset)
        } else {
            epoch.checked_sub(offset)
        };
        moment.ok_or_else(out_of_range)
    }

    /// Convert from a point in time, truncating to 100ns
    pub fn from_system_time(moment: SystemTime) -> Result<Self> {
        let epoch = Self::epoch()?;
        let ticks = match moment.duration_since(epoch) {
            Ok(after) => (after.as_nanos() / NANOS_PER_TICK as u128) as i128,
            Err(before) => -((before.duration().as_nanos() / NANOS_PER_TICK as u128) as i128),
        };
        let offset = ticks as f64 / TICKS_PER_DAY as f64;
        if offset >= 0.0 {
            return Ok(Self(offset));
        }
        let days = offset.floor();
        let time = offset - days;
        Ok(Self(days - time))
    }
}

/// Payload union
#[repr(C)]
#[derive(Clone, Copy)]
pub union VariantData {
    pub char_val: i8,
    pub short_val: i16,
    pub long_val: i32,
    pub llong_val: i64,
    pub byte_val: u8,
    pub ushort_val: u16,
    pub ulong_val: u32,
    pub ullong_val: u64,
    pub float_val: f32,
    pub double_val: f64,
    pub bool_val: VariantBool,
    pub date: VariantDate,
    pub bstr: RawBStr,
    pub punk: RawComPtr,
    /// Sizes the union for the record form (two pointers)
    pub record: [usize; 2],
}

/// The tagged value as laid out in memory
///
/// A raw value owns its string or object reference when the tag says so.
/// It has no destructor; [`clear`](Self::clear) releases the payload.
#[repr(C)]
pub struct RawVariant {
    pub vt: u16,
    pub reserved1: u16,
    pub reserved2: u16,
    pub reserved3: u16,
    pub data: VariantData,
}

impl RawVariant {
    /// An empty value
    pub const fn empty() -> Self {
        Self::with(var_type::EMPTY, VariantData { record: [0; 2] })
    }

    pub(crate) const fn with(vt: u16, data: VariantData) -> Self {
        Self {
            vt,
            reserved1: 0,
            reserved2: 0,
            reserved3: 0,
            data,
        }
    }

    /// Free the owned payload and reset to empty
    ///
    /// # Safety
    ///
    /// For string and object tags the payload must be a pointer owned by
    /// this value.
    pub unsafe fn clear(&mut self) {
        match self.vt {
            var_type::BSTR => strings::free(self.data.bstr),
            var_type::UNKNOWN => {
                if !self.data.punk.is_null() {
                    interfaces::release(self.data.punk);
                }
            }
            _ => {}
        }
        *self = Self::empty();
    }

    /// Serialize a scalar value: `[u16 LE tag][6 zero bytes][8-byte LE payload]`
    ///
    /// Pointer payloads have no host-independent form and are rejected.
    pub fn write_scalar<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        let mut payload = [0u8; 8];
        // SAFETY: each arm reads the field selected by the tag.
        unsafe {
            match self.vt {
                var_type::EMPTY | var_type::NULL => {}
                var_type::I1 => payload[..1].copy_from_slice(&self.data.char_val.to_le_bytes()),
                var_type::UI1 => payload[0] = self.data.byte_val,
                var_type::I2 => payload[..2].copy_from_slice(&self.data.short_val.to_le_bytes()),
                var_type::UI2 => payload[..2].copy_from_slice(&self.data.ushort_val.to_le_bytes()),
                var_type::BOOL => payload[..2].copy_from_slice(&self.data.bool_val.0.to_le_bytes()),
                var_type::I4 => payload[..4].copy_from_slice(&self.data.long_val.to_le_bytes()),
                var_type::UI4 => payload[..4].copy_from_slice(&self.data.ulong_val.to_le_bytes()),
                var_type::R4 => payload[..4].copy_from_slice(&self.data.float_val.to_le_bytes()),
                var_type::I8 => payload = self.data.llong_val.to_le_bytes(),
                var_type::UI8 => payload = self.data.ullong_val.to_le_bytes(),
                var_type::R8 => payload = self.data.double_val.to_le_bytes(),
                var_type::DATE => payload = self.data.date.0.to_le_bytes(),
                other => return Err(ComError::UnsupportedVariant(other)),
            }
        }
        buf.put_u16_le(self.vt);
        buf.put_bytes(0, 6);
        buf.put_slice(&payload);
        Ok(())
    }

    /// Read a value written by [`write_scalar`](Self::write_scalar)
    pub fn read_scalar<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < 16 {
            return Err(ComError::Encoding(format!(
                "variant needs 16 bytes, {} remaining",
                buf.remaining()
            )));
        }
        let vt = buf.get_u16_le();
        buf.advance(6);
        let mut payload = [0u8; 8];
        buf.copy_to_slice(&mut payload);

        let data = match vt {
            var_type::EMPTY | var_type::NULL => VariantData { record: [0; 2] },
            var_type::I1 => VariantData { char_val: payload[0] as i8 },
            var_type::UI1 => VariantData { byte_val: payload[0] },
            var_type::I2 => VariantData { short_val: i16::from_le_bytes([payload[0], payload[1]]) },
            var_type::UI2 => VariantData { ushort_val: u16::from_le_bytes([payload[0], payload[1]]) },
            var_type::BOOL => VariantData {
                bool_val: VariantBool(i16::from_le_bytes([payload[0], payload[1]])),
            },
            var_type::I4 => VariantData { long_val: i32::from_le_bytes(first4(&payload)) },
            var_type::UI4 => VariantData { ulong_val: u32::from_le_bytes(first4(&payload)) },
            var_type::R4 => VariantData { float_val: f32::from_le_bytes(first4(&payload)) },
            var_type::I8 => VariantData { llong_val: i64::from_le_bytes(payload) },
            var_type::UI8 => VariantData { ullong_val: u64::from_le_bytes(payload) },
            var_type::R8 => VariantData { double_val: f64::from_le_bytes(payload) },
            var_type::DATE => VariantData { date: VariantDate(f64::from_le_bytes(payload)) },
            other => return Err(ComError::UnsupportedVariant(other)),
        };
        let mut raw = Self::empty();
        raw.vt = vt;
        raw.data = data;
        Ok(raw)
    }
}

fn first4(payload: &[u8; 8]) -> [u8; 4] {
    [payload[0], payload[1], payload[2], payload[3]]
}

impl Default for RawVariant {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for RawVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // SAFETY: the record view covers the whole union as plain words.
        let words = unsafe { self.data.record };
        f.debug_struct("RawVariant")
            .field("vt", &format_args!("0x{:04x}", self.vt))
            .field("data", &format_args!("{:#x?}", words))
            .finish()
    }
}
