//! GUID identifiers
//!
//! Classes and interfaces are identified by 128-bit GUIDs. The in-memory
//! layout is the 16-byte `{u32, u16, u16, [u8; 8]}` structure shared with
//! the foreign side, so a `Guid` can be passed by pointer across the boundary.

use bytes::{Buf, BufMut};
use std::fmt;
use std::str::FromStr;
use crate::types::{ComError, Result};

/// Binary GUID (16 bytes)
///
/// Equality and hashing are byte-wise. The text form is
/// `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX`; parsing also accepts braces
/// and the raw 32 digit form.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

/// Identifies a class (a concrete implementation)
pub type ClassId = Guid;

/// Identifies an interface (a set of operations)
pub type InterfaceId = Guid;

impl Guid {
    /// Size of a GUID in bytes
    pub const SIZE: usize = 16;

    /// Nil GUID (all zeros)
    pub const NIL: Self = Self::new(0, 0, 0, [0; 8]);

    /// Create a GUID from its fields
    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self { data1, data2, data3, data4 }
    }

    /// Generate a random v4 GUID
    pub fn generate() -> Self {
        Self::from(uuid::Uuid::new_v4())
    }

    /// Parse from text
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        uuid::Uuid::parse_str(s)
            .map(Self::from)
            .map_err(|e| ComError::InvalidArgument(format!("invalid GUID '{}': {}", s, e)))
    }

    /// Check for the nil GUID
    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }

    /// Encode in the in-memory layout, little-endian fields
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32_le(self.data1);
        buf.put_u16_le(self.data2);
        buf.put_u16_le(self.data3);
        buf.put_slice(&self.data4);
    }

    /// Decode from the in-memory layout, little-endian fields
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < Self::SIZE {
            return Err(ComError::InvalidArgument(format!(
                "GUID needs {} bytes, have {}",
                Self::SIZE,
                buf.remaining()
            )));
        }
        let data1 = buf.get_u32_le();
        let data2 = buf.get_u16_le();
        let data3 = buf.get_u16_le();
        let mut data4 = [0u8; 8];
        buf.copy_to_slice(&mut data4);
        Ok(Self { data1, data2, data3, data4 })
    }
}

impl From<uuid::Uuid> for Guid {
    fn from(uuid: uuid::Uuid) -> Self {
        let (data1, data2, data3, data4) = uuid.as_fields();
        Self { data1, data2, data3, data4: *data4 }
    }
}

impl From<Guid> for uuid::Uuid {
    fn from(guid: Guid) -> Self {
        uuid::Uuid::from_fields(guid.data1, guid.data2, guid.data3, &guid.data4)
    }
}

impl FromStr for Guid {
    type Err = ComError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GUID({})", self)
    }
}
