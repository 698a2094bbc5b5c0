//! Structured 32-bit status codes
//!
//! Layout:
//! ```text
//!  31 30                       16 15                            0
//! ┌──┬───────────────────────────┬───────────────────────────────┐
//! │S │ facility (15 bits)        │ code (16 bits)                │
//! └──┴───────────────────────────┴───────────────────────────────┘
//! ```
//!
//! The severity bit doubles as the sign bit, so a status is a failure
//! exactly when it is negative as an `i32`.

use std::fmt;

/// Severity of a status code
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Success = 0,
    Failure = 1,
}

/// Well-known facilities
pub mod facility {
    /// Generic, no specific facility
    pub const NULL: u16 = 0;
    /// RPC subsystem
    pub const RPC: u16 = 1;
    /// Late-binding dispatch
    pub const DISPATCH: u16 = 2;
    /// Interface-specific codes
    pub const ITF: u16 = 4;
    /// Wrapped Win32 error codes
    pub const WIN32: u16 = 7;
}

/// 32-bit status code
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatusCode(pub i32);

impl StatusCode {
    /// Mask for the 15 facility bits (after shifting)
    pub const FACILITY_MASK: u32 = 0x7FFF;

    /// Operation successful
    pub const OK: Self = Self::encode(Severity::Success, facility::NULL, 0x0000);
    /// Operation successful, returning false
    pub const FALSE: Self = Self::encode(Severity::Success, facility::NULL, 0x0001);
    /// Not implemented
    pub const NOT_IMPLEMENTED: Self = Self::encode(Severity::Failure, facility::NULL, 0x4001);
    /// No such interface supported
    pub const NO_SUCH_INTERFACE: Self = Self::encode(Severity::Failure, facility::NULL, 0x4002);
    /// Invalid pointer
    pub const INVALID_POINTER: Self = Self::encode(Severity::Failure, facility::NULL, 0x4003);
    /// Operation aborted
    pub const ABORTED: Self = Self::encode(Severity::Failure, facility::NULL, 0x4004);
    /// Unspecified error
    pub const GENERIC_FAILURE: Self = Self::encode(Severity::Failure, facility::NULL, 0x4005);
    /// Out of memory
    pub const OUT_OF_MEMORY: Self = Self::encode(Severity::Failure, facility::WIN32, 0x000E);
    /// Invalid argument
    pub const INVALID_ARGUMENT: Self = Self::encode(Severity::Failure, facility::WIN32, 0x0057);
    /// Class not registered
    pub const CLASS_NOT_REGISTERED: Self = Self::encode(Severity::Failure, facility::ITF, 0x0154);
    /// Class does not support aggregation
    pub const NO_AGGREGATION: Self = Self::encode(Severity::Failure, facility::ITF, 0x0110);
    /// Variant type not supported
    pub const BAD_VARIANT_TYPE: Self = Self::encode(Severity::Failure, facility::DISPATCH, 0x0008);

    /// Pack severity, facility and code
    ///
    /// Facility bits above the 15-bit field are discarded.
    pub const fn encode(severity: Severity, facility: u16, code: u16) -> Self {
        let bits = ((severity as u32) << 31)
            | (((facility as u32) & Self::FACILITY_MASK) << 16)
            | (code as u32);
        Self(bits as i32)
    }

    /// Create from raw bits
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits as i32)
    }

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0 as u32
    }

    /// Unpack `(facility, code)`
    pub const fn decode(self) -> (u16, u16) {
        (self.facility(), self.code())
    }

    /// Severity field
    pub const fn severity(self) -> Severity {
        if self.0 < 0 { Severity::Failure } else { Severity::Success }
    }

    /// Facility field
    pub const fn facility(self) -> u16 {
        ((self.bits() >> 16) & Self::FACILITY_MASK) as u16
    }

    /// Code field
    pub const fn code(self) -> u16 {
        (self.bits() & 0xFFFF) as u16
    }

    /// True if the severity bit is clear
    pub const fn succeeded(self) -> bool {
        self.0 >= 0
    }

    /// True if the severity bit is set
    pub const fn failed(self) -> bool {
        self.0 < 0
    }

    /// Symbolic name for well-known codes
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::OK => "S_OK",
            Self::FALSE => "S_FALSE",
            Self::NOT_IMPLEMENTED => "E_NOTIMPL",
            Self::NO_SUCH_INTERFACE => "E_NOINTERFACE",
            Self::INVALID_POINTER => "E_POINTER",
            Self::ABORTED => "E_ABORT",
            Self::GENERIC_FAILURE => "E_FAIL",
            Self::OUT_OF_MEMORY => "E_OUTOFMEMORY",
            Self::INVALID_ARGUMENT => "E_INVALIDARG",
            Self::CLASS_NOT_REGISTERED => "REGDB_E_CLASSNOTREG",
            Self::NO_AGGREGATION => "CLASS_E_NOAGGREGATION",
            Self::BAD_VARIANT_TYPE => "DISP_E_BADVARTYPE",
            _ => return None,
        })
    }

    /// Convert a failure into a `ComError`, keeping success codes
    pub fn ok(self) -> crate::types::Result<StatusCode> {
        if self.failed() {
            Err(self.into())
        } else {
            Ok(self)
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "0x{:08X} ({})", self.bits(), name),
            None => write!(f, "0x{:08X}", self.bits()),
        }
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatusCode({})", self)
    }
}

impl From<i32> for StatusCode {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl From<StatusCode> for i32 {
    fn from(status: StatusCode) -> Self {
        status.0
    }
}
