//! Core component runtime types
//!
//! This module contains the fundamental values shared by every other module:
//! - Identifiers: GUID, CLSID, IID
//! - Status codes: the 32-bit severity/facility/code encoding
//! - Errors: the structured error type used by the convenience APIs

mod error;
mod guid;
mod status;

pub use error::*;
pub use guid::{Guid, ClassId, InterfaceId};
pub use status::{StatusCode, Severity, facility};

/// Well-known interface IDs
pub mod iid {
    use super::InterfaceId;

    /// IUnknown interface ID
    pub const IUNKNOWN: InterfaceId = InterfaceId::new(
        0x0000_0000, 0x0000, 0x0000,
        [0xc0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
    );

    /// IClassFactory interface ID
    pub const ICLASSFACTORY: InterfaceId = InterfaceId::new(
        0x0000_0001, 0x0000, 0x0000,
        [0xc0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
    );
}
