//! Interfaces and interface ownership
//!
//! An interface pointer points at an object whose first word is a pointer to
//! a function table (vtable). Every vtable starts with the three `IUnknown`
//! entries, in this order:
//!
//! ```text
//! slot 0  QueryInterface(this, riid, out) -> status
//! slot 1  AddRef(this) -> u32
//! slot 2  Release(this) -> u32
//! slot 3+ interface-specific methods
//! ```
//!
//! All entries use the `extern "system"` calling convention. Slot order and
//! calling convention are part of the binary contract with the other side of
//! the boundary and must not change.

mod raw;
mod handle;

pub use raw::*;
pub use handle::InterfaceHandle;
