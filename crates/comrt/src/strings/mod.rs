//! Length-prefixed strings and encoding conversion
//!
//! Strings cross the boundary as length-prefixed UTF-16 buffers:
//!
//! ```text
//! ┌──────────────────┬───────────────────────────┬──────────┐
//! │ u32 byte length  │ UTF-16 code units         │ u16 zero │
//! └──────────────────┴───────────────────────────┴──────────┘
//!                    ^ pointer handed to callers
//! ```
//!
//! The prefix always equals the payload length in bytes, excluding the
//! terminator. Buffers come from the C allocator so either side of the
//! boundary can free them. The producer allocates and the consumer frees,
//! unless a parameter is documented as borrowed.
//!
//! In memory, code units are native `u16` values. The serialized byte image
//! ([`encode_wire`] / [`decode_wire`]) pins the order to little-endian so it
//! is the same on every host.

mod bstr;
mod convert;

pub use bstr::{
    allocate, byte_length, character_count, decode_wire, encode_wire, free, grow,
    BString, RawBStr,
};
pub use convert::{
    cstr_to_utf16, next_capacity, utf16_to_cstring, utf16_to_utf8, utf16le_to_utf8,
    utf8_to_utf16, utf8_to_utf16_with_capacity,
};
