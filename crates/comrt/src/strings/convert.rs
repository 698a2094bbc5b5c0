//! UTF-8 / UTF-16 conversion

use std::ffi::{CStr, CString};
use tracing::trace;
use crate::types::{ComError, Result};
use super::BString;

const MIN_CAPACITY: usize = 16;

/// Capacity to grow to when a destination buffer of `current` units is full
pub fn next_capacity(current: usize) -> usize {
    current.saturating_mul(2).max(MIN_CAPACITY)
}

/// Convert UTF-8 bytes to a length-prefixed UTF-16 string
pub fn utf8_to_utf16(src: &[u8]) -> Result<BString> {
    // A UTF-8 sequence never needs more UTF-16 units than it has bytes.
    utf8_to_utf16_with_capacity(src, src.len())
}

/// Convert UTF-8 bytes, starting from a destination of `capacity` units
///
/// The destination doubles whenever it fills and conversion resumes where
/// it stopped. The result is trimmed to the converted length.
pub fn utf8_to_utf16_with_capacity(src: &[u8], capacity: usize) -> Result<BString> {
    let text = std::str::from_utf8(src).map_err(|e| {
        ComError::Encoding(format!("invalid UTF-8 at byte {}", e.valid_up_to()))
    })?;

    let mut out = BString::with_len(capacity)?;
    let mut written = 0;
    for unit in text.encode_utf16() {
        if written == out.len() {
            let next = next_capacity(written);
            trace!(from = written, to = next, "growing UTF-16 destination");
            out.resize(next)?;
        }
        out.as_units_mut()[written] = unit;
        written += 1;
    }
    out.resize(written)?;
    Ok(out)
}

/// Convert UTF-16 units to UTF-8
pub fn utf16_to_utf8(units: &[u16]) -> Result<String> {
    let mut out = String::with_capacity(units.len());
    let mut position = 0;
    for decoded in char::decode_utf16(units.iter().copied()) {
        match decoded {
            Ok(c) => {
                position += c.len_utf16();
                out.push(c);
            }
            Err(e) => {
                return Err(ComError::Encoding(format!(
                    "unpaired surrogate 0x{:04x} at unit {}",
                    e.unpaired_surrogate(),
                    position
                )));
            }
        }
    }
    Ok(out)
}

/// Convert UTF-16LE bytes to UTF-8
pub fn utf16le_to_utf8(bytes: &[u8]) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(ComError::Encoding(format!(
            "UTF-16 input has odd byte length {}",
            bytes.len()
        )));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    utf16_to_utf8(&units)
}

/// Convert UTF-16 units to a null-terminated UTF-8 string
pub fn utf16_to_cstring(units: &[u16]) -> Result<CString> {
    let text = utf16_to_utf8(units)?;
    CString::new(text).map_err(|e| {
        ComError::InvalidArgument(format!("embedded null at byte {}", e.nul_position()))
    })
}

/// Convert a null-terminated UTF-8 string to UTF-16
pub fn cstr_to_utf16(src: &CStr) -> Result<BString> {
    utf8_to_utf16(src.to_bytes())
}
