//! Length-prefixed UTF-16 buffers

use std::fmt;
use std::mem;
use std::ptr;
use std::slice;
use std::str::FromStr;
use bytes::{Buf, BufMut};
use crate::types::{ComError, Result};

/// Raw string pointer as it crosses the boundary (points past the prefix)
pub type RawBStr = *mut u16;

const PREFIX: usize = mem::size_of::<u32>();
const TERMINATOR: usize = mem::size_of::<u16>();

fn payload_bytes(count: usize) -> Result<usize> {
    count
        .checked_mul(2)
        .filter(|bytes| *bytes <= u32::MAX as usize)
        .ok_or_else(|| ComError::InvalidArgument(format!("string of {} units is too long", count)))
}

unsafe fn base_of(ptr: RawBStr) -> *mut u8 {
    (ptr as *mut u8).sub(PREFIX)
}

unsafe fn finish(base: *mut u8, bytes: usize) -> RawBStr {
    (base as *mut u32).write_unaligned(bytes as u32);
    let data = base.add(PREFIX);
    (data.add(bytes) as *mut u16).write_unaligned(0);
    data as RawBStr
}

/// Allocate a zero-filled string of `count` UTF-16 units
///
/// The prefix is set to `2 * count` and the buffer is null-terminated.
pub fn allocate(count: usize) -> Result<RawBStr> {
    let bytes = payload_bytes(count)?;
    // SAFETY: the size is non-zero and the writes stay inside it.
    unsafe {
        let base = libc::malloc(PREFIX + bytes + TERMINATOR) as *mut u8;
        if base.is_null() {
            return Err(ComError::OutOfMemory);
        }
        ptr::write_bytes(base.add(PREFIX), 0, bytes);
        Ok(finish(base, bytes))
    }
}

/// Free a string; null is a no-op
///
/// # Safety
///
/// `ptr` must be null or come from [`allocate`] / [`grow`] and not have been
/// freed already.
pub unsafe fn free(ptr: RawBStr) {
    if !ptr.is_null() {
        libc::free(base_of(ptr) as *mut libc::c_void);
    }
}

/// Payload size in bytes, read from the prefix; 0 for null
///
/// # Safety
///
/// `ptr` must be null or a live string.
pub unsafe fn byte_length(ptr: RawBStr) -> u32 {
    if ptr.is_null() {
        return 0;
    }
    (base_of(ptr) as *const u32).read_unaligned()
}

/// Number of UTF-16 units; 0 for null
///
/// # Safety
///
/// `ptr` must be null or a live string.
pub unsafe fn character_count(ptr: RawBStr) -> usize {
    byte_length(ptr) as usize / 2
}

/// Resize a string to `new_bytes` bytes of payload
///
/// Existing content up to the new size is kept, any added space is
/// zero-filled, and the prefix and terminator are rewritten. A null `ptr`
/// allocates. On failure the original string is untouched.
///
/// # Safety
///
/// `ptr` must be null or a live string. On success it must no longer be used;
/// the returned pointer replaces it.
pub unsafe fn grow(ptr: RawBStr, new_bytes: usize) -> Result<RawBStr> {
    if new_bytes % 2 != 0 {
        return Err(ComError::InvalidArgument(format!(
            "string size {} is not a whole number of units",
            new_bytes
        )));
    }
    if ptr.is_null() {
        return allocate(new_bytes / 2);
    }
    payload_bytes(new_bytes / 2)?;

    let old_bytes = byte_length(ptr) as usize;
    let base = libc::realloc(
        base_of(ptr) as *mut libc::c_void,
        PREFIX + new_bytes + TERMINATOR,
    ) as *mut u8;
    if base.is_null() {
        return Err(ComError::OutOfMemory);
    }
    if new_bytes > old_bytes {
        ptr::write_bytes(base.add(PREFIX + old_bytes), 0, new_bytes - old_bytes);
    }
    Ok(finish(base, new_bytes))
}

/// Owned length-prefixed string
///
/// Frees its buffer on drop. A null pointer is the empty string.
pub struct BString {
    ptr: RawBStr,
}

// The buffer is uniquely owned.
unsafe impl Send for BString {}
unsafe impl Sync for BString {}

impl BString {
    /// The empty (null) string
    pub const fn new() -> Self {
        Self { ptr: ptr::null_mut() }
    }

    /// A zero-filled string of `len` units
    pub fn with_len(len: usize) -> Result<Self> {
        Ok(Self { ptr: allocate(len)? })
    }

    /// Copy UTF-16 units into a new string
    pub fn from_units(units: &[u16]) -> Result<Self> {
        let mut s = Self::with_len(units.len())?;
        s.as_units_mut().copy_from_slice(units);
        Ok(s)
    }

    /// Take ownership of a raw string
    ///
    /// # Safety
    ///
    /// `ptr` must be null or an unowned string from [`allocate`] / [`grow`].
    pub unsafe fn from_raw(ptr: RawBStr) -> Self {
        Self { ptr }
    }

    /// Give up ownership; the caller must free the result
    pub fn into_raw(self) -> RawBStr {
        let ptr = self.ptr;
        mem::forget(self);
        ptr
    }

    /// Borrow the raw pointer
    pub fn as_raw(&self) -> RawBStr {
        self.ptr
    }

    /// Length in UTF-16 units
    pub fn len(&self) -> usize {
        // SAFETY: ptr is null or owned by self.
        unsafe { character_count(self.ptr) }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The UTF-16 units, without the terminator
    pub fn as_units(&self) -> &[u16] {
        if self.ptr.is_null() {
            return &[];
        }
        // SAFETY: the prefix describes the live payload.
        unsafe { slice::from_raw_parts(self.ptr, self.len()) }
    }

    pub fn as_units_mut(&mut self) -> &mut [u16] {
        if self.ptr.is_null() {
            return &mut [];
        }
        let len = self.len();
        // SAFETY: the prefix describes the live payload, uniquely borrowed.
        unsafe { slice::from_raw_parts_mut(self.ptr, len) }
    }

    /// Resize to `len` units, keeping the leading content
    pub fn resize(&mut self, len: usize) -> Result<()> {
        let bytes = payload_bytes(len)?;
        // SAFETY: ptr is null or owned; it is replaced only on success.
        self.ptr = unsafe { grow(self.ptr, bytes)? };
        Ok(())
    }

    /// Decode to UTF-8, failing on unpaired surrogates
    pub fn to_utf8(&self) -> Result<String> {
        super::utf16_to_utf8(self.as_units())
    }

    /// Copy into a new buffer
    pub fn try_clone(&self) -> Result<Self> {
        if self.ptr.is_null() {
            return Ok(Self::new());
        }
        Self::from_units(self.as_units())
    }
}

impl FromStr for BString {
    type Err = ComError;

    fn from_str(s: &str) -> Result<Self> {
        super::utf8_to_utf16(s.as_bytes())
    }
}

impl Default for BString {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BString {
    fn drop(&mut self) {
        // SAFETY: ptr is null or owned by self.
        unsafe { free(self.ptr) }
    }
}

impl PartialEq for BString {
    fn eq(&self, other: &Self) -> bool {
        self.as_units() == other.as_units()
    }
}

impl Eq for BString {}

impl PartialEq<str> for BString {
    fn eq(&self, other: &str) -> bool {
        self.as_units().iter().copied().eq(other.encode_utf16())
    }
}

impl PartialEq<&str> for BString {
    fn eq(&self, other: &&str) -> bool {
        *self == **other
    }
}

impl fmt::Display for BString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in char::decode_utf16(self.as_units().iter().copied()) {
            write!(f, "{}", c.unwrap_or(char::REPLACEMENT_CHARACTER))?;
        }
        Ok(())
    }
}

impl fmt::Debug for BString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BString({:?})", self.to_string())
    }
}

/// Write the host-independent byte image of `units`
///
/// Layout: `[u32 LE byte length][UTF-16LE units][0u16]`.
pub fn encode_wire<B: BufMut>(units: &[u16], buf: &mut B) -> Result<()> {
    let bytes = payload_bytes(units.len())?;
    buf.put_u32_le(bytes as u32);
    for unit in units {
        buf.put_u16_le(*unit);
    }
    buf.put_u16_le(0);
    Ok(())
}

/// Read a byte image written by [`encode_wire`]
pub fn decode_wire<B: Buf>(buf: &mut B) -> Result<BString> {
    if buf.remaining() < PREFIX {
        return Err(ComError::Encoding("truncated string length".into()));
    }
    let bytes = buf.get_u32_le() as usize;
    if bytes % 2 != 0 {
        return Err(ComError::Encoding(format!("odd string byte length {}", bytes)));
    }
    if buf.remaining() < bytes + TERMINATOR {
        return Err(ComError::Encoding(format!(
            "string needs {} bytes, {} remaining",
            bytes + TERMINATOR,
            buf.remaining()
        )));
    }

    let mut s = BString::with_len(bytes / 2)?;
    for unit in s.as_units_mut() {
        *unit = buf.get_u16_le();
    }
    if buf.get_u16_le() != 0 {
        return Err(ComError::Encoding("missing string terminator".into()));
    }
    Ok(s)
}
