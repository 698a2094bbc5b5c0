//! Owning handle for reference-counted interface pointers
//!
//! An `InterfaceHandle<T>` owns zero or one reference to an object. Every
//! non-empty construction or clone performs exactly one `AddRef` (or takes
//! over a reference the caller already owned), and every drop or reset of a
//! non-empty handle performs exactly one `Release`.
//!
//! The handle does no bookkeeping of its own: the reference count lives in
//! the object, and making `AddRef`/`Release` safe for concurrent callers is
//! the object's job.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ptr;
use crate::types::{ComError, InterfaceId, Result, StatusCode};
use super::raw::{self, ComInterface, IClassFactory, RawComPtr};

/// RAII ownership of one interface reference
pub struct InterfaceHandle<T: ComInterface> {
    ptr: RawComPtr,
    _interface: PhantomData<*const T>,
}

// Reference counts of shared objects must be thread-safe on the object side.
unsafe impl<T: ComInterface> Send for InterfaceHandle<T> {}
unsafe impl<T: ComInterface> Sync for InterfaceHandle<T> {}

impl<T: ComInterface> InterfaceHandle<T> {
    /// Create an empty handle
    pub const fn new() -> Self {
        Self {
            ptr: ptr::null_mut(),
            _interface: PhantomData,
        }
    }

    /// Adopt a pointer, adding a reference
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer to interface `T`.
    pub unsafe fn from_raw(ptr: RawComPtr) -> Self {
        if !ptr.is_null() {
            raw::add_ref(ptr);
        }
        Self::attach(ptr)
    }

    /// Take over a reference the caller already owns
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer to interface `T`, and the caller
    /// must own one reference that is transferred to the handle.
    pub unsafe fn attach(ptr: RawComPtr) -> Self {
        Self {
            ptr,
            _interface: PhantomData,
        }
    }

    /// The raw pointer, still owned by the handle
    pub fn as_raw(&self) -> RawComPtr {
        self.ptr
    }

    /// True if the handle owns nothing
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// Release the current reference (if any) and adopt `ptr`
    ///
    /// # Safety
    ///
    /// Same as [`from_raw`](Self::from_raw).
    pub unsafe fn reset(&mut self, ptr: RawComPtr) {
        // AddRef first so resetting to the pointer already held is harmless.
        if !ptr.is_null() {
            raw::add_ref(ptr);
        }
        let old = std::mem::replace(&mut self.ptr, ptr);
        if !old.is_null() {
            raw::release(old);
        }
    }

    /// Release the current reference, leaving the handle empty
    pub fn clear(&mut self) {
        let old = std::mem::replace(&mut self.ptr, ptr::null_mut());
        if !old.is_null() {
            // SAFETY: the handle owned one reference to `old`.
            unsafe {
                raw::release(old);
            }
        }
    }

    /// Give up ownership without releasing
    ///
    /// The caller becomes responsible for the reference. The handle is left
    /// empty.
    pub fn release(&mut self) -> RawComPtr {
        std::mem::replace(&mut self.ptr, ptr::null_mut())
    }

    /// Consume the handle, returning the owned pointer
    pub fn into_raw(mut self) -> RawComPtr {
        self.release()
    }

    /// Write slot for an out-parameter
    ///
    /// The handle must be empty; whatever the callee writes is owned by the
    /// handle afterwards.
    pub fn out(&mut self) -> *mut RawComPtr {
        debug_assert!(
            self.ptr.is_null(),
            "InterfaceHandle::out() called on a non-empty handle"
        );
        &mut self.ptr
    }

    /// The object's function table
    pub fn vtable(&self) -> Option<&T::Vtable> {
        if self.ptr.is_null() {
            return None;
        }
        // SAFETY: ComInterface guarantees the first word points at T::Vtable.
        unsafe { Some(&**(self.ptr as *const *const T::Vtable)) }
    }

    /// Ask the object for another interface
    pub fn query<U: ComInterface>(&self) -> Result<InterfaceHandle<U>> {
        let mut target = InterfaceHandle::<U>::new();
        let status = self.query_raw(&U::IID, target.out());
        if status == StatusCode::NO_SUCH_INTERFACE {
            return Err(ComError::NoSuchInterface {
                interface: U::IID,
                class: None,
            });
        }
        status.ok()?;
        if target.is_null() {
            return Err(ComError::InvalidPointer);
        }
        Ok(target)
    }

    /// Untyped `QueryInterface`
    pub fn query_raw(&self, iid: &InterfaceId, out: *mut RawComPtr) -> StatusCode {
        if out.is_null() {
            return StatusCode::INVALID_POINTER;
        }
        if self.ptr.is_null() {
            // SAFETY: checked non-null above.
            unsafe {
                *out = ptr::null_mut();
            }
            return StatusCode::INVALID_POINTER;
        }
        // SAFETY: the handle keeps the object alive.
        unsafe { raw::query_interface(self.ptr, iid, out) }
    }
}

impl InterfaceHandle<IClassFactory> {
    /// `IClassFactory::CreateInstance`
    pub fn create_instance(
        &self,
        outer: RawComPtr,
        iid: &InterfaceId,
        out: *mut RawComPtr,
    ) -> StatusCode {
        match self.vtable() {
            // SAFETY: the handle keeps the factory alive.
            Some(vtbl) => unsafe { (vtbl.create_instance)(self.ptr, outer, iid, out) },
            None => StatusCode::INVALID_POINTER,
        }
    }

    /// `IClassFactory::LockServer`
    pub fn lock_server(&self, lock: bool) -> StatusCode {
        match self.vtable() {
            // SAFETY: the handle keeps the factory alive.
            Some(vtbl) => unsafe { (vtbl.lock_server)(self.ptr, lock as i32) },
            None => StatusCode::INVALID_POINTER,
        }
    }
}

impl<T: ComInterface> Default for InterfaceHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ComInterface> Clone for InterfaceHandle<T> {
    fn clone(&self) -> Self {
        // SAFETY: self.ptr is null or live while self exists.
        unsafe { Self::from_raw(self.ptr) }
    }
}

impl<T: ComInterface> Drop for InterfaceHandle<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: ComInterface> PartialEq for InterfaceHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T: ComInterface> Eq for InterfaceHandle<T> {}

impl<T: ComInterface> Hash for InterfaceHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ptr.hash(state);
    }
}

impl<T: ComInterface> fmt::Debug for InterfaceHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InterfaceHandle<{}>({:p})", T::IID, self.ptr)
    }
}
