//! Heap box implementing `IUnknown` for Rust values
//!
//! A `ComBox<T>` is the object behind an interface pointer handed out by a
//! Rust component. Its first field is the vtable pointer, so a pointer to the
//! box is a valid interface pointer. The box supports a single vtable: every
//! interface it answers `QueryInterface` for must share that table's layout
//! (typically an interface and its base interfaces).
//!
//! The reference count is atomic, so handles on different threads may add
//! and release references concurrently. The box is destroyed when the count
//! reaches zero.

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{fence, AtomicU32, Ordering};
use crate::interfaces::{ComInterface, IUnknownVtbl, InterfaceHandle, RawComPtr};
use crate::types::{iid, InterfaceId, StatusCode};

/// Reference-counted object box
#[repr(C)]
pub struct ComBox<T: Send + Sync + 'static> {
    vtable: *const c_void,
    ref_count: AtomicU32,
    interfaces: &'static [InterfaceId],
    value: T,
}

impl<T: Send + Sync + 'static> ComBox<T> {
    /// The `IUnknown` entries for a vtable serving a `ComBox<T>`
    ///
    /// Interface vtables for the box must start with exactly this table.
    pub const UNKNOWN_VTBL: IUnknownVtbl = IUnknownVtbl {
        query_interface: Self::query_interface,
        add_ref: Self::add_ref,
        release: Self::release,
    };

    /// Box `value` and return an owned interface pointer (count = 1)
    ///
    /// `IUnknown` is always supported; `interfaces` lists the other
    /// interface IDs the vtable serves.
    ///
    /// # Safety
    ///
    /// `vtable` must be `#[repr(C)]`, start with [`Self::UNKNOWN_VTBL`], and
    /// its remaining entries must expect a `ComBox<T>` as `this`.
    pub unsafe fn new_raw<V: 'static>(
        value: T,
        vtable: &'static V,
        interfaces: &'static [InterfaceId],
    ) -> RawComPtr {
        let boxed = Box::new(Self {
            vtable: vtable as *const V as *const c_void,
            ref_count: AtomicU32::new(1),
            interfaces,
            value,
        });
        Box::into_raw(boxed) as RawComPtr
    }

    /// Box `value` and wrap the initial reference in a handle
    ///
    /// # Safety
    ///
    /// Same as [`new_raw`](Self::new_raw); additionally `I::Vtable` must be
    /// the layout of `vtable`.
    pub unsafe fn new_handle<I: ComInterface>(
        value: T,
        vtable: &'static I::Vtable,
        interfaces: &'static [InterfaceId],
    ) -> InterfaceHandle<I> {
        InterfaceHandle::attach(Self::new_raw(value, vtable, interfaces))
    }

    /// Box `value` and answer a `CreateInstance`-style request for `iid`
    ///
    /// On success `*out` receives an owned pointer; on failure it is null and
    /// the box is destroyed.
    ///
    /// # Safety
    ///
    /// Same as [`new_raw`](Self::new_raw); `out` must be writable.
    pub unsafe fn create<V: 'static>(
        value: T,
        vtable: &'static V,
        interfaces: &'static [InterfaceId],
        iid: &InterfaceId,
        out: *mut RawComPtr,
    ) -> StatusCode {
        let this = Self::new_raw(value, vtable, interfaces);
        let status = Self::query_interface(this, iid, out);
        Self::release(this);
        status
    }

    /// Borrow the boxed value
    ///
    /// # Safety
    ///
    /// `this` must be a live pointer to a `ComBox<T>`.
    pub unsafe fn value<'a>(this: RawComPtr) -> &'a T {
        &(*(this as *const Self)).value
    }

    /// Current reference count
    ///
    /// # Safety
    ///
    /// `this` must be a live pointer to a `ComBox<T>`.
    pub unsafe fn ref_count(this: RawComPtr) -> u32 {
        (*(this as *const Self)).ref_count.load(Ordering::Acquire)
    }

    unsafe extern "system" fn query_interface(
        this: RawComPtr,
        riid: *const InterfaceId,
        out: *mut RawComPtr,
    ) -> StatusCode {
        if out.is_null() {
            return StatusCode::INVALID_POINTER;
        }
        *out = ptr::null_mut();
        if this.is_null() || riid.is_null() {
            return StatusCode::INVALID_POINTER;
        }

        let riid = &*riid;
        let this_box = &*(this as *const Self);
        if *riid == iid::IUNKNOWN || this_box.interfaces.contains(riid) {
            Self::add_ref(this);
            *out = this;
            StatusCode::OK
        } else {
            StatusCode::NO_SUCH_INTERFACE
        }
    }

    unsafe extern "system" fn add_ref(this: RawComPtr) -> u32 {
        let this_box = &*(this as *const Self);
        this_box.ref_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    unsafe extern "system" fn release(this: RawComPtr) -> u32 {
        let previous = {
            let this_box = &*(this as *const Self);
            this_box.ref_count.fetch_sub(1, Ordering::Release)
        };
        debug_assert!(previous > 0, "Release called on a destroyed ComBox");
        if previous == 1 {
            fence(Ordering::Acquire);
            drop(Box::from_raw(this as *mut Self));
        }
        previous - 1
    }
}
