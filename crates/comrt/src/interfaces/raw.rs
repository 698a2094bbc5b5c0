//! Raw vtable layouts for the core interfaces

use std::ffi::c_void;
use crate::types::{iid, InterfaceId, StatusCode};

/// Untyped interface pointer
pub type RawComPtr = *mut c_void;

/// `IUnknown` function table
#[repr(C)]
pub struct IUnknownVtbl {
    pub query_interface: unsafe extern "system" fn(
        this: RawComPtr,
        riid: *const InterfaceId,
        out: *mut RawComPtr,
    ) -> StatusCode,
    pub add_ref: unsafe extern "system" fn(this: RawComPtr) -> u32,
    pub release: unsafe extern "system" fn(this: RawComPtr) -> u32,
}

/// `IClassFactory` function table
#[repr(C)]
pub struct IClassFactoryVtbl {
    pub base: IUnknownVtbl,
    pub create_instance: unsafe extern "system" fn(
        this: RawComPtr,
        outer: RawComPtr,
        riid: *const InterfaceId,
        out: *mut RawComPtr,
    ) -> StatusCode,
    pub lock_server: unsafe extern "system" fn(this: RawComPtr, lock: i32) -> StatusCode,
}

/// Describes an interface for [`InterfaceHandle`](crate::InterfaceHandle)
///
/// # Safety
///
/// `Vtable` must be `#[repr(C)]` and begin with an [`IUnknownVtbl`], and
/// any pointer handed out for `IID` must point at an object whose first
/// word is a pointer to such a table.
pub unsafe trait ComInterface: 'static {
    /// Interface ID
    const IID: InterfaceId;

    /// Function table layout
    type Vtable: 'static;
}

/// The root interface, implemented by every object
pub enum IUnknown {}

unsafe impl ComInterface for IUnknown {
    const IID: InterfaceId = iid::IUNKNOWN;
    type Vtable = IUnknownVtbl;
}

/// Creates instances of one class
pub enum IClassFactory {}

unsafe impl ComInterface for IClassFactory {
    const IID: InterfaceId = iid::ICLASSFACTORY;
    type Vtable = IClassFactoryVtbl;
}

/// Get the `IUnknown` part of an object's vtable
///
/// # Safety
///
/// `this` must be a live, non-null interface pointer.
pub(crate) unsafe fn unknown_vtbl<'a>(this: RawComPtr) -> &'a IUnknownVtbl {
    &**(this as *const *const IUnknownVtbl)
}

/// Call `AddRef` through the vtable
///
/// # Safety
///
/// `this` must be a live, non-null interface pointer.
pub unsafe fn add_ref(this: RawComPtr) -> u32 {
    (unknown_vtbl(this).add_ref)(this)
}

/// Call `Release` through the vtable
///
/// # Safety
///
/// `this` must be a live, non-null interface pointer and the caller must own
/// the reference being released.
pub unsafe fn release(this: RawComPtr) -> u32 {
    (unknown_vtbl(this).release)(this)
}

/// Call `QueryInterface` through the vtable
///
/// # Safety
///
/// `this` must be a live, non-null interface pointer and `out` must be
/// writable.
pub unsafe fn query_interface(this: RawComPtr, riid: &InterfaceId, out: *mut RawComPtr) -> StatusCode {
    (unknown_vtbl(this).query_interface)(this, riid, out)
}
