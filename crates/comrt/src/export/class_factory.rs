//! Generic class factory object for Rust components
//!
//! The factory answers `IClassFactory::CreateInstance` by calling a plain
//! constructor function registered for the class.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicI32, Ordering};
use tracing::warn;
use crate::interfaces::{IClassFactoryVtbl, RawComPtr};
use crate::types::{iid, ClassId, InterfaceId, StatusCode};
use super::ComBox;

/// Constructor invoked by `CreateInstance`
///
/// Must write an owned pointer for `iid` into `out` and return `OK`, or leave
/// `out` null and return a failure.
pub type CreateInstanceFn = fn(iid: &InterfaceId, out: *mut RawComPtr) -> StatusCode;

/// State held by a class factory object
pub struct FactoryState {
    clsid: ClassId,
    create: CreateInstanceFn,
    server_locks: AtomicI32,
}

impl FactoryState {
    /// The class this factory creates
    pub fn clsid(&self) -> ClassId {
        self.clsid
    }

    /// Outstanding `LockServer(true)` calls
    pub fn server_locks(&self) -> i32 {
        self.server_locks.load(Ordering::Acquire)
    }
}

static FACTORY_VTBL: IClassFactoryVtbl = IClassFactoryVtbl {
    base: ComBox::<FactoryState>::UNKNOWN_VTBL,
    create_instance,
    lock_server,
};

static FACTORY_INTERFACES: [InterfaceId; 1] = [iid::ICLASSFACTORY];

/// Create a class factory object, returning an owned pointer (count = 1)
pub fn new_class_factory(clsid: ClassId, create: CreateInstanceFn) -> RawComPtr {
    let state = FactoryState {
        clsid,
        create,
        server_locks: AtomicI32::new(0),
    };
    // SAFETY: FACTORY_VTBL starts with the ComBox<FactoryState> IUnknown table.
    unsafe { ComBox::new_raw(state, &FACTORY_VTBL, &FACTORY_INTERFACES) }
}

unsafe extern "system" fn create_instance(
    this: RawComPtr,
    outer: RawComPtr,
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
    if !outer.is_null() {
        return StatusCode::NO_AGGREGATION;
    }

    let state = ComBox::<FactoryState>::value(this);
    let riid = &*riid;
    match catch_unwind(AssertUnwindSafe(|| (state.create)(riid, out))) {
        Ok(status) => status,
        Err(_) => {
            warn!(clsid = %state.clsid, "constructor panicked in CreateInstance");
            *out = ptr::null_mut();
            StatusCode::GENERIC_FAILURE
        }
    }
}

unsafe extern "system" fn lock_server(this: RawComPtr, lock: i32) -> StatusCode {
    if this.is_null() {
        return StatusCode::INVALID_POINTER;
    }
    let state = ComBox::<FactoryState>::value(this);
    if lock != 0 {
        state.server_locks.fetch_add(1, Ordering::AcqRel);
    } else {
        state.server_locks.fetch_sub(1, Ordering::AcqRel);
    }
    StatusCode::OK
}
