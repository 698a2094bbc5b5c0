//! Library entry points
//!
//! A component library exports two functions with fixed names and the
//! `extern "system"` calling convention:
//!
//! - `DllGetClassObject(clsid, iid, out) -> status`: required, returns the
//!   class factory for `clsid`.
//! - `DllListClassObjects(count_out, ids_out) -> status`: optional, lists the
//!   implemented class IDs so the registry can discover them.
//!
//! [`export_classes!`](crate::export_classes) generates both from a table.

use std::ptr;
use tracing::debug;
use crate::interfaces::{self, RawComPtr};
use crate::types::{ClassId, InterfaceId, StatusCode};
use super::class_factory::{new_class_factory, CreateInstanceFn};

/// One exported class
#[derive(Clone, Copy)]
pub struct ClassEntry {
    pub clsid: ClassId,
    pub create: CreateInstanceFn,
}

/// Implementation of `DllGetClassObject` over a class table
///
/// # Safety
///
/// `clsid` and `iid` must be null or valid for reads; `out` must be null or
/// valid for writes.
pub unsafe fn get_class_object(
    classes: &[ClassEntry],
    clsid: *const ClassId,
    iid: *const InterfaceId,
    out: *mut RawComPtr,
) -> StatusCode {
    if out.is_null() {
        return StatusCode::INVALID_POINTER;
    }
    *out = ptr::null_mut();
    if clsid.is_null() || iid.is_null() {
        return StatusCode::INVALID_POINTER;
    }

    let clsid = &*clsid;
    let entry = match classes.iter().find(|entry| entry.clsid == *clsid) {
        Some(entry) => entry,
        None => {
            debug!(%clsid, "class object requested for unknown class");
            return StatusCode::CLASS_NOT_REGISTERED;
        }
    };

    let factory = new_class_factory(entry.clsid, entry.create);
    let status = interfaces::query_interface(factory, &*iid, out);
    interfaces::release(factory);
    status
}

/// Implementation of `DllListClassObjects` over a static ID list
///
/// # Safety
///
/// `count` and `ids` must be null or valid for writes.
pub unsafe fn list_class_objects(
    class_ids: &'static [ClassId],
    count: *mut usize,
    ids: *mut *const ClassId,
) -> StatusCode {
    if count.is_null() || ids.is_null() {
        return StatusCode::INVALID_POINTER;
    }
    *count = class_ids.len();
    *ids = class_ids.as_ptr();
    StatusCode::OK
}

/// Export the library entry points for a set of classes
///
/// ```ignore
/// comrt::export_classes! {
///     CALCULATOR_CLSID => create_calculator,
///     CONVERTER_CLSID => create_converter,
/// }
/// ```
///
/// Expands to `#[no_mangle]` definitions of `DllGetClassObject` and
/// `DllListClassObjects`, so it may be used once per library.
#[macro_export]
macro_rules! export_classes {
    ( $( $clsid:expr => $create:expr ),* $(,)? ) => {
        static __COMRT_CLASS_TABLE: &[$crate::export::ClassEntry] = &[
            $( $crate::export::ClassEntry { clsid: $clsid, create: $create } ),*
        ];

        static __COMRT_CLASS_IDS: &[$crate::ClassId] = &[ $( $clsid ),* ];

        #[no_mangle]
        pub unsafe extern "system" fn DllGetClassObject(
            clsid: *const $crate::ClassId,
            iid: *const $crate::InterfaceId,
            out: *mut $crate::RawComPtr,
        ) -> $crate::StatusCode {
            $crate::export::get_class_object(__COMRT_CLASS_TABLE, clsid, iid, out)
        }

        #[no_mangle]
        pub unsafe extern "system" fn DllListClassObjects(
            count: *mut usize,
            ids: *mut *const $crate::ClassId,
        ) -> $crate::StatusCode {
            $crate::export::list_class_objects(__COMRT_CLASS_IDS, count, ids)
        }
    };
}
