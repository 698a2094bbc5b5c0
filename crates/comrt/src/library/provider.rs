//! Library abstraction and the per-library contract

use std::ffi::c_void;
use std::mem;
use std::ptr;
use std::slice;
use std::sync::Arc;
use crate::interfaces::RawComPtr;
use crate::types::{ClassId, InterfaceId, Result, StatusCode};

/// Required entry point: returns the class object for a class
pub const GET_CLASS_OBJECT: &str = "DllGetClassObject";

/// Optional entry point: lists the classes a library implements
pub const LIST_CLASS_OBJECTS: &str = "DllListClassObjects";

/// Signature of [`GET_CLASS_OBJECT`]
pub type GetClassObjectFn = unsafe extern "system" fn(
    clsid: *const ClassId,
    iid: *const InterfaceId,
    out: *mut RawComPtr,
) -> StatusCode;

/// Signature of [`LIST_CLASS_OBJECTS`]
///
/// The id array belongs to the library and stays valid while it is loaded.
pub type ListClassObjectsFn =
    unsafe extern "system" fn(count: *mut usize, ids: *mut *const ClassId) -> StatusCode;

/// A loaded library
pub trait DynamicLibrary: Send + Sync {
    /// The name the library was opened with; empty for the main program
    fn name(&self) -> &str;

    /// Address of an exported symbol
    fn symbol(&self, name: &str) -> Option<*const c_void>;
}

/// Source of libraries: opening by name and listing what is loaded
pub trait LibraryProvider: Send + Sync {
    /// Open (or reopen) a library; the empty name is the main program
    fn open(&self, name: &str) -> Result<Arc<dyn DynamicLibrary>>;

    /// Names of the libraries currently loaded in the process
    fn loaded_libraries(&self) -> Result<Vec<String>>;
}

/// Resolve the class object entry point
///
/// # Safety
///
/// If present, the symbol must have the [`GetClassObjectFn`] signature.
pub unsafe fn get_class_object_fn(library: &dyn DynamicLibrary) -> Option<GetClassObjectFn> {
    library
        .symbol(GET_CLASS_OBJECT)
        .filter(|address| !address.is_null())
        .map(|address| mem::transmute::<*const c_void, GetClassObjectFn>(address))
}

/// Resolve the class list entry point
///
/// # Safety
///
/// If present, the symbol must have the [`ListClassObjectsFn`] signature.
pub unsafe fn list_class_objects_fn(library: &dyn DynamicLibrary) -> Option<ListClassObjectsFn> {
    library
        .symbol(LIST_CLASS_OBJECTS)
        .filter(|address| !address.is_null())
        .map(|address| mem::transmute::<*const c_void, ListClassObjectsFn>(address))
}

/// Ask a library which classes it implements
///
/// Returns `Ok(None)` when the library has no class list entry point.
///
/// # Safety
///
/// Same as [`list_class_objects_fn`].
pub unsafe fn list_classes(library: &dyn DynamicLibrary) -> Result<Option<Vec<ClassId>>> {
    let list = match list_class_objects_fn(library) {
        Some(list) => list,
        None => return Ok(None),
    };

    let mut count = 0usize;
    let mut ids: *const ClassId = ptr::null();
    list(&mut count, &mut ids).ok()?;
    if count == 0 || ids.is_null() {
        return Ok(Some(Vec::new()));
    }
    Ok(Some(slice::from_raw_parts(ids, count).to_vec()))
}
