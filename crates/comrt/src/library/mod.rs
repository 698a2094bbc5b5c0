//! Dynamic library access
//!
//! Everything above this module talks to libraries through two traits:
//! [`DynamicLibrary`] (symbol lookup on one loaded library) and
//! [`LibraryProvider`] (open by name, list what is loaded). The native
//! provider uses libloading for open and lookup and the platform loader's
//! image list for enumeration. Tests substitute their own provider.

mod native;
mod provider;

pub use native::{NativeLibrary, NativeLibraryProvider};
pub use provider::{
    get_class_object_fn, list_class_objects_fn, list_classes, DynamicLibrary,
    GetClassObjectFn, LibraryProvider, ListClassObjectsFn, GET_CLASS_OBJECT,
    LIST_CLASS_OBJECTS,
};
