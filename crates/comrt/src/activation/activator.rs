//! Class activation through a library's class factory

use std::fmt;
use std::ptr;
use std::sync::Arc;
use tracing::debug;
use crate::interfaces::{ComInterface, IClassFactory, InterfaceHandle, RawComPtr};
use crate::library::{get_class_object_fn, DynamicLibrary};
use crate::types::{ClassId, ComError, InterfaceId, Result, StatusCode};
use super::ClassRegistry;

/// Creates instances of one class
///
/// Holds the class factory for the lifetime of the activator, and the
/// library handle so the factory's code stays loaded.
pub struct Activator {
    // Released before the library handle is dropped.
    factory: InterfaceHandle<IClassFactory>,
    library: Arc<dyn DynamicLibrary>,
    class_id: ClassId,
}

impl Activator {
    /// Resolve `class_id` through the global registry
    pub fn new(class_id: ClassId) -> Result<Self> {
        Self::with_registry(&ClassRegistry::global(), class_id, None)
    }

    /// Load `library` directly and resolve `class_id` in it
    pub fn from_library(library: &str, class_id: ClassId) -> Result<Self> {
        Self::with_registry(&ClassRegistry::global(), class_id, Some(library))
    }

    /// Resolve `class_id` through `registry`, or in `library` when given
    pub fn with_registry(
        registry: &ClassRegistry,
        class_id: ClassId,
        library: Option<&str>,
    ) -> Result<Self> {
        let name = match library {
            Some(name) => name.to_string(),
            None => registry
                .find_library(&class_id)
                .ok_or(ComError::ClassNotRegistered(class_id))?,
        };
        let library = registry.open_library(&name)?;

        // SAFETY: the class object symbol has a fixed signature by contract.
        let get_class_object = unsafe { get_class_object_fn(library.as_ref()) }.ok_or_else(|| {
            debug!(library = %name, "library does not export a class object entry point");
            ComError::ClassNotRegistered(class_id)
        })?;

        let mut factory = InterfaceHandle::<IClassFactory>::new();
        // SAFETY: all pointers are valid for the duration of the call.
        let status = unsafe { get_class_object(&class_id, &IClassFactory::IID, factory.out()) };
        if status == StatusCode::CLASS_NOT_REGISTERED {
            debug!(%class_id, library = %name, "library does not implement class");
            return Err(ComError::ClassNotRegistered(class_id));
        }
        if status == StatusCode::NO_SUCH_INTERFACE {
            return Err(ComError::NoSuchInterface {
                interface: IClassFactory::IID,
                class: Some(class_id),
            });
        }
        if status.failed() {
            return Err(ComError::generic(
                status,
                format!("getting class object for class {} from '{}' failed", class_id, name),
            ));
        }
        if factory.is_null() {
            return Err(ComError::InvalidPointer);
        }

        debug!(%class_id, library = %name, "class factory resolved");
        Ok(Self {
            factory,
            library,
            class_id,
        })
    }

    /// Create an instance and return its `T` interface
    pub fn create<T: ComInterface>(&self) -> Result<InterfaceHandle<T>> {
        let mut instance = InterfaceHandle::<T>::new();
        let status = self.create_raw(&T::IID, instance.out());
        if status == StatusCode::NO_SUCH_INTERFACE {
            return Err(ComError::NoSuchInterface {
                interface: T::IID,
                class: Some(self.class_id),
            });
        }
        if status.failed() {
            return Err(ComError::generic(
                status,
                format!(
                    "creating instance of class {} with interface {} failed",
                    self.class_id,
                    T::IID
                ),
            ));
        }
        if instance.is_null() {
            return Err(ComError::InvalidPointer);
        }
        Ok(instance)
    }

    /// Untyped creation; on success `*out` holds an owned reference
    pub fn create_raw(&self, iid: &InterfaceId, out: *mut RawComPtr) -> StatusCode {
        self.factory.create_instance(ptr::null_mut(), iid, out)
    }

    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    /// Name of the library providing the class
    pub fn library_name(&self) -> &str {
        self.library.name()
    }

    /// The class factory
    pub fn factory(&self) -> &InterfaceHandle<IClassFactory> {
        &self.factory
    }
}

impl fmt::Debug for Activator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activator")
            .field("class_id", &self.class_id)
            .field("library", &self.library.name())
            .finish()
    }
}
