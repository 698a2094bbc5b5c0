//! Lazily activated, statically described classes

use std::fmt;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;
use once_cell::sync::OnceCell;
use tracing::warn;
use crate::interfaces::{ComInterface, InterfaceHandle, RawComPtr};
use crate::types::{ClassId, ComError, InterfaceId, Result, StatusCode};
use super::{Activator, ClassRegistry};

/// Compile-time description of a class
///
/// ```ignore
/// struct Calculator;
///
/// impl ComClass for Calculator {
///     const CLSID: ClassId = CALCULATOR_CLSID;
///     const LIBRARY: Option<&'static str> = Some("libcalculator.so");
/// }
/// ```
pub trait ComClass {
    const CLSID: ClassId;

    /// Library to load directly; `None` asks the registry
    const LIBRARY: Option<&'static str> = None;
}

/// Per-class creator with an exactly-once activator
///
/// The activator is built on first use. Concurrent first callers wait for
/// one resolution; a failed resolution is not cached, so a later call
/// retries it.
pub struct ClassFactory<C: ComClass> {
    registry: Arc<ClassRegistry>,
    activator: OnceCell<Activator>,
    _class: PhantomData<fn() -> C>,
}

impl<C: ComClass> ClassFactory<C> {
    /// A factory resolving through the global registry
    pub fn new() -> Self {
        Self::with_registry(ClassRegistry::global())
    }

    pub fn with_registry(registry: Arc<ClassRegistry>) -> Self {
        Self {
            registry,
            activator: OnceCell::new(),
            _class: PhantomData,
        }
    }

    /// The activator, resolving it on first use
    pub fn activator(&self) -> Result<&Activator> {
        self.activator.get_or_try_init(|| {
            let resolved = catch_unwind(AssertUnwindSafe(|| {
                Activator::with_registry(&self.registry, C::CLSID, C::LIBRARY)
            }));
            match resolved {
                Ok(result) => result,
                Err(_) => {
                    warn!(class_id = %C::CLSID, "class activation panicked");
                    Err(ComError::generic(
                        StatusCode::GENERIC_FAILURE,
                        format!("activation of class {} panicked", C::CLSID),
                    ))
                }
            }
        })
    }

    /// True once the activator has been resolved
    pub fn is_ready(&self) -> bool {
        self.activator.get().is_some()
    }

    /// Create an instance and return its `T` interface
    pub fn create<T: ComInterface>(&self) -> Result<InterfaceHandle<T>> {
        self.activator()?.create::<T>()
    }

    /// Untyped creation; resolution failures are reported as a status
    pub fn create_raw(&self, iid: &InterfaceId, out: *mut RawComPtr) -> StatusCode {
        if out.is_null() {
            return StatusCode::INVALID_POINTER;
        }
        match self.activator() {
            Ok(activator) => activator.create_raw(iid, out),
            Err(e) => {
                // SAFETY: checked non-null above.
                unsafe {
                    *out = ptr::null_mut();
                }
                e.status()
            }
        }
    }
}

impl<C: ComClass> Default for ClassFactory<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ComClass> fmt::Debug for ClassFactory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassFactory")
            .field("class_id", &C::CLSID)
            .field("library", &C::LIBRARY)
            .field("ready", &self.is_ready())
            .finish()
    }
}
