//! Operating system libraries via libloading

use std::ffi::c_void;
use std::sync::Arc;
use libloading::{Library, Symbol};
use tracing::debug;
use crate::types::{ComError, Result};
use super::provider::{DynamicLibrary, LibraryProvider};

/// A library opened through the platform loader
pub struct NativeLibrary {
    name: String,
    library: Library,
}

impl NativeLibrary {
    /// Open a library by path or loader name; the empty name is the main
    /// program
    pub fn open(name: &str) -> Result<Self> {
        let library = if name.is_empty() {
            open_self()?
        } else {
            // SAFETY: loading runs the library's initializers; callers only
            // open component libraries they trust.
            unsafe { Library::new(name) }.map_err(|e| ComError::Library {
                library: name.to_string(),
                reason: e.to_string(),
            })?
        };
        debug!(library = name, "opened library");
        Ok(Self {
            name: name.to_string(),
            library,
        })
    }
}

#[cfg(unix)]
fn open_self() -> Result<Library> {
    Ok(libloading::os::unix::Library::this().into())
}

#[cfg(windows)]
fn open_self() -> Result<Library> {
    libloading::os::windows::Library::this()
        .map(Into::into)
        .map_err(|e| ComError::Library {
            library: String::new(),
            reason: e.to_string(),
        })
}

impl DynamicLibrary for NativeLibrary {
    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self, name: &str) -> Option<*const c_void> {
        // SAFETY: the address is only reinterpreted by typed resolvers.
        let symbol: Symbol<*const c_void> = unsafe { self.library.get(name.as_bytes()) }.ok()?;
        Some(*symbol)
    }
}

/// The process's own loader
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeLibraryProvider;

impl LibraryProvider for NativeLibraryProvider {
    fn open(&self, name: &str) -> Result<Arc<dyn DynamicLibrary>> {
        Ok(Arc::new(NativeLibrary::open(name)?))
    }

    fn loaded_libraries(&self) -> Result<Vec<String>> {
        let mut names = loaded_images();
        let mut seen = std::collections::HashSet::new();
        names.retain(|name| seen.insert(name.clone()));
        Ok(names)
    }
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
fn loaded_images() -> Vec<String> {
    use std::ffi::CStr;

    unsafe extern "C" fn collect(
        info: *mut libc::dl_phdr_info,
        _size: libc::size_t,
        data: *mut libc::c_void,
    ) -> libc::c_int {
        let names = &mut *(data as *mut Vec<String>);
        let name = (*info).dlpi_name;
        if name.is_null() {
            names.push(String::new());
        } else {
            let name = CStr::from_ptr(name).to_string_lossy().into_owned();
            if !is_kernel_image(&name) {
                names.push(name);
            }
        }
        0
    }

    let mut names: Vec<String> = Vec::new();
    // SAFETY: the callback only touches `names`, which outlives the call.
    unsafe {
        libc::dl_iterate_phdr(Some(collect), &mut names as *mut Vec<String> as *mut libc::c_void);
    }
    names
}

/// Kernel-provided images are mapped but cannot be opened by name
#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
fn is_kernel_image(name: &str) -> bool {
    name.starts_with("linux-vdso") || name.starts_with("linux-gate") || name == "[vdso]"
}

#[cfg(target_vendor = "apple")]
fn loaded_images() -> Vec<String> {
    use std::ffi::CStr;
    use std::os::raw::c_char;

    extern "C" {
        fn _dyld_image_count() -> u32;
        fn _dyld_get_image_name(index: u32) -> *const c_char;
    }

    // SAFETY: dyld returns null for indices that vanished since the count.
    unsafe {
        (0.._dyld_image_count())
            .filter_map(|index| {
                let name = _dyld_get_image_name(index);
                if name.is_null() {
                    None
                } else {
                    Some(CStr::from_ptr(name).to_string_lossy().into_owned())
                }
            })
            .collect()
    }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_vendor = "apple"
)))]
fn loaded_images() -> Vec<String> {
    debug!("loaded library enumeration is not supported on this platform");
    Vec::new()
}
