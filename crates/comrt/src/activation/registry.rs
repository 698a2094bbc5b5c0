//! Class ID to library registry
//!
//! The registry learns which library implements which class by asking every
//! loaded library for its class list. Scanning is lazy: it happens on the
//! first lookup miss, and again on later misses for libraries that appeared
//! since. A library is scanned at most once per registry, whatever the
//! outcome, so a broken library costs one failed scan and is then ignored.
//!
//! One mutex guards the whole state and is held for the entire refresh.
//! A class list entry point must therefore not call back into the same
//! registry.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use crate::library::{list_classes, DynamicLibrary, LibraryProvider, NativeLibraryProvider};
use crate::types::{ClassId, ComError, Result};

static GLOBAL: Lazy<Arc<ClassRegistry>> =
    Lazy::new(|| Arc::new(ClassRegistry::new(Arc::new(NativeLibraryProvider))));

/// Outcome of an explicit [`ClassRegistry::register`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReport {
    /// The library that was loaded
    pub library: String,
    /// Expected classes that no library provides after the refresh
    pub missing: Vec<ClassId>,
}

impl RegistrationReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

#[derive(Default)]
struct RegistryState {
    /// Libraries already scanned, by enumerated name
    scanned: HashSet<String>,
    /// Class -> name of the library that listed it first
    classes: HashMap<ClassId, String>,
    /// Open handles, kept for the registry's lifetime
    libraries: HashMap<String, Arc<dyn DynamicLibrary>>,
    empty_reported: bool,
    refreshes: u64,
}

/// Process-wide map from class IDs to the libraries implementing them
pub struct ClassRegistry {
    provider: Arc<dyn LibraryProvider>,
    state: Mutex<RegistryState>,
}

impl ClassRegistry {
    /// Create a registry over a library provider
    pub fn new(provider: Arc<dyn LibraryProvider>) -> Self {
        Self {
            provider,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// The registry backed by the platform loader, created on first use
    pub fn global() -> Arc<ClassRegistry> {
        GLOBAL.clone()
    }

    /// Name of the library implementing `class_id`
    ///
    /// A hit is answered from the map. A miss rescans the loaded libraries
    /// that have not been scanned yet, then looks again.
    pub fn find_library(&self, class_id: &ClassId) -> Option<String> {
        let mut state = self.state.lock();
        if let Some(name) = state.classes.get(class_id) {
            return Some(name.clone());
        }

        self.refresh(&mut state);

        let found = state.classes.get(class_id).cloned();
        if found.is_none() {
            debug!(%class_id, "class not provided by any loaded library");
        }
        found
    }

    /// Load a library and register its classes
    ///
    /// The library is scanned even if enumeration would not report it, and
    /// every other loaded library is refreshed as well. Expected classes
    /// that are still unknown are reported, not treated as an error.
    pub fn register(&self, library: &str, expected: &[ClassId]) -> Result<RegistrationReport> {
        let mut state = self.state.lock();
        let handle = self.open_locked(&mut state, library)?;
        if state.scanned.insert(library.to_string()) {
            self.scan(&mut state, library, Ok(handle));
        }
        self.refresh(&mut state);

        let missing: Vec<ClassId> = expected
            .iter()
            .filter(|class_id| !state.classes.contains_key(class_id))
            .copied()
            .collect();
        if missing.is_empty() {
            info!(library, classes = expected.len(), "library registered");
        } else {
            warn!(library, missing = ?missing, "library registered without some expected classes");
        }
        Ok(RegistrationReport {
            library: library.to_string(),
            missing,
        })
    }

    /// Open a library, reusing the handle if it was opened before
    ///
    /// Handles are kept for the registry's lifetime so entry points and
    /// vtables obtained from them stay valid.
    pub fn open_library(&self, name: &str) -> Result<Arc<dyn DynamicLibrary>> {
        let mut state = self.state.lock();
        self.open_locked(&mut state, name)
    }

    /// Snapshot of the known classes, sorted by class ID
    pub fn known_classes(&self) -> Vec<(ClassId, String)> {
        let state = self.state.lock();
        let mut classes: Vec<_> = state
            .classes
            .iter()
            .map(|(class_id, library)| (*class_id, library.clone()))
            .collect();
        classes.sort();
        classes
    }

    /// Number of refreshes performed so far
    pub fn refresh_count(&self) -> u64 {
        self.state.lock().refreshes
    }

    fn open_locked(&self, state: &mut RegistryState, name: &str) -> Result<Arc<dyn DynamicLibrary>> {
        if let Some(library) = state.libraries.get(name) {
            return Ok(library.clone());
        }
        let library = self.provider.open(name)?;
        state.libraries.insert(name.to_string(), library.clone());
        Ok(library)
    }

    fn refresh(&self, state: &mut RegistryState) {
        state.refreshes += 1;
        let names = match self.provider.loaded_libraries() {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "cannot enumerate loaded libraries");
                Vec::new()
            }
        };

        for name in names {
            if !state.scanned.insert(name.clone()) {
                continue;
            }
            let opened = match state.libraries.get(&name) {
                Some(library) => Ok(library.clone()),
                None => catch_unwind(AssertUnwindSafe(|| self.provider.open(&name)))
                    .unwrap_or_else(|_| Err(ComError::Library {
                        library: name.clone(),
                        reason: "panicked while opening".into(),
                    })),
            };
            self.scan(state, &name, opened);
        }

        if state.classes.is_empty() && !state.empty_reported {
            state.empty_reported = true;
            warn!("no loaded library lists any component class; libraries must export DllListClassObjects to be discovered");
        }
    }

    fn scan(&self, state: &mut RegistryState, name: &str, opened: Result<Arc<dyn DynamicLibrary>>) {
        let library = match opened {
            Ok(library) => library,
            Err(e) => {
                warn!(library = name, error = %e, "cannot open library for class scan");
                return;
            }
        };

        // SAFETY: libraries exporting the class list symbol follow its contract.
        let listed = catch_unwind(AssertUnwindSafe(|| unsafe { list_classes(library.as_ref()) }));
        let class_ids = match listed {
            Ok(Ok(Some(class_ids))) => class_ids,
            Ok(Ok(None)) => return,
            Ok(Err(e)) => {
                warn!(library = name, error = %e, "class list entry point failed");
                return;
            }
            Err(_) => {
                warn!(library = name, "class scan panicked");
                return;
            }
        };

        debug!(library = name, classes = class_ids.len(), "registered library classes");
        for class_id in class_ids {
            match state.classes.get(&class_id) {
                Some(owner) if owner != name => {
                    debug!(%class_id, owner = %owner, library = name, "class already provided by another library");
                }
                Some(_) => {}
                None => {
                    state.classes.insert(class_id, name.to_string());
                }
            }
        }
        // Keep the handle so the class's entry points stay loaded.
        state.libraries.entry(name.to_string()).or_insert(library);
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ClassRegistry")
            .field("classes", &state.classes.len())
            .field("scanned", &state.scanned.len())
            .field("refreshes", &state.refreshes)
            .finish()
    }
}
