//! Common test utilities for integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::ffi::c_void;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use parking_lot::Mutex;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use comrt::export::{get_class_object, list_class_objects, ClassEntry, ComBox};
use comrt::interfaces::{IUnknownVtbl, RawComPtr};
use comrt::library::{DynamicLibrary, LibraryProvider, GET_CLASS_OBJECT, LIST_CLASS_OBJECTS};
use comrt::{ClassId, ComError, ComInterface, InterfaceHandle, InterfaceId, Result, StatusCode};

/// Initialize logging for tests
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// Counter interface
// ---------------------------------------------------------------------------

pub const IID_ICOUNTER: InterfaceId = InterfaceId::new(
    0x6d1f_3c2a, 0x4b7e, 0x4f10,
    [0x9a, 0x41, 0x5e, 0x22, 0x8c, 0x07, 0xd3, 0x11],
);

#[repr(C)]
pub struct ICounterVtbl {
    pub base: IUnknownVtbl,
    pub increment: unsafe extern "system" fn(this: RawComPtr) -> i32,
    pub value: unsafe extern "system" fn(this: RawComPtr) -> i32,
}

/// Test interface: a shared counter
pub enum ICounter {}

unsafe impl ComInterface for ICounter {
    const IID: InterfaceId = IID_ICOUNTER;
    type Vtable = ICounterVtbl;
}

/// Calls through the interface's vtable
pub trait CounterExt {
    fn increment(&self) -> i32;
    fn value(&self) -> i32;
}

impl CounterExt for InterfaceHandle<ICounter> {
    fn increment(&self) -> i32 {
        let vtbl = self.vtable().expect("counter handle is empty");
        unsafe { (vtbl.increment)(self.as_raw()) }
    }

    fn value(&self) -> i32 {
        let vtbl = self.vtable().expect("counter handle is empty");
        unsafe { (vtbl.value)(self.as_raw()) }
    }
}

/// Object behind ICounter; counts its own destruction
pub struct Counter {
    value: AtomicI32,
    drops: Option<Arc<AtomicUsize>>,
}

impl Drop for Counter {
    fn drop(&mut self) {
        if let Some(drops) = &self.drops {
            drops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

unsafe extern "system" fn counter_increment(this: RawComPtr) -> i32 {
    ComBox::<Counter>::value(this).value.fetch_add(1, Ordering::SeqCst) + 1
}

unsafe extern "system" fn counter_value(this: RawComPtr) -> i32 {
    ComBox::<Counter>::value(this).value.load(Ordering::SeqCst)
}

pub static COUNTER_VTBL: ICounterVtbl = ICounterVtbl {
    base: ComBox::<Counter>::UNKNOWN_VTBL,
    increment: counter_increment,
    value: counter_value,
};

pub static COUNTER_INTERFACES: [InterfaceId; 1] = [IID_ICOUNTER];

/// A fresh counter and its destruction count
pub fn counter_object() -> (InterfaceHandle<ICounter>, Arc<AtomicUsize>) {
    let drops = Arc::new(AtomicUsize::new(0));
    let counter = Counter {
        value: AtomicI32::new(0),
        drops: Some(drops.clone()),
    };
    let handle = unsafe { ComBox::new_handle::<ICounter>(counter, &COUNTER_VTBL, &COUNTER_INTERFACES) };
    (handle, drops)
}

/// Reference count of a counter object
pub fn ref_count<T: ComInterface>(handle: &InterfaceHandle<T>) -> u32 {
    unsafe { ComBox::<Counter>::ref_count(handle.as_raw()) }
}

/// Class constructor for counters
pub fn create_counter(iid: &InterfaceId, out: *mut RawComPtr) -> StatusCode {
    let counter = Counter {
        value: AtomicI32::new(0),
        drops: None,
    };
    unsafe { ComBox::create(counter, &COUNTER_VTBL, &COUNTER_INTERFACES, iid, out) }
}

/// Class constructor for counters that count their destruction in `drops`
pub fn create_tracked_counter(drops: Arc<AtomicUsize>, iid: &InterfaceId, out: *mut RawComPtr) -> StatusCode {
    let counter = Counter {
        value: AtomicI32::new(0),
        drops: Some(drops),
    };
    unsafe { ComBox::create(counter, &COUNTER_VTBL, &COUNTER_INTERFACES, iid, out) }
}

// ---------------------------------------------------------------------------
// Component libraries
// ---------------------------------------------------------------------------

pub const LIBRARY_A: &str = "/opt/components/libcounter_a.so";
pub const LIBRARY_B: &str = "/opt/components/libcounter_b.so";

pub const CLASS_X: ClassId = ClassId::new(0xa0a0_0001, 0x0001, 0x0001, [1, 1, 1, 1, 1, 1, 1, 1]);
pub const CLASS_Y: ClassId = ClassId::new(0xb0b0_0002, 0x0002, 0x0002, [2, 2, 2, 2, 2, 2, 2, 2]);
pub const CLASS_Z: ClassId = ClassId::new(0xc0c0_0003, 0x0003, 0x0003, [3, 3, 3, 3, 3, 3, 3, 3]);

static A_CLASSES: [ClassEntry; 1] = [ClassEntry { clsid: CLASS_X, create: create_counter }];
static A_IDS: [ClassId; 1] = [CLASS_X];
static B_CLASSES: [ClassEntry; 1] = [ClassEntry { clsid: CLASS_Y, create: create_counter }];
static B_IDS: [ClassId; 1] = [CLASS_Y];

unsafe extern "system" fn a_get_class_object(
    clsid: *const ClassId,
    iid: *const InterfaceId,
    out: *mut RawComPtr,
) -> StatusCode {
    get_class_object(&A_CLASSES, clsid, iid, out)
}

unsafe extern "system" fn a_list_class_objects(count: *mut usize, ids: *mut *const ClassId) -> StatusCode {
    list_class_objects(&A_IDS, count, ids)
}

unsafe extern "system" fn b_get_class_object(
    clsid: *const ClassId,
    iid: *const InterfaceId,
    out: *mut RawComPtr,
) -> StatusCode {
    get_class_object(&B_CLASSES, clsid, iid, out)
}

unsafe extern "system" fn b_list_class_objects(count: *mut usize, ids: *mut *const ClassId) -> StatusCode {
    list_class_objects(&B_IDS, count, ids)
}

unsafe extern "system" fn failing_list_class_objects(
    _count: *mut usize,
    _ids: *mut *const ClassId,
) -> StatusCode {
    StatusCode::OUT_OF_MEMORY
}

/// In-memory library with a symbol table
pub struct TestLibrary {
    name: String,
    symbols: HashMap<&'static str, usize>,
    lookups: AtomicUsize,
}

impl TestLibrary {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            symbols: HashMap::new(),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn with_symbol(mut self, symbol: &'static str, address: usize) -> Self {
        self.symbols.insert(symbol, address);
        self
    }

    /// Number of symbol lookups so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl DynamicLibrary for TestLibrary {
    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self, name: &str) -> Option<*const c_void> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.symbols.get(name).map(|address| *address as *const c_void)
    }
}

/// Library A: implements class X
pub fn library_a() -> TestLibrary {
    TestLibrary::new(LIBRARY_A)
        .with_symbol(GET_CLASS_OBJECT, a_get_class_object as usize)
        .with_symbol(LIST_CLASS_OBJECTS, a_list_class_objects as usize)
}

/// Library B: implements class Y
pub fn library_b() -> TestLibrary {
    TestLibrary::new(LIBRARY_B)
        .with_symbol(GET_CLASS_OBJECT, b_get_class_object as usize)
        .with_symbol(LIST_CLASS_OBJECTS, b_list_class_objects as usize)
}

/// A library whose class list entry point fails
pub fn failing_library(name: &str) -> TestLibrary {
    TestLibrary::new(name).with_symbol(LIST_CLASS_OBJECTS, failing_list_class_objects as usize)
}

#[derive(Default)]
struct ProviderState {
    loaded: Vec<Arc<TestLibrary>>,
    available: Vec<Arc<TestLibrary>>,
    broken: HashSet<String>,
}

/// Library provider over in-memory libraries
#[derive(Default)]
pub struct TestProvider {
    state: Mutex<ProviderState>,
    enumerations: AtomicUsize,
}

impl TestProvider {
    pub fn new(loaded: Vec<TestLibrary>) -> Arc<Self> {
        let provider = Arc::new(Self::default());
        for library in loaded {
            provider.load(library);
        }
        provider
    }

    /// Add a library that is loaded in the process
    pub fn load(&self, library: TestLibrary) -> Arc<TestLibrary> {
        let library = Arc::new(library);
        self.state.lock().loaded.push(library.clone());
        library
    }

    /// Add a library that can be opened but is not loaded yet
    pub fn make_available(&self, library: TestLibrary) -> Arc<TestLibrary> {
        let library = Arc::new(library);
        self.state.lock().available.push(library.clone());
        library
    }

    /// Add a loaded library name that fails to open
    pub fn load_broken(&self, name: &str) {
        self.state.lock().broken.insert(name.to_string());
    }

    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }
}

impl LibraryProvider for TestProvider {
    fn open(&self, name: &str) -> Result<Arc<dyn DynamicLibrary>> {
        let mut state = self.state.lock();
        if let Some(library) = state.loaded.iter().find(|l| l.name == name) {
            return Ok(library.clone() as Arc<dyn DynamicLibrary>);
        }
        // Opening an available library loads it.
        if let Some(position) = state.available.iter().position(|l| l.name == name) {
            let library = state.available.remove(position);
            state.loaded.push(library.clone());
            return Ok(library as Arc<dyn DynamicLibrary>);
        }
        Err(ComError::Library {
            library: name.to_string(),
            reason: "cannot open shared object file".into(),
        })
    }

    fn loaded_libraries(&self) -> Result<Vec<String>> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        let mut names: Vec<String> = state.broken.iter().cloned().collect();
        names.extend(state.loaded.iter().map(|l| l.name.clone()));
        Ok(names)
    }
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

/// Layer counting events at WARN level
#[derive(Clone, Default)]
pub struct WarningCounter {
    count: Arc<AtomicUsize>,
}

impl WarningCounter {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for WarningCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Run `f` with a thread-local subscriber that counts warnings
pub fn count_warnings<R>(f: impl FnOnce() -> R) -> (R, usize) {
    use tracing_subscriber::layer::SubscriberExt;

    let counter = WarningCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, counter.count())
}
