//! Binary component runtime
//!
//! This crate lets independently compiled shared libraries expose
//! reference-counted, GUID-identified interface objects that can be
//! instantiated and called across module boundaries through function
//! pointer tables.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Consumer API (this crate)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ClassFactory<C>      │  Activator         │  Handles       │
//! │  - exactly-once init  │  - DllGetClassObj. │  - AddRef/Rel. │
//! │  - typed + raw create │  - CreateInstance  │  - QueryItf.   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ClassRegistry (CLSID -> library, lazy scan, process-wide)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Marshaling           │  Status codes      │  Export side   │
//! │  - BSTR / UTF-16      │  - severity/fac.   │  - ComBox      │
//! │  - VARIANT            │  - ComError        │  - entry pts   │
//! ├─────────────────────────────────────────────────────────────┤
//! │           Dynamic libraries (libloading / dl_iterate)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`types`]: GUIDs, status codes and the error type
//! - [`interfaces`]: raw vtable layouts and [`InterfaceHandle`]
//! - [`strings`]: length-prefixed UTF-16 strings and encoding conversion
//! - [`variant`]: the tagged-union value representation
//! - [`library`]: dynamic library access and the per-library contract
//! - [`activation`]: class discovery, activation and class factories
//! - [`export`]: building blocks for libraries that implement classes

pub mod types;
pub mod interfaces;
pub mod strings;
pub mod variant;
pub mod library;
pub mod activation;
pub mod export;

// Re-export the types most callers need
pub use types::{
    ComError, Result,
    Guid, ClassId, InterfaceId,
    StatusCode, Severity,
};
pub use interfaces::{ComInterface, InterfaceHandle, IUnknown, IClassFactory, RawComPtr};
pub use strings::BString;
pub use variant::{Variant, RawVariant, VariantDate};
pub use activation::{Activator, ClassFactory, ClassRegistry, ComClass, RegistrationReport};
