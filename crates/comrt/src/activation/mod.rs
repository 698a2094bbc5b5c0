//! Class discovery and activation
//!
//! ```text
//! ClassFactory<C>  ──(once)──►  Activator  ──►  library entry point
//!                                   │              DllGetClassObject
//!                                   ▼
//!                            ClassRegistry  ──►  DllListClassObjects
//!                          (class -> library)     of loaded libraries
//! ```

mod activator;
mod factory;
mod registry;


pub use activator::Activator;
pub use factory::{ClassFactory, ComClass};
pub use registry::{ClassRegistry, RegistrationReport};
