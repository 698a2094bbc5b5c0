//! Component-side building blocks
//!
//! Everything a Rust library needs to implement classes that other modules
//! activate through the per-library contract:
//! - [`ComBox`]: reference-counted object box with an `IUnknown` implementation
//! - [`new_class_factory`]: generic `IClassFactory` object over a constructor
//! - [`get_class_object`] / [`list_class_objects`]: entry point bodies
//! - [`export_classes!`](crate::export_classes): exports both entry points

mod combox;
mod class_factory;
mod entry;

pub use combox::ComBox;
pub use class_factory::{new_class_factory, CreateInstanceFn, FactoryState};
pub use entry::{get_class_object, list_class_objects, ClassEntry};
