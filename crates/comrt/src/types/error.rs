//! Component runtime error types

use thiserror::Error;
use crate::types::{ClassId, InterfaceId, StatusCode};

/// Result type for component runtime operations
pub type Result<T> = std::result::Result<T, ComError>;

/// Structured errors returned by the convenience APIs
///
/// Every variant maps onto a [`StatusCode`] through [`ComError::status`],
/// which is what crosses the binary boundary.
#[derive(Error, Debug)]
pub enum ComError {
    /// Operation not implemented
    #[error("not implemented")]
    NotImplemented,

    /// The object does not implement the requested interface
    #[error("interface {interface} not supported{}", on_class(.class))]
    NoSuchInterface {
        interface: InterfaceId,
        class: Option<ClassId>,
    },

    /// No loaded library implements the class
    #[error("class not registered: {0}")]
    ClassNotRegistered(ClassId),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Null or otherwise unusable pointer
    #[error("invalid pointer")]
    InvalidPointer,

    /// Allocation failed
    #[error("out of memory")]
    OutOfMemory,

    /// Operation aborted
    #[error("operation aborted")]
    Aborted,

    /// Invalid UTF-8 or UTF-16 sequence
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Variant tag outside the supported set
    #[error("unsupported variant type: 0x{0:04x}")]
    UnsupportedVariant(u16),

    /// Dynamic library could not be loaded
    #[error("cannot load library '{library}': {reason}")]
    Library { library: String, reason: String },

    /// Any other failing status
    #[error("{message} (status {status})")]
    Generic { status: StatusCode, message: String },
}

fn on_class(class: &Option<ClassId>) -> String {
    match class {
        Some(class) => format!(" by class {}", class),
        None => String::new(),
    }
}

impl ComError {
    /// Create a generic error carrying the original status
    pub fn generic(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Generic { status, message: message.into() }
    }

    /// Status code reported across the binary boundary
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            Self::NoSuchInterface { .. } => StatusCode::NO_SUCH_INTERFACE,
            Self::ClassNotRegistered(_) => StatusCode::CLASS_NOT_REGISTERED,
            Self::InvalidArgument(_) => StatusCode::INVALID_ARGUMENT,
            Self::InvalidPointer => StatusCode::INVALID_POINTER,
            Self::OutOfMemory => StatusCode::OUT_OF_MEMORY,
            Self::Aborted => StatusCode::ABORTED,
            Self::Encoding(_) => StatusCode::INVALID_ARGUMENT,
            Self::UnsupportedVariant(_) => StatusCode::BAD_VARIANT_TYPE,
            Self::Library { .. } => StatusCode::CLASS_NOT_REGISTERED,
            Self::Generic { status, .. } => *status,
        }
    }
}

impl From<StatusCode> for ComError {
    fn from(status: StatusCode) -> Self {
        match status {
            StatusCode::NOT_IMPLEMENTED => Self::NotImplemented,
            StatusCode::NO_SUCH_INTERFACE => Self::NoSuchInterface {
                interface: InterfaceId::NIL,
                class: None,
            },
            StatusCode::INVALID_ARGUMENT => Self::InvalidArgument(status.to_string()),
            StatusCode::INVALID_POINTER => Self::InvalidPointer,
            StatusCode::OUT_OF_MEMORY => Self::OutOfMemory,
            StatusCode::ABORTED => Self::Aborted,
            _ => Self::Generic {
                status,
                message: "operation failed".to_string(),
            },
        }
    }
}

impl From<ComError> for StatusCode {
    fn from(error: ComError) -> Self {
        error.status()
    }
}
