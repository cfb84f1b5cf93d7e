//! Error types for the Ember3D engine
//!
//! Errors fall in two classes. Fatal errors (`BackendError`, `OutOfMemory`) come
//! from the device and are never retried. Misuse errors (`InvalidUsage`) flag a
//! logic bug in the calling code. Transient swapchain conditions are not errors
//! at all: they are reported through `AcquireStatus` / `FrameStatus`.

use std::fmt;

/// Result type for Ember3D engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ember3D engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (driver rejection, device lost...)
    BackendError(String),

    /// Out of GPU or host memory
    OutOfMemory,

    /// Handle that does not belong to the receiving manager
    InvalidResource(String),

    /// Initialization failed (context, pools, swapchain wrapping)
    InitializationFailed(String),

    /// Programmer misuse of the recording protocol
    InvalidUsage(String),
}

impl Error {
    /// True for errors caused by a logic bug in the caller
    pub fn is_misuse(&self) -> bool {
        matches!(self, Error::InvalidUsage(_) | Error::InvalidResource(_))
    }

    /// True for environment failures with no safe degraded mode
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::BackendError(_) | Error::OutOfMemory | Error::InitializationFailed(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::InvalidUsage(msg) => write!(f, "Invalid usage: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an ERROR and build an `Error::BackendError` with the same message
///
/// # Example
///
/// ```no_run
/// # use ember_3d_engine::engine_err;
/// let err = engine_err!("ember3d::vulkan", "Failed to create fence: {}", -1);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::ember3d::Error::BackendError(message)
    }};
}

/// Log an ERROR and return `Err(Error::BackendError)` from the enclosing function
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

/// Log a WARN and build an `Error::InvalidUsage` with the same message
#[macro_export]
macro_rules! engine_misuse {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_warn!($source, "{}", message);
        $crate::ember3d::Error::InvalidUsage(message)
    }};
}

/// Log a WARN and return `Err(Error::InvalidUsage)` from the enclosing function
#[macro_export]
macro_rules! engine_bail_misuse {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_misuse!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
