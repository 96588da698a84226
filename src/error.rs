//! Errors raised by native callables.
//!
//! Bound functions may return `Result<T, E>` for any `E: Display`; the error
//! message becomes the command's error. [`NativeError`] covers the common
//! cases so callables do not need their own error type.

use thiserror::Error;

use tclbind_core::{ConversionError, TclError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NativeError {
    /// Error converting a value inside the callable
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("index {index} out of range (length {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("{message}")]
    Other { message: String },
}

impl NativeError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        NativeError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        NativeError::Other {
            message: message.into(),
        }
    }
}

impl From<NativeError> for TclError {
    fn from(err: NativeError) -> Self {
        match err {
            NativeError::Conversion(err) => TclError::Conversion(err),
            other => TclError::native(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(
            NativeError::invalid_argument("negative radius").to_string(),
            "invalid argument: negative radius"
        );
        assert_eq!(
            NativeError::OutOfRange { index: 4, len: 2 }.to_string(),
            "index 4 out of range (length 2)"
        );
    }

    #[test]
    fn converts_to_tcl_error() {
        let err: TclError = NativeError::other("boom").into();
        assert_eq!(err, TclError::native("boom"));
        let err: TclError = NativeError::from(ConversionError::SharedObject).into();
        assert!(matches!(err, TclError::Conversion(ConversionError::SharedObject)));
    }
}
