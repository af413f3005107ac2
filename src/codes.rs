//! Caller-facing error codes returned by the machine provider.
//!
//! The lifecycle controller retries on any error and branches on the code,
//! so every failure crossing the provider boundary is classified into one of
//! the [`Code`] variants below.

use std::fmt;

use thiserror::Error;

/// Machine error codes understood by the lifecycle controller.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Code {
    /// The request itself is malformed or targets another provider.
    InvalidArgument,
    /// The provider failed in a way that indicates a bug or bad state.
    Internal,
    /// The referenced device does not exist.
    NotFound,
    /// The backend could not satisfy a create request.
    Unavailable,
    /// The backend failed for an unclassified reason.
    Unknown,
    /// The operation is not supported by this provider.
    Unimplemented,
}

impl Code {
    /// Returns the canonical name of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "InvalidArgument",
            Self::Internal => "Internal",
            Self::NotFound => "NotFound",
            Self::Unavailable => "Unavailable",
            Self::Unknown => "Unknown",
            Self::Unimplemented => "Unimplemented",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error envelope returned from every provider operation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("machine codes error: code = [{code}] message = [{message}]")]
pub struct MachineError {
    /// Classification of the failure.
    pub code: Code,
    /// Human readable detail, including any backend message.
    pub message: String,
}

impl MachineError {
    /// Builds an error with the given code and message.
    #[must_use]
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Shorthand for [`Code::InvalidArgument`].
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    /// Shorthand for [`Code::Internal`].
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    /// Shorthand for [`Code::NotFound`].
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    /// Shorthand for [`Code::Unavailable`].
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    /// Shorthand for [`Code::Unknown`].
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(Code::Unknown, message)
    }

    /// Shorthand for [`Code::Unimplemented`].
    #[must_use]
    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(Code::Unimplemented, message)
    }
}
