//! Error types for the scripting core.

use std::fmt;

/// The result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for scripting operations.
///
/// Every failure is reported to the immediate caller; none of these variants
/// crash the process or invalidate cached scripts in the owning session.
#[derive(Debug)]
pub enum Error {
    /// The script body failed to compile. The body is never cached.
    Compile(String),

    /// A script invocation raised an error, made an untrapped command call
    /// that failed, or exceeded its time limit. The session remains usable.
    Runtime(String),

    /// No compiled script is cached under the given identity.
    NotFound(String),

    /// Serialization was requested but no result is pending.
    NoPendingResult,

    /// An invalid argument was provided.
    InvalidArgument(String),

    /// The embedded engine failed outside of script semantics, e.g. a
    /// registry or allocation error. Unrecoverable VM corruption is not
    /// modeled here and aborts the process.
    Engine(String),
}

impl Error {
    /// Creates a new runtime error.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Error::Runtime(msg.into())
    }

    /// Creates a new not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new engine error.
    pub fn engine(msg: impl Into<String>) -> Self {
        Error::Engine(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Compile(msg) => write!(f, "Compile error: {}", msg),
            Error::Runtime(msg) => write!(f, "Runtime error: {}", msg),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::NoPendingResult => write!(f, "No pending result to serialize"),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::Engine(msg) => write!(f, "Engine error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<mlua::Error> for Error {
    fn from(err: mlua::Error) -> Self {
        Error::Engine(err.to_string())
    }
}
