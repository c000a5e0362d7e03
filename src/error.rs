//! Error types for archive operations

use std::fmt;

/// Result type for archive operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for archive operations
#[derive(Debug)]
pub enum Error {
    /// I/O error while reading sources or writing the archive/destination
    Io(std::io::Error),
    /// The archive content is corrupt or not a recognized tar stream
    Format {
        /// Description of what could not be parsed
        message: String,
    },
    /// Error reported by libarchive that is not a format problem
    Archive {
        /// errno reported by libarchive
        code: i32,
        /// Error message from libarchive
        message: String,
    },
    /// Invalid argument
    InvalidArgument(String),
    /// libarchive could not be loaded from the host
    NativeUnavailable(String),
    /// Null pointer error
    NullPointer,
}

impl Error {
    /// Returns true when the archive itself is bad, as opposed to the environment
    pub fn is_format(&self) -> bool {
        matches!(self, Error::Format { .. })
    }

    /// Returns true when the failure came from the filesystem
    pub fn is_io(&self) -> bool {
        match self {
            Error::Io(_) => true,
            Error::Archive { code, .. } => *code > 0,
            _ => false,
        }
    }

    pub(crate) fn format(message: impl Into<String>) -> Self {
        Error::Format {
            message: message.into(),
        }
    }

    /// Map an I/O error raised while decoding the archive stream
    pub(crate) fn from_stream(e: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match e.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::InvalidData
            | ErrorKind::InvalidInput
            | ErrorKind::Other => Error::format(e.to_string()),
            _ => Error::Io(e),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Format { message } => write!(f, "malformed archive: {}", message),
            Error::Archive { code, message } => {
                write!(f, "libarchive error (code {}): {}", code, message)
            }
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::NativeUnavailable(msg) => write!(f, "libarchive unavailable: {}", msg),
            Error::NullPointer => write!(f, "Null pointer error"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<regex::Error> for Error {
    fn from(e: regex::Error) -> Self {
        Error::InvalidArgument(format!("bad ignore pattern: {}", e))
    }
}

impl From<walkdir::Error> for Error {
    fn from(e: walkdir::Error) -> Self {
        Error::Io(e.into())
    }
}
