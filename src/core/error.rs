use thiserror::Error as ThisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown version or type tag in a stored item
    Format,
    /// Truncated or malformed bytes, or derived data disagreeing with its header
    Corrupt,
    /// Predicted serialized size disagrees with the bytes actually written
    SizeMismatch,
    /// Failure reported by the durable blob backend
    Backend,
    Compression,
    /// A differing write raced with an in-flight write for the same key
    Conflict,
    InvalidArgument,
    Internal,
}

/// Error type shared by every layer of the crate.
///
/// Cloneable so that one failed in-flight operation can be reported to every
/// caller that joined it.
#[derive(Debug, Clone, ThisError)]
#[error("{kind:?}: {context}")]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error { kind, context: context.into() }
    }

    pub fn format(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::Format, context)
    }

    pub fn corrupt(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::Corrupt, context)
    }

    pub fn backend(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::Backend, context)
    }

    pub fn size_mismatch(what: &str, expected: usize, actual: usize) -> Self {
        Self::new(
            ErrorKind::SizeMismatch,
            format!("{what}: predicted {expected} bytes, wrote {actual}"),
        )
    }

    pub fn is_format(&self) -> bool {
        self.kind == ErrorKind::Format
    }

    pub fn is_corrupt(&self) -> bool {
        self.kind == ErrorKind::Corrupt
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::Backend, err.to_string())
    }
}

impl From<fst::Error> for Error {
    fn from(err: fst::Error) -> Self {
        Error::new(ErrorKind::Corrupt, format!("FST error: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorKind::InvalidArgument, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind_and_context() {
        let err = Error::format("unknown version 7");
        assert_eq!(err.to_string(), "Format: unknown version 7");
        assert!(err.is_format());
    }

    #[test]
    fn test_io_error_maps_to_backend() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert_eq!(err.kind, ErrorKind::Backend);
        assert!(err.context.contains("denied"));
    }

    #[test]
    fn test_size_mismatch_message() {
        let err = Error::size_mismatch("sub-chunk", 10, 12);
        assert_eq!(err.kind, ErrorKind::SizeMismatch);
        assert!(err.context.contains("predicted 10 bytes, wrote 12"));
    }
}
