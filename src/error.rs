use thiserror::Error;

/// Main error type for Tabload
#[derive(Error, Debug)]
pub enum TabloadError {
    /// Archive cannot be opened or decoded
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No parser registered for the file extension
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// File decodes but its structure is unusable (missing header, bad rows)
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Remote insert API errors
    #[error("Remote insert error: {0}")]
    RemoteInsert(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenient Result type using TabloadError
pub type Result<T> = std::result::Result<T, TabloadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TabloadError::CorruptArchive("bad magic".to_string());
        assert!(err.to_string().contains("Corrupt archive"));
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TabloadError = io_err.into();
        assert!(matches!(err, TabloadError::Io(_)));
    }
}
