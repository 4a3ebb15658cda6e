//! Error types for conversions

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Errors raised while converting between CSV and XLSX
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Input file does not exist or cannot be read
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV record
    #[error("CSV parse error on line {line}: {message}")]
    Parse { line: u64, message: String },

    /// Malformed or unsupported workbook structure
    #[error("workbook error: {0}")]
    Container(String),

    /// Destination cannot be created or written
    #[error("write error: {0}")]
    Write(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Rejected option value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// File extension is neither CSV nor a workbook
    #[error("unsupported file extension: {}", .0.display())]
    UnsupportedExtension(PathBuf),
}

impl ConvertError {
    /// Whether processing may continue with the next input after this error
    pub fn is_skippable(&self) -> bool {
        matches!(self, ConvertError::UnsupportedExtension(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ConvertError::Parse {
            line: 7,
            message: "unterminated quoted field".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "CSV parse error on line 7: unterminated quoted field"
        );

        let err = ConvertError::UnsupportedExtension(PathBuf::from("notes.txt"));
        assert_eq!(err.to_string(), "unsupported file extension: notes.txt");
    }

    #[test]
    fn test_only_extension_errors_are_skippable() {
        assert!(ConvertError::UnsupportedExtension(PathBuf::from("b.txt")).is_skippable());
        assert!(!ConvertError::Container("bad".to_string()).is_skippable());
        assert!(!ConvertError::Write("disk full".to_string()).is_skippable());
    }
}
