//! Conversion options

use crate::error::{ConvertError, Result};
use crate::fast_writer::DEFAULT_COMPRESSION_LEVEL;

/// Rows per worksheet in the XLSX format (2^20)
pub const MAX_ROWS: u32 = 1_048_576;

/// Columns per worksheet in the XLSX format (2^14, column `XFD`)
pub const MAX_COLUMNS: usize = 16_384;

/// How the exporter chooses the field count of a sheet's CSV rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WidthPolicy {
    /// Measure the widest row first and pad every row to it
    #[default]
    Widest,
    /// Pad to the first non-empty row; wider rows are written unchanged
    FirstRow,
}

/// What a multi-file run does after a file fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop at the first failing file
    #[default]
    FailFast,
    /// Record the failure and carry on with the next file
    Continue,
}

/// Options shared by both conversion directions
///
/// # Examples
///
/// ```
/// use sheetbridge::{ConvertOptions, WidthPolicy};
///
/// let options = ConvertOptions::default()
///     .row_capacity(500_000)
///     .width_policy(WidthPolicy::FirstRow)
///     .delimiter(b';');
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    pub(crate) row_capacity: u32,
    pub(crate) width_policy: WidthPolicy,
    pub(crate) error_policy: ErrorPolicy,
    pub(crate) delimiter: u8,
    pub(crate) quote_char: u8,
    pub(crate) compression_level: u32,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            row_capacity: MAX_ROWS,
            width_policy: WidthPolicy::default(),
            error_policy: ErrorPolicy::default(),
            delimiter: b',',
            quote_char: b'"',
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl ConvertOptions {
    /// Rows per sheet before CSV input rolls over to the next sheet (1..=MAX_ROWS)
    pub fn row_capacity(mut self, rows: u32) -> Self {
        self.row_capacity = rows;
        self
    }

    /// Export width policy
    pub fn width_policy(mut self, policy: WidthPolicy) -> Self {
        self.width_policy = policy;
        self
    }

    /// Multi-file error policy
    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// CSV field delimiter, for reading and writing
    pub fn delimiter(mut self, delim: u8) -> Self {
        self.delimiter = delim;
        self
    }

    /// CSV quote character, for reading and writing
    pub fn quote_char(mut self, quote: u8) -> Self {
        self.quote_char = quote;
        self
    }

    /// Deflate level for written workbooks (0-9)
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Reject option combinations that cannot produce valid output
    pub fn validate(&self) -> Result<()> {
        if self.row_capacity == 0 || self.row_capacity > MAX_ROWS {
            return Err(ConvertError::InvalidConfig(format!(
                "row capacity must be between 1 and {}, got {}",
                MAX_ROWS, self.row_capacity
            )));
        }
        if self.delimiter == self.quote_char {
            return Err(ConvertError::InvalidConfig(
                "delimiter and quote character must differ".to_string(),
            ));
        }
        for (name, byte) in [("delimiter", self.delimiter), ("quote character", self.quote_char)] {
            if byte == b'\n' || byte == b'\r' || !byte.is_ascii() {
                return Err(ConvertError::InvalidConfig(format!(
                    "{} must be a single ASCII character other than CR or LF",
                    name
                )));
            }
        }
        if self.compression_level > 9 {
            return Err(ConvertError::InvalidConfig(format!(
                "compression level must be 0-9, got {}",
                self.compression_level
            )));
        }
        Ok(())
    }
}
