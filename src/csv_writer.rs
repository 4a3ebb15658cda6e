//! CSV file writing with streaming support

use crate::csv::CsvEncoder;
use crate::error::{ConvertError, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// CSV writer with streaming capabilities
///
/// Writes rows one at a time through a reusable encode buffer, so memory usage is
/// constant regardless of dataset size.
///
/// # Examples
///
/// ```no_run
/// use sheetbridge::csv_writer::CsvWriter;
///
/// let mut writer = CsvWriter::create("output.csv").unwrap();
/// writer.write_row(["Name", "Age", "City"]).unwrap();
/// writer.write_row(["Alice", "30", "NYC"]).unwrap();
/// writer.save().unwrap();
/// ```
pub struct CsvWriter<W: Write> {
    writer: W,

    // State
    row_count: u64,
    buffer: Vec<u8>,

    // Configuration
    delimiter: u8,
    quote_char: u8,
    line_ending: &'static [u8],
}

impl CsvWriter<BufWriter<File>> {
    /// Create (or truncate) a CSV file
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            ConvertError::Write(format!("failed to create {}: {}", path.display(), e))
        })?;
        Ok(Self::from_writer(BufWriter::with_capacity(64 * 1024, file)))
    }
}

impl<W: Write> CsvWriter<W> {
    /// Write CSV into any sink
    pub fn from_writer(writer: W) -> Self {
        CsvWriter {
            writer,
            row_count: 0,
            buffer: Vec::with_capacity(4096),
            delimiter: b',',
            quote_char: b'"',
            line_ending: b"\n",
        }
    }

    /// Set custom delimiter (builder pattern)
    pub fn delimiter(mut self, delim: u8) -> Self {
        self.delimiter = delim;
        self
    }

    /// Set custom quote character (builder pattern)
    pub fn quote_char(mut self, quote: u8) -> Self {
        self.quote_char = quote;
        self
    }

    /// Write a row of strings
    pub fn write_row<I, S>(&mut self, data: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields: Vec<S> = data.into_iter().collect();
        self.write_fields(&fields)
    }

    /// Write a row that is already collected
    pub fn write_fields<S: AsRef<str>>(&mut self, fields: &[S]) -> Result<()> {
        // Reuse buffer
        self.buffer.clear();

        let encoder = CsvEncoder::new(self.delimiter, self.quote_char);
        encoder.encode_row(fields, &mut self.buffer);
        self.buffer.extend_from_slice(self.line_ending);

        self.writer
            .write_all(&self.buffer)
            .map_err(|e| ConvertError::Write(format!("failed to write row: {}", e)))?;

        self.row_count += 1;
        Ok(())
    }

    /// Get the number of rows written
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Flush and return the underlying sink
    pub fn into_inner(mut self) -> Result<W> {
        self.writer
            .flush()
            .map_err(|e| ConvertError::Write(format!("failed to flush: {}", e)))?;
        Ok(self.writer)
    }

    /// Finalize the CSV output
    ///
    /// Consumes the writer; everything written so far is flushed.
    pub fn save(self) -> Result<()> {
        self.into_inner().map(|_| ())
    }
}
