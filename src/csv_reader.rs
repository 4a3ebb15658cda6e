//! CSV file reading with streaming support

use crate::csv::{CsvParser, ParseIssue, PartialRecord};
use crate::error::{ConvertError, Result};
use crate::types::Record;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// CSV reader with streaming capabilities
///
/// Reads records one at a time using an iterator pattern. Memory usage is
/// bounded by the longest logical record, never by file size.
///
/// - Records may differ in field count
/// - Quoted fields may span several physical lines
/// - Blank lines are skipped
///
/// # Examples
///
/// ```no_run
/// use sheetbridge::csv_reader::CsvReader;
///
/// let mut reader = CsvReader::open("data.csv").unwrap();
///
/// for record in reader.rows() {
///     let record = record.unwrap();
///     println!("{:?}", record);
/// }
/// ```
pub struct CsvReader<R> {
    reader: R,

    // Parser state
    line_buffer: String,
    record: PartialRecord,
    line_number: u64,
    row_count: u64,

    // Configuration
    delimiter: u8,
    quote_char: u8,
}

impl CsvReader<BufReader<File>> {
    /// Open a CSV file for streaming reads
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConvertError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(BufReader::with_capacity(64 * 1024, file)))
    }
}

impl<R: BufRead> CsvReader<R> {
    /// Read CSV from any buffered source
    pub fn from_reader(reader: R) -> Self {
        CsvReader {
            reader,
            line_buffer: String::with_capacity(1024),
            record: PartialRecord::default(),
            line_number: 0,
            row_count: 0,
            delimiter: b',',
            quote_char: b'"',
        }
    }

    /// Set custom delimiter (builder pattern)
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sheetbridge::csv_reader::CsvReader;
    ///
    /// let reader = CsvReader::open("data.csv")
    ///     .unwrap()
    ///     .delimiter(b';');
    /// ```
    pub fn delimiter(mut self, delim: u8) -> Self {
        self.delimiter = delim;
        self
    }

    /// Set custom quote character (builder pattern)
    pub fn quote_char(mut self, quote: u8) -> Self {
        self.quote_char = quote;
        self
    }

    /// Read the next physical line into `line_buffer`, without its terminator
    ///
    /// Returns `false` at EOF.
    fn next_line(&mut self) -> Result<bool> {
        self.line_buffer.clear();
        let bytes_read = self
            .reader
            .read_line(&mut self.line_buffer)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::InvalidData => ConvertError::Parse {
                    line: self.line_number + 1,
                    message: "invalid UTF-8".to_string(),
                },
                _ => ConvertError::Io(e),
            })?;
        if bytes_read == 0 {
            return Ok(false);
        }
        self.line_number += 1;

        if self.line_buffer.ends_with('\n') {
            self.line_buffer.pop();
            if self.line_buffer.ends_with('\r') {
                self.line_buffer.pop();
            }
        }
        if self.line_number == 1 && self.line_buffer.starts_with('\u{feff}') {
            self.line_buffer.drain(..'\u{feff}'.len_utf8());
        }
        Ok(true)
    }

    /// Read a single record
    ///
    /// Returns `Ok(None)` when EOF is reached.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sheetbridge::csv_reader::CsvReader;
    ///
    /// let mut reader = CsvReader::open("data.csv").unwrap();
    ///
    /// while let Some(record) = reader.read_row().unwrap() {
    ///     println!("{:?}", record);
    /// }
    /// ```
    pub fn read_row(&mut self) -> Result<Option<Record>> {
        // Skip blank lines between records
        loop {
            if !self.next_line()? {
                return Ok(None);
            }
            if !self.line_buffer.is_empty() {
                break;
            }
        }

        let start_line = self.line_number;
        self.record.clear();

        let parser = CsvParser::new(self.delimiter, self.quote_char);
        loop {
            match parser.feed_line(&self.line_buffer, &mut self.record) {
                Ok(true) => {
                    self.row_count += 1;
                    return Ok(Some(self.record.take_fields()));
                }
                // Quoted field continues on the next physical line
                Ok(false) => {
                    if !self.next_line()? {
                        return Err(ConvertError::Parse {
                            line: start_line,
                            message: ParseIssue::UnterminatedQuote.to_string(),
                        });
                    }
                }
                Err(issue) => {
                    return Err(ConvertError::Parse {
                        line: start_line,
                        message: issue.to_string(),
                    });
                }
            }
        }
    }

    /// Get iterator over records
    pub fn rows(&mut self) -> CsvRowIterator<'_, R> {
        CsvRowIterator {
            reader: self,
            failed: false,
        }
    }

    /// Get the number of records read so far
    pub fn row_count(&self) -> u64 {
        self.row_count
    }
}

/// Iterator over CSV records
///
/// Stops after the first error.
pub struct CsvRowIterator<'a, R> {
    reader: &'a mut CsvReader<R>,
    failed: bool,
}

impl<'a, R: BufRead> Iterator for CsvRowIterator<'a, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.reader.read_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(input: &str) -> Result<Vec<Record>> {
        let mut reader = CsvReader::from_reader(input.as_bytes());
        reader.rows().collect()
    }

    #[test]
    fn test_read_ragged() -> Result<()> {
        let rows = read_all("a,b\nc\nd,e,f\n")?;
        assert_eq!(rows, vec![vec!["a", "b"], vec!["c"], vec!["d", "e", "f"]]);
        Ok(())
    }

    #[test]
    fn test_crlf_and_missing_final_newline() -> Result<()> {
        let rows = read_all("Name,Age\r\nAlice,30")?;
        assert_eq!(rows, vec![vec!["Name", "Age"], vec!["Alice", "30"]]);
        Ok(())
    }

    #[test]
    fn test_blank_lines_skipped() -> Result<()> {
        let rows = read_all("a\n\n\nb\n\n")?;
        assert_eq!(rows, vec![vec!["a"], vec!["b"]]);
        Ok(())
    }

    #[test]
    fn test_quoted_newline_spans_lines() -> Result<()> {
        let mut reader = CsvReader::from_reader("id,note\r\n1,\"first\r\n\r\nlast\"\r\n2,x\r\n".as_bytes());
        let rows: Vec<Record> = reader.rows().collect::<Result<_>>()?;
        assert_eq!(
            rows,
            vec![
                vec!["id", "note"],
                vec!["1", "first\n\nlast"],
                vec!["2", "x"]
            ]
        );
        assert_eq!(reader.row_count(), 3);
        Ok(())
    }

    #[test]
    fn test_quoted_field_over_many_lines() -> Result<()> {
        let lines = 50_000;
        let mut input = String::from("id,body\n7,\"");
        for i in 0..lines {
            if i > 0 {
                input.push('\n');
            }
            input.push_str("line ");
            input.push_str(&i.to_string());
        }
        input.push_str("\",tail\nnext,row\n");

        let mut reader = CsvReader::from_reader(input.as_bytes());
        assert_eq!(reader.read_row()?, Some(vec!["id".to_string(), "body".to_string()]));

        let record = reader.read_row()?.unwrap();
        assert_eq!(record.len(), 3);
        assert_eq!(record[0], "7");
        assert_eq!(record[1].lines().count(), lines);
        assert!(record[1].starts_with("line 0\nline 1\n"));
        assert!(record[1].ends_with("line 49999"));
        assert_eq!(record[2], "tail");

        assert_eq!(reader.read_row()?, Some(vec!["next".to_string(), "row".to_string()]));
        Ok(())
    }

    #[test]
    fn test_bom_stripped() -> Result<()> {
        let rows = read_all("\u{feff}a,b\n")?;
        assert_eq!(rows, vec![vec!["a", "b"]]);
        Ok(())
    }

    #[test]
    fn test_custom_delimiter() -> Result<()> {
        let mut reader = CsvReader::from_reader("a;b\n".as_bytes()).delimiter(b';');
        assert_eq!(reader.read_row()?, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(reader.read_row()?, None);
        Ok(())
    }

    #[test]
    fn test_unterminated_quote_is_fatal() {
        let err = read_all("ok\n\"never closed\nmore\n").unwrap_err();
        match err {
            ConvertError::Parse { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("unterminated"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_bare_quote_reports_line() {
        let err = read_all("a\nb\"c\n").unwrap_err();
        assert!(matches!(err, ConvertError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let mut reader = CsvReader::from_reader("x\"y\nz\n".as_bytes());
        let mut rows = reader.rows();
        assert!(matches!(rows.next(), Some(Err(_))));
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_open_missing_file() {
        let err = CsvReader::open("definitely/not/here.csv").err().unwrap();
        assert!(matches!(err, ConvertError::Open { .. }));
    }
}
