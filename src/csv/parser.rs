//! CSV parsing with strict RFC 4180 quoting

use std::fmt;

/// Why a line could not be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseIssue {
    /// Quote character inside an unquoted field (1-based column)
    BareQuote { column: usize },
    /// Characters between a closing quote and the next delimiter (1-based column)
    ExtraneousQuote { column: usize },
    /// Input ended inside a quoted field
    UnterminatedQuote,
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseIssue::BareQuote { column } => {
                write!(f, "bare quote in non-quoted field (column {})", column)
            }
            ParseIssue::ExtraneousQuote { column } => {
                write!(f, "extraneous or missing quote in quoted field (column {})", column)
            }
            ParseIssue::UnterminatedQuote => write!(f, "unterminated quoted field"),
        }
    }
}

/// A record being assembled from one or more physical lines
///
/// Holds the fields finished so far and the field in progress, so a quoted
/// field that spans lines resumes where the previous line stopped.
#[derive(Debug, Default)]
pub struct PartialRecord {
    fields: Vec<String>,
    field: String,
    in_quotes: bool,
    // Characters consumed by earlier lines, newlines included
    offset: usize,
}

impl PartialRecord {
    /// Reset for the next record, keeping allocations
    pub fn clear(&mut self) {
        self.fields.clear();
        self.field.clear();
        self.in_quotes = false;
        self.offset = 0;
    }

    /// Whether the last line fed ended inside a quoted field
    pub fn is_open(&self) -> bool {
        self.in_quotes
    }

    /// Hand out the finished fields and reset
    pub fn take_fields(&mut self) -> Vec<String> {
        let fields = std::mem::take(&mut self.fields);
        self.clear();
        fields
    }
}

/// CSV parser for reading CSV data
pub struct CsvParser {
    delimiter: u8,
    quote_char: u8,
}

impl CsvParser {
    /// Create a new CSV parser with custom delimiter and quote character
    pub fn new(delimiter: u8, quote_char: u8) -> Self {
        Self {
            delimiter,
            quote_char,
        }
    }

    /// Parse one complete record into fields
    ///
    /// Quoted fields may contain embedded `\n`. A record that ends inside quotes
    /// is [`ParseIssue::UnterminatedQuote`].
    pub fn parse_line(&self, line: &str) -> Result<Vec<String>, ParseIssue> {
        let mut record = PartialRecord::default();
        if self.feed_line(line, &mut record)? {
            Ok(record.take_fields())
        } else {
            Err(ParseIssue::UnterminatedQuote)
        }
    }

    /// Continue `record` with one physical line (without its terminator)
    ///
    /// Returns `Ok(true)` once the record is complete. `Ok(false)` means the line
    /// ended inside a quoted field: a `\n` has been added to that field and the
    /// next physical line should be fed. Each line is scanned exactly once.
    pub fn feed_line(&self, line: &str, record: &mut PartialRecord) -> Result<bool, ParseIssue> {
        let quote = self.quote_char as char;
        let delimiter = self.delimiter as char;
        let offset = record.offset;
        let mut chars = line.chars().enumerate().peekable();

        loop {
            if record.in_quotes {
                // Quoted field: runs to the closing quote
                loop {
                    match chars.next() {
                        None => {
                            record.field.push('\n');
                            record.offset += line.chars().count() + 1;
                            return Ok(false);
                        }
                        Some((_, c)) if c == quote => match chars.peek() {
                            Some(&(_, next)) if next == quote => {
                                // Escaped quote ("")
                                record.field.push(quote);
                                chars.next();
                            }
                            Some(&(_, next)) if next == delimiter => {
                                record.in_quotes = false;
                                break;
                            }
                            None => {
                                record.in_quotes = false;
                                break;
                            }
                            Some(&(pos, _)) => {
                                return Err(ParseIssue::ExtraneousQuote {
                                    column: offset + pos + 1,
                                })
                            }
                        },
                        Some((_, c)) => record.field.push(c),
                    }
                }
            } else if let Some(&(_, ch)) = chars.peek() {
                if ch == quote {
                    chars.next();
                    record.in_quotes = true;
                    continue;
                }
                // Unquoted field: runs to the next delimiter
                while let Some(&(pos, c)) = chars.peek() {
                    if c == delimiter {
                        break;
                    }
                    if c == quote {
                        return Err(ParseIssue::BareQuote {
                            column: offset + pos + 1,
                        });
                    }
                    record.field.push(c);
                    chars.next();
                }
            }

            record.fields.push(std::mem::take(&mut record.field));

            // Either a delimiter (another field follows) or end of line
            match chars.next() {
                Some((_, c)) if c == delimiter => continue,
                _ => break,
            }
        }

        Ok(true)
    }
}
