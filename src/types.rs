//! Type definitions for cell addressing

use std::fmt;

/// One parsed CSV line, or one worksheet row: an ordered list of text fields
pub type Record = Vec<String>;

/// Convert a zero-based column index to its spreadsheet label (0 -> "A", 26 -> "AA")
///
/// Bijective base-26: there is no zero digit, so every index maps to exactly one
/// label and every label to exactly one index.
///
/// # Examples
///
/// ```
/// use sheetbridge::types::column_label;
///
/// assert_eq!(column_label(0), "A");
/// assert_eq!(column_label(25), "Z");
/// assert_eq!(column_label(26), "AA");
/// assert_eq!(column_label(702), "AAA");
/// ```
pub fn column_label(index: usize) -> String {
    let mut buffer = Vec::with_capacity(4);
    write_column_label(index, &mut buffer);
    // Only A-Z bytes are ever pushed
    buffer.into_iter().map(char::from).collect()
}

/// Append the label for `index` to `buffer`
///
/// Letters are produced least-significant first and reversed in place, so the
/// caller's buffer never needs shifting.
pub fn write_column_label(index: usize, buffer: &mut Vec<u8>) {
    let start = buffer.len();
    let mut n = index;
    loop {
        buffer.push(b'A' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    buffer[start..].reverse();
}

/// Convert a label (or the letter prefix of a cell reference) back to its zero-based index
///
/// Returns `None` when `label` has no leading letters or overflows `usize`.
pub fn column_index(label: &str) -> Option<usize> {
    let mut index: usize = 0;
    let mut seen = false;
    for byte in label.bytes() {
        if !byte.is_ascii_alphabetic() {
            break;
        }
        seen = true;
        let digit = (byte.to_ascii_uppercase() - b'A') as usize + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
    }
    if seen {
        Some(index - 1)
    } else {
        None
    }
}

/// A cell coordinate: zero-based column, one-based row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef {
    /// Zero-based column index
    pub column: usize,
    /// One-based row number
    pub row: u32,
}

impl CellRef {
    /// Create a new cell reference
    pub fn new(column: usize, row: u32) -> Self {
        CellRef { column, row }
    }

    /// Parse an A1-style reference such as `"C14"`
    pub fn parse(reference: &str) -> Option<Self> {
        let letters = reference
            .bytes()
            .take_while(|b| b.is_ascii_alphabetic())
            .count();
        let column = column_index(&reference[..letters])?;
        let row: u32 = reference[letters..].parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(CellRef { column, row })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_label(self.column), self.row)
    }
}
