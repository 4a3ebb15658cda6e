//! Streaming reader for XLSX files
//!
//! **Memory Usage:**
//! - Shared Strings Table (SST): loaded fully, since cells reference it by index
//! - Worksheet XML: inflated and pull-parsed straight off the ZIP entry; only the
//!   current `<row>` and a fixed read buffer are held, whatever the sheet size
//!
//! **Trade-offs:**
//! - Cell values are returned as text; styles, formulas and number formats are ignored
//! - Sequential read only; one sheet stream is open at a time

use crate::config::{MAX_COLUMNS, MAX_ROWS};
use crate::error::{ConvertError, Result};
use crate::types::{CellRef, Record};
use indexmap::IndexMap;
use quick_xml::events::{BytesCData, BytesStart, Event};
use quick_xml::Reader;
use s_zip::StreamingZipReader;
use std::fmt::Display;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Rows of one worksheet, decompressed as they are read
pub type SheetRows<'a> = RowIterator<'a, BufReader<Box<dyn Read + 'a>>>;

/// Streaming reader for XLSX files
///
/// Sheet order, names and worksheet parts are resolved once in [`open`](Self::open);
/// each call to [`rows`](Self::rows) seeks to that sheet's entry and inflates it
/// while rows are pulled.
///
/// # Example
///
/// ```no_run
/// use sheetbridge::streaming_reader::WorkbookReader;
///
/// let mut reader = WorkbookReader::open("report.xlsx")?;
/// for name in reader.sheet_names() {
///     for row in reader.rows(&name)? {
///         println!("{}: {:?}", name, row?);
///     }
/// }
/// # Ok::<(), sheetbridge::ConvertError>(())
/// ```
pub struct WorkbookReader {
    archive: StreamingZipReader,
    sst: Vec<String>,
    sheets: IndexMap<String, String>,
}

impl WorkbookReader {
    /// Open an XLSX file and load its sheet list and shared strings
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        // Surface a missing/unreadable file as an open failure, not a ZIP error
        std::fs::File::open(path).map_err(|source| ConvertError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut archive = StreamingZipReader::open(path).map_err(container_error)?;

        let relationships = load_relationships(open_part(&mut archive, WORKBOOK_RELS_PART)?)?;
        let sheets = load_sheet_list(open_part(&mut archive, WORKBOOK_PART)?, &relationships)?;

        let sst = if archive.find_entry(SHARED_STRINGS_PART).is_some() {
            load_shared_strings(open_part(&mut archive, SHARED_STRINGS_PART)?)?
        } else {
            // No SST = all cells are inline
            Vec::new()
        };

        log::debug!(
            "opened {} ({} sheets, {} shared strings)",
            path.display(),
            sheets.len(),
            sst.len()
        );

        Ok(WorkbookReader {
            archive,
            sst,
            sheets,
        })
    }

    /// Sheet names in workbook order
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.keys().cloned().collect()
    }

    /// Stream the rows of one sheet
    ///
    /// Rows come back ragged, exactly as stored: a row holds cells up to its last
    /// stored cell, skipped columns are `""`, and skipped row numbers produce
    /// empty rows.
    pub fn rows(&mut self, sheet_name: &str) -> Result<SheetRows<'_>> {
        let part = self.sheets.get(sheet_name).ok_or_else(|| {
            ConvertError::Container(format!(
                "sheet '{}' not found. Available sheets: {:?}",
                sheet_name,
                self.sheets.keys().collect::<Vec<_>>()
            ))
        })?;

        let stream = open_part(&mut self.archive, part)?;
        Ok(RowIterator::new(stream, &self.sst))
    }
}

fn open_part<'a>(
    archive: &'a mut StreamingZipReader,
    part: &str,
) -> Result<BufReader<Box<dyn Read + 'a>>> {
    let stream = archive
        .read_entry_streaming_by_name(part)
        .map_err(|e| ConvertError::Container(format!("{}: {}", part, e)))?;
    Ok(BufReader::with_capacity(READ_BUFFER_SIZE, stream))
}

fn container_error<E: Display>(e: E) -> ConvertError {
    ConvertError::Container(e.to_string())
}

fn xml_error<E: Display>(e: E) -> ConvertError {
    ConvertError::Container(format!("malformed XML: {}", e))
}

fn xml_reader<R: BufRead>(source: R) -> Reader<R> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(false);
    reader
}

/// Unescaped value of the attribute whose qualified name is `key`
fn attr(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    match e.try_get_attribute(key).map_err(xml_error)? {
        Some(a) => Ok(Some(a.unescape_value().map_err(xml_error)?.into_owned())),
        None => Ok(None),
    }
}

/// Unescaped value of the first attribute whose local name is `key`, any prefix
fn attr_local(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a.map_err(xml_error)?;
        if a.key.local_name().as_ref() == key {
            return Ok(Some(a.unescape_value().map_err(xml_error)?.into_owned()));
        }
    }
    Ok(None)
}

fn cdata_text(e: BytesCData<'_>) -> Result<String> {
    let raw = e.into_inner();
    std::str::from_utf8(&raw)
        .map(str::to_string)
        .map_err(xml_error)
}

/// Relationship id -> package part path
///
/// `<Relationship Id="rId1" Target="worksheets/sheet1.xml"/>`
fn load_relationships<R: BufRead>(source: R) -> Result<IndexMap<String, String>> {
    let mut xml = xml_reader(source);
    let mut buf = Vec::new();
    let mut targets = IndexMap::new();

    loop {
        match xml.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attr(&e, b"Id")?, attr(&e, b"Target")?) {
                    targets.insert(id, resolve_part(&target));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(targets)
}

/// Sheet name -> worksheet part path, in workbook order
///
/// `<sheet name="Sheet1" sheetId="1" r:id="rId1"/>`
fn load_sheet_list<R: BufRead>(
    source: R,
    relationships: &IndexMap<String, String>,
) -> Result<IndexMap<String, String>> {
    let mut xml = xml_reader(source);
    let mut buf = Vec::new();
    let mut sheets = IndexMap::new();

    loop {
        match xml.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attr(&e, b"name")?
                    .ok_or_else(|| ConvertError::Container("sheet without a name".to_string()))?;
                let rid = attr_local(&e, b"id")?.ok_or_else(|| {
                    ConvertError::Container(format!("sheet '{}' has no relationship id", name))
                })?;
                let part = relationships.get(&rid).ok_or_else(|| {
                    ConvertError::Container(format!(
                        "sheet '{}' points to unknown relationship {}",
                        name, rid
                    ))
                })?;
                if sheets.insert(name.clone(), part.clone()).is_some() {
                    return Err(ConvertError::Container(format!(
                        "duplicate sheet name '{}'",
                        name
                    )));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

// Targets are relative to xl/ unless absolute within the package
fn resolve_part(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

/// Load the Shared Strings Table
///
/// Each `<si>` is the concatenation of its `<t>` runs; phonetic runs (`<rPh>`) are
/// skipped.
fn load_shared_strings<R: BufRead>(source: R) -> Result<Vec<String>> {
    let mut xml = xml_reader(source);
    let mut buf = Vec::new();
    let mut sst = Vec::new();

    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match xml.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => sst.push(String::new()),
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => sst.push(current.take().unwrap_or_default()),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Text(e) if in_text && !in_phonetic => {
                if let Some(value) = current.as_mut() {
                    value.push_str(&e.unescape().map_err(xml_error)?);
                }
            }
            Event::CData(e) if in_text && !in_phonetic => {
                if let Some(value) = current.as_mut() {
                    value.push_str(&cdata_text(e)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(sst)
}

/// Where character data inside a cell currently goes
#[derive(Clone, Copy, PartialEq, Eq)]
enum CellText {
    None,
    Value,
    Inline,
}

/// Cell being assembled
struct CellState {
    column: usize,
    kind: Option<String>,
    value: String,
    target: CellText,
    in_phonetic: bool,
}

impl CellState {
    fn accepts_text(&self) -> bool {
        match self.target {
            CellText::Value => true,
            // Inline text only counts inside inlineStr cells
            CellText::Inline => self.kind.as_deref() == Some("inlineStr") && !self.in_phonetic,
            CellText::None => false,
        }
    }
}

/// Iterator over the rows of one worksheet
pub struct RowIterator<'a, R: BufRead> {
    xml: Reader<R>,
    buf: Vec<u8>,
    sst: &'a [String],
    last_row: u32,
    empty_rows_pending: u32,
    queued: Option<Record>,
    finished: bool,
}

impl<'a, R: BufRead> RowIterator<'a, R> {
    /// Stream rows from raw worksheet XML
    pub fn new(source: R, sst: &'a [String]) -> Self {
        RowIterator {
            xml: xml_reader(source),
            buf: Vec::with_capacity(4096),
            sst,
            last_row: 0,
            empty_rows_pending: 0,
            queued: None,
            finished: false,
        }
    }

    /// Parse the next `<row>`; `None` once `</sheetData>` or EOF is reached
    fn next_stored_row(&mut self) -> Result<Option<(u32, Record)>> {
        // Find the next row start
        let number = loop {
            self.buf.clear();
            match self.xml.read_event_into(&mut self.buf).map_err(xml_error)? {
                Event::Eof => return Ok(None),
                Event::End(e) if e.local_name().as_ref() == b"sheetData" => return Ok(None),
                Event::Start(e) if e.local_name().as_ref() == b"row" => {
                    break row_number(&e, self.last_row)?;
                }
                Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                    return Ok(Some((row_number(&e, self.last_row)?, Vec::new())));
                }
                _ => {}
            }
        };

        let mut cells: Record = Vec::new();
        let mut cell: Option<CellState> = None;

        loop {
            self.buf.clear();
            match self.xml.read_event_into(&mut self.buf).map_err(xml_error)? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"c" => cell = Some(start_cell(&e, number, cells.len())?),
                    b"v" => {
                        if let Some(state) = cell.as_mut() {
                            state.target = CellText::Value;
                        }
                    }
                    b"t" => {
                        if let Some(state) = cell.as_mut() {
                            state.target = CellText::Inline;
                        }
                    }
                    b"rPh" => {
                        if let Some(state) = cell.as_mut() {
                            state.in_phonetic = true;
                        }
                    }
                    _ => {}
                },
                Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                    let state = start_cell(&e, number, cells.len())?;
                    store_cell(self.sst, &mut cells, state)?;
                }
                Event::End(e) => match e.local_name().as_ref() {
                    b"c" => {
                        if let Some(state) = cell.take() {
                            store_cell(self.sst, &mut cells, state)?;
                        }
                    }
                    b"v" | b"t" => {
                        if let Some(state) = cell.as_mut() {
                            state.target = CellText::None;
                        }
                    }
                    b"rPh" => {
                        if let Some(state) = cell.as_mut() {
                            state.in_phonetic = false;
                        }
                    }
                    b"row" => return Ok(Some((number, cells))),
                    _ => {}
                },
                Event::Text(e) => {
                    if let Some(state) = cell.as_mut() {
                        if state.accepts_text() {
                            state.value.push_str(&e.unescape().map_err(xml_error)?);
                        }
                    }
                }
                Event::CData(e) => {
                    if let Some(state) = cell.as_mut() {
                        if state.accepts_text() {
                            state.value.push_str(&cdata_text(e)?);
                        }
                    }
                }
                Event::Eof => {
                    return Err(ConvertError::Container(format!(
                        "row {} is not closed",
                        number
                    )))
                }
                _ => {}
            }
        }
    }
}

/// 1-based row number from `<row r="..">`, or the next one when `r` is absent
fn row_number(e: &BytesStart<'_>, last_row: u32) -> Result<u32> {
    let number = match attr(e, b"r")? {
        Some(r) => r
            .trim()
            .parse::<u32>()
            .map_err(|_| ConvertError::Container(format!("invalid row number '{}'", r)))?,
        None => last_row + 1,
    };
    if number <= last_row || number > MAX_ROWS {
        return Err(ConvertError::Container(format!(
            "row {} out of order or beyond the sheet limit",
            number
        )));
    }
    Ok(number)
}

/// Cell state from `<c r=".." t="..">`; cells without `r` take the next column
fn start_cell(e: &BytesStart<'_>, row: u32, next_column: usize) -> Result<CellState> {
    let column = match attr(e, b"r")? {
        Some(reference) => CellRef::parse(&reference)
            .filter(|r| r.row == row)
            .map(|r| r.column)
            .ok_or_else(|| {
                ConvertError::Container(format!(
                    "invalid cell reference '{}' in row {}",
                    reference, row
                ))
            })?,
        None => next_column,
    };
    if column < next_column || column >= MAX_COLUMNS {
        return Err(ConvertError::Container(format!(
            "cell column {} out of order or beyond the sheet limit in row {}",
            column + 1,
            row
        )));
    }
    Ok(CellState {
        column,
        kind: attr(e, b"t")?,
        value: String::new(),
        target: CellText::None,
        in_phonetic: false,
    })
}

/// Resolve the cell's text and place it at its column
fn store_cell(sst: &[String], cells: &mut Record, state: CellState) -> Result<()> {
    let value = match state.kind.as_deref() {
        Some("s") => {
            let index: usize = state.value.trim().parse().map_err(|_| {
                ConvertError::Container(format!("invalid shared string index '{}'", state.value))
            })?;
            sst.get(index).cloned().ok_or_else(|| {
                ConvertError::Container(format!(
                    "shared string index {} out of range ({} strings)",
                    index,
                    sst.len()
                ))
            })?
        }
        Some("b") => match state.value.trim() {
            "1" => "TRUE".to_string(),
            "0" => "FALSE".to_string(),
            other => other.to_string(),
        },
        // inlineStr, str, n, e, d, or untyped: the collected text as-is
        _ => state.value,
    };

    cells.resize(state.column, String::new());
    cells.push(value);
    Ok(())
}

impl<'a, R: BufRead> Iterator for RowIterator<'a, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.empty_rows_pending > 0 {
            self.empty_rows_pending -= 1;
            return Some(Ok(Vec::new()));
        }
        if let Some(row) = self.queued.take() {
            return Some(Ok(row));
        }
        if self.finished {
            return None;
        }

        match self.next_stored_row() {
            Ok(Some((number, cells))) => {
                let gap = number - self.last_row - 1;
                self.last_row = number;
                if gap == 0 {
                    Some(Ok(cells))
                } else {
                    // Row numbers skipped by the file still occupy their position
                    self.empty_rows_pending = gap - 1;
                    self.queued = Some(cells);
                    Some(Ok(Vec::new()))
                }
            }
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn sheet(rows_xml: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1"/><sheetData>{}</sheetData><pageMargins left="0.7"/></worksheet>"#,
            rows_xml
        )
    }

    fn read_rows(xml: &str, sst: &[String]) -> Result<Vec<Record>> {
        RowIterator::new(xml.as_bytes(), sst).collect()
    }

    /// Counts bytes handed to the XML parser
    struct CountingReader<R> {
        inner: R,
        consumed: Rc<Cell<usize>>,
    }

    impl<R: Read> Read for CountingReader<R> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.inner.read(buf)?;
            self.consumed.set(self.consumed.get() + n);
            Ok(n)
        }
    }

    #[test]
    fn test_inline_strings() -> Result<()> {
        let xml = sheet(
            r#"<row r="1"><c r="A1" t="inlineStr"><is><t>a &amp; b</t></is></c><c r="B1" t="inlineStr"><is><t xml:space="preserve"> pad </t></is></c></row>"#,
        );
        assert_eq!(read_rows(&xml, &[])?, vec![vec!["a & b", " pad "]]);
        Ok(())
    }

    #[test]
    fn test_shared_strings_and_types() -> Result<()> {
        let sst = vec!["zero".to_string(), "one".to_string()];
        let xml = sheet(
            r#"<row r="1" spans="1:5"><c r="A1" t="s"><v>1</v></c><c r="B1"><v>3.5</v></c><c r="C1" t="b"><v>1</v></c><c r="D1" t="str"><f>A1&amp;"x"</f><v>onex</v></c><c r="E1" t="e"><v>#N/A</v></c></row>"#,
        );
        assert_eq!(
            read_rows(&xml, &sst)?,
            vec![vec!["one", "3.5", "TRUE", "onex", "#N/A"]]
        );
        Ok(())
    }

    #[test]
    fn test_column_gaps_and_empty_cells() -> Result<()> {
        let xml = sheet(r#"<row r="1"><c r="B1" t="inlineStr"><is><t>b</t></is></c><c r="D1"/></row>"#);
        assert_eq!(read_rows(&xml, &[])?, vec![vec!["", "b", "", ""]]);
        Ok(())
    }

    #[test]
    fn test_row_gaps_become_empty_rows() -> Result<()> {
        let xml = sheet(
            r#"<row r="2"><c r="A2"><v>1</v></c></row><row r="3"/><row r="5"><c r="A5"><v>5</v></c></row>"#,
        );
        let rows = read_rows(&xml, &[])?;
        let expected: Vec<Vec<&str>> = vec![vec![], vec!["1"], vec![], vec![], vec!["5"]];
        assert_eq!(rows, expected);
        Ok(())
    }

    #[test]
    fn test_cells_without_references() -> Result<()> {
        let xml = sheet(r#"<row><c><v>1</v></c><c><v>2</v></c></row><row><c><v>3</v></c></row>"#);
        assert_eq!(read_rows(&xml, &[])?, vec![vec!["1", "2"], vec!["3"]]);
        Ok(())
    }

    #[test]
    fn test_cdata_and_character_references() -> Result<()> {
        let xml = sheet(
            r#"<row r="1"><c r="A1" t="inlineStr"><is><t><![CDATA[<raw> & ]]></t></is></c><c r="B1" t="inlineStr"><is><t>line&#10;break&#x41;</t></is></c></row>"#,
        );
        assert_eq!(read_rows(&xml, &[])?, vec![vec!["<raw> & ", "line\nbreakA"]]);
        Ok(())
    }

    #[test]
    fn test_bad_shared_string_index() {
        let xml = sheet(r#"<row r="1"><c r="A1" t="s"><v>9</v></c></row>"#);
        assert!(matches!(
            read_rows(&xml, &[]),
            Err(ConvertError::Container(_))
        ));
    }

    #[test]
    fn test_unclosed_row() {
        let xml = r#"<worksheet><sheetData><row r="1"><c r="A1"><v>1</v></c>"#;
        let mut rows = RowIterator::new(xml.as_bytes(), &[]);
        assert!(matches!(rows.next(), Some(Err(ConvertError::Container(_)))));
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_rows_are_read_lazily() -> Result<()> {
        let mut rows_xml = String::new();
        for r in 1..=20_000 {
            rows_xml.push_str(&format!(
                r#"<row r="{r}"><c r="A{r}" t="inlineStr"><is><t>value {r}</t></is></c></row>"#
            ));
        }
        let xml = sheet(&rows_xml);
        let consumed = Rc::new(Cell::new(0));
        let source = BufReader::with_capacity(
            4096,
            CountingReader {
                inner: xml.as_bytes(),
                consumed: Rc::clone(&consumed),
            },
        );

        let mut rows = RowIterator::new(source, &[]);
        assert_eq!(rows.next().transpose()?, Some(vec!["value 1".to_string()]));
        // One buffer fill is enough for the first row of a ~1.5 MB sheet
        assert!(
            consumed.get() <= 8 * 1024,
            "read {} of {} bytes to yield one row",
            consumed.get(),
            xml.len()
        );

        assert_eq!(rows.count(), 19_999);
        assert!(consumed.get() > 1024 * 1024);
        Ok(())
    }

    #[test]
    fn test_load_shared_strings_rich_text() -> Result<()> {
        let xml = r#"<sst count="3" uniqueCount="3"><si><t>plain</t></si><si><r><rPr><b/></rPr><t>bo</t></r><r><t xml:space="preserve">ld </t></r><rPh sb="0" eb="1"><t>ふ</t></rPh></si><si/></sst>"#;
        let sst = load_shared_strings(xml.as_bytes())?;
        assert_eq!(sst, vec!["plain", "bold ", ""]);
        Ok(())
    }

    #[test]
    fn test_load_sheet_list() -> Result<()> {
        let rels = r#"<Relationships><Relationship Id="rId1" Type="x/worksheet" Target="worksheets/sheet2.xml"/><Relationship Id="rId2" Type="x/worksheet" Target="/xl/worksheets/sheet1.xml"/></Relationships>"#;
        let workbook = r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId2"/><sheet name="Data &amp; More" sheetId="2" r:id="rId1"/></sheets></workbook>"#;

        let relationships = load_relationships(rels.as_bytes())?;
        let sheets = load_sheet_list(workbook.as_bytes(), &relationships)?;
        let pairs: Vec<(&str, &str)> = sheets
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("Sheet1", "xl/worksheets/sheet1.xml"),
                ("Data & More", "xl/worksheets/sheet2.xml")
            ]
        );
        Ok(())
    }

    #[test]
    fn test_unknown_relationship() {
        let workbook = r#"<workbook><sheets><sheet name="S" sheetId="1" r:id="rId9"/></sheets></workbook>"#;
        let relationships = IndexMap::new();
        assert!(load_sheet_list(workbook.as_bytes(), &relationships).is_err());
    }
}
