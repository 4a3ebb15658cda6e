//! Conversions between CSV and workbooks
//!
//! Both directions stream: CSV records are written to the workbook as they are
//! parsed, and worksheet rows are written to CSV as they are read.
//!
//! - [`csv_to_sheets`] partitions a record stream across `Sheet1`, `Sheet2`, ...
//!   whenever the per-sheet row capacity is reached.
//! - [`export_sheets`] writes one CSV per sheet, right-padding short rows with
//!   empty fields.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::{ConvertOptions, WidthPolicy, MAX_ROWS};
use crate::csv_reader::CsvReader;
use crate::csv_writer::CsvWriter;
use crate::error::{ConvertError, Result};
use crate::fast_writer::StreamingWorkbook;
use crate::naming;
use crate::streaming_reader::{SheetRows, WorkbookReader};
use crate::types::Record;

/// Destination of the CSV -> workbook direction
pub trait SheetSink {
    /// Finish the sheet in progress, if any, and start `name`
    fn start_sheet(&mut self, name: &str) -> Result<()>;

    /// Write `fields` at 1-based `row` of the current sheet, field `i` in column `i`
    fn write_row(&mut self, row: u32, fields: &[String]) -> Result<()>;

    /// Flush the last sheet and finalize the artifact
    fn finish(self) -> Result<()>
    where
        Self: Sized;
}

/// Origin of the workbook -> CSV direction
pub trait SheetSource {
    type Rows<'a>: Iterator<Item = Result<Record>>
    where
        Self: 'a;

    /// Sheet names in source order
    fn sheet_names(&self) -> Vec<String>;

    /// A fresh, lazy pass over one sheet's rows
    fn rows(&mut self, sheet: &str) -> Result<Self::Rows<'_>>;
}

impl<W: Write + std::io::Seek> SheetSink for StreamingWorkbook<W> {
    fn start_sheet(&mut self, name: &str) -> Result<()> {
        self.add_worksheet(name)
    }

    fn write_row(&mut self, row: u32, fields: &[String]) -> Result<()> {
        self.write_row_at(row, fields)
    }

    fn finish(self) -> Result<()> {
        self.close().map(|_| ())
    }
}

impl SheetSource for WorkbookReader {
    type Rows<'a> = SheetRows<'a>;

    fn sheet_names(&self) -> Vec<String> {
        WorkbookReader::sheet_names(self)
    }

    fn rows(&mut self, sheet: &str) -> Result<Self::Rows<'_>> {
        WorkbookReader::rows(self, sheet)
    }
}

/// Counts from one CSV -> workbook conversion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionStats {
    pub records: u64,
    pub sheets: u64,
}

/// Stream records into a sink, rolling over to a new sheet every `row_capacity` records
///
/// Record `r` (0-based) lands in sheet `Sheet{r / row_capacity + 1}` at row
/// `r % row_capacity + 1`. Fields are written as given; ragged records stay ragged.
/// With no records at all, an empty `Sheet1` is still started. The first failing
/// record aborts the conversion. The caller finalizes the sink.
pub fn csv_to_sheets<I, S>(records: I, sink: &mut S, row_capacity: u32) -> Result<ConversionStats>
where
    I: IntoIterator<Item = Result<Record>>,
    S: SheetSink,
{
    if row_capacity == 0 || row_capacity > MAX_ROWS {
        return Err(ConvertError::InvalidConfig(format!(
            "row capacity must be between 1 and {}, got {}",
            MAX_ROWS, row_capacity
        )));
    }

    let mut stats = ConversionStats::default();
    let mut r: u64 = 0;

    for record in records {
        let record = record?;
        if naming::starts_sheet(r, row_capacity) {
            let name = naming::sheet_name_for_row(r, row_capacity);
            if r > 0 {
                log::debug!("row capacity {} reached, continuing in {}", row_capacity, name);
            }
            sink.start_sheet(&name)?;
            stats.sheets += 1;
        }
        sink.write_row(naming::local_row(r, row_capacity), &record)?;
        r += 1;
    }

    if stats.sheets == 0 {
        sink.start_sheet(naming::PRIMARY_SHEET)?;
        stats.sheets = 1;
    }
    stats.records = r;
    Ok(stats)
}

/// Convert `<base>.csv` into `<base>.xlsx` next to it
pub fn csv_file_to_xlsx(input: &Path, options: &ConvertOptions) -> Result<PathBuf> {
    options.validate()?;

    let mut reader = CsvReader::open(input)?
        .delimiter(options.delimiter)
        .quote_char(options.quote_char);

    let output = naming::workbook_path(input);
    let file = File::create(&output).map_err(|e| {
        ConvertError::Write(format!("failed to create {}: {}", output.display(), e))
    })?;
    let mut workbook = StreamingWorkbook::with_compression(
        BufWriter::with_capacity(64 * 1024, file),
        options.compression_level,
    )?;

    let stats = csv_to_sheets(reader.rows(), &mut workbook, options.row_capacity)?;

    let mut sink = workbook.close()?;
    sink.flush()
        .map_err(|e| ConvertError::Write(format!("failed to flush {}: {}", output.display(), e)))?;

    log::info!(
        "{} -> {} ({} records, {} sheets)",
        input.display(),
        output.display(),
        stats.records,
        stats.sheets
    );
    Ok(output)
}

/// One CSV produced by [`export_sheets`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedSheet {
    /// Source sheet name
    pub sheet: String,
    /// Output identity: `base` or `base_<sheet>`
    pub stem: String,
    pub rows: u64,
    /// Field count every shorter row was padded to
    pub width: usize,
}

/// Write every sheet of `source` as CSV, in source order
///
/// `open_output` is called with each sheet name, after the sheet name has been
/// checked, and returns the writer for that sheet's CSV. Each CSV is flushed
/// before the next sheet is read. Sheets exported before a failure are left as
/// written.
pub fn export_sheets<S, W, F>(
    source: &mut S,
    base: &str,
    mut open_output: F,
    policy: WidthPolicy,
) -> Result<Vec<ExportedSheet>>
where
    S: SheetSource,
    W: Write,
    F: FnMut(&str) -> Result<CsvWriter<W>>,
{
    let mut exported = Vec::new();

    for sheet in source.sheet_names() {
        // Sheet names become part of a file name
        naming::validate_sheet_name(&sheet).map_err(|e| ConvertError::Container(e.to_string()))?;

        let mut width = match policy {
            WidthPolicy::Widest => Some(widest_row(source, &sheet)?),
            WidthPolicy::FirstRow => None,
        };

        let mut writer = open_output(&sheet)?;
        for row in source.rows(&sheet)? {
            let mut row = row?;
            if width.is_none() && !row.is_empty() {
                width = Some(row.len());
            }
            if let Some(width) = width {
                if row.len() < width {
                    row.resize(width, String::new());
                }
            }
            writer.write_fields(&row)?;
        }

        let rows = writer.row_count();
        writer.into_inner()?;

        let stem = naming::csv_stem(base, &sheet);
        log::debug!("exported sheet '{}' as {} ({} rows)", sheet, stem, rows);
        exported.push(ExportedSheet {
            sheet,
            stem,
            rows,
            width: width.unwrap_or(0),
        });
    }

    Ok(exported)
}

fn widest_row<S: SheetSource>(source: &mut S, sheet: &str) -> Result<usize> {
    let mut widest = 0;
    for row in source.rows(sheet)? {
        widest = widest.max(row?.len());
    }
    Ok(widest)
}

/// Convert `<base>.xlsx` into `<base>.csv` / `<base>_<sheet>.csv` next to it
pub fn xlsx_file_to_csv(input: &Path, options: &ConvertOptions) -> Result<Vec<PathBuf>> {
    options.validate()?;

    let mut reader = WorkbookReader::open(input)?;
    let base = naming::base_path(input)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let exported = export_sheets(
        &mut reader,
        &base,
        |sheet| {
            Ok(CsvWriter::create(naming::csv_path(input, sheet))?
                .delimiter(options.delimiter)
                .quote_char(options.quote_char))
        },
        options.width_policy,
    )?;

    let outputs: Vec<PathBuf> = exported
        .iter()
        .map(|sheet| naming::csv_path(input, &sheet.sheet))
        .collect();
    log::info!(
        "{} -> {} CSV file(s)",
        input.display(),
        outputs.len()
    );
    Ok(outputs)
}
