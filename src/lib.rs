//! # sheetbridge
//!
//! Streaming conversion between CSV and XLSX.
//!
//! - **CSV -> XLSX**: records are written to the workbook as they are parsed. Once a
//!   sheet holds its row capacity (1,048,576 rows by default), writing continues
//!   in `Sheet2`, `Sheet3`, ...
//! - **XLSX -> CSV**: every sheet becomes its own CSV file, `report.csv` for
//!   `Sheet1` and `report_<sheet>.csv` for the rest, with short rows padded so
//!   each file is rectangular.
//!
//! Memory stays bounded in both directions. The writer closes a worksheet's ZIP
//! entry as soon as the next sheet starts. The reader inflates and parses a
//! worksheet entry only as rows are pulled, so it holds the current row, its read
//! buffers and the workbook's shared-string table. With `WidthPolicy::Widest`
//! each sheet is streamed twice: once to measure, once to write.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sheetbridge::{convert, ConvertOptions};
//! use std::path::Path;
//!
//! let options = ConvertOptions::default();
//! let workbook = convert::csv_file_to_xlsx(Path::new("data.csv"), &options)?;
//! let csv_files = convert::xlsx_file_to_csv(&workbook, &options)?;
//! println!("{:?}", csv_files);
//! # Ok::<(), sheetbridge::ConvertError>(())
//! ```
//!
//! ## Streaming API
//!
//! ```no_run
//! use sheetbridge::fast_writer::StreamingWorkbook;
//! use sheetbridge::streaming_reader::WorkbookReader;
//!
//! let mut workbook = StreamingWorkbook::create("out.xlsx")?;
//! workbook.add_worksheet("Sheet1")?;
//! workbook.write_row(&["id", "name"])?;
//! workbook.close()?;
//!
//! let mut reader = WorkbookReader::open("out.xlsx")?;
//! for row in reader.rows("Sheet1")? {
//!     println!("{:?}", row?);
//! }
//! # Ok::<(), sheetbridge::ConvertError>(())
//! ```

pub mod config;
pub mod convert;
pub mod csv;
pub mod csv_reader;
pub mod csv_writer;
pub mod dispatch;
pub mod error;
pub mod fast_writer;
pub mod naming;
pub mod streaming_reader;
pub mod types;

pub use config::{ConvertOptions, ErrorPolicy, WidthPolicy, MAX_COLUMNS, MAX_ROWS};
pub use convert::{ConversionStats, ExportedSheet, SheetSink, SheetSource};
pub use csv_reader::CsvReader;
pub use csv_writer::CsvWriter;
pub use dispatch::{FileKind, Outcome, RunSummary};
pub use error::{ConvertError, Result};
pub use fast_writer::StreamingWorkbook;
pub use streaming_reader::WorkbookReader;
pub use types::{column_label, CellRef, Record};
