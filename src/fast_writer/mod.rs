//! Streaming XLSX writer built on s-zip

mod workbook;
mod xml_writer;

pub use workbook::{StreamingWorkbook, DEFAULT_COMPRESSION_LEVEL};
pub use xml_writer::{escape_into, XmlWriter};

use crate::error::ConvertError;
use s_zip::StreamingZipWriter;
use std::io::{Seek, Write};

pub(crate) fn zip_error<E: std::fmt::Display>(e: E) -> ConvertError {
    ConvertError::Write(format!("ZIP write failed: {}", e))
}

/// `io::Write` view of the ZIP entry currently open in a [`StreamingZipWriter`]
pub(crate) struct EntryWriter<'a, W: Write + Seek> {
    zip: &'a mut StreamingZipWriter<W>,
}

impl<'a, W: Write + Seek> EntryWriter<'a, W> {
    pub(crate) fn new(zip: &'a mut StreamingZipWriter<W>) -> Self {
        EntryWriter { zip }
    }
}

impl<W: Write + Seek> Write for EntryWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.zip
            .write_data(buf)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
