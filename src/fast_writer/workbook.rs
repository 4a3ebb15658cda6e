//! Streaming workbook writer: one ZIP entry per worksheet, rows written as they arrive

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use s_zip::StreamingZipWriter;

use super::xml_writer::{escape_into, XmlWriter};
use super::{zip_error, EntryWriter};
use crate::config::{MAX_COLUMNS, MAX_ROWS};
use crate::error::{ConvertError, Result};
use crate::naming;
use crate::types::write_column_label;

const SPREADSHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIP_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PACKAGE_RELATIONSHIP_NS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";
const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";

/// Default deflate level for workbook parts
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Streaming XLSX writer
///
/// Each worksheet is a ZIP entry that stays open only while it is the current
/// sheet; starting the next sheet (or closing the workbook) writes the closing
/// tags and moves on, so a finished sheet holds no memory. Cell text is written
/// inline (`t="inlineStr"`), so there is no shared-string table growing with
/// the input.
///
/// # Examples
///
/// ```no_run
/// use sheetbridge::fast_writer::StreamingWorkbook;
///
/// let mut workbook = StreamingWorkbook::create("out.xlsx")?;
/// workbook.add_worksheet("Sheet1")?;
/// workbook.write_row(&["Name", "Age"])?;
/// workbook.write_row(&["Alice", "30"])?;
/// workbook.close()?;
/// # Ok::<(), sheetbridge::ConvertError>(())
/// ```
pub struct StreamingWorkbook<W: Write + Seek> {
    zip: StreamingZipWriter<W>,
    worksheets: Vec<String>,
    in_worksheet: bool,
    current_row: u32,
    wide_row_reported: bool,
    xml_buffer: Vec<u8>,
}

impl StreamingWorkbook<BufWriter<File>> {
    /// Create (or truncate) an `.xlsx` file
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            ConvertError::Write(format!("failed to create {}: {}", path.display(), e))
        })?;
        Self::from_writer(BufWriter::with_capacity(64 * 1024, file))
    }
}

impl<W: Write + Seek> StreamingWorkbook<W> {
    /// Write a workbook into any seekable sink
    pub fn from_writer(writer: W) -> Result<Self> {
        Self::with_compression(writer, DEFAULT_COMPRESSION_LEVEL)
    }

    /// Write a workbook with an explicit deflate level (0-9)
    pub fn with_compression(writer: W, level: u32) -> Result<Self> {
        let zip = StreamingZipWriter::from_writer_with_compression(writer, level.min(9))
            .map_err(zip_error)?;

        Ok(StreamingWorkbook {
            zip,
            worksheets: Vec::new(),
            in_worksheet: false,
            current_row: 0,
            wide_row_reported: false,
            xml_buffer: Vec::with_capacity(8192),
        })
    }

    /// Names of the worksheets started so far, in order
    pub fn sheet_names(&self) -> &[String] {
        &self.worksheets
    }

    /// Last row number written to the current worksheet (0 before the first row)
    pub fn current_row(&self) -> u32 {
        self.current_row
    }

    /// Finish the current worksheet (if any) and start a new one
    pub fn add_worksheet(&mut self, name: &str) -> Result<()> {
        naming::validate_sheet_name(name)?;
        if self
            .worksheets
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(name))
        {
            return Err(ConvertError::Write(format!(
                "duplicate sheet name '{}'",
                name
            )));
        }

        self.finish_current_worksheet()?;

        self.worksheets.push(name.to_string());
        self.current_row = 0;
        self.wide_row_reported = false;

        let entry_name = format!("xl/worksheets/sheet{}.xml", self.worksheets.len());
        self.zip.start_entry(&entry_name).map_err(zip_error)?;

        self.xml_buffer.clear();
        self.xml_buffer.extend_from_slice(XML_DECLARATION.as_bytes());
        self.xml_buffer.extend_from_slice(b"<worksheet xmlns=\"");
        self.xml_buffer.extend_from_slice(SPREADSHEET_NS.as_bytes());
        self.xml_buffer.extend_from_slice(b"\" xmlns:r=\"");
        self.xml_buffer.extend_from_slice(RELATIONSHIP_NS.as_bytes());
        self.xml_buffer.extend_from_slice(b"\"><sheetData>");
        self.zip.write_data(&self.xml_buffer).map_err(zip_error)?;

        self.in_worksheet = true;
        log::debug!("started worksheet '{}'", name);
        Ok(())
    }

    /// Write the next row of the current worksheet
    pub fn write_row<S: AsRef<str>>(&mut self, values: &[S]) -> Result<()> {
        let next = self.current_row.checked_add(1).ok_or_else(|| {
            ConvertError::Write("worksheet row counter overflow".to_string())
        })?;
        self.write_row_at(next, values)
    }

    /// Write a row at an explicit 1-based row number
    ///
    /// Row numbers must be strictly ascending within a worksheet and may skip
    /// (skipped rows are simply absent). Empty strings become empty cells that
    /// still occupy their column.
    pub fn write_row_at<S: AsRef<str>>(&mut self, row: u32, values: &[S]) -> Result<()> {
        if !self.in_worksheet {
            return Err(ConvertError::Write("no worksheet started".to_string()));
        }
        if row <= self.current_row || row as u64 > MAX_ROWS as u64 {
            return Err(ConvertError::Write(format!(
                "row {} out of order or beyond the sheet limit (last written: {})",
                row, self.current_row
            )));
        }
        if values.len() > MAX_COLUMNS && !self.wide_row_reported {
            self.wide_row_reported = true;
            log::warn!(
                "row {} of sheet '{}' has {} fields; spreadsheet applications show at most {} columns",
                row,
                self.worksheets.last().map(String::as_str).unwrap_or_default(),
                values.len(),
                MAX_COLUMNS
            );
        }

        self.current_row = row;

        let mut row_digits = itoa::Buffer::new();
        let row_str = row_digits.format(row).as_bytes();

        self.xml_buffer.clear();
        self.xml_buffer.extend_from_slice(b"<row r=\"");
        self.xml_buffer.extend_from_slice(row_str);
        self.xml_buffer.extend_from_slice(b"\">");

        for (col_idx, value) in values.iter().enumerate() {
            let value = value.as_ref();

            self.xml_buffer.extend_from_slice(b"<c r=\"");
            write_column_label(col_idx, &mut self.xml_buffer);
            self.xml_buffer.extend_from_slice(row_str);

            if value.is_empty() {
                self.xml_buffer.extend_from_slice(b"\"/>");
            } else if needs_space_preserve(value) {
                self.xml_buffer
                    .extend_from_slice(b"\" t=\"inlineStr\"><is><t xml:space=\"preserve\">");
                escape_into(&mut self.xml_buffer, value);
                self.xml_buffer.extend_from_slice(b"</t></is></c>");
            } else {
                self.xml_buffer
                    .extend_from_slice(b"\" t=\"inlineStr\"><is><t>");
                escape_into(&mut self.xml_buffer, value);
                self.xml_buffer.extend_from_slice(b"</t></is></c>");
            }
        }

        self.xml_buffer.extend_from_slice(b"</row>");

        // Stream to compressor immediately
        self.zip.write_data(&self.xml_buffer).map_err(zip_error)?;
        Ok(())
    }

    /// Close the current worksheet's XML; a no-op between worksheets
    pub fn finish_current_worksheet(&mut self) -> Result<()> {
        if self.in_worksheet {
            self.zip
                .write_data(b"</sheetData></worksheet>")
                .map_err(zip_error)?;
            self.in_worksheet = false;
            log::debug!(
                "finished worksheet '{}' ({} rows)",
                self.worksheets.last().map(String::as_str).unwrap_or_default(),
                self.current_row
            );
        }
        Ok(())
    }

    /// Close the workbook, write the package parts and return the sink
    ///
    /// A workbook with no worksheets gets an empty `Sheet1`, since a workbook
    /// without sheets cannot be opened.
    pub fn close(mut self) -> Result<W> {
        if self.worksheets.is_empty() {
            self.add_worksheet(naming::PRIMARY_SHEET)?;
        }
        self.finish_current_worksheet()?;

        self.write_content_types()?;
        self.write_root_rels()?;
        self.write_workbook_xml()?;
        self.write_workbook_rels()?;
        self.write_styles()?;
        self.write_app_props()?;
        self.write_core_props()?;

        self.zip.finish().map_err(zip_error)
    }

    fn write_content_types(&mut self) -> Result<()> {
        self.zip
            .start_entry("[Content_Types].xml")
            .map_err(zip_error)?;
        let sheet_count = self.worksheets.len();
        let mut xml = XmlWriter::new(EntryWriter::new(&mut self.zip));

        xml.write_str(XML_DECLARATION)?;
        xml.start_element("Types")?;
        xml.attribute(
            "xmlns",
            "http://schemas.openxmlformats.org/package/2006/content-types",
        )?;
        xml.close_start_tag()?;
        xml.write_str("<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>")?;
        xml.write_str("<Default Extension=\"xml\" ContentType=\"application/xml\"/>")?;
        xml.write_str("<Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>")?;
        for sheet_id in 1..=sheet_count {
            xml.start_element("Override")?;
            xml.attribute("PartName", &format!("/xl/worksheets/sheet{}.xml", sheet_id))?;
            xml.attribute(
                "ContentType",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml",
            )?;
            xml.close_empty_tag()?;
        }
        xml.write_str("<Override PartName=\"/xl/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml\"/>")?;
        xml.write_str("<Override PartName=\"/docProps/core.xml\" ContentType=\"application/vnd.openxmlformats-package.core-properties+xml\"/>")?;
        xml.write_str("<Override PartName=\"/docProps/app.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.extended-properties+xml\"/>")?;
        xml.end_element("Types")?;
        xml.flush()
    }

    fn write_root_rels(&mut self) -> Result<()> {
        self.zip.start_entry("_rels/.rels").map_err(zip_error)?;
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>
</Relationships>"#;
        self.zip.write_data(xml.as_bytes()).map_err(zip_error)
    }

    fn write_workbook_xml(&mut self) -> Result<()> {
        self.zip.start_entry("xl/workbook.xml").map_err(zip_error)?;
        let mut xml = XmlWriter::new(EntryWriter::new(&mut self.zip));

        xml.write_str(XML_DECLARATION)?;
        xml.start_element("workbook")?;
        xml.attribute("xmlns", SPREADSHEET_NS)?;
        xml.attribute("xmlns:r", RELATIONSHIP_NS)?;
        xml.close_start_tag()?;

        xml.start_element("sheets")?;
        xml.close_start_tag()?;
        for (i, name) in self.worksheets.iter().enumerate() {
            let sheet_id = (i + 1) as u64;
            xml.start_element("sheet")?;
            xml.attribute("name", name)?;
            xml.attribute_int("sheetId", sheet_id)?;
            xml.attribute("r:id", &format!("rId{}", sheet_id))?;
            xml.close_empty_tag()?;
        }
        xml.end_element("sheets")?;

        xml.end_element("workbook")?;
        xml.flush()
    }

    fn write_workbook_rels(&mut self) -> Result<()> {
        self.zip
            .start_entry("xl/_rels/workbook.xml.rels")
            .map_err(zip_error)?;
        let sheet_count = self.worksheets.len();
        let mut xml = XmlWriter::new(EntryWriter::new(&mut self.zip));

        xml.write_str(XML_DECLARATION)?;
        xml.start_element("Relationships")?;
        xml.attribute("xmlns", PACKAGE_RELATIONSHIP_NS)?;
        xml.close_start_tag()?;

        for rid in 1..=sheet_count {
            xml.start_element("Relationship")?;
            xml.attribute("Id", &format!("rId{}", rid))?;
            xml.attribute(
                "Type",
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet",
            )?;
            xml.attribute("Target", &format!("worksheets/sheet{}.xml", rid))?;
            xml.close_empty_tag()?;
        }

        xml.start_element("Relationship")?;
        xml.attribute("Id", &format!("rId{}", sheet_count + 1))?;
        xml.attribute(
            "Type",
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles",
        )?;
        xml.attribute("Target", "styles.xml")?;
        xml.close_empty_tag()?;

        xml.end_element("Relationships")?;
        xml.flush()
    }

    fn write_styles(&mut self) -> Result<()> {
        self.zip.start_entry("xl/styles.xml").map_err(zip_error)?;
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
<cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>
</styleSheet>"#;
        self.zip.write_data(xml.as_bytes()).map_err(zip_error)
    }

    fn write_app_props(&mut self) -> Result<()> {
        self.zip.start_entry("docProps/app.xml").map_err(zip_error)?;
        let xml = concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties">
<Application>sheetbridge "#,
            env!("CARGO_PKG_VERSION"),
            r#"</Application>
<DocSecurity>0</DocSecurity>
<ScaleCrop>false</ScaleCrop>
<LinksUpToDate>false</LinksUpToDate>
<SharedDoc>false</SharedDoc>
<HyperlinksChanged>false</HyperlinksChanged>
</Properties>"#
        );
        self.zip.write_data(xml.as_bytes()).map_err(zip_error)
    }

    fn write_core_props(&mut self) -> Result<()> {
        self.zip.start_entry("docProps/core.xml").map_err(zip_error)?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
<dc:creator>sheetbridge</dc:creator>
<dcterms:created xsi:type="dcterms:W3CDTF">{now}</dcterms:created>
<dcterms:modified xsi:type="dcterms:W3CDTF">{now}</dcterms:modified>
</cp:coreProperties>"#
        );
        self.zip.write_data(xml.as_bytes()).map_err(zip_error)
    }
}

// Leading/trailing whitespace is collapsed by XML consumers unless marked
fn needs_space_preserve(value: &str) -> bool {
    value.starts_with(|c: char| c.is_ascii_whitespace())
        || value.ends_with(|c: char| c.is_ascii_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_write_rows_and_close() -> Result<()> {
        let mut workbook = StreamingWorkbook::from_writer(Cursor::new(Vec::new()))?;
        workbook.add_worksheet("Sheet1")?;
        workbook.write_row(&["Name", "Age"])?;
        workbook.write_row(&["Alice", "30"])?;
        assert_eq!(workbook.current_row(), 2);

        let bytes = workbook.close()?.into_inner();
        // ZIP local file header signature
        assert_eq!(&bytes[..4], b"PK\x03\x04");
        Ok(())
    }

    #[test]
    fn test_write_without_sheet_fails() -> Result<()> {
        let mut workbook = StreamingWorkbook::from_writer(Cursor::new(Vec::new()))?;
        assert!(matches!(
            workbook.write_row(&["x"]),
            Err(ConvertError::Write(_))
        ));
        Ok(())
    }

    #[test]
    fn test_rows_must_ascend() -> Result<()> {
        let mut workbook = StreamingWorkbook::from_writer(Cursor::new(Vec::new()))?;
        workbook.add_worksheet("Sheet1")?;
        workbook.write_row_at(3, &["c"])?;
        assert!(workbook.write_row_at(3, &["again"]).is_err());
        assert!(workbook.write_row_at(2, &["back"]).is_err());
        workbook.write_row_at(4, &["d"])?;
        Ok(())
    }

    #[test]
    fn test_new_sheet_resets_rows() -> Result<()> {
        let mut workbook = StreamingWorkbook::from_writer(Cursor::new(Vec::new()))?;
        workbook.add_worksheet("Sheet1")?;
        workbook.write_row(&["a"])?;
        workbook.add_worksheet("Sheet2")?;
        assert_eq!(workbook.current_row(), 0);
        workbook.write_row(&["b"])?;
        assert_eq!(workbook.sheet_names(), &["Sheet1", "Sheet2"]);
        Ok(())
    }

    #[test]
    fn test_duplicate_and_invalid_sheet_names() -> Result<()> {
        let mut workbook = StreamingWorkbook::from_writer(Cursor::new(Vec::new()))?;
        workbook.add_worksheet("Data")?;
        assert!(workbook.add_worksheet("data").is_err());
        assert!(workbook.add_worksheet("a/b").is_err());
        assert!(workbook.add_worksheet("").is_err());
        Ok(())
    }

    #[test]
    fn test_space_preserve_detection() {
        assert!(needs_space_preserve(" lead"));
        assert!(needs_space_preserve("trail\n"));
        assert!(!needs_space_preserve("in side"));
    }
}
