//! Minimal-allocation XML writer

use crate::error::Result;
use std::io::Write;

/// Append `text` to `buffer` with XML escaping
///
/// Control characters that XML 1.0 forbids are dropped; tab, LF and CR are kept.
pub fn escape_into(buffer: &mut Vec<u8>, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => buffer.extend_from_slice(b"&amp;"),
            '<' => buffer.extend_from_slice(b"&lt;"),
            '>' => buffer.extend_from_slice(b"&gt;"),
            '"' => buffer.extend_from_slice(b"&quot;"),
            '\'' => buffer.extend_from_slice(b"&apos;"),
            c if (c as u32) < 0x20 && c != '\t' && c != '\n' && c != '\r' => continue,
            '\u{FFFE}' | '\u{FFFF}' => continue,
            c => {
                let mut buf = [0u8; 4];
                buffer.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
}

/// XML writer that batches output into an internal buffer
pub struct XmlWriter<W: Write> {
    writer: W,
    buffer: Vec<u8>,
    flush_threshold: usize,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_capacity(writer, 8192)
    }

    pub fn with_capacity(writer: W, capacity: usize) -> Self {
        XmlWriter {
            writer,
            buffer: Vec::with_capacity(capacity),
            flush_threshold: capacity / 2,
        }
    }

    #[inline]
    fn auto_flush(&mut self) -> Result<()> {
        if self.buffer.len() >= self.flush_threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Write raw bytes directly
    #[inline]
    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(data);
        self.auto_flush()
    }

    /// Write string data without escaping
    #[inline]
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        self.write_raw(s.as_bytes())
    }

    /// Write `<name` (attributes may follow)
    #[inline]
    pub fn start_element(&mut self, name: &str) -> Result<()> {
        self.write_raw(b"<")?;
        self.write_str(name)
    }

    /// Write `</name>`
    #[inline]
    pub fn end_element(&mut self, name: &str) -> Result<()> {
        self.write_raw(b"</")?;
        self.write_str(name)?;
        self.write_raw(b">")
    }

    /// Write ` name="value"` with the value escaped
    #[inline]
    pub fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.write_raw(b" ")?;
        self.write_str(name)?;
        self.write_raw(b"=\"")?;
        self.write_escaped(value)?;
        self.write_raw(b"\"")
    }

    /// Write ` name="123"`
    #[inline]
    pub fn attribute_int(&mut self, name: &str, value: u64) -> Result<()> {
        let mut digits = itoa::Buffer::new();
        self.write_raw(b" ")?;
        self.write_str(name)?;
        self.write_raw(b"=\"")?;
        self.write_str(digits.format(value))?;
        self.write_raw(b"\"")
    }

    /// Close start tag with `>`
    #[inline]
    pub fn close_start_tag(&mut self) -> Result<()> {
        self.write_raw(b">")
    }

    /// Close start tag with `/>`
    #[inline]
    pub fn close_empty_tag(&mut self) -> Result<()> {
        self.write_raw(b"/>")
    }

    /// Write text content with XML escaping
    #[inline]
    pub fn write_escaped(&mut self, text: &str) -> Result<()> {
        escape_into(&mut self.buffer, text);
        self.auto_flush()
    }

    /// Flush buffer to underlying writer
    pub fn flush(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_writer() {
        let mut output = Vec::new();
        let mut writer = XmlWriter::new(&mut output);

        writer.start_element("root").unwrap();
        writer.attribute("attr", "a&b").unwrap();
        writer.attribute_int("n", 42).unwrap();
        writer.close_start_tag().unwrap();
        writer.write_str("content").unwrap();
        writer.start_element("leaf").unwrap();
        writer.close_empty_tag().unwrap();
        writer.end_element("root").unwrap();
        writer.flush().unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "<root attr=\"a&amp;b\" n=\"42\">content<leaf/></root>"
        );
    }

    #[test]
    fn test_xml_escaping() {
        let mut buffer = Vec::new();
        escape_into(&mut buffer, "<test>&'\"</test>");
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "&lt;test&gt;&amp;&apos;&quot;&lt;/test&gt;"
        );
    }

    #[test]
    fn test_control_characters_dropped() {
        let mut buffer = Vec::new();
        escape_into(&mut buffer, "a\u{0}b\u{1b}c\td\ne");
        assert_eq!(String::from_utf8(buffer).unwrap(), "abc\td\ne");
    }

    #[test]
    fn test_small_capacity_flushes_everything() {
        let mut output = Vec::new();
        let mut writer = XmlWriter::with_capacity(&mut output, 4);
        writer.write_str("0123456789").unwrap();
        writer.write_escaped("héllo").unwrap();
        writer.flush().unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "0123456789héllo");
    }
}
