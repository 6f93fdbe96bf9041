//! Record Reader - turns one partner file into a lazy sequence of raw rows.
//!
//! The file is read and decoded in one go (encoding forced by the partner
//! config or detected), so the handle is released before the first row is
//! produced. Rows are then split lazily from the decoded buffer. A line whose
//! field count differs from the header is yielded as a [`StructuralSkip`]
//! instead of aborting the partner.

use csv::StringRecord;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::error::{ReaderError, ReaderResult};
use crate::registry::PartnerConfig;

/// One data line of a partner file, keyed by the header's column names.
#[derive(Debug, Clone)]
pub struct RawRow {
    line: u64,
    headers: Arc<[String]>,
    record: StringRecord,
}

impl RawRow {
    /// 1-based physical line number (the header is line 1).
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Raw value of a column, `None` when the header has no such column.
    ///
    /// With duplicate header names the first occurrence wins.
    pub fn get(&self, column: &str) -> Option<&str> {
        let idx = self.headers.iter().position(|h| h == column)?;
        self.record.get(idx)
    }

    /// Row as a JSON object in header order.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        for (header, value) in self.headers.iter().zip(self.record.iter()) {
            obj.entry(header.clone())
                .or_insert_with(|| Value::String(value.to_string()));
        }
        Value::Object(obj)
    }
}

/// A line dropped because it cannot be split into the header's columns.
///
/// `found` is 0 when the line has an unterminated quoted field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralSkip {
    pub line: u64,
    pub expected: usize,
    pub found: usize,
}

/// Item produced by [`PartnerRows`].
#[derive(Debug, Clone)]
pub enum RowEvent {
    Row(RawRow),
    Skipped(StructuralSkip),
}

/// Physical lines of a decoded buffer, numbered from 1.
///
/// Every record is confined to one line, so a stray quote can only ever
/// cost the line it appears on.
#[derive(Debug)]
struct Lines {
    content: String,
    pos: usize,
    line: u64,
}

impl Lines {
    fn new(content: String) -> Self {
        Self {
            content,
            pos: 0,
            line: 0,
        }
    }

    /// Next non-blank line with its number.
    fn next_line(&mut self) -> Option<(u64, &str)> {
        loop {
            if self.pos >= self.content.len() {
                return None;
            }
            let rest = &self.content[self.pos..];
            let (raw, advance) = match rest.find('\n') {
                Some(end) => (&rest[..end], end + 1),
                None => (rest, rest.len()),
            };
            let start = self.pos;
            self.pos += advance;
            self.line += 1;

            let text = raw.strip_suffix('\r').unwrap_or(raw);
            if !text.trim().is_empty() {
                let end = start + text.len();
                return Some((self.line, &self.content[start..end]));
            }
        }
    }
}

/// Lazy row iterator over one decoded partner file.
pub struct PartnerRows {
    headers: Arc<[String]>,
    lines: Lines,
    delimiter: u8,
    encoding: String,
}

impl PartnerRows {
    /// Header column names.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Encoding the file was decoded with.
    pub fn encoding(&self) -> &str {
        &self.encoding
    }
}

impl Iterator for PartnerRows {
    type Item = RowEvent;

    fn next(&mut self) -> Option<RowEvent> {
        let expected = self.headers.len();
        let (line, text) = self.lines.next_line()?;

        let record = match split_line(text, self.delimiter) {
            Some(record) => record,
            None => {
                return Some(RowEvent::Skipped(StructuralSkip {
                    line,
                    expected,
                    found: 0,
                }))
            }
        };

        if record.len() != expected {
            return Some(RowEvent::Skipped(StructuralSkip {
                line,
                expected,
                found: record.len(),
            }));
        }

        Some(RowEvent::Row(RawRow {
            line,
            headers: Arc::clone(&self.headers),
            record,
        }))
    }
}

/// Split one physical line into fields.
///
/// `None` when a quoted field is not closed before the end of the line.
fn split_line(line: &str, delimiter: u8) -> Option<StringRecord> {
    if has_open_quote(line, delimiter) {
        return None;
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    let mut record = StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => Some(record),
        _ => None,
    }
}

/// True if a field opens with `"` and the line ends before its closing quote.
fn has_open_quote(line: &str, delimiter: u8) -> bool {
    let mut bytes = line.bytes().peekable();
    let mut field_start = true;

    while let Some(b) = bytes.next() {
        if field_start && b == b'"' {
            loop {
                match bytes.next() {
                    None => return true,
                    Some(b'"') if bytes.peek() == Some(&b'"') => {
                        bytes.next();
                    }
                    Some(b'"') => break,
                    Some(_) => {}
                }
            }
            field_start = false;
        } else {
            field_start = b == delimiter;
        }
    }

    false
}

/// Open a partner file and prepare its rows.
///
/// Fails with [`ReaderError::SourceUnavailable`] when the file cannot be read
/// or has no header line. Individual bad lines never fail here.
pub fn read(config: &PartnerConfig) -> ReaderResult<PartnerRows> {
    read_path(&config.file_path, config.delimiter, config.encoding.as_deref())
}

/// Same as [`read`] without a partner config.
pub fn read_path(
    path: &Path,
    delimiter: char,
    encoding: Option<&str>,
) -> ReaderResult<PartnerRows> {
    let bytes = fs::read(path).map_err(|e| ReaderError::unavailable(path, e))?;

    let encoding = encoding
        .map(str::to_string)
        .unwrap_or_else(|| detect_encoding(&bytes));
    let content = decode_content(&bytes, &encoding);

    rows_from_string(content, delimiter, encoding)
        .map_err(|reason| ReaderError::unavailable(path, reason))
}

/// Prepare rows from already-decoded text.
pub fn read_str(content: &str, delimiter: char) -> ReaderResult<PartnerRows> {
    rows_from_string(content.to_string(), delimiter, "utf-8".to_string())
        .map_err(|reason| ReaderError::unavailable("<memory>", reason))
}

fn rows_from_string(
    content: String,
    delimiter: char,
    encoding: String,
) -> Result<PartnerRows, String> {
    let delimiter = u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| format!("unusable delimiter {:?}", delimiter))?;

    let content = match content.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => content,
    };

    let mut lines = Lines::new(content);
    let headers: Arc<[String]> = {
        let (_, header_line) = lines.next_line().ok_or("file is empty")?;
        let record = split_line(header_line, delimiter)
            .ok_or_else(|| "cannot read header: unterminated quote".to_string())?;
        record.iter().map(|h| h.trim().to_string()).collect()
    };

    Ok(PartnerRows {
        headers,
        lines,
        delimiter,
        encoding,
    })
}

/// Detect the encoding of raw bytes using chardet
///
/// Valid UTF-8 is always taken as UTF-8; chardet only guesses for the rest.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes using an encoding label; unknown labels fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let label = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => return String::from_utf8_lossy(bytes).into_owned(),
        "latin-1" => "iso-8859-1".to_string(),
        other => other.to_string(),
    };
    match encoding_rs::Encoding::for_label(label.as_bytes()) {
        Some(enc) => enc.decode(bytes).0.into_owned(),
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}
