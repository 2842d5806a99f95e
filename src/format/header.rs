//! File header: the `format` and `version` lines.

use std::fmt;

use super::FormatError;
use super::reader::BufferedLineReader;

/// Encoding of an annotation file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Utf8,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Format::Utf8 => "UTF8",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layout version of an annotation file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    One,
}

impl Version {
    pub fn as_str(self) -> &'static str {
        match self {
            Version::One => "1.0",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two header lines, without a trailing newline.
pub fn format_file_header(format: Format, version: Version) -> String {
    format!("format {}\nversion {}", format, version)
}

/// Format and version as written in a file header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileInformation {
    pub format: String,
    pub version: String,
}

impl FileInformation {
    /// Read the first two lines. Missing or malformed lines yield empty fields.
    pub fn read(reader: &mut dyn BufferedLineReader) -> Result<Self, FormatError> {
        let format_line = reader.next_line()?.unwrap_or_default();
        let version_line = reader.next_line()?.unwrap_or_default();
        Ok(Self {
            format: field(&format_line, "format "),
            version: field(&version_line, "version "),
        })
    }

    /// The known format and version this header names, if any.
    pub fn resolve(&self) -> Option<(Format, Version)> {
        match (self.format.as_str(), self.version.as_str()) {
            ("UTF8", "1.0") => Some((Format::Utf8, Version::One)),
            _ => None,
        }
    }

    pub fn unsupported(&self) -> FormatError {
        FormatError::unsupported(self.format.clone(), self.version.clone())
    }
}

fn field(line: &str, keyword: &str) -> String {
    line.strip_prefix(keyword).unwrap_or_default().to_string()
}
