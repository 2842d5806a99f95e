//! Error types for annotation file parsing and serialization.

use thiserror::Error;

use crate::model::ClassCode;

/// Errors that can occur while reading or writing an annotation file.
///
/// Every variant except [`FormatError::Io`] points at the offending line.
#[derive(Error, Debug)]
pub enum FormatError {
    /// Format or version of the file is not supported
    #[error("Unsupported annotation file: format '{format}', version '{version}'")]
    Unsupported {
        /// Format found in the header
        format: String,
        /// Version found in the header
        version: String,
    },

    /// A label block references a class code missing from the label set
    #[error("Line {line}: there is no label with the class code {class_code}")]
    UnknownLabel {
        line: usize,
        /// The class code as written in the file
        class_code: u32,
    },

    /// A label block appears twice
    #[error("Line {line}: the label with the class code {class_code} was already parsed")]
    DuplicateLabel { line: usize, class_code: ClassCode },

    /// Malformed content
    #[error("Line {line}: {message}")]
    Parsing { line: usize, message: String },

    /// I/O error on the underlying stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FormatError {
    /// Create a parsing error for a line.
    pub fn parsing(line: usize, message: impl Into<String>) -> Self {
        Self::Parsing {
            line,
            message: message.into(),
        }
    }

    /// Create an unsupported error from the header values.
    pub fn unsupported(format: impl Into<String>, version: impl Into<String>) -> Self {
        Self::Unsupported {
            format: format.into(),
            version: version.into(),
        }
    }

    /// Stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unsupported { .. } => "UNSUPPORTED",
            Self::UnknownLabel { .. } => "UNKNOWN_LABEL",
            Self::DuplicateLabel { .. } => "DUPLICATE_LABEL",
            Self::Parsing { .. } => "PARSING_ERROR",
            Self::Io(_) => "IO",
        }
    }

    /// 1-based line the error refers to, if any.
    pub fn line_number(&self) -> Option<usize> {
        match self {
            Self::Unsupported { .. } => Some(1),
            Self::UnknownLabel { line, .. }
            | Self::DuplicateLabel { line, .. }
            | Self::Parsing { line, .. } => Some(*line),
            Self::Io(_) => None,
        }
    }
}
