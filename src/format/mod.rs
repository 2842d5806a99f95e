//! Annotation file reading and writing.
//!
//! Files are parsed from any [`std::io::Read`] in fixed-size chunks and
//! written to any [`std::io::Write`] through a line buffer. Parse errors are
//! returned as [`FormatError`] values carrying a stable code and the line
//! they refer to; the annotation buffer is never touched by a failed parse.
//!
//! ```rust,ignore
//! let parsed = GenericAnnotationFileParser::new(&labels).parse(file)?;
//! annotations.load_annotations(&parsed.selections);
//! ```

mod error;
mod generic;
mod header;
mod reader;
mod traits;
mod utf8v1;
mod writer;

#[cfg(test)]
mod tests;

pub use error::FormatError;
pub use generic::GenericAnnotationFileParser;
pub use header::{FileInformation, Format, Version, format_file_header};
pub use reader::{BufferedLineReader, ChunkedLineReader};
pub use traits::{AnnotationFileParser, AnnotationFileSerializer, ParsedAnnotationFile, ParserResult};
pub use utf8v1::{ParserUtf8v1, SerializerUtf8v1};
pub use writer::BufferedWriter;
