//! Parser selection by file header.

use std::io::Read;

use super::FormatError;
use super::header::{FileInformation, Format, Version};
use super::reader::{BufferedLineReader, ChunkedLineReader};
use super::traits::{AnnotationFileParser, ParserResult};
use super::utf8v1::ParserUtf8v1;
use crate::constants::DEFAULT_READ_CHUNK_SIZE;
use crate::model::LabelRef;

/// Reads the header of a file and hands the rest to the matching parser.
pub struct GenericAnnotationFileParser {
    labels: Vec<LabelRef>,
    chunk_size: usize,
}

impl GenericAnnotationFileParser {
    pub fn new(labels: &[LabelRef]) -> Self {
        Self {
            labels: labels.to_vec(),
            chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Parse a whole file from a byte stream.
    pub fn parse<R: Read>(&self, input: R) -> ParserResult {
        self.parse_with_yield(input, &mut || {})
    }

    /// Like [`parse`](Self::parse), calling `yield_now` between chunks.
    pub fn parse_with_yield<R: Read>(&self, input: R, yield_now: &mut dyn FnMut()) -> ParserResult {
        let mut reader = ChunkedLineReader::with_chunk_size(input, self.chunk_size);
        self.parse_lines(&mut reader, yield_now)
    }

    /// Parse a whole file from a line reader.
    pub fn parse_lines(&self, reader: &mut dyn BufferedLineReader, yield_now: &mut dyn FnMut()) -> ParserResult {
        let info = FileInformation::read(reader)?;
        let mut parser = self.parser_for(&info)?;
        parser.parse_content(reader, yield_now)
    }

    /// The parser for a header, or [`FormatError::Unsupported`].
    pub fn parser_for(&self, info: &FileInformation) -> Result<Box<dyn AnnotationFileParser>, FormatError> {
        match info.resolve() {
            Some((Format::Utf8, Version::One)) => Ok(Box::new(ParserUtf8v1::new(&self.labels))),
            None => {
                log::warn!(
                    "No parser for format '{}' version '{}'",
                    info.format,
                    info.version
                );
                Err(info.unsupported())
            }
        }
    }
}
