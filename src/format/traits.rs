//! Parser and serializer interfaces for annotation files.

use std::io::Write;

use super::FormatError;
use super::header::{FileInformation, Format, Version};
use super::reader::BufferedLineReader;
use crate::model::{ClassCode, LabeledSelection};

/// Content of a parsed annotation file.
#[derive(Debug, Clone, Default)]
pub struct ParsedAnnotationFile {
    /// Element count declared by the file
    pub count: usize,
    /// One selection per label block, in file order
    pub selections: Vec<LabeledSelection>,
}

pub type ParserResult = Result<ParsedAnnotationFile, FormatError>;

/// A parser for one format and version of annotation files.
pub trait AnnotationFileParser {
    /// The header this parser accepts.
    fn file_type(&self) -> (Format, Version);

    /// Parse the lines following the two header lines.
    ///
    /// `yield_now` is called whenever the parser is about to pull another
    /// chunk from the stream.
    fn parse_content(&mut self, reader: &mut dyn BufferedLineReader, yield_now: &mut dyn FnMut()) -> ParserResult;

    /// Parse a whole file, header included.
    fn parse(&mut self, reader: &mut dyn BufferedLineReader, yield_now: &mut dyn FnMut()) -> ParserResult {
        let info = FileInformation::read(reader)?;
        if info.resolve() != Some(self.file_type()) {
            return Err(info.unsupported());
        }
        self.parse_content(reader, yield_now)
    }
}

/// A serializer writing annotation buffers in one format and version.
pub trait AnnotationFileSerializer {
    /// Write `data`, the class code per element, to `out`.
    fn serialize(&self, data: &[ClassCode], out: &mut dyn Write) -> Result<(), FormatError>;
}
