//! The `UTF8` / `1.0` annotation file format.
//!
//! ```text
//! format UTF8
//! version 1.0
//! count <element count>
//! label <class code> <index count>
//! <index>
//! ...
//! ```
//!
//! Every label of the set gets exactly one block, in label set order, even
//! when it has no indices. Indices are written in increasing order. Neutral
//! elements are not written.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::rc::Rc;

use web_time::Instant;

use super::FormatError;
use super::header::{Format, Version, format_file_header};
use super::reader::BufferedLineReader;
use super::traits::{AnnotationFileParser, AnnotationFileSerializer, ParsedAnnotationFile, ParserResult};
use super::writer::BufferedWriter;
use crate::constants::{DEFAULT_WRITE_BUFFER_SIZE, NEUTRAL_CLASS_CODE};
use crate::model::{ClassCode, LabelRef, LabeledSelection};

// ============================================================================
// Parser
// ============================================================================

/// Parser for `UTF8` / `1.0` files against a fixed label set.
pub struct ParserUtf8v1 {
    labels: HashMap<ClassCode, LabelRef>,
}

struct LabelHeader {
    class_code: u32,
    index_count: usize,
}

impl ParserUtf8v1 {
    pub fn new(labels: &[LabelRef]) -> Self {
        Self {
            labels: labels
                .iter()
                .map(|label| (label.class_code(), Rc::clone(label)))
                .collect(),
        }
    }

    fn next_line(
        reader: &mut dyn BufferedLineReader,
        yield_now: &mut dyn FnMut(),
    ) -> Result<Option<String>, FormatError> {
        if !reader.has_buffered_line() {
            yield_now();
        }
        Ok(reader.next_line()?)
    }

    fn parse_count(line: Option<String>, line_number: usize) -> Result<usize, FormatError> {
        let line = line.ok_or_else(|| FormatError::parsing(line_number, "Unexpected end of file, expected the element count"))?;
        line.strip_prefix("count ")
            .and_then(|count| count.parse::<usize>().ok())
            .ok_or_else(|| FormatError::parsing(line_number, format!("Expected 'count <n>' but got: '{}'", line)))
    }

    fn parse_label_header(line: &str, line_number: usize) -> Result<LabelHeader, FormatError> {
        let mut parts = line.split(' ');
        if parts.next() != Some("label") {
            return Err(FormatError::parsing(
                line_number,
                format!("Expected a label header but got: '{}'", line),
            ));
        }
        let class_code = parts.next().and_then(|value| value.parse::<u32>().ok());
        let index_count = parts.next().and_then(|value| value.parse::<usize>().ok());
        match (class_code, index_count, parts.next()) {
            (Some(class_code), Some(index_count), None) => Ok(LabelHeader {
                class_code,
                index_count,
            }),
            _ => Err(FormatError::parsing(
                line_number,
                format!("Malformed label header: '{}'", line),
            )),
        }
    }
}

impl AnnotationFileParser for ParserUtf8v1 {
    fn file_type(&self) -> (Format, Version) {
        (Format::Utf8, Version::One)
    }

    fn parse_content(&mut self, reader: &mut dyn BufferedLineReader, yield_now: &mut dyn FnMut()) -> ParserResult {
        let start = Instant::now();

        let mut line_number = 3;
        let count = Self::parse_count(Self::next_line(reader, yield_now)?, line_number)?;

        let mut parsed: HashSet<ClassCode> = HashSet::new();
        let mut selections = Vec::new();
        while let Some(line) = Self::next_line(reader, yield_now)? {
            line_number += 1;
            let header = Self::parse_label_header(&line, line_number)?;

            let label = ClassCode::try_from(header.class_code)
                .ok()
                .and_then(|class_code| self.labels.get(&class_code))
                .ok_or(FormatError::UnknownLabel {
                    line: line_number,
                    class_code: header.class_code,
                })?;
            if !parsed.insert(label.class_code()) {
                return Err(FormatError::DuplicateLabel {
                    line: line_number,
                    class_code: label.class_code(),
                });
            }

            let mut indices = Vec::with_capacity(header.index_count.min(count));
            for remaining in (1..=header.index_count).rev() {
                let Some(line) = Self::next_line(reader, yield_now)? else {
                    return Err(FormatError::parsing(
                        line_number + 1,
                        format!(
                            "Unexpected end of file, expected {} more indices for class {}",
                            remaining,
                            label.class_code()
                        ),
                    ));
                };
                line_number += 1;
                let index = line
                    .parse::<u32>()
                    .map_err(|_| FormatError::parsing(line_number, format!("Expected an index but got: '{}'", line)))?;
                if index as usize >= count {
                    return Err(FormatError::parsing(
                        line_number,
                        format!("Index {} is out of range for {} elements", index, count),
                    ));
                }
                indices.push(index);
            }
            selections.push(LabeledSelection::new(Rc::clone(label), indices));
        }

        log::info!(
            "Parsed {} label blocks over {} elements in {:?}",
            selections.len(),
            count,
            start.elapsed()
        );
        Ok(ParsedAnnotationFile { count, selections })
    }
}

// ============================================================================
// Serializer
// ============================================================================

/// Serializer for `UTF8` / `1.0` files. Writes one block per label, in order.
pub struct SerializerUtf8v1 {
    labels: Vec<LabelRef>,
    buffer_size: usize,
}

impl SerializerUtf8v1 {
    pub fn new(labels: &[LabelRef]) -> Self {
        Self {
            labels: labels.to_vec(),
            buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
        }
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }
}

impl AnnotationFileSerializer for SerializerUtf8v1 {
    fn serialize(&self, data: &[ClassCode], out: &mut dyn Write) -> Result<(), FormatError> {
        let start = Instant::now();

        let mut buckets: HashMap<ClassCode, Vec<u32>> = self
            .labels
            .iter()
            .map(|label| (label.class_code(), Vec::new()))
            .collect();
        let mut unlisted = 0;
        for (index, class_code) in data.iter().enumerate() {
            match buckets.get_mut(class_code) {
                Some(indices) => indices.push(index as u32),
                None if *class_code == NEUTRAL_CLASS_CODE => {}
                None => unlisted += 1,
            }
        }
        if unlisted > 0 {
            log::warn!("{} elements carry a class code outside the label set and are not written", unlisted);
        }

        let mut writer = BufferedWriter::with_capacity(out, self.buffer_size);
        writer.write_line(&format_file_header(Format::Utf8, Version::One))?;
        writer.write_line(&format!("count {}", data.len()))?;
        for label in &self.labels {
            let indices = buckets
                .get(&label.class_code())
                .map(Vec::as_slice)
                .unwrap_or_default();
            writer.write_line(&format!("label {} {}", label.class_code(), indices.len()))?;
            for index in indices {
                writer.write_line(&index.to_string())?;
            }
        }
        writer.flush()?;
        let bytes = writer.bytes_written();
        writer.close()?;

        log::info!(
            "Serialized {} elements ({} bytes) in {:?}",
            data.len(),
            bytes,
            start.elapsed()
        );
        Ok(())
    }
}
