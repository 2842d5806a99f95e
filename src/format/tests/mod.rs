//! Tests for annotation file parsing and serialization.

mod roundtrip_tests;

use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use crate::format::BufferedLineReader;
use crate::model::{Color, Label, LabelRef};

/// Labels with class codes `0..count`.
pub(crate) fn create_labels(count: u32) -> Vec<LabelRef> {
    (0..count)
        .map(|i| Rc::new(Label::new(i + 1, i, &format!("label{}", i), Color::from_number(i.wrapping_mul(0x112233))).unwrap()))
        .collect()
}

/// Serves lines in predefined chunks and counts how often it had to refill.
pub(crate) struct TestLineReader {
    chunks: VecDeque<Vec<String>>,
    buffered: VecDeque<String>,
    pub fills: usize,
}

impl TestLineReader {
    pub fn new(chunks: &[&[&str]]) -> Self {
        Self {
            chunks: chunks
                .iter()
                .map(|chunk| chunk.iter().map(|line| line.to_string()).collect())
                .collect(),
            buffered: VecDeque::new(),
            fills: 0,
        }
    }
}

impl BufferedLineReader for TestLineReader {
    fn has_buffered_line(&self) -> bool {
        !self.buffered.is_empty()
    }

    fn next_buffered_line(&mut self) -> Option<String> {
        self.buffered.pop_front()
    }

    fn fill(&mut self) -> io::Result<bool> {
        match self.chunks.pop_front() {
            Some(chunk) => {
                self.fills += 1;
                self.buffered.extend(chunk);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
