//! Labeled index selections.

use super::LabelRef;

/// A label together with the element indices it applies to.
#[derive(Debug, Clone)]
pub struct LabeledSelection {
    pub label: LabelRef,
    pub indices: Vec<u32>,
}

impl LabeledSelection {
    pub fn new(label: LabelRef, indices: Vec<u32>) -> Self {
        Self { label, indices }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
