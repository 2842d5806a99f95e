//! Undo groups and history retention settings.

use serde::{Deserialize, Serialize};

use crate::constants::{BYTES_PER_RECORDED_INDEX, DEFAULT_MAX_UNDO_MEMORY, DEFAULT_MAX_UNDOS};
use crate::model::LabeledSelection;

/// One undoable step: the pre-edit label of every element a gesture touched,
/// grouped by that label.
#[derive(Debug, Clone, Default)]
pub struct UndoGroup {
    pub selections: Vec<LabeledSelection>,
}

impl UndoGroup {
    pub fn index_count(&self) -> usize {
        self.selections.iter().map(LabeledSelection::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.index_count() == 0
    }

    /// Estimated memory footprint in bytes.
    pub fn memory_estimate(&self) -> usize {
        self.index_count() * BYTES_PER_RECORDED_INDEX
    }
}

/// Summed memory estimate of a run of groups.
pub fn memory_estimate<'a>(groups: impl IntoIterator<Item = &'a UndoGroup>) -> usize {
    groups.into_iter().map(UndoGroup::memory_estimate).sum()
}

/// Which limit bounds the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    /// At most `max_undos` groups per stack
    Static,
    /// Estimated size of the undo stack stays within `max_undo_memory` bytes
    #[default]
    Memory,
}

/// Configuration for the undo history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoConfig {
    pub policy: RetentionPolicy,
    /// Group cap used by [`RetentionPolicy::Static`]
    pub max_undos: usize,
    /// Byte budget used by [`RetentionPolicy::Memory`]
    pub max_undo_memory: usize,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            policy: RetentionPolicy::default(),
            max_undos: DEFAULT_MAX_UNDOS,
            max_undo_memory: DEFAULT_MAX_UNDO_MEMORY,
        }
    }
}

impl UndoConfig {
    pub fn with_static_limit(max_undos: usize) -> Self {
        Self {
            policy: RetentionPolicy::Static,
            max_undos,
            ..Self::default()
        }
    }

    pub fn with_memory_limit(max_undo_memory: usize) -> Self {
        Self {
            policy: RetentionPolicy::Memory,
            max_undo_memory,
            ..Self::default()
        }
    }
}

/// Format a byte count with a binary unit, e.g. `1.50 KiB`.
pub fn human_readable_size(bytes: usize) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", size, UNITS[unit])
    }
}
