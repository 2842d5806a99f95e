//! Brackets a pointer drag in one undo group.

use super::HybridUndoManager;
use crate::input::{MouseButtons, Pointer};

/// Opens an undo group when exactly the trigger buttons are pressed and
/// closes it once the pointer state changes away from them.
#[derive(Debug, Clone)]
pub struct PointerUndoHandler {
    trigger: MouseButtons,
    group_started: bool,
}

impl Default for PointerUndoHandler {
    fn default() -> Self {
        Self::new(MouseButtons::PRIMARY)
    }
}

impl PointerUndoHandler {
    pub fn new(trigger: MouseButtons) -> Self {
        Self {
            trigger,
            group_started: false,
        }
    }

    /// Call on every pointer update, before annotating for that update.
    pub fn on_update(&mut self, pointer: &Pointer, undo: &mut HybridUndoManager) {
        let held = pointer.buttons == self.trigger;
        if held && !self.group_started {
            self.group_started = true;
            undo.start_group();
        } else if !held && self.group_started {
            self.group_started = false;
            undo.end_group();
        }
    }

    pub fn is_group_started(&self) -> bool {
        self.group_started
    }
}
