//! Undo/redo for annotation edits.

mod hybrid;
mod pointer;
mod retention;

pub use hybrid::{HybridUndoManager, UndoRedoCount};
pub use pointer::PointerUndoHandler;
pub use retention::{RetentionPolicy, UndoConfig, UndoGroup, human_readable_size, memory_estimate};
