//! Label set and annotation buffer management.
//!
//! [`LabelManager`] owns the label set and the active label,
//! [`AnnotationManager`] owns the per-element class code buffer and
//! broadcasts every write to its observers before the buffer changes.

mod annotation_manager;
mod error;
mod label_manager;

pub use annotation_manager::{AnnotationDiff, AnnotationManager};
pub use error::AnnotationError;
pub use label_manager::LabelManager;
