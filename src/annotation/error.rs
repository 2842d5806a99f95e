//! Error types for label and annotation management.

use thiserror::Error;

use crate::model::ClassCode;

/// Errors raised by the label set and the annotation buffer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnnotationError {
    /// A label set must contain at least one label
    #[error("Label set is empty")]
    EmptyLabelSet,

    /// The label is not a member of the current label set
    #[error("Label '{name}' not found in label set")]
    LabelNotFound {
        /// Name of the missing label
        name: String,
    },

    /// Two labels in one set share a class code
    #[error("Duplicate class code {0} in label set")]
    DuplicateClassCode(ClassCode),

    /// Class code outside the representable or allowed range
    #[error("Class code {0} is out of bounds")]
    ClassCodeOutOfBounds(u32),

    /// The annotation buffer holds a class code no known label maps to
    #[error("Unknown annotation class {0} found")]
    UnknownClass(ClassCode),

    /// A color value could not be parsed or is out of range
    #[error("Invalid color '{value}': {reason}")]
    InvalidColor {
        /// The offending input
        value: String,
        /// What is wrong with it
        reason: String,
    },

    /// A label set description could not be read
    #[error("Invalid label set: {0}")]
    InvalidLabelSet(String),

    /// A polygon was concluded with too few points
    #[error("Polygon needs at least {required} points, got {actual}")]
    NotEnoughPolygonPoints { required: usize, actual: usize },

    /// No tool with this name exists for the loaded geometry
    #[error("Tool '{0}' not available")]
    ToolNotFound(String),
}

impl AnnotationError {
    /// Create a label-not-found error for a label name.
    pub fn label_not_found(name: impl Into<String>) -> Self {
        Self::LabelNotFound { name: name.into() }
    }
}
