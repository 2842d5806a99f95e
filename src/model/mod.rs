//! Data models for the annotation engine.

mod label;
mod selection;

pub use label::{
    ClassCode, Color, DEFAULT_ALPHA_VALUE, Label, LabelDescriptor, LabelRef, labels_from_json, neutral_label,
};
pub use selection::LabeledSelection;
