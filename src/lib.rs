//! anno3d - 3D Annotation Engine
//!
//! Label the faces of a triangle mesh or the points of a point cloud with
//! screen space and world space selection tools, with grouped undo/redo and
//! a line based annotation file format.
//!
//! The pieces, bottom up:
//!
//! - [`model`]: labels, colors and labeled selections
//! - [`annotation`]: the label set and the per-element class code buffer
//! - [`undo`]: gesture grouped undo/redo over buffer writes
//! - [`geometry`] and [`tools`]: spatial indexing and the selection tools
//! - [`format`]: reading and writing annotation files
//! - [`session`]: all of the above wired together for one model
//!
//! The geometry kernel lives in the `anno3d_spatial` crate and is re-exported
//! as [`spatial`].

pub mod annotation;
pub mod config;
pub mod constants;
pub mod format;
pub mod geometry;
pub mod input;
pub mod model;
pub mod observer;
pub mod session;
pub mod tools;
pub mod undo;

pub use anno3d_spatial as spatial;

pub use annotation::{AnnotationError, AnnotationManager, LabelManager};
pub use config::{AnnotatorConfig, ConfigError};
pub use format::FormatError;
pub use session::{AbortHandle, AnnotationSession, SetupError, SetupRequest, SetupStage};
pub use undo::HybridUndoManager;
