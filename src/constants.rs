//! Global constants for the annotation engine

use crate::model::ClassCode;

// ============================================================================
// Class codes
// ============================================================================

/// Number of class codes at the top of the u16 range kept for internal use
pub const RESERVED_CLASS_CODE_COUNT: u16 = 10;

/// Smallest class code a user label may use
pub const MIN_CLASS_CODE: ClassCode = 0;

/// Largest class code a user label may use
pub const MAX_CLASS_CODE: ClassCode = u16::MAX - RESERVED_CLASS_CODE_COUNT;

/// Class code of the neutral (eraser) label, also the buffer default
pub const NEUTRAL_CLASS_CODE: ClassCode = u16::MAX;

/// Scratch buffer marker for "no value captured yet" in an undo group
pub const NOT_CAPTURED_CLASS_CODE: ClassCode = NEUTRAL_CLASS_CODE - 1;

// ============================================================================
// Undo
// ============================================================================

/// Estimated memory cost of one recorded index in an undo group
pub const BYTES_PER_RECORDED_INDEX: usize = 10;

/// Default group cap when the static retention policy is active
pub const DEFAULT_MAX_UNDOS: usize = 10;

/// Default memory budget when the memory retention policy is active (100 MiB)
pub const DEFAULT_MAX_UNDO_MEMORY: usize = 100 * 1024 * 1024;

// ============================================================================
// Tools
// ============================================================================

/// Default sphere brush size, as a fraction of the visible height
pub const DEFAULT_BRUSH_SIZE: f32 = 0.01;

/// Largest sphere brush size
pub const MAX_BRUSH_SIZE: f32 = 3.0;

/// Default spotlight size for point clouds
pub const DEFAULT_SPOTLIGHT_SIZE: f32 = 0.1;

/// Largest spotlight size
pub const MAX_SPOTLIGHT_SIZE: f32 = 2.0;

/// World distance within which a ray picks a point
pub const DEFAULT_RAYCAST_THRESHOLD: f32 = 0.005;

/// Pixel distance the pointer must travel before the lasso records a new point
pub const LASSO_MIN_POINTER_TRAVEL: f32 = 3.0;

/// Lasso points continuing the previous direction closer than this (cosine) replace the last point
pub const LASSO_STRAIGHT_LINE_COSINE: f32 = 0.99;

/// Minimum number of points a polygon needs to be concluded
pub const MIN_POLYGON_POINTS: usize = 3;

// ============================================================================
// File IO
// ============================================================================

/// Bytes read from the source per parser chunk (64 KiB)
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;

/// Bytes collected before the serializer writes through (64 KiB)
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 64 * 1024;
