//! Spatial indexing and screen-space geometry for 3D annotation tools.
//!
//! - [`Bvh`] with the [`SpatialIndex`]/[`ShapecastVisitor`] traversal interface
//! - [`BvhBuilderThread`] for building trees off the main thread
//! - [`Camera`] projection, ray construction and world-size helpers
//! - [`planar`] convex hull and ray-crossing tests used by 2D selection

mod aabb;
mod builder;
mod bvh;
mod camera;
mod error;
pub mod planar;
mod raycast;
mod shapes;

pub use aabb::Aabb;
pub use builder::BvhBuilderThread;
pub use bvh::{
    BoundsIntersection, Bvh, BvhGeometry, BvhOptions, DEFAULT_MAX_LEAF_SIZE, FnVisitor, ShapecastVisitor,
    SpatialIndex,
};
pub use camera::{Camera, OrthographicCamera, PerspectiveCamera, Viewport};
pub use error::SpatialError;
pub use raycast::{raycast_closest_point, raycast_first};
pub use shapes::{Ray, RayHit, Sphere, Triangle};

pub use glam;
