//! Screen space circle brush for point clouds.

use anno3d_spatial::{Aabb, BoundsIntersection, Ray, ShapecastVisitor, SpatialIndex, Triangle};

use super::{Tool, ToolContext, ToolKind};
use crate::constants::{DEFAULT_SPOTLIGHT_SIZE, MAX_SPOTLIGHT_SIZE};
use crate::input::{MouseButtons, Pointer};
use crate::undo::PointerUndoHandler;

/// Annotates every point within a cone along the pointer ray while the
/// primary button is held.
///
/// The cone's radius at distance `d` is `size * height_at(1) * d` for
/// perspective cameras, which keeps the on-screen circle constant. For
/// orthographic cameras it is the cylinder `size * height_at(1)`.
#[derive(Debug, Clone)]
pub struct SpotlightBrush {
    size: f32,
    undo_handler: PointerUndoHandler,
}

impl SpotlightBrush {
    pub fn new(size: f32) -> Self {
        Self {
            size: size.clamp(0.0, MAX_SPOTLIGHT_SIZE),
            undo_handler: PointerUndoHandler::default(),
        }
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    /// Set the spotlight size, clamped to `[0, MAX_SPOTLIGHT_SIZE]`.
    pub fn set_size(&mut self, size: f32) {
        self.size = size.clamp(0.0, MAX_SPOTLIGHT_SIZE);
    }

    /// BVH primitives within the cone around `ray`.
    pub fn select(&self, index: &dyn SpatialIndex, ray: Ray, camera_factor: f32, perspective: bool) -> Vec<u32> {
        let mut visitor = ConeVisitor {
            ray,
            radius_scale: self.size * camera_factor,
            perspective,
            selected: Vec::new(),
        };
        index.shapecast(&mut visitor);
        visitor.selected
    }
}

impl Default for SpotlightBrush {
    fn default() -> Self {
        Self::new(DEFAULT_SPOTLIGHT_SIZE)
    }
}

impl Tool for SpotlightBrush {
    fn kind(&self) -> ToolKind {
        ToolKind::Spotlight
    }

    fn on_unselected(&mut self, ctx: &mut ToolContext<'_>) {
        self.undo_handler.on_update(&Pointer::default(), ctx.undo);
    }

    fn update(&mut self, pointer: &Pointer, ctx: &mut ToolContext<'_>) {
        self.undo_handler.on_update(pointer, ctx.undo);
        if pointer.buttons != MouseButtons::PRIMARY {
            return;
        }
        let primitives = self.select(
            ctx.geometry.spatial_index(),
            ctx.pointer_ray(pointer),
            ctx.camera.height_at(1.0),
            ctx.camera.is_perspective(),
        );
        log::trace!("Spotlight covers {} points", primitives.len());
        ctx.annotate_primitives(&primitives);
    }
}

struct ConeVisitor {
    ray: Ray,
    /// Cone radius per unit of distance along the ray (perspective) or the
    /// fixed radius (orthographic)
    radius_scale: f32,
    perspective: bool,
    selected: Vec<u32>,
}

impl ConeVisitor {
    fn radius_at(&self, distance_along_ray: f32) -> f32 {
        if self.perspective {
            self.radius_scale * distance_along_ray
        } else {
            self.radius_scale
        }
    }
}

impl ShapecastVisitor for ConeVisitor {
    fn intersects_bounds(&mut self, bounds: &Aabb, _is_leaf: bool, _depth: usize) -> BoundsIntersection {
        let center = bounds.center();
        let nearest = self.ray.closest_point_to_point(center);
        let max_distance = self.radius_at(nearest.distance(self.ray.origin));
        let box_radius = bounds.bounding_radius();
        let center_to_ray = nearest.distance(center);
        BoundsIntersection::from_level(
            u8::from(max_distance > center_to_ray - box_radius) + u8::from(max_distance > center_to_ray + box_radius),
        )
    }

    fn intersects_primitive(&mut self, triangle: &Triangle, index: u32, contained: bool, _depth: usize) -> bool {
        let point = triangle.a;
        let inside = contained || {
            let nearest = self.ray.closest_point_to_point(point);
            let max_distance = self.radius_at(nearest.distance(self.ray.origin));
            nearest.distance_squared(point) < max_distance * max_distance
        };
        if inside {
            self.selected.push(index);
        }
        false
    }
}
