//! World space sphere brush for meshes and point clouds.

use anno3d_spatial::glam::Vec3;
use anno3d_spatial::{
    Aabb, BoundsIntersection, ShapecastVisitor, SpatialIndex, Sphere, Triangle, raycast_closest_point, raycast_first,
};

use super::{Tool, ToolContext, ToolKind};
use crate::constants::{DEFAULT_BRUSH_SIZE, DEFAULT_RAYCAST_THRESHOLD, MAX_BRUSH_SIZE};
use crate::input::{MouseButtons, Pointer};
use crate::undo::PointerUndoHandler;

/// How the brush finds its position and tests primitives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BrushTarget {
    /// Placed on the first face hit, selects faces touching the sphere
    Mesh,
    /// Placed on the point closest to the pointer ray, selects points inside the sphere
    PointCloud { raycast_threshold: f32 },
}

impl BrushTarget {
    pub fn point_cloud() -> Self {
        Self::PointCloud {
            raycast_threshold: DEFAULT_RAYCAST_THRESHOLD,
        }
    }
}

/// Annotates everything within a sphere that sits where the pointer hits
/// the model, while the primary button is held.
///
/// The radius is `size` times the visible half height at the reference
/// distance, so the brush keeps its on-screen size across camera types.
#[derive(Debug, Clone)]
pub struct SphereBrush {
    target: BrushTarget,
    size: f32,
    center: Option<Vec3>,
    undo_handler: PointerUndoHandler,
}

impl SphereBrush {
    pub fn new(target: BrushTarget, size: f32) -> Self {
        Self {
            target,
            size: size.clamp(0.0, MAX_BRUSH_SIZE),
            center: None,
            undo_handler: PointerUndoHandler::default(),
        }
    }

    pub fn target(&self) -> BrushTarget {
        self.target
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    /// Set the brush size, clamped to `[0, MAX_BRUSH_SIZE]`.
    pub fn set_size(&mut self, size: f32) {
        self.size = size.clamp(0.0, MAX_BRUSH_SIZE);
    }

    /// Brush position, `None` while the pointer is off the model.
    pub fn center(&self) -> Option<Vec3> {
        self.center
    }

    pub fn is_visible(&self) -> bool {
        self.center.is_some()
    }

    /// World radius for the given context.
    pub fn radius(&self, ctx: &ToolContext<'_>) -> f32 {
        self.size * ctx.camera.height_at(ctx.reference_distance)
    }

    fn update_position(&mut self, pointer: &Pointer, ctx: &ToolContext<'_>) {
        let ray = ctx.pointer_ray(pointer);
        let index = ctx.geometry.spatial_index();
        let hit = match self.target {
            BrushTarget::Mesh => raycast_first(index, &ray),
            BrushTarget::PointCloud { raycast_threshold } => raycast_closest_point(index, &ray, raycast_threshold),
        };
        self.center = hit.map(|hit| hit.point);
    }

    /// BVH primitives covered by a sphere.
    pub fn select(&self, index: &dyn SpatialIndex, sphere: Sphere) -> Vec<u32> {
        let mut selected = Vec::new();
        match self.target {
            BrushTarget::Mesh => index.shapecast(&mut MeshSphereVisitor {
                sphere,
                selected: &mut selected,
            }),
            BrushTarget::PointCloud { .. } => index.shapecast(&mut PointSphereVisitor {
                sphere,
                selected: &mut selected,
            }),
        };
        selected
    }
}

impl Default for SphereBrush {
    fn default() -> Self {
        Self::new(BrushTarget::Mesh, DEFAULT_BRUSH_SIZE)
    }
}

impl Tool for SphereBrush {
    fn kind(&self) -> ToolKind {
        ToolKind::SphereBrush
    }

    fn on_unselected(&mut self, ctx: &mut ToolContext<'_>) {
        self.undo_handler.on_update(&Pointer::default(), ctx.undo);
        self.center = None;
    }

    fn update(&mut self, pointer: &Pointer, ctx: &mut ToolContext<'_>) {
        if pointer.has_moved {
            self.update_position(pointer, ctx);
        }

        self.undo_handler.on_update(pointer, ctx.undo);
        let Some(center) = self.center else {
            return;
        };
        if pointer.buttons == MouseButtons::PRIMARY {
            let sphere = Sphere::new(center, self.radius(ctx));
            let primitives = self.select(ctx.geometry.spatial_index(), sphere);
            log::trace!("Brush at {:?} covers {} primitives", center, primitives.len());
            ctx.annotate_primitives(&primitives);
        }
    }
}

/// Faces touching the sphere.
struct MeshSphereVisitor<'a> {
    sphere: Sphere,
    selected: &'a mut Vec<u32>,
}

impl ShapecastVisitor for MeshSphereVisitor<'_> {
    fn intersects_bounds(&mut self, bounds: &Aabb, _is_leaf: bool, _depth: usize) -> BoundsIntersection {
        if !self.sphere.intersects_box(bounds) {
            BoundsIntersection::NotIntersected
        } else if bounds.corners().iter().all(|&corner| self.sphere.contains_point(corner)) {
            BoundsIntersection::Contained
        } else {
            BoundsIntersection::Intersected
        }
    }

    fn intersects_primitive(&mut self, triangle: &Triangle, index: u32, contained: bool, _depth: usize) -> bool {
        if contained || triangle.intersects_sphere(&self.sphere) {
            self.selected.push(index);
        }
        false
    }
}

/// Points strictly inside the sphere.
struct PointSphereVisitor<'a> {
    sphere: Sphere,
    selected: &'a mut Vec<u32>,
}

impl ShapecastVisitor for PointSphereVisitor<'_> {
    fn intersects_bounds(&mut self, bounds: &Aabb, _is_leaf: bool, _depth: usize) -> BoundsIntersection {
        let distance = bounds.center().distance(self.sphere.center);
        let box_radius = bounds.bounding_radius();
        let radius = self.sphere.radius;
        BoundsIntersection::from_level(u8::from(radius > distance - box_radius) + u8::from(radius > distance + box_radius))
    }

    fn intersects_primitive(&mut self, triangle: &Triangle, index: u32, contained: bool, _depth: usize) -> bool {
        if contained || triangle.a.distance_squared(self.sphere.center) < self.sphere.radius * self.sphere.radius {
            self.selected.push(index);
        }
        false
    }
}
