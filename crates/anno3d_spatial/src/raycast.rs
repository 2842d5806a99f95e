//! Ray queries built on top of [`SpatialIndex::shapecast`].

use crate::{Aabb, BoundsIntersection, Ray, RayHit, ShapecastVisitor, SpatialIndex, Triangle};

struct FirstHit<'a> {
    ray: &'a Ray,
    best: Option<RayHit>,
}

impl ShapecastVisitor for FirstHit<'_> {
    fn intersects_bounds(&mut self, bounds: &Aabb, _is_leaf: bool, _depth: usize) -> BoundsIntersection {
        match self.ray.intersect_box(bounds) {
            Some(t) if self.best.is_none_or(|hit| t <= hit.distance) => BoundsIntersection::Intersected,
            _ => BoundsIntersection::NotIntersected,
        }
    }

    fn intersects_primitive(&mut self, triangle: &Triangle, index: u32, _contained: bool, _depth: usize) -> bool {
        if let Some(t) = self.ray.intersect_triangle(triangle) {
            if self.best.is_none_or(|hit| t < hit.distance) {
                self.best = Some(RayHit {
                    point: self.ray.at(t),
                    distance: t,
                    primitive: index,
                });
            }
        }
        false
    }
}

/// Nearest triangle hit along the ray.
pub fn raycast_first(index: &dyn SpatialIndex, ray: &Ray) -> Option<RayHit> {
    let mut visitor = FirstHit { ray, best: None };
    index.shapecast(&mut visitor);
    visitor.best
}

struct ClosestPoint<'a> {
    ray: &'a Ray,
    threshold: f32,
    best: Option<RayHit>,
}

impl ShapecastVisitor for ClosestPoint<'_> {
    fn intersects_bounds(&mut self, bounds: &Aabb, _is_leaf: bool, _depth: usize) -> BoundsIntersection {
        // Everything in this box is farther than the current candidate.
        if self
            .best
            .is_some_and(|hit| bounds.distance_to_point(self.ray.origin) > hit.distance)
        {
            return BoundsIntersection::NotIntersected;
        }
        match self.ray.intersect_box(&bounds.padded(self.threshold)) {
            Some(_) => BoundsIntersection::Intersected,
            None => BoundsIntersection::NotIntersected,
        }
    }

    fn intersects_primitive(&mut self, triangle: &Triangle, index: u32, _contained: bool, _depth: usize) -> bool {
        if self.ray.distance_sq_to_point(triangle.a) < self.threshold * self.threshold {
            let distance = self.ray.origin.distance(triangle.a);
            if self.best.is_none_or(|hit| distance < hit.distance) {
                self.best = Some(RayHit {
                    point: triangle.a,
                    distance,
                    primitive: index,
                });
            }
        }
        false
    }
}

/// Closest point primitive along the ray within `threshold` of it.
///
/// Only the first corner of each primitive is considered, which is the
/// point itself for point clouds.
pub fn raycast_closest_point(index: &dyn SpatialIndex, ray: &Ray, threshold: f32) -> Option<RayHit> {
    let mut visitor = ClosestPoint {
        ray,
        threshold,
        best: None,
    };
    index.shapecast(&mut visitor);
    visitor.best
}
