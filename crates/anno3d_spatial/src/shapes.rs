//! Ray, sphere and triangle primitives used by the selection queries.

use glam::{Mat4, Vec3};

use crate::Aabb;

/// A triangle given by its three corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { a, b, c }
    }

    pub fn centroid(&self) -> Vec3 {
        (self.a + self.b + self.c) / 3.0
    }

    pub fn vertices(&self) -> [Vec3; 3] {
        [self.a, self.b, self.c]
    }

    /// Closest point on the triangle (including its interior) to `p`.
    ///
    /// Voronoi region walk from "Real-Time Collision Detection" (Ericson, 5.1.5).
    pub fn closest_point_to_point(&self, p: Vec3) -> Vec3 {
        let (a, b, c) = (self.a, self.b, self.c);
        let ab = b - a;
        let ac = c - a;
        let ap = p - a;
        let d1 = ab.dot(ap);
        let d2 = ac.dot(ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return a;
        }

        let bp = p - b;
        let d3 = ab.dot(bp);
        let d4 = ac.dot(bp);
        if d3 >= 0.0 && d4 <= d3 {
            return b;
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let v = d1 / (d1 - d3);
            return a + ab * v;
        }

        let cp = p - c;
        let d5 = ab.dot(cp);
        let d6 = ac.dot(cp);
        if d6 >= 0.0 && d5 <= d6 {
            return c;
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let w = d2 / (d2 - d6);
            return a + ac * w;
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return b + (c - b) * w;
        }

        let denom = va + vb + vc;
        if denom.abs() <= f32::EPSILON {
            // Degenerate triangle, all corners collapse onto a point or a line.
            return [a, b, c]
                .into_iter()
                .min_by(|x, y| x.distance_squared(p).total_cmp(&y.distance_squared(p)))
                .unwrap_or(a);
        }
        let v = vb / denom;
        let w = vc / denom;
        a + ab * v + ac * w
    }

    /// Whether the triangle touches the sphere.
    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        self.closest_point_to_point(sphere.center)
            .distance_squared(sphere.center)
            <= sphere.radius * sphere.radius
    }
}

/// A sphere with center and radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.distance_squared(self.center) <= self.radius * self.radius
    }

    pub fn intersects_box(&self, aabb: &Aabb) -> bool {
        aabb.clamp_point(self.center).distance_squared(self.center) <= self.radius * self.radius
    }

    /// Transform the sphere, scaling the radius by the largest axis scale.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let scale = matrix
            .x_axis
            .truncate()
            .length_squared()
            .max(matrix.y_axis.truncate().length_squared())
            .max(matrix.z_axis.truncate().length_squared())
            .sqrt();
        Self {
            center: matrix.transform_point3(self.center),
            radius: self.radius * scale,
        }
    }
}

/// A half-infinite ray with a normalized direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

/// A ray hit against a triangle primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub distance: f32,
    pub primitive: u32,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Closest point on the ray to `point`, clamped to the origin.
    pub fn closest_point_to_point(&self, point: Vec3) -> Vec3 {
        let t = (point - self.origin).dot(self.direction);
        if t < 0.0 { self.origin } else { self.at(t) }
    }

    pub fn distance_sq_to_point(&self, point: Vec3) -> f32 {
        self.closest_point_to_point(point).distance_squared(point)
    }

    /// Transform origin and direction by `matrix`, renormalizing the direction.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        Self::new(
            matrix.transform_point3(self.origin),
            matrix.transform_vector3(self.direction),
        )
    }

    /// Entry distance into the box, if the ray hits it.
    pub fn intersect_box(&self, aabb: &Aabb) -> Option<f32> {
        let inv = self.direction.recip();
        let t1 = (aabb.min - self.origin) * inv;
        let t2 = (aabb.max - self.origin) * inv;
        let t_min = t1.min(t2);
        let t_max = t1.max(t2);
        // NaN from 0 * inf is dropped by max/min element selection.
        let enter = t_min.x.max(t_min.y).max(t_min.z);
        let exit = t_max.x.min(t_max.y).min(t_max.z);
        if exit < 0.0 || enter > exit {
            None
        } else {
            Some(enter.max(0.0))
        }
    }

    /// Möller–Trumbore intersection, double sided.
    pub fn intersect_triangle(&self, triangle: &Triangle) -> Option<f32> {
        let edge1 = triangle.b - triangle.a;
        let edge2 = triangle.c - triangle.a;
        let h = self.direction.cross(edge2);
        let det = edge1.dot(h);
        if det.abs() < f32::EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = self.origin - triangle.a;
        let u = inv_det * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = inv_det * self.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = inv_det * edge2.dot(q);
        (t >= 0.0).then_some(t)
    }
}
