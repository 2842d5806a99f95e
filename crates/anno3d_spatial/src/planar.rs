//! Planar (screen space) geometry: convex hulls and ray-crossing tests.
//!
//! Boundaries are closed polylines stored as [`Segment2`] lists. A point is
//! inside a boundary when a horizontal ray cast from it in +x direction
//! crosses the boundary an odd number of times.

use std::cmp::Ordering;

use glam::Vec2;

/// A directed 2D line segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment2 {
    pub start: Vec2,
    pub end: Vec2,
}

impl Segment2 {
    pub fn new(start: Vec2, end: Vec2) -> Self {
        Self { start, end }
    }
}

/// Close a polyline into a ring of segments, last point connecting back to the first.
pub fn closed_segments(points: &[Vec2]) -> Vec<Segment2> {
    let n = points.len();
    (0..n)
        .map(|i| Segment2::new(points[i], points[(i + 1) % n]))
        .collect()
}

/// Orientation of an ordered point triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Collinear,
    Clockwise,
    CounterClockwise,
}

pub fn orientation(p: Vec2, q: Vec2, r: Vec2) -> Orientation {
    let value = (q.y - p.y) * (r.x - q.x) - (q.x - p.x) * (r.y - q.y);
    if value == 0.0 {
        Orientation::Collinear
    } else if value > 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::CounterClockwise
    }
}

/// Graham scan convex hull in counter-clockwise order.
///
/// Returns `None` when fewer than three non-collinear points remain.
pub fn convex_hull(points: &[Vec2]) -> Option<Vec<Vec2>> {
    if points.len() < 3 {
        return None;
    }

    // Pivot: lowest y, ties broken by lowest x.
    let mut pivot_index = 0;
    for (i, p) in points.iter().enumerate() {
        let pivot = points[pivot_index];
        if p.y < pivot.y || (p.y == pivot.y && p.x < pivot.x) {
            pivot_index = i;
        }
    }
    let pivot = points[pivot_index];

    let mut rest: Vec<Vec2> = points
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != pivot_index)
        .map(|(_, p)| *p)
        .collect();
    rest.sort_by(|a, b| compare_polar(pivot, *a, *b));

    // Of each collinear run seen from the pivot only the farthest point survives.
    let mut sorted = Vec::with_capacity(rest.len() + 1);
    sorted.push(pivot);
    let mut i = 0;
    while i < rest.len() {
        while i + 1 < rest.len() && orientation(pivot, rest[i], rest[i + 1]) == Orientation::Collinear {
            i += 1;
        }
        sorted.push(rest[i]);
        i += 1;
    }

    if sorted.len() < 3 {
        return None;
    }

    let mut hull = vec![sorted[0], sorted[1], sorted[2]];
    for &point in &sorted[3..] {
        while hull.len() >= 2
            && orientation(hull[hull.len() - 2], hull[hull.len() - 1], point)
                != Orientation::CounterClockwise
        {
            hull.pop();
        }
        hull.push(point);
    }
    Some(hull)
}

/// Total order by polar angle around `pivot`, closer points first on ties.
fn compare_polar(pivot: Vec2, a: Vec2, b: Vec2) -> Ordering {
    let da = a - pivot;
    let db = b - pivot;
    da.y.atan2(da.x)
        .total_cmp(&db.y.atan2(db.x))
        .then_with(|| da.length_squared().total_cmp(&db.length_squared()))
}

/// Whether a +x ray from `point` crosses `line`.
///
/// Segments are treated as half-open in y, so a ray passing exactly through a
/// vertex shared by two segments is counted once for a crossing and zero or two
/// times for a touching turn point.
pub fn point_ray_crosses_line(point: Vec2, line: &Segment2) -> bool {
    let (start, end) = (line.start, line.end);
    if (start.y > point.y) == (end.y > point.y) {
        return false;
    }
    let x = start.x + (point.y - start.y) * (end.x - start.x) / (end.y - start.y);
    point.x < x
}

/// Number of boundary segments a +x ray from `point` crosses.
pub fn point_ray_crosses_segments(point: Vec2, segments: &[Segment2]) -> usize {
    segments
        .iter()
        .filter(|segment| point_ray_crosses_line(point, segment))
        .count()
}

/// Even-odd inside test against a closed boundary.
pub fn point_in_boundary(point: Vec2, segments: &[Segment2]) -> bool {
    point_ray_crosses_segments(point, segments) % 2 == 1
}

fn ccw(a: Vec2, b: Vec2, c: Vec2) -> bool {
    (c.y - a.y) * (b.x - a.x) > (b.y - a.y) * (c.x - a.x)
}

/// Proper intersection test between two segments.
pub fn segments_cross(l1: &Segment2, l2: &Segment2) -> bool {
    let (a, b) = (l1.start, l1.end);
    let (c, d) = (l2.start, l2.end);
    ccw(a, c, d) != ccw(b, c, d) && ccw(a, b, c) != ccw(a, b, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn square() -> Vec<Segment2> {
        closed_segments(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ])
    }

    fn diamond() -> Vec<Segment2> {
        closed_segments(&[
            Vec2::new(0.0, -1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(-1.0, 0.0),
        ])
    }

    #[test]
    fn test_point_in_square() {
        let square = square();
        assert!(point_in_boundary(Vec2::new(0.5, 0.5), &square));
        assert!(!point_in_boundary(Vec2::new(1.5, 0.5), &square));
        assert!(!point_in_boundary(Vec2::new(-0.5, 0.5), &square));
        assert!(!point_in_boundary(Vec2::new(0.5, 1.5), &square));
    }

    #[test]
    fn test_ray_through_vertex_counts_once() {
        // The ray from the origin passes exactly through the right vertex.
        let diamond = diamond();
        assert_eq!(point_ray_crosses_segments(Vec2::new(0.0, 0.0), &diamond), 1);
        // Left of the diamond the ray passes both side vertices.
        assert_eq!(point_ray_crosses_segments(Vec2::new(-2.0, 0.0), &diamond), 2);
        // Touching only the top vertex is not a crossing into the shape.
        assert!(!point_in_boundary(Vec2::new(-2.0, 1.0), &diamond));
    }

    #[test]
    fn test_concave_boundary() {
        // A "U" shape open to the top.
        let u_shape = closed_segments(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(3.0, 0.0),
            Vec2::new(3.0, 3.0),
            Vec2::new(2.0, 3.0),
            Vec2::new(2.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 3.0),
            Vec2::new(0.0, 3.0),
        ]);
        assert!(point_in_boundary(Vec2::new(0.5, 2.0), &u_shape));
        assert!(!point_in_boundary(Vec2::new(1.5, 2.0), &u_shape));
        assert!(point_in_boundary(Vec2::new(1.5, 0.5), &u_shape));
    }

    #[test]
    fn test_segments_cross() {
        let a = Segment2::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0));
        let b = Segment2::new(Vec2::new(0.0, 1.0), Vec2::new(1.0, 0.0));
        let c = Segment2::new(Vec2::new(2.0, 2.0), Vec2::new(3.0, 2.0));
        assert!(segments_cross(&a, &b));
        assert!(!segments_cross(&a, &c));
    }

    #[test]
    fn test_convex_hull_of_square_with_interior_point() {
        let points = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.5, 0.5),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        let hull = convex_hull(&points).unwrap();
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&Vec2::new(0.5, 0.5)));
        assert_eq!(hull[0], Vec2::new(0.0, 0.0));
    }

    #[test]
    fn test_convex_hull_degenerate_inputs() {
        assert!(convex_hull(&[Vec2::ZERO, Vec2::ONE]).is_none());
        let collinear = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(2.0, 2.0)];
        assert!(convex_hull(&collinear).is_none());
    }

    proptest! {
        #[test]
        fn prop_hull_contains_its_input(
            raw in prop::collection::vec((-100i32..100, -100i32..100), 3..40)
        ) {
            let points: Vec<Vec2> = raw.iter().map(|(x, y)| Vec2::new(*x as f32, *y as f32)).collect();
            if let Some(hull) = convex_hull(&points) {
                // Every input point lies on or left of every hull edge.
                for i in 0..hull.len() {
                    let a = hull[i];
                    let b = hull[(i + 1) % hull.len()];
                    for p in &points {
                        prop_assert!((b - a).perp_dot(*p - a) >= -1e-3);
                    }
                }
            }
        }

        #[test]
        fn prop_rectangle_inside_test_matches_bounds(
            x in -5.0f32..5.0,
            y in -5.0f32..5.0,
        ) {
            let rect = closed_segments(&[
                Vec2::new(-2.0, -1.0),
                Vec2::new(3.0, -1.0),
                Vec2::new(3.0, 2.0),
                Vec2::new(-2.0, 2.0),
            ]);
            prop_assume!(x != -2.0 && x != 3.0 && y != -1.0 && y != 2.0);
            let expected = x > -2.0 && x < 3.0 && y > -1.0 && y < 2.0;
            prop_assert_eq!(point_in_boundary(Vec2::new(x, y), &rect), expected);
        }
    }
}
