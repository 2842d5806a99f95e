//! Screen space selection shared by the lasso and polygon tools.
//!
//! The boundary is a closed polygon in normalized device coordinates. One
//! shapecast projects every visited node box into screen space and compares
//! its convex hull against the boundary; only boxes straddling the boundary
//! get per-primitive tests.
//!
//! Boundary segments that cannot matter for a box (entirely left of it, or
//! entirely above or below it) are filtered out per depth, so deeper nodes
//! test against progressively fewer segments.

use anno3d_spatial::glam::{Mat4, Vec2, Vec3};
use anno3d_spatial::planar::{
    Segment2, closed_segments, convex_hull, point_in_boundary, point_ray_crosses_segments, segments_cross,
};
use anno3d_spatial::{Aabb, BoundsIntersection, ShapecastVisitor, SpatialIndex, Triangle};
use serde::{Deserialize, Serialize};

/// How a primitive is classified against the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// The primitive's centroid lies inside
    #[default]
    Centroid,
    /// Any vertex lies inside or any edge crosses the boundary
    Intersection,
    /// Every vertex lies inside
    Contain,
}

impl SelectionMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Centroid => "centroid",
            Self::Intersection => "intersection",
            Self::Contain => "contain",
        }
    }

    pub fn all() -> &'static [SelectionMode] {
        &[Self::Centroid, Self::Intersection, Self::Contain]
    }
}

/// Select the BVH primitives inside `boundary`.
///
/// `to_screen` maps world positions to clip space; it is applied with a
/// perspective divide. Boundaries with fewer than three points select nothing.
/// The returned indices are BVH primitive indices in traversal order.
pub fn select_in_boundary(
    index: &dyn SpatialIndex,
    to_screen: Mat4,
    boundary: &[Vec2],
    mode: SelectionMode,
) -> Vec<u32> {
    if boundary.len() < 3 {
        return Vec::new();
    }
    let segments = closed_segments(boundary);
    let mut selector = BoundarySelector {
        to_screen,
        boundary: &segments,
        per_depth: Vec::new(),
        mode,
        selected: Vec::new(),
    };
    index.shapecast(&mut selector);
    log::trace!(
        "{} selection over {} boundary points hit {} primitives",
        mode.name(),
        boundary.len(),
        selector.selected.len()
    );
    selector.selected
}

struct BoundarySelector<'a> {
    to_screen: Mat4,
    boundary: &'a [Segment2],
    /// Boundary segments relevant to the last box visited at each depth
    per_depth: Vec<Vec<Segment2>>,
    mode: SelectionMode,
    selected: Vec<u32>,
}

impl BoundarySelector<'_> {
    fn project(&self, point: Vec3) -> Vec2 {
        self.to_screen.project_point3(point).truncate()
    }

    fn segments_at(&self, depth: usize) -> &[Segment2] {
        self.per_depth
            .get(depth)
            .map(Vec::as_slice)
            .unwrap_or(self.boundary)
    }

    fn primitive_selected(&self, triangle: &Triangle, segments: &[Segment2]) -> bool {
        match self.mode {
            SelectionMode::Centroid => point_in_boundary(self.project(triangle.centroid()), segments),
            SelectionMode::Contain => triangle
                .vertices()
                .iter()
                .all(|&vertex| point_in_boundary(self.project(vertex), segments)),
            SelectionMode::Intersection => {
                let projected = triangle.vertices().map(|vertex| self.project(vertex));
                projected
                    .iter()
                    .any(|&vertex| point_in_boundary(vertex, segments))
                    || closed_segments(&projected)
                        .iter()
                        .any(|edge| segments.iter().any(|segment| segments_cross(edge, segment)))
            }
        }
    }
}

impl ShapecastVisitor for BoundarySelector<'_> {
    fn intersects_bounds(&mut self, bounds: &Aabb, _is_leaf: bool, depth: usize) -> BoundsIntersection {
        let corners = bounds.corners().map(|corner| self.project(corner));
        let (min_x, min_y, max_y) = corners.iter().fold(
            (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY),
            |(min_x, min_y, max_y), p| (min_x.min(p.x), min_y.min(p.y), max_y.max(p.y)),
        );

        if self.per_depth.len() <= depth {
            self.per_depth.resize_with(depth + 1, Vec::new);
        }
        let mut relevant = std::mem::take(&mut self.per_depth[depth]);
        relevant.clear();
        let parent: &[Segment2] = if depth == 0 {
            self.boundary
        } else {
            &self.per_depth[depth - 1]
        };
        relevant.extend(parent.iter().copied().filter(|segment| {
            let (start, end) = (segment.start, segment.end);
            let left = start.x < min_x && end.x < min_x;
            let above = start.y > max_y && end.y > max_y;
            let below = start.y < min_y && end.y < min_y;
            !(left || above || below)
        }));
        self.per_depth[depth] = relevant;

        classify_box(&corners, &self.per_depth[depth])
    }

    fn intersects_primitive(&mut self, triangle: &Triangle, index: u32, contained: bool, depth: usize) -> bool {
        if contained || self.primitive_selected(triangle, self.segments_at(depth)) {
            self.selected.push(index);
        }
        false
    }
}

/// Classify a projected box against the boundary segments that can affect it.
fn classify_box(corners: &[Vec2; 8], segments: &[Segment2]) -> BoundsIntersection {
    if segments.is_empty() {
        return BoundsIntersection::NotIntersected;
    }

    // Degenerate projection, let the primitives decide.
    let Some(hull) = convex_hull(corners) else {
        return BoundsIntersection::Intersected;
    };
    let hull_edges = closed_segments(&hull);

    // A boundary point inside the hull means the box cannot be contained.
    if point_in_boundary(segments[0].start, &hull_edges) {
        return BoundsIntersection::Intersected;
    }

    let crossings = point_ray_crosses_segments(hull[0], segments);
    if hull[1..]
        .iter()
        .any(|&vertex| point_ray_crosses_segments(vertex, segments) != crossings)
    {
        return BoundsIntersection::Intersected;
    }

    if hull_edges
        .iter()
        .any(|edge| segments.iter().any(|segment| segments_cross(edge, segment)))
    {
        return BoundsIntersection::Intersected;
    }

    if crossings % 2 == 1 {
        BoundsIntersection::Contained
    } else {
        BoundsIntersection::NotIntersected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anno3d_spatial::{Bvh, BvhGeometry, BvhOptions, Camera};
    use proptest::prelude::*;

    /// Two triangles per unit cell over [-n, n]^2 in the z = 0 plane.
    fn grid(n: i32) -> Bvh {
        let mut positions = Vec::new();
        for x in -n..n {
            for y in -n..n {
                let (x, y) = (x as f32, y as f32);
                positions.extend([
                    Vec3::new(x, y, 0.0),
                    Vec3::new(x + 1.0, y, 0.0),
                    Vec3::new(x, y + 1.0, 0.0),
                    Vec3::new(x + 1.0, y, 0.0),
                    Vec3::new(x + 1.0, y + 1.0, 0.0),
                    Vec3::new(x, y + 1.0, 0.0),
                ]);
            }
        }
        let geometry = BvhGeometry::triangles(positions).unwrap();
        Bvh::build(geometry, &BvhOptions::default().with_max_leaf_size(4))
    }

    /// Top-down orthographic view where NDC equals world x, y divided by 10.
    fn top_down() -> Mat4 {
        Camera::orthographic_looking_at(10.0, 1.0, Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO).view_projection()
    }

    fn brute_force(index: &dyn SpatialIndex, to_screen: Mat4, boundary: &[Vec2], mode: SelectionMode) -> Vec<u32> {
        let segments = closed_segments(boundary);
        let selector = BoundarySelector {
            to_screen,
            boundary: &segments,
            per_depth: Vec::new(),
            mode,
            selected: Vec::new(),
        };
        (0..index.primitive_count() as u32)
            .filter(|&p| selector.primitive_selected(&index.triangle(p), &segments))
            .collect()
    }

    fn sorted(mut indices: Vec<u32>) -> Vec<u32> {
        indices.sort_unstable();
        indices
    }

    fn square(half: f32) -> Vec<Vec2> {
        vec![
            Vec2::new(-half, -half),
            Vec2::new(half, -half),
            Vec2::new(half, half),
            Vec2::new(-half, half),
        ]
    }

    #[test]
    fn test_square_selection_counts() {
        let bvh = grid(10);
        // World square [-4.4, 4.4]^2 fully covers the 8 x 8 cells around the origin.
        let boundary = square(0.44);

        let contain = select_in_boundary(&bvh, top_down(), &boundary, SelectionMode::Contain);
        assert_eq!(contain.len(), 8 * 8 * 2);

        // Border cells keep the triangle whose centroid lies 1/3 inside, plus
        // one triangle in each of two corner cells.
        let centroid = select_in_boundary(&bvh, top_down(), &boundary, SelectionMode::Centroid);
        assert_eq!(centroid.len(), 8 * 8 * 2 + 4 * 8 + 2);

        // The two corner triangles whose hypotenuse passes outside the corner are missed.
        let intersection = select_in_boundary(&bvh, top_down(), &boundary, SelectionMode::Intersection);
        assert_eq!(intersection.len(), 10 * 10 * 2 - 2);
    }

    #[test]
    fn test_pruned_traversal_matches_brute_force() {
        let bvh = grid(8);
        let boundary = vec![
            Vec2::new(-0.553, -0.347),
            Vec2::new(0.051, -0.619),
            Vec2::new(0.633, 0.113),
            Vec2::new(0.127, 0.041),
            Vec2::new(-0.213, 0.583),
        ];
        for &mode in SelectionMode::all() {
            let fast = sorted(select_in_boundary(&bvh, top_down(), &boundary, mode));
            let slow = brute_force(&bvh, top_down(), &boundary, mode);
            assert_eq!(fast, slow, "mode {}", mode.name());
        }
    }

    #[test]
    fn test_boundary_inside_single_triangle() {
        let bvh = grid(2);
        // Tiny boundary inside the lower-left triangle of cell (0, 0).
        let boundary = vec![Vec2::new(0.01, 0.01), Vec2::new(0.03, 0.01), Vec2::new(0.01, 0.03)];
        let intersection = select_in_boundary(&bvh, top_down(), &boundary, SelectionMode::Intersection);
        assert!(intersection.is_empty());
        let contain = select_in_boundary(&bvh, top_down(), &boundary, SelectionMode::Contain);
        assert!(contain.is_empty());
    }

    #[test]
    fn test_boundary_outside_view_selects_nothing() {
        let bvh = grid(4);
        let boundary = vec![Vec2::new(0.8, 0.8), Vec2::new(0.95, 0.8), Vec2::new(0.9, 0.95)];
        for &mode in SelectionMode::all() {
            assert!(select_in_boundary(&bvh, top_down(), &boundary, mode).is_empty());
        }
    }

    #[test]
    fn test_too_few_points() {
        let bvh = grid(2);
        let boundary = vec![Vec2::new(-1.0, -1.0), Vec2::new(1.0, 1.0)];
        assert!(select_in_boundary(&bvh, top_down(), &boundary, SelectionMode::Intersection).is_empty());
    }

    #[test]
    fn test_selection_mode_serde() {
        assert_eq!(serde_json::to_string(&SelectionMode::Contain).unwrap(), "\"contain\"");
        let mode: SelectionMode = serde_json::from_str("\"intersection\"").unwrap();
        assert_eq!(mode, SelectionMode::Intersection);
    }

    proptest! {
        #[test]
        fn prop_intersection_contains_contain(
            points in prop::collection::vec((-0.9f32..0.9, -0.9f32..0.9), 3..9)
        ) {
            let bvh = grid(6);
            let boundary: Vec<Vec2> = points.into_iter().map(|(x, y)| Vec2::new(x, y)).collect();
            let contain = select_in_boundary(&bvh, top_down(), &boundary, SelectionMode::Contain);
            let intersection = sorted(select_in_boundary(&bvh, top_down(), &boundary, SelectionMode::Intersection));
            for index in contain {
                prop_assert!(intersection.binary_search(&index).is_ok());
            }
        }
    }
}
