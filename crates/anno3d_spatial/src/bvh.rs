//! Bounding Volume Hierarchy with a shapecast interface.
//!
//! Selection tools never walk the tree themselves. They implement
//! [`ShapecastVisitor`] and let [`SpatialIndex::shapecast`] drive a single
//! traversal: the visitor classifies every node's bounds and, for leaves or
//! contained subtrees, every primitive.
//!
//! Primitives are triangles addressed through a vertex index buffer with
//! three entries per primitive. The build reorders that buffer so every
//! subtree covers one contiguous primitive range; the primitive index handed
//! to the visitor is the position in the reordered buffer. Point clouds are
//! indexed as degenerate triangles whose three corners are the same point.

use glam::Vec3;

use crate::{Aabb, SpatialError, Triangle};

/// Default maximum number of primitives per leaf node.
pub const DEFAULT_MAX_LEAF_SIZE: usize = 10;

/// Result of a bounds test against the query region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsIntersection {
    /// The subtree can be skipped.
    NotIntersected,
    /// Primitives of the subtree need individual tests.
    Intersected,
    /// Every primitive of the subtree lies inside the region.
    Contained,
}

impl BoundsIntersection {
    /// Map an overlap level (0, 1 or 2) to a bounds result.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Self::NotIntersected,
            1 => Self::Intersected,
            _ => Self::Contained,
        }
    }
}

/// Query callbacks for a shapecast traversal.
pub trait ShapecastVisitor {
    /// Classify a node's bounding box. `depth` is zero at the root.
    fn intersects_bounds(&mut self, bounds: &Aabb, is_leaf: bool, depth: usize) -> BoundsIntersection;

    /// Visit a primitive. `contained` is true when an ancestor node was
    /// reported [`BoundsIntersection::Contained`]. Returning true stops the
    /// traversal.
    fn intersects_primitive(&mut self, triangle: &Triangle, index: u32, contained: bool, depth: usize) -> bool;
}

/// An accelerated spatial index over triangle primitives.
pub trait SpatialIndex: Send + Sync {
    /// Run one traversal. Returns true when the visitor stopped it early.
    fn shapecast(&self, visitor: &mut dyn ShapecastVisitor) -> bool;

    /// Bounds of the whole index.
    fn bounds(&self) -> Aabb;

    fn primitive_count(&self) -> usize;

    /// Vertex index buffer in traversal order, three entries per primitive.
    fn index(&self) -> &[u32];

    fn triangle(&self, primitive: u32) -> Triangle;
}

/// Build parameters.
#[derive(Debug, Clone)]
pub struct BvhOptions {
    pub max_leaf_size: usize,
}

impl Default for BvhOptions {
    fn default() -> Self {
        Self {
            max_leaf_size: DEFAULT_MAX_LEAF_SIZE,
        }
    }
}

impl BvhOptions {
    pub fn with_max_leaf_size(mut self, max_leaf_size: usize) -> Self {
        self.max_leaf_size = max_leaf_size;
        self
    }
}

/// Vertex positions plus the primitive index buffer to build a [`Bvh`] over.
#[derive(Debug, Clone, Default)]
pub struct BvhGeometry {
    positions: Vec<Vec3>,
    index: Vec<u32>,
}

impl BvhGeometry {
    /// Non-indexed triangle soup: every three positions form one face.
    pub fn triangles(positions: Vec<Vec3>) -> Result<Self, SpatialError> {
        if positions.len() % 3 != 0 {
            return Err(SpatialError::invalid_geometry(format!(
                "triangle soup needs a multiple of 3 positions, got {}",
                positions.len()
            )));
        }
        let index = (0..positions.len() as u32).collect();
        Ok(Self { positions, index })
    }

    /// Indexed triangles, three index entries per face.
    pub fn indexed(positions: Vec<Vec3>, index: Vec<u32>) -> Result<Self, SpatialError> {
        if index.len() % 3 != 0 {
            return Err(SpatialError::invalid_geometry(format!(
                "index buffer needs a multiple of 3 entries, got {}",
                index.len()
            )));
        }
        if let Some(bad) = index.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(SpatialError::invalid_geometry(format!(
                "index {} out of range for {} positions",
                bad,
                positions.len()
            )));
        }
        Ok(Self { positions, index })
    }

    /// Point cloud: every point becomes a degenerate triangle.
    pub fn points(positions: Vec<Vec3>) -> Self {
        let index = (0..positions.len() as u32).flat_map(|i| [i, i, i]).collect();
        Self { positions, index }
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn primitive_count(&self) -> usize {
        self.index.len() / 3
    }
}

/// BVH node, covering `count` primitives starting at `offset`.
#[derive(Debug)]
enum BvhNode {
    Leaf {
        bounds: Aabb,
        offset: usize,
        count: usize,
    },
    Internal {
        bounds: Aabb,
        offset: usize,
        count: usize,
        left: Box<BvhNode>,
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    fn bounds(&self) -> &Aabb {
        match self {
            Self::Leaf { bounds, .. } | Self::Internal { bounds, .. } => bounds,
        }
    }

    fn range(&self) -> std::ops::Range<usize> {
        match self {
            Self::Leaf { offset, count, .. } | Self::Internal { offset, count, .. } => {
                *offset..*offset + *count
            }
        }
    }
}

/// Bounding Volume Hierarchy over triangle primitives.
#[derive(Debug)]
pub struct Bvh {
    positions: Vec<Vec3>,
    index: Vec<u32>,
    root: Option<BvhNode>,
}

struct PrimitiveInfo {
    bounds: Aabb,
    centroid: Vec3,
}

impl Bvh {
    /// Build a BVH by recursive median split along the longest centroid axis.
    pub fn build(geometry: BvhGeometry, options: &BvhOptions) -> Self {
        let BvhGeometry { positions, index } = geometry;
        let count = index.len() / 3;
        if count == 0 {
            return Self {
                positions,
                index,
                root: None,
            };
        }

        let primitives: Vec<PrimitiveInfo> = index
            .chunks_exact(3)
            .map(|face| {
                let corners = [
                    positions[face[0] as usize],
                    positions[face[1] as usize],
                    positions[face[2] as usize],
                ];
                PrimitiveInfo {
                    bounds: Aabb::from_points(&corners),
                    centroid: (corners[0] + corners[1] + corners[2]) / 3.0,
                }
            })
            .collect();

        let mut order: Vec<u32> = (0..count as u32).collect();
        let max_leaf = options.max_leaf_size.max(1);
        let root = Self::build_recursive(&primitives, &mut order, 0, max_leaf);

        let reordered = order
            .iter()
            .flat_map(|&p| {
                let base = p as usize * 3;
                [index[base], index[base + 1], index[base + 2]]
            })
            .collect();

        log::debug!("Built BVH over {} primitives", count);
        Self {
            positions,
            index: reordered,
            root: Some(root),
        }
    }

    fn build_recursive(
        primitives: &[PrimitiveInfo],
        order: &mut [u32],
        offset: usize,
        max_leaf_size: usize,
    ) -> BvhNode {
        let mut bounds = Aabb::empty();
        let mut centroid_bounds = Aabb::empty();
        for &p in order.iter() {
            let info = &primitives[p as usize];
            bounds.expand(&info.bounds);
            centroid_bounds.expand_point(info.centroid);
        }

        let count = order.len();
        if count <= max_leaf_size {
            return BvhNode::Leaf {
                bounds,
                offset,
                count,
            };
        }

        let axis = centroid_bounds.longest_axis();
        let mid = count / 2;
        order.select_nth_unstable_by(mid, |&a, &b| {
            primitives[a as usize].centroid[axis].total_cmp(&primitives[b as usize].centroid[axis])
        });

        let (left_order, right_order) = order.split_at_mut(mid);
        let left = Self::build_recursive(primitives, left_order, offset, max_leaf_size);
        let right = Self::build_recursive(primitives, right_order, offset + mid, max_leaf_size);

        BvhNode::Internal {
            bounds,
            offset,
            count,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    fn visit_node(&self, node: &BvhNode, visitor: &mut dyn ShapecastVisitor, depth: usize) -> bool {
        let is_leaf = matches!(node, BvhNode::Leaf { .. });
        match visitor.intersects_bounds(node.bounds(), is_leaf, depth) {
            BoundsIntersection::NotIntersected => false,
            BoundsIntersection::Contained => self.visit_range(node.range(), visitor, true, depth),
            BoundsIntersection::Intersected => match node {
                BvhNode::Leaf { .. } => self.visit_range(node.range(), visitor, false, depth),
                BvhNode::Internal { left, right, .. } => {
                    self.visit_node(left, visitor, depth + 1)
                        || self.visit_node(right, visitor, depth + 1)
                }
            },
        }
    }

    fn visit_range(
        &self,
        range: std::ops::Range<usize>,
        visitor: &mut dyn ShapecastVisitor,
        contained: bool,
        depth: usize,
    ) -> bool {
        for primitive in range {
            let triangle = self.triangle(primitive as u32);
            if visitor.intersects_primitive(&triangle, primitive as u32, contained, depth) {
                return true;
            }
        }
        false
    }
}

impl SpatialIndex for Bvh {
    fn shapecast(&self, visitor: &mut dyn ShapecastVisitor) -> bool {
        match &self.root {
            Some(root) => self.visit_node(root, visitor, 0),
            None => false,
        }
    }

    fn bounds(&self) -> Aabb {
        self.root
            .as_ref()
            .map(|root| *root.bounds())
            .unwrap_or_default()
    }

    fn primitive_count(&self) -> usize {
        self.index.len() / 3
    }

    fn index(&self) -> &[u32] {
        &self.index
    }

    fn triangle(&self, primitive: u32) -> Triangle {
        let base = primitive as usize * 3;
        Triangle::new(
            self.positions[self.index[base] as usize],
            self.positions[self.index[base + 1] as usize],
            self.positions[self.index[base + 2] as usize],
        )
    }
}

/// A [`ShapecastVisitor`] assembled from two closures.
pub struct FnVisitor<B, P> {
    bounds: B,
    primitive: P,
}

impl<B, P> FnVisitor<B, P>
where
    B: FnMut(&Aabb, bool, usize) -> BoundsIntersection,
    P: FnMut(&Triangle, u32, bool, usize) -> bool,
{
    pub fn new(bounds: B, primitive: P) -> Self {
        Self { bounds, primitive }
    }
}

impl<B, P> ShapecastVisitor for FnVisitor<B, P>
where
    B: FnMut(&Aabb, bool, usize) -> BoundsIntersection,
    P: FnMut(&Triangle, u32, bool, usize) -> bool,
{
    fn intersects_bounds(&mut self, bounds: &Aabb, is_leaf: bool, depth: usize) -> BoundsIntersection {
        (self.bounds)(bounds, is_leaf, depth)
    }

    fn intersects_primitive(&mut self, triangle: &Triangle, index: u32, contained: bool, depth: usize) -> bool {
        (self.primitive)(triangle, index, contained, depth)
    }
}
