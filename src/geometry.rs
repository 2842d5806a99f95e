//! Annotatable geometry behind a spatial index.
//!
//! A [`Model`] is either a triangle mesh, where every face is one annotatable
//! element, or a point cloud, where every point is. Both are backed by a
//! [`Bvh`]; selection tools work on BVH primitive indices and translate them
//! back to element indices through [`GeometryProvider::translate_bvh_index`].

use std::time::Duration;

use anno3d_spatial::glam::Vec3;
use anno3d_spatial::{Bvh, BvhBuilderThread, BvhGeometry, BvhOptions, SpatialError, SpatialIndex};

/// Which kind of elements a model is annotated by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Mesh,
    PointCloud,
}

impl GeometryKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mesh => "mesh",
            Self::PointCloud => "point cloud",
        }
    }
}

impl std::fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What the selection tools need from the annotated geometry.
pub trait GeometryProvider {
    fn kind(&self) -> GeometryKind;

    /// Number of annotatable elements (faces or points).
    fn element_count(&self) -> usize;

    fn spatial_index(&self) -> &dyn SpatialIndex;

    /// Map a BVH primitive to the element it was built from.
    fn translate_bvh_index(&self, primitive: u32) -> u32;

    fn translate_bvh_indices(&self, primitives: &[u32]) -> Vec<u32> {
        primitives
            .iter()
            .map(|&primitive| self.translate_bvh_index(primitive))
            .collect()
    }
}

/// Raw vertex data a [`Model`] is built from.
#[derive(Debug, Clone)]
pub struct ModelSource {
    pub kind: GeometryKind,
    /// Triangle soup for meshes (three positions per face), one position per point otherwise
    pub positions: Vec<Vec3>,
}

impl ModelSource {
    pub fn mesh(positions: Vec<Vec3>) -> Self {
        Self {
            kind: GeometryKind::Mesh,
            positions,
        }
    }

    pub fn point_cloud(positions: Vec<Vec3>) -> Self {
        Self {
            kind: GeometryKind::PointCloud,
            positions,
        }
    }

    fn into_bvh_geometry(self) -> Result<BvhGeometry, SpatialError> {
        match self.kind {
            GeometryKind::Mesh => BvhGeometry::triangles(self.positions),
            GeometryKind::PointCloud => Ok(BvhGeometry::points(self.positions)),
        }
    }
}

/// An annotatable model and its spatial index.
#[derive(Debug)]
pub enum Model {
    Mesh(Bvh),
    PointCloud(Bvh),
}

impl Model {
    /// Build the index on the calling thread.
    pub fn build(source: ModelSource, options: &BvhOptions) -> Result<Self, SpatialError> {
        let kind = source.kind;
        let bvh = Bvh::build(source.into_bvh_geometry()?, options);
        Ok(Self::from_bvh(kind, bvh))
    }

    /// Build the index on `builder`'s worker thread, blocking until it is
    /// done or `timeout` expires.
    pub fn build_on(
        builder: &mut BvhBuilderThread,
        source: ModelSource,
        options: BvhOptions,
        timeout: Duration,
    ) -> Result<Self, SpatialError> {
        let kind = source.kind;
        builder.request_build(source.into_bvh_geometry()?, options)?;
        match builder.wait_result(timeout) {
            Some(result) => Ok(Self::from_bvh(kind, result?)),
            None => Err(SpatialError::WorkerFailed(format!(
                "BVH build for {} did not finish within {:?}",
                kind, timeout
            ))),
        }
    }

    pub fn from_bvh(kind: GeometryKind, bvh: Bvh) -> Self {
        match kind {
            GeometryKind::Mesh => Self::Mesh(bvh),
            GeometryKind::PointCloud => Self::PointCloud(bvh),
        }
    }

    pub fn bvh(&self) -> &Bvh {
        match self {
            Self::Mesh(bvh) | Self::PointCloud(bvh) => bvh,
        }
    }
}

impl GeometryProvider for Model {
    fn kind(&self) -> GeometryKind {
        match self {
            Self::Mesh(_) => GeometryKind::Mesh,
            Self::PointCloud(_) => GeometryKind::PointCloud,
        }
    }

    fn element_count(&self) -> usize {
        self.bvh().primitive_count()
    }

    fn spatial_index(&self) -> &dyn SpatialIndex {
        self.bvh()
    }

    fn translate_bvh_index(&self, primitive: u32) -> u32 {
        // The first vertex of a primitive identifies it: faces own three
        // consecutive soup vertices, points repeat their own index.
        let vertex = self.bvh().index()[primitive as usize * 3];
        match self {
            Self::Mesh(_) => vertex / 3,
            Self::PointCloud(_) => vertex,
        }
    }
}
