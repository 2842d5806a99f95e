//! Selection tools that turn pointer gestures into annotated elements.
//!
//! Every tool ends in [`AnnotationManager::annotate`]: it computes BVH
//! primitives through one shapecast, translates them to element indices and
//! hands them over. Undo groups are opened and closed by the tools so one
//! gesture becomes one undo step.
//!
//! | Tool | Geometry | Region |
//! |------|----------|--------|
//! | [`LassoTool`] | mesh, point cloud | freehand screen space path |
//! | [`PolygonTool`] | mesh | clicked screen space polygon |
//! | [`SphereBrush`] | mesh, point cloud | world space sphere at the hit point |
//! | [`SpotlightBrush`] | point cloud | cone along the pointer ray |

mod brush;
mod lasso;
mod manager;
mod polygon;
mod selection;
mod spotlight;

pub use brush::{BrushTarget, SphereBrush};
pub use lasso::LassoTool;
pub use manager::ToolManager;
pub use polygon::{PolygonState, PolygonTool};
pub use selection::{SelectionMode, select_in_boundary};
pub use spotlight::SpotlightBrush;

use anno3d_spatial::glam::Vec2;
use anno3d_spatial::{Camera, Ray, Viewport};
use serde::{Deserialize, Serialize};

use crate::annotation::{AnnotationError, AnnotationManager};
use crate::constants::{DEFAULT_BRUSH_SIZE, DEFAULT_RAYCAST_THRESHOLD, DEFAULT_SPOTLIGHT_SIZE};
use crate::geometry::GeometryProvider;
use crate::input::{Pointer, ToolEvent};
use crate::undo::HybridUndoManager;

/// Everything a tool may touch while handling one event or frame.
pub struct ToolContext<'a> {
    pub annotations: &'a mut AnnotationManager,
    pub undo: &'a mut HybridUndoManager,
    pub geometry: &'a dyn GeometryProvider,
    pub camera: &'a Camera,
    pub viewport: Viewport,
    /// Distance from the camera to the point it orbits, used to size brushes
    pub reference_distance: f32,
}

impl ToolContext<'_> {
    /// Pointer position in normalized device coordinates.
    pub fn pointer_ndc(&self, pointer: &Pointer) -> Vec2 {
        self.viewport.to_ndc(pointer.position)
    }

    /// World space ray under the pointer.
    pub fn pointer_ray(&self, pointer: &Pointer) -> Ray {
        self.camera.ray_from_ndc(self.pointer_ndc(pointer))
    }

    /// Translate BVH primitives to elements and annotate them with the active label.
    pub fn annotate_primitives(&mut self, primitives: &[u32]) {
        if primitives.is_empty() {
            return;
        }
        let indices = self.geometry.translate_bvh_indices(primitives);
        self.annotations.annotate(&indices);
    }
}

/// Common lifecycle of the selection tools.
///
/// The [`ToolManager`] tracks the pointer, applies each event to it and then
/// forwards the event to the selected tool. `update` runs once per frame.
pub trait Tool {
    fn kind(&self) -> ToolKind;

    fn on_selected(&mut self, _ctx: &mut ToolContext<'_>) {}

    /// Called when another tool takes over. Open gestures are finished here.
    fn on_unselected(&mut self, _ctx: &mut ToolContext<'_>) {}

    fn handle_event(
        &mut self,
        _event: &ToolEvent,
        _pointer: &Pointer,
        _ctx: &mut ToolContext<'_>,
    ) -> Result<(), AnnotationError> {
        Ok(())
    }

    fn update(&mut self, _pointer: &Pointer, _ctx: &mut ToolContext<'_>) {}
}

/// Identifies a tool within a [`ToolManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Lasso,
    Polygon,
    SphereBrush,
    Spotlight,
}

impl ToolKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lasso => "lasso",
            Self::Polygon => "polygon",
            Self::SphereBrush => "sphere_brush",
            Self::Spotlight => "spotlight",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Initial tool parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Sphere brush size as a fraction of the visible height
    pub brush_size: f32,
    /// Spotlight size as a fraction of the visible height at unit distance
    pub spotlight_size: f32,
    /// World distance within which a point cloud ray cast picks a point
    pub spotlight_raycast_threshold: f32,
    /// Primitive test used by the lasso and polygon tools
    pub selection_mode: SelectionMode,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            brush_size: DEFAULT_BRUSH_SIZE,
            spotlight_size: DEFAULT_SPOTLIGHT_SIZE,
            spotlight_raycast_threshold: DEFAULT_RAYCAST_THRESHOLD,
            selection_mode: SelectionMode::default(),
        }
    }
}

/// A tool of any kind.
#[derive(Debug)]
pub enum AnnotationTool {
    Lasso(LassoTool),
    Polygon(PolygonTool),
    SphereBrush(SphereBrush),
    Spotlight(SpotlightBrush),
}

impl AnnotationTool {
    fn as_tool_mut(&mut self) -> &mut dyn Tool {
        match self {
            Self::Lasso(tool) => tool,
            Self::Polygon(tool) => tool,
            Self::SphereBrush(tool) => tool,
            Self::Spotlight(tool) => tool,
        }
    }
}

impl Tool for AnnotationTool {
    fn kind(&self) -> ToolKind {
        match self {
            Self::Lasso(_) => ToolKind::Lasso,
            Self::Polygon(_) => ToolKind::Polygon,
            Self::SphereBrush(_) => ToolKind::SphereBrush,
            Self::Spotlight(_) => ToolKind::Spotlight,
        }
    }

    fn on_selected(&mut self, ctx: &mut ToolContext<'_>) {
        self.as_tool_mut().on_selected(ctx);
    }

    fn on_unselected(&mut self, ctx: &mut ToolContext<'_>) {
        self.as_tool_mut().on_unselected(ctx);
    }

    fn handle_event(
        &mut self,
        event: &ToolEvent,
        pointer: &Pointer,
        ctx: &mut ToolContext<'_>,
    ) -> Result<(), AnnotationError> {
        self.as_tool_mut().handle_event(event, pointer, ctx)
    }

    fn update(&mut self, pointer: &Pointer, ctx: &mut ToolContext<'_>) {
        self.as_tool_mut().update(pointer, ctx);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! A small annotated scene shared by the tool tests.

    use std::cell::RefCell;
    use std::rc::Rc;

    use anno3d_spatial::glam::Vec3;
    use anno3d_spatial::{BvhOptions, Camera, Viewport};

    use super::ToolContext;
    use crate::annotation::{AnnotationManager, LabelManager};
    use crate::geometry::{Model, ModelSource};
    use crate::model::{Color, Label, LabelRef};
    use crate::undo::{HybridUndoManager, UndoConfig};

    pub struct Scene {
        pub labels: Vec<LabelRef>,
        pub annotations: AnnotationManager,
        pub undo: HybridUndoManager,
        pub model: Model,
        pub camera: Camera,
        pub viewport: Viewport,
    }

    impl Scene {
        /// Unit cell grid over [-n, n]^2 at z = 0, two triangles per cell,
        /// viewed top down so that NDC equals world x, y divided by 10.
        pub fn mesh_grid(n: i32) -> Self {
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
            Self::new(ModelSource::mesh(positions))
        }

        /// Points on the integer lattice over [-n, n]^2 at z = 0.
        pub fn point_grid(n: i32) -> Self {
            let mut positions = Vec::new();
            for x in -n..=n {
                for y in -n..=n {
                    positions.push(Vec3::new(x as f32, y as f32, 0.0));
                }
            }
            Self::new(ModelSource::point_cloud(positions))
        }

        fn new(source: ModelSource) -> Self {
            let model = Model::build(source, &BvhOptions::default().with_max_leaf_size(4)).unwrap();
            let labels = vec![Rc::new(Label::new(1, 0, "first", Color::new(255, 0, 0)).unwrap())];
            let label_manager = Rc::new(RefCell::new(LabelManager::new(labels.clone()).unwrap()));
            let annotations = AnnotationManager::new(
                crate::geometry::GeometryProvider::element_count(&model),
                label_manager,
            );
            let undo = HybridUndoManager::new(&annotations, UndoConfig::default());
            Self {
                labels,
                annotations,
                undo,
                model,
                camera: Camera::orthographic_looking_at(10.0, 1.0, Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO),
                viewport: Viewport::new(200.0, 200.0),
            }
        }

        pub fn context(&mut self) -> ToolContext<'_> {
            ToolContext {
                annotations: &mut self.annotations,
                undo: &mut self.undo,
                geometry: &self.model,
                camera: &self.camera,
                viewport: self.viewport,
                reference_distance: 10.0,
            }
        }

        /// Number of elements carrying the first label.
        pub fn labeled_count(&self) -> usize {
            let class_code = self.labels[0].class_code();
            self.annotations
                .annotations()
                .iter()
                .filter(|&&code| code == class_code)
                .count()
        }
    }
}
