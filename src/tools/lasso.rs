//! Freehand lasso selection.

use anno3d_spatial::glam::Vec2;

use super::{SelectionMode, Tool, ToolContext, ToolKind, select_in_boundary};
use crate::annotation::AnnotationError;
use crate::constants::{LASSO_MIN_POINTER_TRAVEL, LASSO_STRAIGHT_LINE_COSINE};
use crate::input::{MouseButtons, Pointer, ToolEvent};

/// Draws a closed path while the primary button is held and selects
/// everything inside it on release.
#[derive(Debug, Clone)]
pub struct LassoTool {
    selection_mode: SelectionMode,
    /// Path in normalized device coordinates
    points: Vec<Vec2>,
    /// Pixel position of the last accepted pointer sample
    last_sample: Vec2,
    pressed: bool,
}

impl LassoTool {
    pub fn new(selection_mode: SelectionMode) -> Self {
        Self {
            selection_mode,
            points: Vec::new(),
            last_sample: Vec2::ZERO,
            pressed: false,
        }
    }

    pub fn selection_mode(&self) -> SelectionMode {
        self.selection_mode
    }

    pub fn set_selection_mode(&mut self, selection_mode: SelectionMode) {
        self.selection_mode = selection_mode;
    }

    /// Current path in normalized device coordinates.
    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn is_drawing(&self) -> bool {
        self.pressed
    }

    /// Extend the path with a pointer sample.
    ///
    /// Samples closer than the minimum travel to the previous one are
    /// dropped. A sample continuing the last segment's direction moves the
    /// last point instead of adding one.
    fn add_sample(&mut self, pixel: Vec2, ndc: Vec2) {
        let travel = (pixel - self.last_sample).abs();
        if travel.x < LASSO_MIN_POINTER_TRAVEL && travel.y < LASSO_MIN_POINTER_TRAVEL {
            return;
        }

        let straight = match self.points.as_slice() {
            [.., before, last] => {
                let previous = (*last - *before).normalize_or_zero();
                let current = (ndc - *last).normalize_or_zero();
                previous.dot(current) > LASSO_STRAIGHT_LINE_COSINE
            }
            _ => false,
        };

        match self.points.last_mut() {
            Some(last) if straight => *last = ndc,
            _ => self.points.push(ndc),
        }
        self.last_sample = pixel;
    }

    fn finish(&mut self, ctx: &mut ToolContext<'_>) {
        self.pressed = false;
        if self.points.len() >= 3 {
            let primitives = select_in_boundary(
                ctx.geometry.spatial_index(),
                ctx.camera.view_projection(),
                &self.points,
                self.selection_mode,
            );
            log::debug!(
                "Lasso with {} points selected {} primitives",
                self.points.len(),
                primitives.len()
            );
            ctx.annotate_primitives(&primitives);
        }
        ctx.undo.end_group();
        self.points.clear();
    }
}

impl Default for LassoTool {
    fn default() -> Self {
        Self::new(SelectionMode::default())
    }
}

impl Tool for LassoTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Lasso
    }

    fn on_unselected(&mut self, ctx: &mut ToolContext<'_>) {
        if self.pressed {
            self.pressed = false;
            self.points.clear();
            ctx.undo.end_group();
        }
    }

    fn handle_event(
        &mut self,
        event: &ToolEvent,
        pointer: &Pointer,
        ctx: &mut ToolContext<'_>,
    ) -> Result<(), AnnotationError> {
        match *event {
            ToolEvent::PointerDown { position, buttons } => {
                if buttons.contains(MouseButtons::PRIMARY) && !self.pressed {
                    ctx.undo.start_group();
                    self.pressed = true;
                    self.last_sample = position;
                    self.points.clear();
                }
            }
            ToolEvent::PointerMove { position } => {
                if self.pressed && pointer.buttons.contains(MouseButtons::PRIMARY) {
                    let ndc = ctx.viewport.to_ndc(position);
                    self.add_sample(position, ndc);
                }
            }
            ToolEvent::PointerUp { .. } => {
                if self.pressed {
                    self.finish(ctx);
                }
            }
            ToolEvent::KeyPressed { .. } | ToolEvent::KeyReleased { .. } => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::Scene;

    fn pointer_at(position: Vec2, buttons: MouseButtons) -> Pointer {
        Pointer {
            position,
            buttons,
            has_moved: true,
        }
    }

    fn drag(tool: &mut LassoTool, scene: &mut Scene, path: &[Vec2]) {
        let mut ctx = scene.context();
        tool.handle_event(
            &ToolEvent::PointerDown {
                position: path[0],
                buttons: MouseButtons::PRIMARY,
            },
            &pointer_at(path[0], MouseButtons::PRIMARY),
            &mut ctx,
        )
        .unwrap();
        for &position in &path[1..] {
            tool.handle_event(
                &ToolEvent::PointerMove { position },
                &pointer_at(position, MouseButtons::PRIMARY),
                &mut ctx,
            )
            .unwrap();
        }
        let end = path[path.len() - 1];
        tool.handle_event(
            &ToolEvent::PointerUp { position: end },
            &pointer_at(end, MouseButtons::NONE),
            &mut ctx,
        )
        .unwrap();
    }

    #[test]
    fn test_small_moves_are_ignored() {
        let mut tool = LassoTool::default();
        tool.add_sample(Vec2::new(10.0, 10.0), Vec2::new(0.0, 0.0));
        tool.add_sample(Vec2::new(12.0, 11.0), Vec2::new(0.1, 0.1));
        assert_eq!(tool.points().len(), 1);
        tool.add_sample(Vec2::new(10.0, 13.0), Vec2::new(0.2, 0.2));
        assert_eq!(tool.points().len(), 2);
    }

    #[test]
    fn test_straight_continuation_replaces_last_point() {
        let mut tool = LassoTool::default();
        tool.add_sample(Vec2::new(10.0, 0.0), Vec2::new(0.0, 0.0));
        tool.add_sample(Vec2::new(20.0, 0.0), Vec2::new(0.1, 0.0));
        tool.add_sample(Vec2::new(30.0, 0.0), Vec2::new(0.2, 0.0));
        assert_eq!(tool.points(), &[Vec2::new(0.0, 0.0), Vec2::new(0.2, 0.0)]);

        // A turn adds a new point.
        tool.add_sample(Vec2::new(30.0, 10.0), Vec2::new(0.2, 0.1));
        assert_eq!(tool.points().len(), 3);
    }

    #[test]
    fn test_lasso_annotates_enclosed_cells_as_one_group() {
        let mut scene = Scene::mesh_grid(10);
        let mut tool = LassoTool::new(SelectionMode::Contain);

        // Pixel square from world (-2.5, 2.5) to (2.5, -2.5): the 4 x 4 cells
        // around the origin. The press position itself is not a path point.
        let path = [
            Vec2::new(75.0, 75.0),
            Vec2::new(125.0, 75.0),
            Vec2::new(125.0, 125.0),
            Vec2::new(75.0, 125.0),
            Vec2::new(75.0, 75.0),
        ];
        drag(&mut tool, &mut scene, &path);

        assert_eq!(scene.labeled_count(), 4 * 4 * 2);
        assert!(!tool.is_drawing());
        assert!(tool.points().is_empty());
        assert_eq!(scene.undo.undo_count(), 1);

        scene.undo.undo(&mut scene.annotations);
        assert_eq!(scene.labeled_count(), 0);
    }

    #[test]
    fn test_click_without_path_leaves_no_undo_step() {
        let mut scene = Scene::mesh_grid(2);
        let mut tool = LassoTool::default();
        drag(&mut tool, &mut scene, &[Vec2::new(100.0, 100.0)]);
        assert_eq!(scene.labeled_count(), 0);
        assert!(!scene.undo.has_undo());
        assert!(!scene.undo.is_grouping());
    }

    #[test]
    fn test_secondary_button_does_not_draw() {
        let mut scene = Scene::mesh_grid(2);
        let mut tool = LassoTool::default();
        let mut ctx = scene.context();
        tool.handle_event(
            &ToolEvent::PointerDown {
                position: Vec2::ZERO,
                buttons: MouseButtons::SECONDARY,
            },
            &pointer_at(Vec2::ZERO, MouseButtons::SECONDARY),
            &mut ctx,
        )
        .unwrap();
        assert!(!tool.is_drawing());
        assert!(!ctx.undo.is_grouping());
    }
}
