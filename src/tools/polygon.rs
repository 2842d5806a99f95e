//! Click-by-click polygon selection.
//!
//! While a polygon is being drawn the point list ends in a floating point
//! that follows the pointer. Holding Shift previews the polygon without it.
//!
//! ```text
//!   Inactive --click--> Active --a / Enter (>= 3 points)--> Selected
//!      ^                  |  ^                                  |
//!      |                  |  +--------d / Delete / Backspace----+
//!      +----Escape--------+----------------a / Enter (annotate)-+
//! ```

use anno3d_spatial::glam::Vec2;

use super::{SelectionMode, Tool, ToolContext, ToolKind, select_in_boundary};
use crate::annotation::AnnotationError;
use crate::constants::MIN_POLYGON_POINTS;
use crate::input::{Key, MouseButtons, Pointer, ToolEvent};
use crate::observer::{Channel, Subscription};
use crate::undo::HybridUndoManager;

/// Drawing state of the polygon tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonState {
    /// No polygon
    Inactive,
    /// Placing points
    Active,
    /// Polygon closed, waiting for confirmation
    Selected,
}

#[derive(Debug)]
pub struct PolygonTool {
    selection_mode: SelectionMode,
    /// Vertices in normalized device coordinates
    points: Vec<Vec2>,
    state: PolygonState,
    preview: bool,
    /// Primary button was part of the last press
    primary_pressed: bool,
    state_observers: Channel<PolygonState>,
}

impl PolygonTool {
    pub fn new(selection_mode: SelectionMode) -> Self {
        Self {
            selection_mode,
            points: Vec::new(),
            state: PolygonState::Inactive,
            preview: false,
            primary_pressed: false,
            state_observers: Channel::new(),
        }
    }

    pub fn selection_mode(&self) -> SelectionMode {
        self.selection_mode
    }

    pub fn set_selection_mode(&mut self, selection_mode: SelectionMode) {
        self.selection_mode = selection_mode;
    }

    pub fn state(&self) -> PolygonState {
        self.state
    }

    pub fn is_previewing(&self) -> bool {
        self.preview
    }

    /// While true the host should not move the camera on pointer input.
    pub fn captures_pointer(&self) -> bool {
        self.state != PolygonState::Inactive
    }

    /// Observe state changes and point additions or removals.
    pub fn subscribe_state<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&PolygonState) + 'static,
    {
        self.state_observers.subscribe(observer)
    }

    /// Vertices including the floating point, in normalized device coordinates.
    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    /// Number of placed vertices, not counting the floating point.
    pub fn point_count(&self) -> usize {
        if self.preview {
            self.points.len()
        } else {
            self.points.len().saturating_sub(1)
        }
    }

    fn set_state(&mut self, state: PolygonState) {
        self.state = state;
        self.state_observers.notify(&self.state);
    }

    fn start_polygon(&mut self, point: Vec2, undo: &mut HybridUndoManager) {
        self.set_state(PolygonState::Active);
        undo.start_group();
        self.points.push(point);
    }

    fn add_point(&mut self, point: Vec2) {
        self.points.push(point);
        self.state_observers.notify(&self.state);
    }

    fn move_last_point(&mut self, point: Vec2) {
        if let Some(last) = self.points.last_mut() {
            *last = point;
        }
    }

    /// Whether only the first vertex is left.
    fn at_first_point(&self) -> bool {
        (self.preview && self.points.len() == 1) || (!self.preview && self.points.len() == 2)
    }

    fn remove_last_point_if_possible(&mut self) {
        if self.at_first_point() {
            return;
        }
        self.points.pop();
        self.state_observers.notify(&self.state);
    }

    /// Remove the last placed vertex. Removing the only vertex ends the polygon.
    pub fn remove_last_point(&mut self, pointer: Vec2, undo: &mut HybridUndoManager) {
        match self.state {
            PolygonState::Inactive => {}
            PolygonState::Selected => {
                // The last vertex becomes the floating point again.
                self.move_last_point(pointer);
                self.set_state(PolygonState::Active);
            }
            PolygonState::Active => {
                if self.at_first_point() {
                    self.end_polygon(undo);
                    return;
                }
                self.points.pop();
                if !self.preview {
                    self.move_last_point(pointer);
                }
                self.state_observers.notify(&self.state);
            }
        }
    }

    /// Close the polygon, moving it to [`PolygonState::Selected`].
    pub fn conclude(&mut self) -> Result<(), AnnotationError> {
        let actual = self.point_count();
        if actual < MIN_POLYGON_POINTS {
            return Err(AnnotationError::NotEnoughPolygonPoints {
                required: MIN_POLYGON_POINTS,
                actual,
            });
        }
        if !self.preview {
            self.remove_last_point_if_possible();
        }
        self.set_state(PolygonState::Selected);
        Ok(())
    }

    /// Annotate everything inside the polygon and end it.
    pub fn annotate(&mut self, ctx: &mut ToolContext<'_>) {
        let primitives = select_in_boundary(
            ctx.geometry.spatial_index(),
            ctx.camera.view_projection(),
            &self.points,
            self.selection_mode,
        );
        log::debug!(
            "Polygon with {} points selected {} primitives",
            self.points.len(),
            primitives.len()
        );
        ctx.annotate_primitives(&primitives);
        self.end_polygon(ctx.undo);
    }

    /// Drop the polygon without annotating.
    pub fn abort(&mut self, undo: &mut HybridUndoManager) {
        self.end_polygon(undo);
    }

    pub fn show_preview(&mut self) {
        if self.preview {
            return;
        }
        self.preview = true;
        self.remove_last_point_if_possible();
    }

    pub fn hide_preview(&mut self, pointer: Vec2) {
        self.preview = false;
        if self.state == PolygonState::Active {
            self.add_point(pointer);
        }
    }

    fn end_polygon(&mut self, undo: &mut HybridUndoManager) {
        self.points.clear();
        undo.end_group();
        self.set_state(PolygonState::Inactive);
    }

    fn handle_key(&mut self, key: Key, pointer: Vec2, ctx: &mut ToolContext<'_>) {
        match key {
            Key::Shift => {
                if self.state == PolygonState::Active {
                    self.show_preview();
                }
            }
            Key::Char('d' | 'D') | Key::Delete | Key::Backspace => {
                self.remove_last_point(pointer, ctx.undo);
            }
            Key::Char('a' | 'A') | Key::Enter => match self.state {
                PolygonState::Active if self.point_count() >= MIN_POLYGON_POINTS => {
                    if let Err(e) = self.conclude() {
                        log::warn!("Cannot close polygon: {}", e);
                    }
                }
                PolygonState::Selected => self.annotate(ctx),
                _ => {}
            },
            Key::Escape => {
                if self.state != PolygonState::Inactive {
                    self.abort(ctx.undo);
                }
            }
            Key::Char(_) => {}
        }
    }
}

impl Default for PolygonTool {
    fn default() -> Self {
        Self::new(SelectionMode::default())
    }
}

impl Tool for PolygonTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Polygon
    }

    fn on_unselected(&mut self, ctx: &mut ToolContext<'_>) {
        if self.state != PolygonState::Inactive {
            self.abort(ctx.undo);
        }
        self.preview = false;
    }

    fn handle_event(
        &mut self,
        event: &ToolEvent,
        pointer: &Pointer,
        ctx: &mut ToolContext<'_>,
    ) -> Result<(), AnnotationError> {
        let ndc = ctx.pointer_ndc(pointer);
        match *event {
            ToolEvent::PointerDown { buttons, .. } => {
                self.primary_pressed = buttons.contains(MouseButtons::PRIMARY);
            }
            ToolEvent::PointerUp { .. } => {
                if !std::mem::take(&mut self.primary_pressed) || self.state == PolygonState::Selected {
                    return Ok(());
                }
                if self.state == PolygonState::Inactive {
                    self.start_polygon(ndc, ctx.undo);
                }
                self.add_point(ndc);
            }
            ToolEvent::PointerMove { .. } => {
                if self.state == PolygonState::Active && !self.preview {
                    self.move_last_point(ndc);
                }
            }
            ToolEvent::KeyPressed { key, .. } => self.handle_key(key, ndc, ctx),
            ToolEvent::KeyReleased { key: Key::Shift, .. } => self.hide_preview(ndc),
            ToolEvent::KeyReleased { .. } => {}
        }
        Ok(())
    }
}
