//! Per-geometry tool set with a single selected tool.

use super::{
    AnnotationTool, BrushTarget, LassoTool, PolygonTool, SphereBrush, SpotlightBrush, Tool, ToolContext, ToolKind,
    ToolSettings,
};
use crate::annotation::AnnotationError;
use crate::geometry::GeometryKind;
use crate::input::{Pointer, ToolEvent};
use crate::observer::{Channel, Subscription};

/// Owns the tools available for one kind of geometry and routes input to
/// the selected one.
///
/// Meshes get lasso, polygon and sphere brush. Point clouds get spotlight,
/// lasso and sphere brush.
#[derive(Debug)]
pub struct ToolManager {
    geometry: GeometryKind,
    tools: Vec<AnnotationTool>,
    current: Option<usize>,
    pointer: Pointer,
    selected_observers: Channel<Option<ToolKind>>,
}

impl ToolManager {
    pub fn new(geometry: GeometryKind, settings: &ToolSettings) -> Self {
        let tools = match geometry {
            GeometryKind::Mesh => vec![
                AnnotationTool::Lasso(LassoTool::new(settings.selection_mode)),
                AnnotationTool::Polygon(PolygonTool::new(settings.selection_mode)),
                AnnotationTool::SphereBrush(SphereBrush::new(BrushTarget::Mesh, settings.brush_size)),
            ],
            GeometryKind::PointCloud => vec![
                AnnotationTool::Spotlight(SpotlightBrush::new(settings.spotlight_size)),
                AnnotationTool::Lasso(LassoTool::new(settings.selection_mode)),
                AnnotationTool::SphereBrush(SphereBrush::new(
                    BrushTarget::PointCloud {
                        raycast_threshold: settings.spotlight_raycast_threshold,
                    },
                    settings.brush_size,
                )),
            ],
        };
        log::debug!("Loaded {} tools for {}", tools.len(), geometry);
        Self {
            geometry,
            tools,
            current: None,
            pointer: Pointer::default(),
            selected_observers: Channel::new(),
        }
    }

    pub fn geometry_kind(&self) -> GeometryKind {
        self.geometry
    }

    /// Available tools in display order.
    pub fn tool_kinds(&self) -> Vec<ToolKind> {
        self.tools.iter().map(Tool::kind).collect()
    }

    pub fn tool(&self, kind: ToolKind) -> Option<&AnnotationTool> {
        self.tools.iter().find(|tool| tool.kind() == kind)
    }

    pub fn tool_mut(&mut self, kind: ToolKind) -> Option<&mut AnnotationTool> {
        self.tools.iter_mut().find(|tool| tool.kind() == kind)
    }

    pub fn current(&self) -> Option<ToolKind> {
        self.current.map(|i| self.tools[i].kind())
    }

    pub fn current_tool(&self) -> Option<&AnnotationTool> {
        self.current.map(|i| &self.tools[i])
    }

    pub fn pointer(&self) -> &Pointer {
        &self.pointer
    }

    /// Observe the selected tool. The observer is called immediately with the current one.
    pub fn subscribe_selected_tool<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&Option<ToolKind>) + 'static,
    {
        self.selected_observers
            .subscribe_with_replay(&self.current(), observer)
    }

    /// Make `kind` the selected tool, unselecting the previous one.
    pub fn select_tool(&mut self, kind: ToolKind, ctx: &mut ToolContext<'_>) -> Result<(), AnnotationError> {
        let index = self
            .tools
            .iter()
            .position(|tool| tool.kind() == kind)
            .ok_or_else(|| AnnotationError::ToolNotFound(format!("{} is not available for {}", kind, self.geometry)))?;

        if let Some(previous) = self.current.take() {
            self.tools[previous].on_unselected(ctx);
        }
        log::info!("Selected tool {}", kind);
        self.current = Some(index);
        self.tools[index].on_selected(ctx);
        self.selected_observers.notify(&self.current());
        Ok(())
    }

    /// Unselect the current tool and return which one it was.
    pub fn unselect_current_tool(&mut self, ctx: &mut ToolContext<'_>) -> Option<ToolKind> {
        let previous = self.current.take().map(|index| {
            let tool = &mut self.tools[index];
            tool.on_unselected(ctx);
            tool.kind()
        });
        if let Some(kind) = previous {
            log::info!("Unselected tool {}", kind);
        }
        self.selected_observers.notify(&None);
        previous
    }

    /// Track the pointer and forward the event to the selected tool.
    pub fn handle_event(&mut self, event: &ToolEvent, ctx: &mut ToolContext<'_>) -> Result<(), AnnotationError> {
        self.pointer.apply(event);
        match self.current {
            Some(index) => self.tools[index].handle_event(event, &self.pointer, ctx),
            None => Ok(()),
        }
    }

    /// Per-frame update of the selected tool.
    pub fn update(&mut self, ctx: &mut ToolContext<'_>) {
        if let Some(index) = self.current {
            self.tools[index].update(&self.pointer, ctx);
        }
        self.pointer.has_moved = false;
    }

    /// Unselect the current tool and drop all observers.
    pub fn dispose(&mut self, ctx: &mut ToolContext<'_>) {
        if let Some(index) = self.current.take() {
            self.tools[index].on_unselected(ctx);
        }
        self.selected_observers.clear();
    }
}
