//! The annotator facade.
//!
//! An [`AnnotationSession`] owns everything needed to annotate one model:
//! the label set, the annotation buffer, the undo history, the spatial index
//! and the tools. It is created by a staged [`AnnotationSession::setup`] that
//! reports each stage and can be aborted between stages.

use std::cell::RefCell;
use std::io::{Read, Write};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anno3d_spatial::{BvhBuilderThread, BvhOptions, Camera, SpatialError, Viewport};
use thiserror::Error;
use web_time::Instant;

use crate::annotation::{AnnotationError, AnnotationManager, LabelManager};
use crate::config::AnnotatorConfig;
use crate::format::{AnnotationFileSerializer, FormatError, GenericAnnotationFileParser, SerializerUtf8v1};
use crate::geometry::{GeometryProvider, Model, ModelSource};
use crate::input::ToolEvent;
use crate::model::LabelRef;
use crate::tools::{ToolContext, ToolKind, ToolManager};
use crate::undo::HybridUndoManager;

// ============================================================================
// Setup
// ============================================================================

/// Stages reported while a session is set up, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetupStage {
    InitializeModel,
    CheckAnnotationFile,
    /// Only reported when an annotation file was given
    ReadAnnotationData,
    LoadTools,
    Finished,
    Aborted,
}

impl SetupStage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitializeModel => "initializeModel",
            Self::CheckAnnotationFile => "checkAnnotationFile",
            Self::ReadAnnotationData => "readAnnotationData",
            Self::LoadTools => "loadTools",
            Self::Finished => "finished",
            Self::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for SetupStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Cancels a running setup at the next stage boundary. Cloned handles share the flag.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Errors that end a setup before it finishes.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Failed to read annotation file: {0}")]
    Format(#[from] FormatError),

    #[error("Failed to initialize model: {0}")]
    Spatial(#[from] SpatialError),

    #[error(transparent)]
    Annotation(#[from] AnnotationError),
}

impl SetupError {
    /// Stable error code, used as the inspector's exit message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Format(e) => e.code(),
            Self::Spatial(_) => "MODEL",
            Self::Annotation(_) => "LABELS",
        }
    }
}

/// Inputs of [`AnnotationSession::setup`].
pub struct SetupRequest {
    pub labels: Vec<LabelRef>,
    pub source: ModelSource,
    pub annotation_file: Option<Box<dyn Read>>,
    pub config: AnnotatorConfig,
    pub camera: Camera,
    pub viewport: Viewport,
    pub bvh_options: BvhOptions,
    /// Build the spatial index on a worker thread, waiting at most this long.
    /// On timeout the worker is detached and setup fails.
    pub background_build: Option<Duration>,
}

impl SetupRequest {
    pub fn new(labels: Vec<LabelRef>, source: ModelSource, camera: Camera, viewport: Viewport) -> Self {
        Self {
            labels,
            source,
            annotation_file: None,
            config: AnnotatorConfig::default(),
            camera,
            viewport,
            bvh_options: BvhOptions::default(),
            background_build: None,
        }
    }

    pub fn with_annotation_file(mut self, file: impl Read + 'static) -> Self {
        self.annotation_file = Some(Box::new(file));
        self
    }

    pub fn with_config(mut self, config: AnnotatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_bvh_options(mut self, options: BvhOptions) -> Self {
        self.bvh_options = options;
        self
    }

    pub fn with_background_build(mut self, timeout: Duration) -> Self {
        self.background_build = Some(timeout);
        self
    }
}

impl std::fmt::Debug for SetupRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetupRequest")
            .field("labels", &self.labels.len())
            .field("kind", &self.source.kind)
            .field("annotation_file", &self.annotation_file.is_some())
            .field("background_build", &self.background_build)
            .finish()
    }
}

/// Components created once the model is initialized.
struct PartialSetup {
    label_manager: Rc<RefCell<LabelManager>>,
    annotations: AnnotationManager,
    undo: HybridUndoManager,
}

impl PartialSetup {
    fn teardown(mut self) {
        self.undo.dispose();
        self.annotations.dispose();
        self.label_manager.borrow_mut().dispose();
        log::debug!("Partial setup torn down");
    }

    fn abort(self, on_progress: &mut dyn FnMut(SetupStage)) {
        log::info!("Setup aborted");
        self.teardown();
        on_progress(SetupStage::Aborted);
    }
}

fn build_model(
    source: ModelSource,
    options: BvhOptions,
    background_build: Option<Duration>,
) -> Result<Model, SpatialError> {
    match background_build {
        Some(timeout) => {
            let mut builder = BvhBuilderThread::spawn()?;
            let model = Model::build_on(&mut builder, source, options, timeout);
            if builder.is_running() {
                builder.detach();
            } else {
                builder.dispose();
            }
            model
        }
        None => Model::build(source, &options),
    }
}

// ============================================================================
// Session
// ============================================================================

/// A model being annotated.
pub struct AnnotationSession {
    label_manager: Rc<RefCell<LabelManager>>,
    annotations: AnnotationManager,
    undo: HybridUndoManager,
    tools: ToolManager,
    model: Model,
    camera: Camera,
    viewport: Viewport,
    reference_distance: f32,
    config: AnnotatorConfig,
}

impl AnnotationSession {
    /// Build a session stage by stage.
    ///
    /// `on_progress` sees every stage entered. Returns `Ok(None)` when
    /// `abort` was triggered; components created up to then are disposed.
    pub fn setup(
        request: SetupRequest,
        abort: &AbortHandle,
        on_progress: &mut dyn FnMut(SetupStage),
    ) -> Result<Option<Self>, SetupError> {
        let start = Instant::now();
        let SetupRequest {
            labels,
            source,
            annotation_file,
            config,
            camera,
            viewport,
            bvh_options,
            background_build,
        } = request;

        let label_manager = Rc::new(RefCell::new(LabelManager::new(labels)?));

        on_progress(SetupStage::InitializeModel);
        let model = match build_model(source, bvh_options, background_build) {
            Ok(model) => model,
            Err(e) => {
                label_manager.borrow_mut().dispose();
                return Err(e.into());
            }
        };
        log::info!(
            "Initialized {} with {} elements",
            model.kind(),
            model.element_count()
        );
        if abort.is_aborted() {
            label_manager.borrow_mut().dispose();
            log::info!("Setup aborted");
            on_progress(SetupStage::Aborted);
            return Ok(None);
        }

        let annotations = AnnotationManager::new(model.element_count(), Rc::clone(&label_manager));
        let undo = HybridUndoManager::new(&annotations, config.to_undo_config());
        let mut partial = PartialSetup {
            label_manager,
            annotations,
            undo,
        };

        on_progress(SetupStage::CheckAnnotationFile);
        if let Some(file) = annotation_file {
            if abort.is_aborted() {
                partial.abort(on_progress);
                return Ok(None);
            }

            on_progress(SetupStage::ReadAnnotationData);
            let labels = partial.label_manager.borrow().labels().to_vec();
            let parsed = match GenericAnnotationFileParser::new(&labels)
                .with_chunk_size(config.io.read_chunk_size)
                .parse(file)
                .and_then(|parsed| check_element_count(parsed, model.element_count()))
            {
                Ok(parsed) => parsed,
                Err(e) => {
                    partial.teardown();
                    return Err(e.into());
                }
            };
            if abort.is_aborted() {
                partial.abort(on_progress);
                return Ok(None);
            }
            partial.annotations.load_annotations(&parsed.selections);
        }

        on_progress(SetupStage::LoadTools);
        let tools = ToolManager::new(model.kind(), &config.tools);

        let reference_distance = camera.position().length();
        let PartialSetup {
            label_manager,
            annotations,
            undo,
        } = partial;
        let session = Self {
            label_manager,
            annotations,
            undo,
            tools,
            model,
            camera,
            viewport,
            reference_distance,
            config,
        };

        on_progress(SetupStage::Finished);
        log::info!("Session ready in {:?}", start.elapsed());
        Ok(Some(session))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn label_manager(&self) -> &Rc<RefCell<LabelManager>> {
        &self.label_manager
    }

    pub fn annotations(&self) -> &AnnotationManager {
        &self.annotations
    }

    pub fn annotations_mut(&mut self) -> &mut AnnotationManager {
        &mut self.annotations
    }

    pub fn undo_manager(&self) -> &HybridUndoManager {
        &self.undo
    }

    pub fn undo_manager_mut(&mut self) -> &mut HybridUndoManager {
        &mut self.undo
    }

    pub fn tools(&self) -> &ToolManager {
        &self.tools
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Replace the camera. The brush reference distance follows the distance to the origin.
    pub fn set_camera(&mut self, camera: Camera) {
        self.reference_distance = camera.position().length();
        self.camera = camera;
    }

    pub fn set_reference_distance(&mut self, distance: f32) {
        self.reference_distance = distance;
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    // ========================================================================
    // Labels and tools
    // ========================================================================

    pub fn select_label(&self, label: &LabelRef) -> Result<(), AnnotationError> {
        self.label_manager.borrow_mut().select_label(label)
    }

    pub fn select_eraser(&self) {
        self.label_manager.borrow_mut().select_eraser();
    }

    pub fn select_tool(&mut self, kind: ToolKind) -> Result<(), AnnotationError> {
        let Self {
            annotations,
            undo,
            tools,
            model,
            camera,
            viewport,
            reference_distance,
            ..
        } = self;
        let mut ctx = ToolContext {
            annotations,
            undo,
            geometry: &*model,
            camera,
            viewport: *viewport,
            reference_distance: *reference_distance,
        };
        tools.select_tool(kind, &mut ctx)
    }

    /// Forward one input event to the selected tool.
    pub fn handle_event(&mut self, event: &ToolEvent) -> Result<(), AnnotationError> {
        let Self {
            annotations,
            undo,
            tools,
            model,
            camera,
            viewport,
            reference_distance,
            ..
        } = self;
        let mut ctx = ToolContext {
            annotations,
            undo,
            geometry: &*model,
            camera,
            viewport: *viewport,
            reference_distance: *reference_distance,
        };
        tools.handle_event(event, &mut ctx)
    }

    /// Per-frame tool update.
    pub fn update(&mut self) {
        let Self {
            annotations,
            undo,
            tools,
            model,
            camera,
            viewport,
            reference_distance,
            ..
        } = self;
        let mut ctx = ToolContext {
            annotations,
            undo,
            geometry: &*model,
            camera,
            viewport: *viewport,
            reference_distance: *reference_distance,
        };
        tools.update(&mut ctx);
    }

    // ========================================================================
    // History
    // ========================================================================

    pub fn undo(&mut self) -> bool {
        self.undo.undo(&mut self.annotations)
    }

    pub fn redo(&mut self) -> bool {
        self.undo.redo(&mut self.annotations)
    }

    // ========================================================================
    // Files
    // ========================================================================

    /// Write the buffer as a `UTF8` / `1.0` annotation file.
    pub fn save(&self, out: &mut dyn Write) -> Result<(), FormatError> {
        let labels = self.label_manager.borrow().labels().to_vec();
        SerializerUtf8v1::new(&labels)
            .with_buffer_size(self.config.io.write_buffer_size)
            .serialize(self.annotations.annotations(), out)
    }

    /// Replace the buffer with the content of an annotation file.
    ///
    /// The buffer is untouched if parsing fails. Undo history is cleared.
    pub fn load(&mut self, input: impl Read) -> Result<(), FormatError> {
        let labels = self.label_manager.borrow().labels().to_vec();
        let parsed = GenericAnnotationFileParser::new(&labels)
            .with_chunk_size(self.config.io.read_chunk_size)
            .parse(input)?;
        let parsed = check_element_count(parsed, self.annotations.element_count())?;

        self.undo.reset(true);
        self.undo.deactivate();
        self.annotations.load_annotations(&parsed.selections);
        self.undo.activate();
        Ok(())
    }

    /// Release every component. The session is empty afterwards.
    pub fn dispose(&mut self) {
        let Self {
            annotations,
            undo,
            tools,
            model,
            camera,
            viewport,
            reference_distance,
            ..
        } = self;
        let mut ctx = ToolContext {
            annotations,
            undo,
            geometry: &*model,
            camera,
            viewport: *viewport,
            reference_distance: *reference_distance,
        };
        tools.dispose(&mut ctx);
        self.undo.dispose();
        self.annotations.dispose();
        self.label_manager.borrow_mut().dispose();
        log::debug!("Session disposed");
    }
}

impl std::fmt::Debug for AnnotationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationSession")
            .field("kind", &self.model.kind())
            .field("annotations", &self.annotations)
            .field("undo", &self.undo)
            .field("tool", &self.tools.current())
            .finish()
    }
}

fn check_element_count(
    parsed: crate::format::ParsedAnnotationFile,
    element_count: usize,
) -> Result<crate::format::ParsedAnnotationFile, FormatError> {
    if parsed.count == element_count {
        Ok(parsed)
    } else {
        Err(FormatError::parsing(
            3,
            format!(
                "File declares {} elements but the model has {}",
                parsed.count, element_count
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Color, Label};
    use anno3d_spatial::glam::Vec3;

    fn labels() -> Vec<LabelRef> {
        vec![
            Rc::new(Label::new(1, 0, "ground", Color::new(0, 255, 0)).unwrap()),
            Rc::new(Label::new(2, 1, "tree", Color::new(0, 0, 255)).unwrap()),
        ]
    }

    fn points() -> ModelSource {
        ModelSource::point_cloud((0..6).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect())
    }

    fn request() -> SetupRequest {
        SetupRequest::new(
            labels(),
            points(),
            Camera::orthographic_looking_at(10.0, 1.0, Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO),
            Viewport::new(200.0, 200.0),
        )
    }

    fn run(request: SetupRequest, abort: &AbortHandle) -> (Result<Option<AnnotationSession>, SetupError>, Vec<SetupStage>) {
        let mut stages = Vec::new();
        let result = AnnotationSession::setup(request, abort, &mut |stage| stages.push(stage));
        (result, stages)
    }

    #[test]
    fn test_setup_without_file_skips_read_stage() {
        let (result, stages) = run(request(), &AbortHandle::new());
        let session = result.unwrap().unwrap();
        assert_eq!(
            stages,
            vec![
                SetupStage::InitializeModel,
                SetupStage::CheckAnnotationFile,
                SetupStage::LoadTools,
                SetupStage::Finished
            ]
        );
        assert_eq!(session.annotations().element_count(), 6);
        assert_eq!(session.tools().tool_kinds()[0], ToolKind::Spotlight);
    }

    #[test]
    fn test_setup_loads_annotation_file() {
        let file = "format UTF8\nversion 1.0\ncount 6\nlabel 0 2\n0\n5\nlabel 1 1\n3\n";
        let (result, stages) = run(request().with_annotation_file(std::io::Cursor::new(file)), &AbortHandle::new());
        let session = result.unwrap().unwrap();
        assert!(stages.contains(&SetupStage::ReadAnnotationData));
        assert_eq!(
            session.annotations().annotations(),
            &[0, u16::MAX, u16::MAX, 1, u16::MAX, 0]
        );
        assert!(!session.undo_manager().has_undo());
    }

    #[test]
    fn test_setup_rejects_mismatched_count() {
        let file = "format UTF8\nversion 1.0\ncount 7\n";
        let (result, _) = run(request().with_annotation_file(std::io::Cursor::new(file)), &AbortHandle::new());
        let err = result.unwrap_err();
        assert_eq!(err.code(), "PARSING_ERROR");
    }

    #[test]
    fn test_aborted_setup_reports_aborted() {
        let abort = AbortHandle::new();
        abort.abort();
        let (result, stages) = run(request(), &abort);
        assert!(result.unwrap().is_none());
        assert_eq!(stages, vec![SetupStage::InitializeModel, SetupStage::Aborted]);
    }

    #[test]
    fn test_background_build() {
        let (result, _) = run(request().with_background_build(Duration::from_secs(30)), &AbortHandle::new());
        assert_eq!(result.unwrap().unwrap().model().element_count(), 6);
    }

    #[test]
    fn test_save_then_load_restores_buffer() {
        let (result, _) = run(request(), &AbortHandle::new());
        let mut session = result.unwrap().unwrap();
        session.annotations_mut().annotate(&[1, 2]);

        let mut out = Vec::new();
        session.save(&mut out).unwrap();
        assert_eq!(String::from_utf8(out.clone()).unwrap(), "format UTF8\nversion 1.0\ncount 6\nlabel 0 2\n1\n2\nlabel 1 0\n");

        session.annotations_mut().annotate(&[4]);
        session.load(out.as_slice()).unwrap();
        assert_eq!(session.annotations().annotations()[4], u16::MAX);
        assert_eq!(session.annotations().annotations()[1], 0);
        assert!(!session.undo_manager().has_undo());
    }

    #[test]
    fn test_failed_load_keeps_buffer() {
        let (result, _) = run(request(), &AbortHandle::new());
        let mut session = result.unwrap().unwrap();
        session.annotations_mut().annotate(&[0]);
        let err = session.load("format UTF8\nversion 1.0\ncount 6\nlabel 9 0\n".as_bytes()).unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_LABEL");
        assert_eq!(session.annotations().annotations()[0], 0);
    }
}
