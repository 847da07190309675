//! Application state and its reducer.
//!
//! Every mutation goes through [`reduce`]; the store applies it under a lock
//! and publishes the derived [`ViewState`].

use std::collections::BTreeSet;
use std::sync::Arc;

use image::RgbaImage;

use crate::detection::domain::detection_result::DetectionResult;
use crate::detection::domain::model_kind::ModelKind;
use crate::shared::constants::CAPTURE_CONFIDENCE_THRESHOLD;
use crate::shared::frame::Frame;

#[derive(Clone, Debug)]
pub struct AppState {
    pub selected_model: Option<ModelKind>,
    pub loaded_models: BTreeSet<ModelKind>,
    pub video_running: bool,
    /// Most recent non-empty batch, display coordinates, detector order.
    pub detections: Vec<DetectionResult>,
    pub latest_frame: Option<Arc<Frame>>,
    pub overlay: Option<Arc<RgbaImage>>,
    pub captures: usize,
    pub capture_threshold: f64,
    pub last_error: Option<String>,
}

impl AppState {
    pub fn new(capture_threshold: f64) -> Self {
        Self {
            selected_model: None,
            loaded_models: BTreeSet::new(),
            video_running: false,
            detections: Vec::new(),
            latest_frame: None,
            overlay: None,
            captures: 0,
            capture_threshold,
            last_error: None,
        }
    }

    /// The selected model, if it has finished loading.
    pub fn ready_model(&self) -> Option<ModelKind> {
        self.selected_model
            .filter(|kind| self.loaded_models.contains(kind))
    }

    pub fn can_capture(&self) -> bool {
        self.detections
            .iter()
            .any(|d| d.confidence > self.capture_threshold)
    }

    pub fn view(&self) -> ViewState {
        ViewState {
            selected_model: self.selected_model,
            model_ready: self.ready_model().is_some(),
            video_running: self.video_running,
            face_count: self.detections.len(),
            can_capture: self.can_capture(),
            captures: self.captures,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(CAPTURE_CONFIDENCE_THRESHOLD)
    }
}

/// What a front-end needs to render controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewState {
    pub selected_model: Option<ModelKind>,
    pub model_ready: bool,
    pub video_running: bool,
    pub face_count: usize,
    pub can_capture: bool,
    pub captures: usize,
}

#[derive(Clone, Debug)]
pub enum Action {
    SelectModel(ModelKind),
    ModelLoaded(ModelKind),
    ModelLoadFailed { kind: ModelKind, message: String },
    VideoStarted,
    VideoStopped,
    FrameAnnotated {
        frame: Arc<Frame>,
        detections: Vec<DetectionResult>,
        overlay: Arc<RgbaImage>,
    },
    PhotoCaptured,
}

pub fn reduce(mut state: AppState, action: Action) -> AppState {
    match action {
        Action::SelectModel(kind) => {
            state.selected_model = Some(kind);
        }
        Action::ModelLoaded(kind) => {
            state.loaded_models.insert(kind);
            state.last_error = None;
        }
        Action::ModelLoadFailed { kind, message } => {
            state.loaded_models.remove(&kind);
            state.last_error = Some(message);
        }
        Action::VideoStarted => {
            state.video_running = true;
        }
        Action::VideoStopped => {
            state.video_running = false;
            state.detections.clear();
            state.latest_frame = None;
            state.overlay = None;
        }
        Action::FrameAnnotated {
            frame,
            detections,
            overlay,
        } => {
            state.latest_frame = Some(frame);
            state.overlay = Some(overlay);
            // An empty tick keeps the last known faces.
            if !detections.is_empty() {
                state.detections = detections;
            }
        }
        Action::PhotoCaptured => {
            state.captures += 1;
        }
    }
    state
}
