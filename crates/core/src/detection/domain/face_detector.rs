use crate::detection::domain::detection_result::DetectionResult;
use crate::detection::domain::model_kind::{DetectionOptions, ModelKind};
use crate::shared::frame::Frame;

/// Domain interface for the face detection backend.
///
/// Results are in the coordinate space of the frame passed in, in the
/// backend's return order. Loading is explicit so callers can report
/// readiness before the first detection.
pub trait FaceDetector: Send {
    fn load_model(
        &mut self,
        kind: ModelKind,
        base_url: &str,
    ) -> Result<(), Box<dyn std::error::Error>>;

    fn is_loaded(&self, kind: ModelKind) -> bool;

    fn detect_all_faces(
        &mut self,
        frame: &Frame,
        kind: ModelKind,
        options: &DetectionOptions,
    ) -> Result<Vec<DetectionResult>, Box<dyn std::error::Error>>;
}
