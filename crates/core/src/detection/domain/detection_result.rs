use serde::{Deserialize, Serialize};

use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::image_size::ImageSize;

/// One detected face: box, confidence in `[0, 1]`, optional landmarks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub bounding_box: BoundingBox,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<FaceLandmarks>,
}

impl DetectionResult {
    pub fn new(bounding_box: BoundingBox, confidence: f64) -> Self {
        Self {
            bounding_box,
            confidence,
            landmarks: None,
        }
    }

    pub fn with_landmarks(mut self, landmarks: FaceLandmarks) -> Self {
        self.landmarks = Some(landmarks);
        self
    }

    /// Maps the box and landmarks from coordinates in `from` to `to`.
    pub fn rescaled(&self, from: ImageSize, to: ImageSize) -> Self {
        let (sx, sy) = from.scale_to(to);
        Self {
            bounding_box: self.bounding_box.scaled(sx, sy),
            confidence: self.confidence,
            landmarks: self.landmarks.as_ref().map(|lm| lm.scaled(sx, sy)),
        }
    }

    /// Text drawn above the face, e.g. `Accuracy: 93.00%`.
    pub fn accuracy_label(&self) -> String {
        format!("Accuracy: {:.2}%", self.confidence * 100.0)
    }
}

/// Rescales a batch, keeping detector order.
pub fn rescale_all(
    detections: &[DetectionResult],
    from: ImageSize,
    to: ImageSize,
) -> Vec<DetectionResult> {
    detections.iter().map(|d| d.rescaled(from, to)).collect()
}
