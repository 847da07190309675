//! Facial landmark points reported by landmark-capable models.

use serde::{Deserialize, Serialize};

/// Ordered landmark points in pixel coordinates.
///
/// The ONNX adapter emits five points (eyes, nose, mouth corners); replayed
/// detections may carry any number. Points a model could not see are
/// dropped before construction rather than stored as placeholders.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceLandmarks {
    points: Vec<(f64, f64)>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn scaled(&self, sx: f64, sy: f64) -> Self {
        Self::new(self.points.iter().map(|(x, y)| (x * sx, y * sy)).collect())
    }
}
