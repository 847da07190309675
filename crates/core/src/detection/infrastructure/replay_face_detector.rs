use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detection::domain::detection_result::DetectionResult;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::model_kind::{DetectionOptions, ModelKind};
use crate::shared::frame::Frame;

/// Pre-recorded detections, keyed by frame index.
///
/// Frames without an entry get `fallback`, so a script with only a
/// fallback replays the same faces on every frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayScript {
    #[serde(default)]
    pub frames: HashMap<usize, Vec<DetectionResult>>,
    #[serde(default)]
    pub fallback: Vec<DetectionResult>,
}

impl ReplayScript {
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read detections {}: {e}", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn constant(detections: Vec<DetectionResult>) -> Self {
        Self {
            frames: HashMap::new(),
            fallback: detections,
        }
    }
}

/// Replays scripted detection results instead of running a model.
///
/// Used for offline runs and tests. Landmarks are stripped unless the
/// requested options ask for them, matching what a real model reports.
pub struct ReplayFaceDetector {
    script: ReplayScript,
    loaded: HashSet<ModelKind>,
}

impl ReplayFaceDetector {
    pub fn new(script: ReplayScript) -> Self {
        Self {
            script,
            loaded: HashSet::new(),
        }
    }
}

impl FaceDetector for ReplayFaceDetector {
    fn load_model(
        &mut self,
        kind: ModelKind,
        _base_url: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.loaded.insert(kind);
        Ok(())
    }

    fn is_loaded(&self, kind: ModelKind) -> bool {
        self.loaded.contains(&kind)
    }

    fn detect_all_faces(
        &mut self,
        frame: &Frame,
        kind: ModelKind,
        options: &DetectionOptions,
    ) -> Result<Vec<DetectionResult>, Box<dyn std::error::Error>> {
        if !self.is_loaded(kind) {
            return Err(format!("Model {kind} is not loaded").into());
        }
        let detections = self
            .script
            .frames
            .get(&frame.index())
            .unwrap_or(&self.script.fallback);
        Ok(detections
            .iter()
            .filter(|d| d.confidence >= options.min_confidence)
            .map(|d| {
                let mut d = d.clone();
                if !options.with_landmarks {
                    d.landmarks = None;
                }
                d
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_landmarks::FaceLandmarks;
    use crate::shared::bounding_box::BoundingBox;

    fn frame(index: usize) -> Frame {
        Frame::new(vec![0u8; 10 * 10 * 3], 10, 10, index)
    }

    fn face(x: f64, confidence: f64) -> DetectionResult {
        DetectionResult::new(BoundingBox::new(x, 20.0, 50.0, 50.0), confidence)
            .with_landmarks(FaceLandmarks::new(vec![(x + 10.0, 30.0)]))
    }

    fn loaded(script: ReplayScript, kind: ModelKind) -> ReplayFaceDetector {
        let mut detector = ReplayFaceDetector::new(script);
        detector.load_model(kind, "unused").unwrap();
        detector
    }

    #[test]
    fn test_returns_scripted_results_for_known_frame() {
        let script = ReplayScript {
            frames: HashMap::from([(3, vec![face(10.0, 0.9), face(60.0, 0.8)])]),
            fallback: vec![],
        };
        let kind = ModelKind::FastAccurate;
        let mut detector = loaded(script, kind);

        let result = detector
            .detect_all_faces(&frame(3), kind, &kind.options())
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].bounding_box.x, 10.0);
        assert!(detector
            .detect_all_faces(&frame(4), kind, &kind.options())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_fallback_applies_to_every_unlisted_frame() {
        let kind = ModelKind::FastAccurate;
        let mut detector = loaded(ReplayScript::constant(vec![face(10.0, 0.9)]), kind);
        for i in 0..3 {
            let result = detector
                .detect_all_faces(&frame(i), kind, &kind.options())
                .unwrap();
            assert_eq!(result.len(), 1);
        }
    }

    #[test]
    fn test_unloaded_model_errors() {
        let mut detector = ReplayFaceDetector::new(ReplayScript::default());
        let kind = ModelKind::FastLightweight;
        assert!(detector
            .detect_all_faces(&frame(0), kind, &kind.options())
            .is_err());
    }

    #[test]
    fn test_landmarks_only_for_landmark_model() {
        let script = ReplayScript::constant(vec![face(10.0, 0.9)]);
        let mut detector = ReplayFaceDetector::new(script);
        detector.load_model(ModelKind::FastAccurate, "").unwrap();
        detector.load_model(ModelKind::LandmarkCapable, "").unwrap();

        let plain = detector
            .detect_all_faces(
                &frame(0),
                ModelKind::FastAccurate,
                &ModelKind::FastAccurate.options(),
            )
            .unwrap();
        let with_lm = detector
            .detect_all_faces(
                &frame(0),
                ModelKind::LandmarkCapable,
                &ModelKind::LandmarkCapable.options(),
            )
            .unwrap();
        assert!(plain[0].landmarks.is_none());
        assert!(with_lm[0].landmarks.is_some());
    }

    #[test]
    fn test_min_confidence_filters() {
        let kind = ModelKind::FastAccurate;
        let mut detector = loaded(
            ReplayScript::constant(vec![face(10.0, 0.3), face(60.0, 0.9)]),
            kind,
        );
        let result = detector
            .detect_all_faces(&frame(0), kind, &kind.options())
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].confidence, 0.9);
    }

    #[test]
    fn test_script_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detections.json");
        fs::write(
            &path,
            r#"{
                "frames": { "2": [ {
                    "bounding_box": { "x": 300, "y": 200, "width": 100, "height": 120 },
                    "confidence": 0.93
                } ] },
                "fallback": []
            }"#,
        )
        .unwrap();

        let script = ReplayScript::from_json_file(&path).unwrap();
        assert_eq!(
            script.frames[&2][0].bounding_box,
            BoundingBox::new(300.0, 200.0, 100.0, 120.0)
        );
        assert!(script.fallback.is_empty());
    }

    #[test]
    fn test_missing_script_file_errors() {
        assert!(ReplayScript::from_json_file(Path::new("/nonexistent/detections.json")).is_err());
    }
}
