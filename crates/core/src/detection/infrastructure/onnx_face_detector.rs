//! YOLO-pose face detector using ONNX Runtime via `ort`.
//!
//! Handles letterbox preprocessing, inference and NMS post-processing. One
//! session is kept per loaded [`ModelKind`].
use std::collections::HashMap;
use std::path::Path;

use crate::detection::domain::detection_result::DetectionResult;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::detection::domain::model_kind::{DetectionOptions, ModelKind};
use crate::detection::infrastructure::execution_provider::preferred_execution_providers;
use crate::detection::infrastructure::model_resolver;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::config::ModelFiles;
use crate::shared::frame::Frame;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Number of keypoint values per detection (5 landmarks × x, y, conf).
const NUM_KEYPOINT_VALUES: usize = 15;

/// Minimum keypoint confidence to treat a landmark as visible.
const KEYPOINT_CONF_THRESH: f64 = 0.5;

struct LoadedModel {
    session: ort::session::Session,
    /// Static input resolution read from the model, if it declares one.
    fixed_input_size: Option<u32>,
}

pub struct OnnxFaceDetector {
    model_files: ModelFiles,
    models: HashMap<ModelKind, LoadedModel>,
}

impl OnnxFaceDetector {
    pub fn new(model_files: ModelFiles) -> Self {
        Self {
            model_files,
            models: HashMap::new(),
        }
    }

    fn load_session(model_path: &Path) -> Result<LoadedModel, Box<dyn std::error::Error>> {
        let intra_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let session = ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        // NCHW: [1, 3, H, W]; dynamic axes report as -1.
        let fixed_input_size = session.inputs().first().and_then(|input| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                if shape.len() >= 4 && shape[2] > 0 {
                    Some(shape[2] as u32)
                } else {
                    None
                }
            } else {
                None
            }
        });

        Ok(LoadedModel {
            session,
            fixed_input_size,
        })
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn load_model(
        &mut self,
        kind: ModelKind,
        base_url: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if self.models.contains_key(&kind) {
            return Ok(());
        }
        let file_name = self.model_files.for_kind(kind).to_string();
        let model_path = model_resolver::resolve(
            &file_name,
            base_url,
            Some(Box::new(|downloaded, total| {
                log::debug!("Model download: {downloaded}/{total} bytes");
            })),
        )?;
        let loaded = Self::load_session(&model_path)?;
        log::info!("Loaded {kind} model from {}", model_path.display());
        self.models.insert(kind, loaded);
        Ok(())
    }

    fn is_loaded(&self, kind: ModelKind) -> bool {
        self.models.contains_key(&kind)
    }

    fn detect_all_faces(
        &mut self,
        frame: &Frame,
        kind: ModelKind,
        options: &DetectionOptions,
    ) -> Result<Vec<DetectionResult>, Box<dyn std::error::Error>> {
        let model = self
            .models
            .get_mut(&kind)
            .ok_or_else(|| format!("Model {kind} is not loaded"))?;
        let input_size = model.fixed_input_size.unwrap_or(options.input_size);

        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = model.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
        }

        // [1, features, detections] (transposed) or [1, detections, features].
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        let mut raw_dets = Vec::new();
        for i in 0..num_dets {
            let row: Vec<f32> = if transposed {
                (0..num_feats).map(|f| data[f * num_dets + i]).collect()
            } else {
                data[i * num_feats..(i + 1) * num_feats].to_vec()
            };
            if let Some(det) = parse_row(&row, options, scale, pad_x, pad_y) {
                raw_dets.push(det);
            }
        }

        Ok(nms(&mut raw_dets, NMS_IOU_THRESH)
            .into_iter()
            .map(RawDetection::into_result)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = (fw * scale).round() as u32;
    let new_h = (fh * scale).round() as u32;
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padding is 114/255 gray, the YOLO convention.
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

// ---------------------------------------------------------------------------
// Post-processing
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDetection {
    bbox: BoundingBox,
    confidence: f64,
    landmarks: Option<Vec<(f64, f64)>>,
}

impl RawDetection {
    fn into_result(self) -> DetectionResult {
        let result = DetectionResult::new(self.bbox, self.confidence);
        match self.landmarks {
            Some(points) => result.with_landmarks(FaceLandmarks::new(points)),
            None => result,
        }
    }
}

/// Decodes one output row `[cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]`
/// from letterbox coordinates back to frame coordinates.
fn parse_row(
    row: &[f32],
    options: &DetectionOptions,
    scale: f64,
    pad_x: u32,
    pad_y: u32,
) -> Option<RawDetection> {
    if row.len() < 5 {
        return None;
    }
    let conf = row[4] as f64;
    if conf < options.min_confidence {
        return None;
    }

    let unletterbox = |x: f64, y: f64| ((x - pad_x as f64) / scale, (y - pad_y as f64) / scale);

    let (cx, cy, w, h) = (row[0] as f64, row[1] as f64, row[2] as f64, row[3] as f64);
    let (x1, y1) = unletterbox(cx - w / 2.0, cy - h / 2.0);
    let (x2, y2) = unletterbox(cx + w / 2.0, cy + h / 2.0);

    let landmarks = if options.with_landmarks && row.len() >= 5 + NUM_KEYPOINT_VALUES {
        let points = (0..5)
            .filter(|k| row[5 + k * 3 + 2] as f64 >= KEYPOINT_CONF_THRESH)
            .map(|k| unletterbox(row[5 + k * 3] as f64, row[5 + k * 3 + 1] as f64))
            .collect();
        Some(points)
    } else {
        None
    };

    Some(RawDetection {
        bbox: BoundingBox::from_corners(x1, y1, x2, y2),
        confidence: conf,
        landmarks,
    })
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if !suppressed[j] && dets[i].bbox.iou(&dets[j].bbox) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}
