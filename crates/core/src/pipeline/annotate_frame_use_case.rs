use std::sync::Arc;
use std::time::Instant;

use image::RgbaImage;

use crate::detection::domain::detection_result::{rescale_all, DetectionResult};
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::model_kind::ModelKind;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::rendering::label_font::LabelFont;
use crate::rendering::overlay::OverlaySurface;
use crate::shared::frame::Frame;
use crate::shared::image_size::ImageSize;

/// Output of one annotation tick. `detections` are in display coordinates
/// and empty when no face was found.
pub struct AnnotatedTick {
    pub frame: Frame,
    pub detections: Vec<DetectionResult>,
    pub overlay: Arc<RgbaImage>,
}

/// Per-tick work of the live loop: clear overlay → detect → rescale → draw.
pub struct AnnotateFrameUseCase {
    overlay: OverlaySurface,
    display_size: ImageSize,
    logger: Box<dyn PipelineLogger>,
}

impl AnnotateFrameUseCase {
    pub fn new(
        display_size: ImageSize,
        font: Option<LabelFont>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            overlay: OverlaySurface::new(display_size, font),
            display_size,
            logger,
        }
    }

    pub fn execute(
        &mut self,
        frame: Frame,
        detector: &mut dyn FaceDetector,
        kind: ModelKind,
    ) -> Result<AnnotatedTick, Box<dyn std::error::Error>> {
        self.overlay.resize(self.display_size);
        self.overlay.clear();

        let t0 = Instant::now();
        let raw = detector.detect_all_faces(&frame, kind, &kind.options())?;
        self.logger
            .timing("detect", t0.elapsed().as_secs_f64() * 1000.0);
        self.logger.metric("faces", raw.len() as f64);

        let detections = if raw.is_empty() {
            Vec::new()
        } else {
            let t1 = Instant::now();
            let rescaled = rescale_all(&raw, frame.size(), self.display_size);
            self.overlay.draw(&rescaled, kind.supports_landmarks());
            self.logger
                .timing("draw", t1.elapsed().as_secs_f64() * 1000.0);
            rescaled
        };

        self.logger.tick(frame.index());
        Ok(AnnotatedTick {
            frame,
            detections,
            overlay: self.overlay.snapshot(),
        })
    }

    pub fn logger_mut(&mut self) -> &mut dyn PipelineLogger {
        self.logger.as_mut()
    }

    /// Emits the logger summary. Called once when the loop stops.
    pub fn finish(&self) {
        self.logger.summary();
    }
}
