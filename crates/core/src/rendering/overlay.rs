use std::sync::Arc;

use image::RgbaImage;

use crate::detection::domain::detection_result::DetectionResult;
use crate::rendering::annotation::{draw_detections, AnnotationStyle};
use crate::rendering::label_font::LabelFont;
use crate::shared::image_size::ImageSize;

/// Transparent drawing surface laid over the displayed video.
pub struct OverlaySurface {
    image: RgbaImage,
    style: AnnotationStyle,
    font: Option<LabelFont>,
}

impl OverlaySurface {
    pub fn new(size: ImageSize, font: Option<LabelFont>) -> Self {
        Self {
            image: RgbaImage::new(size.width, size.height),
            style: AnnotationStyle::default(),
            font,
        }
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.image.width(), self.image.height())
    }

    /// Matches the surface to the displayed video. Reallocates only on change.
    pub fn resize(&mut self, size: ImageSize) {
        if self.size() != size {
            self.image = RgbaImage::new(size.width, size.height);
        }
    }

    pub fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            pixel.0 = [0, 0, 0, 0];
        }
    }

    /// Draws detections already expressed in overlay coordinates.
    pub fn draw(&mut self, detections: &[DetectionResult], with_landmarks: bool) {
        draw_detections(
            &mut self.image,
            detections,
            with_landmarks,
            self.font.as_ref(),
            &self.style,
        );
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn snapshot(&self) -> Arc<RgbaImage> {
        Arc::new(self.image.clone())
    }
}
