use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb, RgbImage};
use thiserror::Error;

use crate::capture::domain::crop::{padded_crop, CropRect};
use crate::capture::domain::photo_sink::PhotoSink;
use crate::detection::domain::detection_result::DetectionResult;
use crate::rendering::annotation::{draw_accuracy_annotations, AnnotationStyle};
use crate::rendering::label_font::LabelFont;
use crate::shared::config::AppConfig;
use crate::shared::frame::Frame;
use crate::shared::image_size::ImageSize;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to encode passport photo: {0}")]
    Encode(#[source] image::ImageError),
    #[error("failed to deliver {file_name}: {reason}")]
    Deliver { file_name: String, reason: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct CaptureSettings {
    pub display_size: ImageSize,
    pub output_size: ImageSize,
    pub padding: u32,
    pub file_name: String,
}

impl CaptureSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            display_size: config.display_size,
            output_size: config.output_size,
            padding: config.crop_padding,
            file_name: config.output_file_name.clone(),
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Result of one successful capture.
#[derive(Clone, Debug)]
pub struct CapturedPhoto {
    pub file_name: String,
    pub crop: CropRect,
    pub image: RgbImage,
    pub png: Vec<u8>,
}

/// One-shot passport capture: annotate → crop around the primary face →
/// stretch onto the output surface → encode PNG → deliver.
///
/// The primary face is the first detection in detector order. Detections
/// must already be in display coordinates. Inputs are only read, so repeated
/// captures of the same state produce identical pixels.
pub struct CapturePassportUseCase {
    sink: Box<dyn PhotoSink>,
    settings: CaptureSettings,
    font: Option<LabelFont>,
    style: AnnotationStyle,
}

impl CapturePassportUseCase {
    pub fn new(
        sink: Box<dyn PhotoSink>,
        settings: CaptureSettings,
        font: Option<LabelFont>,
    ) -> Self {
        Self {
            sink,
            settings,
            font,
            style: AnnotationStyle::default(),
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Runs the capture. `Ok(None)` when there is no frame or no detection.
    pub fn execute(
        &self,
        frame: Option<&Frame>,
        detections: &[DetectionResult],
    ) -> Result<Option<CapturedPhoto>, CaptureError> {
        let Some(frame) = frame else {
            log::info!("Capture skipped: no frame available");
            return Ok(None);
        };
        let Some((crop, image)) = self.compose(frame, detections) else {
            log::info!("Capture skipped: no face detected");
            return Ok(None);
        };

        let png = encode_png(&image)?;
        let file_name = self.settings.file_name.clone();
        self.sink
            .deliver(&file_name, &png)
            .map_err(|e| CaptureError::Deliver {
                file_name: file_name.clone(),
                reason: e.to_string(),
            })?;

        log::info!(
            "Captured {file_name} from crop {}x{} at ({}, {})",
            crop.width,
            crop.height,
            crop.x,
            crop.y
        );
        Ok(Some(CapturedPhoto {
            file_name,
            crop,
            image,
            png,
        }))
    }

    /// Builds the output raster without encoding or delivering it.
    pub fn compose(
        &self,
        frame: &Frame,
        detections: &[DetectionResult],
    ) -> Option<(CropRect, RgbImage)> {
        let primary = detections.first()?;
        let out = self.settings.output_size;
        if out.is_empty() || self.settings.display_size.is_empty() {
            return None;
        }

        let mut canvas = frame.to_rgb_image_sized(self.settings.display_size);
        draw_accuracy_annotations(&mut canvas, detections, self.font.as_ref(), &self.style);

        let canvas_size = ImageSize::new(canvas.width(), canvas.height());
        let crop = padded_crop(&primary.bounding_box, self.settings.padding, canvas_size)?;
        let region =
            imageops::crop_imm(&canvas, crop.x, crop.y, crop.width, crop.height).to_image();
        let stretched = imageops::resize(&region, out.width, out.height, FilterType::Triangle);

        let mut output = RgbImage::from_pixel(out.width, out.height, BACKGROUND);
        imageops::replace(&mut output, &stretched, 0, 0);
        Some((crop, output))
    }
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, CaptureError> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(CaptureError::Encode)?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::bounding_box::BoundingBox;
    use std::sync::{Arc, Mutex};

    // --- Stubs ---

    type Delivered = Arc<Mutex<Vec<(String, Vec<u8>)>>>;

    struct RecordingSink {
        delivered: Delivered,
    }

    impl PhotoSink for RecordingSink {
        fn deliver(&self, file_name: &str, png: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
            self.delivered
                .lock()
                .unwrap()
                .push((file_name.to_string(), png.to_vec()));
            Ok(())
        }
    }

    struct FailingSink;

    impl PhotoSink for FailingSink {
        fn deliver(&self, _file_name: &str, _png: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
            Err("disk full".into())
        }
    }

    fn use_case() -> (CapturePassportUseCase, Delivered) {
        let delivered: Delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            delivered: delivered.clone(),
        };
        (
            CapturePassportUseCase::new(Box::new(sink), CaptureSettings::default(), None),
            delivered,
        )
    }

    fn labelled_use_case() -> CapturePassportUseCase {
        let sink = RecordingSink {
            delivered: Arc::new(Mutex::new(Vec::new())),
        };
        let font = LabelFont::from_config(None);
        assert!(font.is_some());
        CapturePassportUseCase::new(Box::new(sink), CaptureSettings::default(), font)
    }

    /// Output pixels above the accuracy line: canvas rows 160..192 land on
    /// output rows 0..80 at the 2.5x vertical stretch.
    fn label_band_green_pixels(image: &RgbImage) -> usize {
        (20..80)
            .flat_map(|y| (80..400).map(move |x| (x, y)))
            .filter(|&(x, y)| image.get_pixel(x, y).0[1] > 100)
            .count()
    }

    fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        Frame::from_rgb_image(RgbImage::from_pixel(width, height, Rgb(rgb)), 0)
    }

    fn gradient_frame() -> Frame {
        let img = RgbImage::from_fn(640, 480, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 77]));
        Frame::from_rgb_image(img, 0)
    }

    fn face(x: f64, y: f64, w: f64, h: f64, confidence: f64) -> DetectionResult {
        DetectionResult::new(BoundingBox::new(x, y, w, h), confidence)
    }

    #[test]
    fn test_no_detections_is_noop() {
        let (uc, delivered) = use_case();
        let frame = solid_frame(640, 480, [1, 2, 3]);
        let result = uc.execute(Some(&frame), &[]).unwrap();
        assert!(result.is_none());
        assert!(delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn test_no_frame_is_noop() {
        let (uc, delivered) = use_case();
        let result = uc
            .execute(None, &[face(300.0, 200.0, 100.0, 120.0, 0.9)])
            .unwrap();
        assert!(result.is_none());
        assert!(delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn test_output_is_passport_size_and_delivered() {
        let (uc, delivered) = use_case();
        let frame = gradient_frame();
        let photo = uc
            .execute(Some(&frame), &[face(300.0, 200.0, 100.0, 120.0, 0.9)])
            .unwrap()
            .unwrap();

        assert_eq!(photo.image.dimensions(), (400, 500));
        assert_eq!(photo.crop, CropRect::new(260, 160, 180, 200));
        assert_eq!(photo.file_name, "passport_photo.png");

        let delivered = delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, "passport_photo.png");
        let decoded = image::load_from_memory(&delivered[0].1).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (400, 500));
    }

    #[test]
    fn test_output_size_independent_of_face_size() {
        let (uc, _) = use_case();
        let frame = gradient_frame();
        for d in [
            face(10.0, 10.0, 5.0, 5.0, 0.9),
            face(0.0, 0.0, 640.0, 480.0, 0.9),
            face(620.0, 470.0, 40.0, 40.0, 0.9),
        ] {
            let (_, image) = uc.compose(&frame, &[d]).unwrap();
            assert_eq!(image.dimensions(), (400, 500));
        }
    }

    #[test]
    fn test_primary_face_is_first_even_if_less_confident() {
        let (uc, _) = use_case();
        let frame = gradient_frame();
        let detections = [
            face(50.0, 60.0, 80.0, 90.0, 0.55),
            face(400.0, 200.0, 100.0, 120.0, 0.99),
        ];
        let (crop, _) = uc.compose(&frame, &detections).unwrap();
        assert_eq!(crop, CropRect::new(10, 20, 160, 170));
    }

    #[test]
    fn test_repeated_capture_is_pixel_identical() {
        let (uc, delivered) = use_case();
        let frame = gradient_frame();
        let detections = vec![face(300.0, 200.0, 100.0, 120.0, 0.9)];
        let frame_before = frame.clone();
        let detections_before = detections.clone();

        let first = uc.execute(Some(&frame), &detections).unwrap().unwrap();
        let second = uc.execute(Some(&frame), &detections).unwrap().unwrap();

        assert_eq!(first.image, second.image);
        assert_eq!(first.png, second.png);
        assert_eq!(delivered.lock().unwrap().len(), 2);
        assert_eq!(frame, frame_before);
        assert_eq!(detections, detections_before);
    }

    #[test]
    fn test_crop_content_comes_from_frame() {
        let (uc, _) = use_case();
        let frame = solid_frame(640, 480, [10, 20, 30]);
        let (_, image) = uc
            .compose(&frame, &[face(300.0, 200.0, 100.0, 120.0, 0.9)])
            .unwrap();
        assert_eq!(*image.get_pixel(200, 250), Rgb([10, 20, 30]));
    }

    #[test]
    fn test_native_resolution_frame_is_resized_to_display() {
        let (uc, _) = use_case();
        let frame = solid_frame(1280, 960, [40, 40, 40]);
        let (crop, image) = uc
            .compose(&frame, &[face(300.0, 200.0, 100.0, 120.0, 0.9)])
            .unwrap();
        assert_eq!(crop, CropRect::new(260, 160, 180, 200));
        assert_eq!(image.dimensions(), (400, 500));
    }

    #[test]
    fn test_accuracy_line_is_redrawn_on_capture() {
        let (uc, _) = use_case();
        let frame = solid_frame(640, 480, [0, 0, 0]);
        // Line at canvas y = 195, x 300..=390; crop origin (260, 160), scale 2.5 vertically.
        let (_, image) = uc
            .compose(&frame, &[face(300.0, 200.0, 100.0, 120.0, 0.9)])
            .unwrap();
        let brightest_green = (80..96).map(|y| image.get_pixel(200, y).0[1]).max().unwrap();
        assert!(brightest_green > 100);
        assert_eq!(*image.get_pixel(200, 400), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_accuracy_label_is_redrawn_on_capture() {
        let frame = solid_frame(640, 480, [0, 0, 0]);
        let detections = [face(300.0, 200.0, 100.0, 120.0, 0.9)];

        let (_, labelled) = labelled_use_case().compose(&frame, &detections).unwrap();
        let (_, unlabelled) = use_case().0.compose(&frame, &detections).unwrap();

        assert!(label_band_green_pixels(&labelled) > 20);
        assert_eq!(label_band_green_pixels(&unlabelled), 0);
    }

    #[test]
    fn test_delivery_failure_is_reported() {
        let uc =
            CapturePassportUseCase::new(Box::new(FailingSink), CaptureSettings::default(), None);
        let frame = gradient_frame();
        let err = uc
            .execute(Some(&frame), &[face(300.0, 200.0, 100.0, 120.0, 0.9)])
            .unwrap_err();
        match err {
            CaptureError::Deliver { file_name, reason } => {
                assert_eq!(file_name, "passport_photo.png");
                assert_eq!(reason, "disk full");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_custom_settings() {
        let settings = CaptureSettings {
            display_size: ImageSize::new(640, 480),
            output_size: ImageSize::new(200, 250),
            padding: 0,
            file_name: "id.png".into(),
        };
        let delivered: Delivered = Arc::new(Mutex::new(Vec::new()));
        let uc = CapturePassportUseCase::new(
            Box::new(RecordingSink {
                delivered: delivered.clone(),
            }),
            settings,
            None,
        );
        let photo = uc
            .execute(Some(&gradient_frame()), &[face(100.0, 100.0, 50.0, 60.0, 0.8)])
            .unwrap()
            .unwrap();
        assert_eq!(photo.image.dimensions(), (200, 250));
        assert_eq!(photo.crop, CropRect::new(100, 100, 50, 60));
        assert_eq!(delivered.lock().unwrap()[0].0, "id.png");
    }

    #[test]
    fn test_encode_png_roundtrips_dimensions() {
        let img = RgbImage::from_pixel(4, 6, Rgb([1, 2, 3]));
        let png = encode_png(&img).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded, img);
    }
}
