//! Face annotations: boxes, landmarks, accuracy lines and labels.
//!
//! The live overlay draws everything onto a transparent RGBA surface; the
//! capture pipeline redraws only the accuracy line and label onto the RGB
//! working canvas.

use image::{ImageBuffer, Pixel, Rgb, Rgba};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;

use crate::detection::domain::detection_result::DetectionResult;
use crate::rendering::label_font::LabelFont;
use crate::shared::bounding_box::BoundingBox;

/// Pixel types annotations can be drawn onto.
pub trait AnnotationPixel: Pixel<Subpixel = u8> + 'static {
    fn opaque(rgb: [u8; 3]) -> Self;
}

impl AnnotationPixel for Rgb<u8> {
    fn opaque(rgb: [u8; 3]) -> Self {
        Rgb(rgb)
    }
}

impl AnnotationPixel for Rgba<u8> {
    fn opaque(rgb: [u8; 3]) -> Self {
        Rgba([rgb[0], rgb[1], rgb[2], 255])
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnnotationStyle {
    pub box_color: [u8; 3],
    pub landmark_color: [u8; 3],
    pub accuracy_color: [u8; 3],
    pub landmark_radius: i32,
    /// Distance of the accuracy line above the box top edge.
    pub line_offset: f64,
    /// Gap between the label baseline box and the accuracy line.
    pub label_gap: i32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            box_color: [0, 120, 255],
            landmark_color: [255, 64, 64],
            accuracy_color: [0, 200, 80],
            landmark_radius: 2,
            line_offset: 5.0,
            label_gap: 2,
        }
    }
}

/// Draws the full live annotation for every detection.
pub fn draw_detections<P: AnnotationPixel>(
    canvas: &mut ImageBuffer<P, Vec<u8>>,
    detections: &[DetectionResult],
    with_landmarks: bool,
    font: Option<&LabelFont>,
    style: &AnnotationStyle,
) {
    let (w, h) = canvas.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    for detection in detections {
        if let Some(rect) = rect_from_bbox(&detection.bounding_box, w, h) {
            draw_hollow_rect_mut(canvas, rect, P::opaque(style.box_color));
        }
        if with_landmarks {
            if let Some(landmarks) = &detection.landmarks {
                for &(x, y) in landmarks.points() {
                    let center = (clamp_to_i32(x, w), clamp_to_i32(y, h));
                    draw_filled_circle_mut(
                        canvas,
                        center,
                        style.landmark_radius,
                        P::opaque(style.landmark_color),
                    );
                }
            }
        }
        draw_accuracy(canvas, detection, font, style);
    }
}

/// Draws only the accuracy line and label for every detection.
pub fn draw_accuracy_annotations<P: AnnotationPixel>(
    canvas: &mut ImageBuffer<P, Vec<u8>>,
    detections: &[DetectionResult],
    font: Option<&LabelFont>,
    style: &AnnotationStyle,
) {
    let (w, h) = canvas.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    for detection in detections {
        draw_accuracy(canvas, detection, font, style);
    }
}

fn draw_accuracy<P: AnnotationPixel>(
    canvas: &mut ImageBuffer<P, Vec<u8>>,
    detection: &DetectionResult,
    font: Option<&LabelFont>,
    style: &AnnotationStyle,
) {
    let color = P::opaque(style.accuracy_color);
    let (start, end) = accuracy_line(detection, style.line_offset);
    draw_line_segment_mut(canvas, start, end, color);

    if let Some(font) = font {
        let text = detection.accuracy_label();
        let (_, text_h) = text_size(font.scale(), font.font(), &text);
        let (x, y) = label_origin(detection, style, text_h);
        draw_text_mut(canvas, color, x, y, font.scale(), font.font(), &text);
    }
}

/// Endpoints of the accuracy line: starts at the box's left edge, spans
/// `width * confidence`, and sits `offset` pixels above the top edge.
pub fn accuracy_line(detection: &DetectionResult, offset: f64) -> ((f32, f32), (f32, f32)) {
    let bbox = &detection.bounding_box;
    let y = (bbox.y - offset) as f32;
    let x0 = bbox.x as f32;
    let x1 = (bbox.x + bbox.width * detection.confidence.clamp(0.0, 1.0)) as f32;
    ((x0, y), (x1, y))
}

/// Top-left corner of the label, placed above the accuracy line.
pub fn label_origin(
    detection: &DetectionResult,
    style: &AnnotationStyle,
    text_h: u32,
) -> (i32, i32) {
    let bbox = &detection.bounding_box;
    let line_y = (bbox.y - style.line_offset).round() as i32;
    let y = line_y - style.label_gap - text_h as i32;
    (bbox.x.round() as i32, y.max(0))
}

/// Converts a box to an integer rect clamped to the canvas. `None` when the
/// box lies entirely outside.
fn rect_from_bbox(bbox: &BoundingBox, img_w: u32, img_h: u32) -> Option<Rect> {
    let max_x = (img_w - 1) as f64;
    let max_y = (img_h - 1) as f64;
    if bbox.right() < 0.0 || bbox.bottom() < 0.0 || bbox.x > max_x || bbox.y > max_y {
        return None;
    }

    let x1 = bbox.x.clamp(0.0, max_x);
    let y1 = bbox.y.clamp(0.0, max_y);
    let x2 = bbox.right().clamp(0.0, max_x + 1.0);
    let y2 = bbox.bottom().clamp(0.0, max_y + 1.0);

    let width = (x2 - x1).max(1.0).round() as u32;
    let height = (y2 - y1).max(1.0).round() as u32;
    Some(Rect::at(x1.round() as i32, y1.round() as i32).of_size(width, height))
}

#[inline]
fn clamp_to_i32(value: f64, max_extent: u32) -> i32 {
    let max = (max_extent - 1) as f64;
    value.clamp(0.0, max).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_landmarks::FaceLandmarks;
    use approx::assert_relative_eq;
    use image::{RgbImage, RgbaImage};

    fn face() -> DetectionResult {
        DetectionResult::new(BoundingBox::new(100.0, 100.0, 50.0, 40.0), 0.8)
            .with_landmarks(FaceLandmarks::new(vec![(120.0, 115.0)]))
    }

    #[test]
    fn test_accuracy_line_scales_with_confidence() {
        let ((x0, y0), (x1, y1)) = accuracy_line(&face(), 5.0);
        assert_relative_eq!(x0, 100.0);
        assert_relative_eq!(x1, 140.0);
        assert_relative_eq!(y0, 95.0);
        assert_relative_eq!(y1, 95.0);
    }

    #[test]
    fn test_label_sits_above_line() {
        let style = AnnotationStyle::default();
        assert_eq!(label_origin(&face(), &style, 12), (100, 81));
    }

    #[test]
    fn test_label_clamped_to_top_edge() {
        let style = AnnotationStyle::default();
        let d = DetectionResult::new(BoundingBox::new(10.0, 3.0, 20.0, 20.0), 0.9);
        assert_eq!(label_origin(&d, &style, 12).1, 0);
    }

    #[test]
    fn test_draw_detections_on_overlay() {
        let style = AnnotationStyle::default();
        let mut overlay = RgbaImage::new(200, 200);
        draw_detections(&mut overlay, &[face()], true, None, &style);

        let box_px = Rgba::<u8>::opaque(style.box_color);
        assert_eq!(*overlay.get_pixel(100, 120), box_px);
        assert_eq!(*overlay.get_pixel(149, 120), box_px);
        assert_eq!(overlay.get_pixel(130, 130).0[3], 0);
        assert_eq!(*overlay.get_pixel(120, 115), Rgba::<u8>::opaque(style.landmark_color));
        assert_eq!(*overlay.get_pixel(110, 95), Rgba::<u8>::opaque(style.accuracy_color));
        assert_eq!(overlay.get_pixel(145, 95).0[3], 0);
    }

    #[test]
    fn test_accuracy_label_drawn_above_line() {
        let style = AnnotationStyle::default();
        let font = LabelFont::bundled(16.0).unwrap();
        let d = DetectionResult::new(BoundingBox::new(300.0, 200.0, 100.0, 120.0), 0.9);
        let mut overlay = RgbaImage::new(640, 480);
        draw_detections(&mut overlay, &[d], false, Some(&font), &style);

        // Line sits on row 195; the label band is everything above it.
        let label_pixels: Vec<_> = (150..193)
            .flat_map(|y| (300..440).map(move |x| (x, y)))
            .map(|(x, y)| *overlay.get_pixel(x, y))
            .filter(|p| p.0[3] > 0)
            .collect();
        assert!(label_pixels.len() > 20);
        assert!(label_pixels.iter().any(|p| p.0[3] > 200 && p.0[1] > 150));
        assert!(label_pixels.iter().all(|p| p.0[0] == 0 && p.0[2] <= 80));
    }

    #[test]
    fn test_label_skipped_without_font() {
        let style = AnnotationStyle::default();
        let d = DetectionResult::new(BoundingBox::new(300.0, 200.0, 100.0, 120.0), 0.9);
        let mut overlay = RgbaImage::new(640, 480);
        draw_detections(&mut overlay, &[d], false, None, &style);
        assert!((150..193).all(|y| (300..440).all(|x| overlay.get_pixel(x, y).0[3] == 0)));
    }

    #[test]
    fn test_landmarks_skipped_when_not_supported() {
        let style = AnnotationStyle::default();
        let mut overlay = RgbaImage::new(200, 200);
        draw_detections(&mut overlay, &[face()], false, None, &style);
        assert_eq!(overlay.get_pixel(120, 115).0[3], 0);
    }

    #[test]
    fn test_accuracy_annotations_leave_box_undrawn() {
        let style = AnnotationStyle::default();
        let mut canvas = RgbImage::from_pixel(200, 200, Rgb([9, 9, 9]));
        draw_accuracy_annotations(&mut canvas, &[face()], None, &style);

        assert_eq!(*canvas.get_pixel(100, 120), Rgb([9, 9, 9]));
        assert_eq!(*canvas.get_pixel(110, 95), Rgb(style.accuracy_color));
    }

    #[test]
    fn test_box_outside_canvas_is_skipped() {
        let style = AnnotationStyle::default();
        let mut overlay = RgbaImage::new(50, 50);
        let d = DetectionResult::new(BoundingBox::new(300.0, 300.0, 20.0, 20.0), 0.5);
        draw_detections(&mut overlay, &[d], false, None, &style);
        assert!(overlay.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_rect_clamped_to_canvas() {
        let rect = rect_from_bbox(&BoundingBox::new(-10.0, -10.0, 40.0, 40.0), 100, 100).unwrap();
        assert_eq!((rect.left(), rect.top()), (0, 0));
        assert_eq!((rect.width(), rect.height()), (30, 30));
    }
}
