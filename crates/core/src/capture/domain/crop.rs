use crate::shared::bounding_box::BoundingBox;
use crate::shared::image_size::ImageSize;

/// Integer pixel rectangle lying inside the canvas it was computed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Expands a face box by `padding` on every side, clamped to the canvas.
///
/// The origin is clamped at zero and the extent at the canvas size, then
/// clipped so the rect ends inside the canvas. A face near one edge yields
/// a smaller crop; the rect is never shifted to compensate. Returns `None`
/// for an empty canvas.
pub fn padded_crop(bbox: &BoundingBox, padding: u32, canvas: ImageSize) -> Option<CropRect> {
    if canvas.is_empty() {
        return None;
    }
    let pad = padding as f64;
    let canvas_w = canvas.width as f64;
    let canvas_h = canvas.height as f64;

    let x = (bbox.x - pad).max(0.0).round().min(canvas_w - 1.0);
    let y = (bbox.y - pad).max(0.0).round().min(canvas_h - 1.0);
    let w = (bbox.width + 2.0 * pad).min(canvas_w).min(canvas_w - x);
    let h = (bbox.height + 2.0 * pad).min(canvas_h).min(canvas_h - y);

    Some(CropRect::new(
        x as u32,
        y as u32,
        w.round().max(1.0) as u32,
        h.round().max(1.0) as u32,
    ))
}
