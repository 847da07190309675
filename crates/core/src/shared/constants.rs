use crate::shared::image_size::ImageSize;

pub const DEFAULT_MODEL_FILE: &str = "yolo11n-pose_widerface.onnx";
pub const DEFAULT_MODEL_BASE_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0";

/// Display size of the video surface; overlay and capture canvas match it.
pub const DISPLAY_SIZE: ImageSize = ImageSize::new(640, 480);

/// Fixed dimensions of the captured passport photo.
pub const PASSPORT_SIZE: ImageSize = ImageSize::new(400, 500);

/// Margin added around the primary face before cropping.
pub const CROP_PADDING: u32 = 40;

pub const PASSPORT_FILE_NAME: &str = "passport_photo.png";

/// Capture is offered only when some face scores strictly above this.
pub const CAPTURE_CONFIDENCE_THRESHOLD: f64 = 0.7;

pub const TICK_INTERVAL_MS: u64 = 100;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
