pub mod image_sequence_source;
pub mod still_image_source;
#[cfg(feature = "webcam")]
pub mod webcam_source;
