pub mod bounding_box;
pub mod config;
pub mod constants;
pub mod frame;
pub mod image_size;
