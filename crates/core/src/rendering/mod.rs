pub mod annotation;
pub mod label_font;
pub mod overlay;
