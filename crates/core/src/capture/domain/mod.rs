pub mod crop;
pub mod photo_sink;
