/// Destination for encoded passport photos.
pub trait PhotoSink: Send {
    /// Hands over PNG bytes under the given file name.
    fn deliver(&self, file_name: &str, png: &[u8]) -> Result<(), Box<dyn std::error::Error>>;
}
