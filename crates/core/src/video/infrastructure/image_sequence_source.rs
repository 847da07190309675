use std::fs;
use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::shared::image_size::ImageSize;
use crate::video::domain::frame_source::FrameSource;

/// Plays a directory of images in file-name order, looping at the end.
///
/// Frame indices keep counting across loops.
pub struct ImageSequenceSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next_index: usize,
}

impl ImageSequenceSource {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            files: Vec::new(),
            next_index: 0,
        }
    }

    fn list_images(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| format!("Failed to read {}: {e}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        files.sort();
        Ok(files)
    }
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self, requested: ImageSize) -> Result<ImageSize, Box<dyn std::error::Error>> {
        let files = Self::list_images(&self.dir)?;
        let first = files
            .first()
            .ok_or_else(|| format!("No images found in {}", self.dir.display()))?;
        let (width, height) = image::image_dimensions(first)?;
        log::info!(
            "Replaying {} images from {} (requested {requested})",
            files.len(),
            self.dir.display()
        );
        self.files = files;
        self.next_index = 0;
        Ok(ImageSize::new(width, height))
    }

    fn read_frame(&mut self) -> Result<Frame, Box<dyn std::error::Error>> {
        if self.files.is_empty() {
            return Err("ImageSequenceSource: not opened".into());
        }
        let path = &self.files[self.next_index % self.files.len()];
        let image = image::open(path)
            .map_err(|e| format!("Failed to decode {}: {e}", path.display()))?
            .to_rgb8();
        let frame = Frame::from_rgb_image(image, self.next_index);
        self.next_index += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        self.files.clear();
    }

    fn is_open(&self) -> bool {
        !self.files.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_image(dir: &Path, name: &str, value: u8) {
        image::RgbImage::from_pixel(8, 6, image::Rgb([value, value, value]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_plays_in_name_order_and_loops() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "b.png", 20);
        write_image(dir.path(), "a.png", 10);
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = ImageSequenceSource::new(dir.path());
        let size = source.open(ImageSize::new(640, 480)).unwrap();
        assert_eq!(size, ImageSize::new(8, 6));

        let values: Vec<(usize, u8)> = (0..3)
            .map(|_| {
                let f = source.read_frame().unwrap();
                (f.index(), f.data()[0])
            })
            .collect();
        assert_eq!(values, vec![(0, 10), (1, 20), (2, 10)]);
    }

    #[test]
    fn test_empty_directory_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ImageSequenceSource::new(dir.path());
        assert!(source.open(ImageSize::new(640, 480)).is_err());
        assert!(!source.is_open());
    }

    #[test]
    fn test_read_after_close_errors() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "a.png", 10);
        let mut source = ImageSequenceSource::new(dir.path());
        source.open(ImageSize::new(8, 6)).unwrap();
        source.close();
        assert!(source.read_frame().is_err());
    }

    #[test]
    fn test_is_image_is_case_insensitive() {
        assert!(is_image(Path::new("frame.PNG")));
        assert!(is_image(Path::new("frame.jpeg")));
        assert!(!is_image(Path::new("frame.mp4")));
        assert!(!is_image(Path::new("frame")));
    }
}
