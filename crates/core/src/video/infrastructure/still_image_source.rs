use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;
use crate::shared::image_size::ImageSize;
use crate::video::domain::frame_source::FrameSource;

/// Replays a single image file as an endless stream of identical frames.
pub struct StillImageSource {
    path: PathBuf,
    frame: Option<Frame>,
    next_index: usize,
}

impl StillImageSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            frame: None,
            next_index: 0,
        }
    }
}

impl FrameSource for StillImageSource {
    fn open(&mut self, requested: ImageSize) -> Result<ImageSize, Box<dyn std::error::Error>> {
        let image = image::open(&self.path)
            .map_err(|e| format!("Failed to open image {}: {e}", self.path.display()))?
            .to_rgb8();
        let frame = Frame::from_rgb_image(image, 0);
        let size = frame.size();
        if size != requested {
            log::debug!(
                "{} is {size}, requested {requested}; frames keep native size",
                self.path.display()
            );
        }
        self.frame = Some(frame);
        self.next_index = 0;
        Ok(size)
    }

    fn read_frame(&mut self) -> Result<Frame, Box<dyn std::error::Error>> {
        let frame = self.frame.as_ref().ok_or("StillImageSource: not opened")?;
        let data = frame.data().to_vec();
        let out = Frame::new(data, frame.width(), frame.height(), self.next_index);
        self.next_index += 1;
        Ok(out)
    }

    fn close(&mut self) {
        self.frame = None;
    }

    fn is_open(&self) -> bool {
        self.frame.is_some()
    }
}
