use image::RgbImage;
use ndarray::ArrayView3;

use crate::shared::image_size::ImageSize;

/// A single camera/image frame: contiguous RGB bytes in row-major order.
///
/// Sources convert into this layout at their I/O boundary; everything
/// downstream (detection, annotation, capture) reads it as-is.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
}

pub const CHANNELS: usize = 3;

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
        }
    }

    /// Takes ownership of an `RgbImage` without copying its buffer.
    pub fn from_rgb_image(image: RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width, self.height)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .expect("Frame data length must match dimensions")
    }

    /// Returns the frame as an image of exactly `size`, resampling only
    /// when the dimensions differ.
    pub fn to_rgb_image_sized(&self, size: ImageSize) -> RgbImage {
        let image = self.to_rgb_image();
        if self.size() == size {
            return image;
        }
        image::imageops::resize(
            &image,
            size.width,
            size.height,
            image::imageops::FilterType::Triangle,
        )
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, CHANNELS),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }
}
