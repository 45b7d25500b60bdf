use image::{imageops::FilterType, DynamicImage, RgbImage};
use ndarray::{Array, Ix4};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Error decoding image: {0}")]
    InvalidImage(#[from] image::ImageError),
    #[error("Error decoding image: empty upload")]
    Empty,
}

/// Spatial size the classifier expects, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Decodes an uploaded image and forces it to 3-channel RGB.
pub fn decode(image_data: &[u8]) -> Result<RgbImage, PreprocessError> {
    if image_data.is_empty() {
        return Err(PreprocessError::Empty);
    }

    let image_reader = image::ImageReader::new(std::io::Cursor::new(image_data))
        .with_guessed_format()
        .map_err(|e| PreprocessError::InvalidImage(image::ImageError::IoError(e)))?;

    let decoded: DynamicImage = image_reader.decode()?;

    Ok(decoded.to_rgb8())
}

/// Resizes to `target` and scales channels to [0, 1].
///
/// The result is NHWC: `(1, height, width, 3)`.
pub fn prepare(image: &RgbImage, target: TargetSize) -> Array<f32, Ix4> {
    let resized = image::imageops::resize(
        image,
        target.width,
        target.height,
        FilterType::CatmullRom,
    );

    let mut input = Array::zeros((1, target.height as usize, target.width as usize, 3));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let (x, y) = (x as usize, y as usize);
        input[[0, y, x, 0]] = (r as f32) / 255.;
        input[[0, y, x, 1]] = (g as f32) / 255.;
        input[[0, y, x, 2]] = (b as f32) / 255.;
    }

    input
}
