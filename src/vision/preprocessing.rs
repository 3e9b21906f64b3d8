use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::equalize_histogram;
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::gradients::sobel_gradients;
use imageproc::morphology;

use crate::error::{PipelineError, Result};

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Grey levels, kept in a three-channel image so colour stages still apply
pub fn to_gray_rgb(img: &DynamicImage) -> DynamicImage {
    DynamicImage::ImageRgb8(DynamicImage::ImageLuma8(img.to_luma8()).to_rgb8())
}

/// Apply Gaussian blur to reduce noise
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

/// Detect edges using Canny edge detector
pub fn detect_edges(img: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    canny(img, low_threshold, high_threshold)
}

/// Grow bright regions by `radius` pixels (square structuring element)
pub fn dilate(img: &GrayImage, radius: u8) -> GrayImage {
    morphology::dilate(img, Norm::LInf, radius)
}

/// Shrink bright regions by `radius` pixels (square structuring element)
pub fn erode(img: &GrayImage, radius: u8) -> GrayImage {
    morphology::erode(img, Norm::LInf, radius)
}

/// Binary threshold: pixels above `level` become white, the rest black
pub fn binarize(img: &GrayImage, level: u8) -> GrayImage {
    let mut out = img.clone();
    for pixel in out.pixels_mut() {
        pixel[0] = if pixel[0] > level { 255 } else { 0 };
    }
    out
}

/// Sobel gradient magnitude, saturated to 8 bits
pub fn sobel(img: &GrayImage) -> GrayImage {
    let gradients = sobel_gradients(img);
    let (width, height) = gradients.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        Luma([gradients.get_pixel(x, y)[0].min(255) as u8])
    })
}

pub fn equalize(img: &GrayImage) -> GrayImage {
    equalize_histogram(img)
}

/// Saturating per-pixel `a - b`
pub fn subtract(a: &GrayImage, b: &GrayImage) -> Result<GrayImage> {
    if a.dimensions() != b.dimensions() {
        return Err(PipelineError::Other(anyhow::anyhow!(
            "cannot subtract a {}x{} image from a {}x{} image",
            b.width(),
            b.height(),
            a.width(),
            a.height()
        )));
    }
    let (width, height) = a.dimensions();
    Ok(GrayImage::from_fn(width, height, |x, y| {
        Luma([a.get_pixel(x, y)[0].saturating_sub(b.get_pixel(x, y)[0])])
    }))
}
