use image::imageops::FilterType;
use image::DynamicImage;
use std::sync::Arc;

use crate::error::{PipelineError, Result};
use crate::frame::Frame;
use crate::pipeline::{PipelineContext, PipelineStage};
use crate::vision::preprocessing;

/// Empty frames flow through image stages untouched
fn unless_empty<G>(frame: DynamicImage, op: G) -> Result<DynamicImage>
where
    G: FnOnce(DynamicImage) -> Result<DynamicImage>,
{
    if frame.is_empty() {
        return Ok(frame);
    }
    op(frame)
}

/// Convert image to grey levels (three channels kept)
pub struct GrayscaleStage;

impl PipelineStage<DynamicImage> for GrayscaleStage {
    fn process(&self, frame: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        unless_empty(frame, |frame| Ok(preprocessing::to_gray_rgb(&frame)))
    }

    fn name(&self) -> &str {
        "Grayscale Conversion"
    }
}

/// Flip around the vertical axis
pub struct MirrorStage;

impl PipelineStage<DynamicImage> for MirrorStage {
    fn process(&self, frame: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        unless_empty(frame, |frame| Ok(frame.fliph()))
    }

    fn name(&self) -> &str {
        "Mirror"
    }
}

/// Apply Gaussian blur
pub struct BlurStage {
    pub sigma: f32,
}

impl PipelineStage<DynamicImage> for BlurStage {
    fn process(&self, frame: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(PipelineError::Config(format!(
                "blur sigma must be positive and finite, got {}",
                self.sigma
            )));
        }
        unless_empty(frame, |frame| {
            let gray = frame.to_luma8();
            Ok(DynamicImage::ImageLuma8(preprocessing::apply_blur(&gray, self.sigma)))
        })
    }

    fn name(&self) -> &str {
        "Gaussian Blur"
    }
}

/// Detect edges using Canny
pub struct EdgeDetectionStage {
    pub low_threshold: f32,
    pub high_threshold: f32,
}

impl PipelineStage<DynamicImage> for EdgeDetectionStage {
    fn process(&self, frame: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        unless_empty(frame, |frame| {
            let gray = frame.to_luma8();
            let edges = preprocessing::detect_edges(&gray, self.low_threshold, self.high_threshold);
            Ok(DynamicImage::ImageLuma8(edges))
        })
    }

    fn name(&self) -> &str {
        "Edge Detection"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Morphology {
    Dilate,
    Erode,
}

pub struct MorphologyStage {
    pub operation: Morphology,
    pub radius: u8,
}

impl PipelineStage<DynamicImage> for MorphologyStage {
    fn process(&self, frame: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        unless_empty(frame, |frame| {
            let gray = frame.to_luma8();
            let out = match self.operation {
                Morphology::Dilate => preprocessing::dilate(&gray, self.radius),
                Morphology::Erode => preprocessing::erode(&gray, self.radius),
            };
            Ok(DynamicImage::ImageLuma8(out))
        })
    }

    fn name(&self) -> &str {
        match self.operation {
            Morphology::Dilate => "Dilate",
            Morphology::Erode => "Erode",
        }
    }
}

pub struct ThresholdStage {
    pub level: u8,
}

impl PipelineStage<DynamicImage> for ThresholdStage {
    fn process(&self, frame: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        unless_empty(frame, |frame| {
            let gray = frame.to_luma8();
            Ok(DynamicImage::ImageLuma8(preprocessing::binarize(&gray, self.level)))
        })
    }

    fn name(&self) -> &str {
        "Threshold"
    }
}

pub struct SobelStage;

impl PipelineStage<DynamicImage> for SobelStage {
    fn process(&self, frame: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        unless_empty(frame, |frame| {
            let gray = frame.to_luma8();
            Ok(DynamicImage::ImageLuma8(preprocessing::sobel(&gray)))
        })
    }

    fn name(&self) -> &str {
        "Sobel"
    }
}

pub struct EqualizeStage;

impl PipelineStage<DynamicImage> for EqualizeStage {
    fn process(&self, frame: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        unless_empty(frame, |frame| {
            let gray = frame.to_luma8();
            Ok(DynamicImage::ImageLuma8(preprocessing::equalize(&gray)))
        })
    }

    fn name(&self) -> &str {
        "Equalize Histogram"
    }
}

/// Resize to an exact size
pub struct ResizeStage {
    pub width: u32,
    pub height: u32,
}

impl PipelineStage<DynamicImage> for ResizeStage {
    fn process(&self, frame: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        unless_empty(frame, |frame| {
            Ok(frame.resize_exact(self.width, self.height, FilterType::CatmullRom))
        })
    }

    fn name(&self) -> &str {
        "Resize"
    }
}

/// Subtract a fixed image from every frame
pub struct SubtractStage {
    pub other: Arc<DynamicImage>,
}

impl PipelineStage<DynamicImage> for SubtractStage {
    fn process(&self, frame: DynamicImage, _context: &PipelineContext) -> Result<DynamicImage> {
        unless_empty(frame, |frame| {
            let out = preprocessing::subtract(&frame.to_luma8(), &self.other.to_luma8())?;
            Ok(DynamicImage::ImageLuma8(out))
        })
    }

    fn name(&self) -> &str {
        "Subtract"
    }
}

pub fn gray() -> GrayscaleStage {
    GrayscaleStage
}

pub fn mirror() -> MirrorStage {
    MirrorStage
}

pub fn gaussian_blur(sigma: f32) -> BlurStage {
    BlurStage { sigma }
}

pub fn canny(low_threshold: f32, high_threshold: f32) -> EdgeDetectionStage {
    EdgeDetectionStage {
        low_threshold,
        high_threshold,
    }
}

pub fn dilate(radius: u8) -> MorphologyStage {
    MorphologyStage {
        operation: Morphology::Dilate,
        radius,
    }
}

pub fn erode(radius: u8) -> MorphologyStage {
    MorphologyStage {
        operation: Morphology::Erode,
        radius,
    }
}

pub fn threshold(level: u8) -> ThresholdStage {
    ThresholdStage { level }
}

pub fn sobel() -> SobelStage {
    SobelStage
}

pub fn equalize_histogram() -> EqualizeStage {
    EqualizeStage
}

pub fn resize(width: u32, height: u32) -> ResizeStage {
    ResizeStage { width, height }
}

pub fn subtract(other: DynamicImage) -> SubtractStage {
    SubtractStage {
        other: Arc::new(other),
    }
}
