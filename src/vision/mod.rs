//! Image collaborator layer: loading and saving with the `image` crate,
//! stages and feature strategies built on `imageproc`.

pub mod detectors;
pub mod extractors;
pub mod preprocessing;
pub mod stages;

use image::{DynamicImage, ImageReader};
use std::path::Path;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::features::StrategyRegistry;
use crate::frame::{Frame, FrameStore};
use detectors::{ComponentDetector, ContourDetector, FastDetector};
use extractors::{MomentsExtractor, PatchExtractor};

/// Reads and writes image files; the format follows the file extension
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageStore;

impl FrameStore<DynamicImage> for ImageStore {
    fn load(&self, path: &Path) -> DynamicImage {
        let decoded = ImageReader::open(path)
            .map_err(PipelineError::from)
            .and_then(|reader| reader.with_guessed_format().map_err(PipelineError::from))
            .and_then(|reader| reader.decode().map_err(PipelineError::from));

        match decoded {
            Ok(img) => img,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "failed to load image");
                DynamicImage::empty()
            }
        }
    }

    fn save(&self, frame: &DynamicImage, path: &Path) -> Result<()> {
        if frame.is_empty() {
            return Err(PipelineError::InvalidFrame);
        }
        frame.save(path)?;
        Ok(())
    }
}

/// Predicate on the number of colour channels
pub fn has_channels(count: u8) -> impl Fn(&DynamicImage) -> bool + Send + Sync {
    move |img: &DynamicImage| img.color().channel_count() == count
}

/// Registry with the built-in image strategies: detectors `FAST`, `CONTOURS`,
/// `COMPONENTS`; extractors `PATCH`, `MOMENTS`
pub fn builtin_registry() -> StrategyRegistry<DynamicImage> {
    StrategyRegistry::new()
        .with_detector("FAST", FastDetector::default())
        .with_detector("CONTOURS", ContourDetector::default())
        .with_detector("COMPONENTS", ComponentDetector::default())
        .with_extractor("PATCH", PatchExtractor::default())
        .with_extractor("MOMENTS", MomentsExtractor)
}
