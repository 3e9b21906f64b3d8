use image::DynamicImage;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::guard::Guard;
use crate::pipeline::{Pipeline, PipelineContext};
use crate::vision::stages::{gaussian_blur, gray, mirror};

/// Settings for a command-line run, loadable from TOML.
///
/// ```toml
/// verbose = true
/// verify = "ignore"
/// gray = true
/// blur_sigma = 1.5
/// detector = "FAST"
/// extractor = "PATCH"
/// output_dir = "out"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub verbose: bool,
    pub verify: Guard,
    pub gray: bool,
    pub mirror: bool,
    pub blur_sigma: Option<f32>,
    pub detector: Option<String>,
    pub extractor: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub debug_dir: Option<PathBuf>,
}

impl RunConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: RunConfig =
            toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(sigma) = self.blur_sigma {
            if !(sigma.is_finite() && sigma > 0.0) {
                return Err(PipelineError::Config(format!(
                    "blur_sigma must be positive and finite, got {}",
                    sigma
                )));
            }
        }
        if self.extractor.is_some() && self.detector.is_none() {
            return Err(PipelineError::Config(
                "an extractor needs a detector".to_string(),
            ));
        }
        Ok(())
    }

    pub fn context(&self) -> PipelineContext {
        PipelineContext {
            verbose: self.verbose,
            verify: self.verify,
            debug: None,
        }
    }

    /// Preprocessing pipeline described by this config, in the fixed order
    /// gray, blur, mirror
    pub fn build_pipeline(&self) -> Pipeline<DynamicImage> {
        let mut pipeline = Pipeline::new().with_context(self.context());
        if self.gray {
            pipeline = pipeline.then(gray());
        }
        if let Some(sigma) = self.blur_sigma {
            pipeline = pipeline.then(gaussian_blur(sigma));
        }
        if self.mirror {
            pipeline = pipeline.then(mirror());
        }
        pipeline
    }
}
