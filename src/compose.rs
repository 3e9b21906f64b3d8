//! Eager composition: apply stages, guards, pipelines and detectors to a
//! frame one call at a time.
//!
//! ```no_run
//! use framepipe::{Guard, ImageStore, Pipe};
//! use framepipe::vision::stages::{gray, mirror};
//! use image::DynamicImage;
//!
//! # fn main() -> framepipe::Result<()> {
//! let loaded: DynamicImage = Guard::Enforce.load(&ImageStore, "monalisa.jpg")?;
//! let frame = loaded
//!     .pipe(&gray())?
//!     .pipe(&mirror())?
//!     .guard(Guard::Enforce)?;
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::features::{Detected, StrategyRegistry};
use crate::frame::Frame;
use crate::guard::Guard;
use crate::pipeline::{Pipeline, PipelineContext, PipelineStage};

/// Chaining operations available on every frame
pub trait Pipe: Frame + Sized {
    /// Apply a stage immediately
    fn pipe<S>(self, stage: &S) -> Result<Self>
    where
        S: PipelineStage<Self> + ?Sized,
    {
        stage.process(self, &PipelineContext::default())
    }

    /// Apply a guard's policy to this frame
    fn guard(self, guard: Guard) -> Result<Self> {
        guard.check(self)
    }

    /// Invoke a persistent pipeline on this frame
    fn run(self, pipeline: &Pipeline<Self>) -> Result<Self> {
        pipeline.run(self)
    }

    /// Run a named detector, entering the detected state
    fn detect(self, registry: &StrategyRegistry<Self>, detector: &str) -> Result<Detected<Self>> {
        registry.detect(detector, self)
    }
}

impl<F: Frame> Pipe for F {}
