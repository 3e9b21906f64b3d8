use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::pipeline::{PipelineContext, PipelineStage};

/// The data item a pipeline transforms.
///
/// A frame is either valid or in an explicit empty state. Stages take frames
/// by value and hand back a new one.
pub trait Frame: Clone + Send + 'static {
    /// The empty sentinel, returned by failed loads and saves
    fn empty() -> Self;

    fn is_empty(&self) -> bool;
}

impl Frame for DynamicImage {
    fn empty() -> Self {
        DynamicImage::new_rgb8(0, 0)
    }

    fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Load/save collaborator for frames kept in durable storage
pub trait FrameStore<F>: Send + Sync {
    /// Load a frame. Never fails: a missing or undecodable resource yields `F::empty()`.
    fn load(&self, path: &Path) -> F;

    /// Persist a frame
    fn save(&self, frame: &F, path: &Path) -> Result<()>;
}

/// Writes the frame and passes it on; a failed write yields `F::empty()`
pub struct Save<F> {
    store: Arc<dyn FrameStore<F>>,
    path: PathBuf,
    name: String,
}

impl<F: Frame> PipelineStage<F> for Save<F> {
    fn process(&self, frame: F, _context: &PipelineContext) -> Result<F> {
        match self.store.save(&frame, &self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "saved frame");
                Ok(frame)
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to save frame");
                Ok(F::empty())
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub fn save<F: Frame>(store: Arc<dyn FrameStore<F>>, path: impl Into<PathBuf>) -> Save<F> {
    let path = path.into();
    let name = format!("Save {}", path.display());
    Save { store, path, name }
}
