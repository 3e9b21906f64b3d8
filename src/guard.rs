use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::frame::{Frame, FrameStore};
use crate::pipeline::{PipelineContext, PipelineStage};

/// Validation policy for loads and frames.
///
/// `Enforce` turns an empty frame into a typed failure, `Ignore` lets it flow
/// on as data and leaves the caller to inspect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Guard {
    #[default]
    Enforce,
    Ignore,
}

impl Guard {
    pub fn is_enforced(self) -> bool {
        self == Guard::Enforce
    }

    /// Apply the policy to a frame's validity state
    pub fn check<F: Frame>(self, frame: F) -> Result<F> {
        if self.is_enforced() && frame.is_empty() {
            return Err(PipelineError::InvalidFrame);
        }
        Ok(frame)
    }

    /// Load a resource and apply the policy to the outcome
    pub fn load<F, S>(self, store: &S, path: impl AsRef<Path>) -> Result<F>
    where
        F: Frame,
        S: FrameStore<F> + ?Sized,
    {
        let path = path.as_ref();
        let frame = store.load(path);
        if frame.is_empty() {
            debug!(path = %path.display(), policy = ?self, "load produced an empty frame");
            if self.is_enforced() {
                return Err(PipelineError::ResourceNotFound {
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(frame)
    }
}

impl<F: Frame> PipelineStage<F> for Guard {
    fn process(&self, frame: F, _context: &PipelineContext) -> Result<F> {
        self.check(frame)
    }

    fn name(&self) -> &str {
        match self {
            Guard::Enforce => "Verify",
            Guard::Ignore => "No Verify",
        }
    }
}
