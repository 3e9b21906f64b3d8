//! Pull-based frame sources and the driver that plays them through a pipeline.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::batch::{list_directory, IMAGE_EXTENSIONS};
use crate::error::{PipelineError, Result};
use crate::frame::{Frame, FrameStore};
use crate::guard::Guard;
use crate::pipeline::Pipeline;

/// A live capture backend (video file, camera, image sequence)
pub trait Capture<F>: Send {
    /// Block until the next frame is available; `None` once there is no more data
    fn grab(&mut self) -> Result<Option<F>>;
}

/// Opens capture devices by numeric id
pub trait DeviceOpener<F> {
    fn open(&self, device: u32) -> std::result::Result<Box<dyn Capture<F>>, String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Opened,
    /// Open failed; the error string is kept for inspection
    Failed,
    /// A pull found no more data
    Exhausted,
}

/// Outcome of driving a source to the end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayReport {
    /// Number of pipeline invocations, including a cancelled one
    pub invocations: u64,
    /// A stage raised the end-of-stream signal before the source ran dry
    pub cancelled: bool,
}

/// Exclusively owned sequential frame source
pub struct StreamSource<F> {
    name: String,
    capture: Option<Box<dyn Capture<F>>>,
    state: StreamState,
    last_error: Option<String>,
    frames_pulled: u64,
}

impl<F: Frame> StreamSource<F> {
    pub fn from_capture(name: impl Into<String>, capture: impl Capture<F> + 'static) -> Self {
        Self::from_boxed(name, Box::new(capture))
    }

    pub fn from_boxed(name: impl Into<String>, capture: Box<dyn Capture<F>>) -> Self {
        let name = name.into();
        debug!(source = %name, "opened stream source");
        Self {
            name,
            capture: Some(capture),
            state: StreamState::Opened,
            last_error: None,
            frames_pulled: 0,
        }
    }

    /// A source whose open attempt failed
    pub fn failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        let name = name.into();
        let reason = reason.into();
        warn!(source = %name, reason = %reason, "failed to open stream source");
        Self {
            name,
            capture: None,
            state: StreamState::Failed,
            last_error: Some(reason),
            frames_pulled: 0,
        }
    }

    pub fn open_device(opener: &dyn DeviceOpener<F>, device: u32) -> Self {
        let name = format!("device {}", device);
        match opener.open(device) {
            Ok(capture) => Self::from_boxed(name, capture),
            Err(reason) => Self::failed(name, reason),
        }
    }

    /// Play the image files of a directory, in name order, as a stream
    pub fn open_sequence(store: Arc<dyn FrameStore<F>>, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let name = dir.display().to_string();
        match list_directory(dir, IMAGE_EXTENSIONS) {
            Ok(paths) => Self::from_capture(name, FileSequence::new(store, paths)),
            Err(err) => Self::failed(name, err.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.state == StreamState::Opened
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn frames_pulled(&self) -> u64 {
        self.frames_pulled
    }

    /// Check the open state against a policy
    pub fn guard(&mut self, guard: Guard) -> Result<&mut Self> {
        if guard.is_enforced() && self.state == StreamState::Failed {
            return Err(PipelineError::SourceUnavailable {
                reason: self.last_error.clone().unwrap_or_default(),
            });
        }
        Ok(self)
    }

    /// Next frame, or `StreamExhausted` once the source has run dry
    pub fn pull(&mut self) -> Result<F> {
        match self.state {
            StreamState::Failed => {
                return Err(PipelineError::SourceUnavailable {
                    reason: self.last_error.clone().unwrap_or_default(),
                });
            }
            StreamState::Exhausted => return Err(PipelineError::StreamExhausted),
            StreamState::Opened => {}
        }

        let grabbed = match self.capture.as_mut() {
            Some(capture) => capture.grab()?,
            None => None,
        };

        match grabbed {
            Some(frame) if !frame.is_empty() => {
                self.frames_pulled += 1;
                Ok(frame)
            }
            _ => {
                debug!(source = %self.name, frames = self.frames_pulled, "stream exhausted");
                self.state = StreamState::Exhausted;
                self.capture = None;
                Err(PipelineError::StreamExhausted)
            }
        }
    }

    /// Pull every frame through the pipeline until the source or a stage
    /// signals end of stream
    pub fn drive(&mut self, pipeline: &Pipeline<F>) -> Result<PlayReport> {
        let mut invocations = 0;
        loop {
            let frame = match self.pull() {
                Ok(frame) => frame,
                Err(err) if err.is_end_of_stream() => {
                    info!(source = %self.name, invocations, "playback finished");
                    return Ok(PlayReport {
                        invocations,
                        cancelled: false,
                    });
                }
                Err(err) => return Err(err),
            };

            invocations += 1;
            match pipeline.run(frame) {
                Ok(_) => {}
                Err(err) if err.is_end_of_stream() => {
                    info!(source = %self.name, invocations, "playback cancelled by stage");
                    return Ok(PlayReport {
                        invocations,
                        cancelled: true,
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Drive to the end; true when playback terminated through end of stream
    pub fn play(&mut self, pipeline: &Pipeline<F>) -> Result<bool> {
        self.drive(pipeline).map(|_| true)
    }
}

impl<F> Drop for StreamSource<F> {
    fn drop(&mut self) {
        if self.capture.take().is_some() {
            debug!(source = %self.name, "closed stream source");
        }
    }
}

/// Image files replayed in order; unreadable files are skipped
pub struct FileSequence<F> {
    store: Arc<dyn FrameStore<F>>,
    paths: VecDeque<PathBuf>,
}

impl<F> FileSequence<F> {
    pub fn new(store: Arc<dyn FrameStore<F>>, paths: Vec<PathBuf>) -> Self {
        Self {
            store,
            paths: paths.into(),
        }
    }
}

impl<F: Frame> Capture<F> for FileSequence<F> {
    fn grab(&mut self) -> Result<Option<F>> {
        while let Some(path) = self.paths.pop_front() {
            let frame = self.store.load(&path);
            if frame.is_empty() {
                warn!(path = %path.display(), "skipping unreadable frame");
                continue;
            }
            return Ok(Some(frame));
        }
        Ok(None)
    }
}
