use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::frame::Frame;
use crate::pipeline::{PipelineContext, PipelineStage};

pub const KEY_ESCAPE: i32 = 27;

/// Escape, `q` or `Q`
pub fn is_quit_key(key: i32) -> bool {
    key == KEY_ESCAPE || key == 'q' as i32 || key == 'Q' as i32
}

/// Window collaborator used while driving streams
pub trait FrameDisplay<F>: Send + Sync {
    fn show(&self, window: &str, frame: &F) -> Result<()>;

    /// Wait up to `delay_ms` (0 = forever) for a key press
    fn wait_key(&self, delay_ms: u32) -> Option<i32>;
}

/// Display without a window: counts frames and replays scripted key presses
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    keys: Mutex<VecDeque<Option<i32>>>,
    shown: AtomicUsize,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys returned by successive `wait_key` calls; `None` means no key pressed
    pub fn with_keys(keys: impl IntoIterator<Item = Option<i32>>) -> Self {
        Self {
            keys: Mutex::new(keys.into_iter().collect()),
            shown: AtomicUsize::new(0),
        }
    }

    pub fn shown(&self) -> usize {
        self.shown.load(Ordering::SeqCst)
    }
}

impl<F: Frame> FrameDisplay<F> for HeadlessDisplay {
    fn show(&self, window: &str, _frame: &F) -> Result<()> {
        let count = self.shown.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(window, count, "frame shown");
        Ok(())
    }

    fn wait_key(&self, _delay_ms: u32) -> Option<i32> {
        self.keys.lock().ok()?.pop_front().flatten()
    }
}

/// Shows the frame in a window and passes it on
pub struct Show<F> {
    display: Arc<dyn FrameDisplay<F>>,
    window: String,
    name: String,
}

impl<F: Frame> PipelineStage<F> for Show<F> {
    fn process(&self, frame: F, _context: &PipelineContext) -> Result<F> {
        self.display.show(&self.window, &frame)?;
        Ok(frame)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub fn show<F: Frame>(display: Arc<dyn FrameDisplay<F>>, window: impl Into<String>) -> Show<F> {
    let window = window.into();
    let name = format!("Show {}", window);
    Show {
        display,
        window,
        name,
    }
}

/// Waits for a key; raises the end-of-stream signal when `cancel` accepts it
pub struct WaitKey<F, C> {
    display: Arc<dyn FrameDisplay<F>>,
    delay_ms: u32,
    cancel: C,
}

impl<F, C> PipelineStage<F> for WaitKey<F, C>
where
    F: Frame,
    C: Fn(i32) -> bool + Send + Sync,
{
    fn process(&self, frame: F, _context: &PipelineContext) -> Result<F> {
        if let Some(key) = self.display.wait_key(self.delay_ms) {
            if (self.cancel)(key) {
                debug!(key, "cancel key pressed");
                return Err(PipelineError::StreamExhausted);
            }
        }
        Ok(frame)
    }

    fn name(&self) -> &str {
        "Wait Key"
    }
}

pub fn wait_key<F, C>(display: Arc<dyn FrameDisplay<F>>, delay_ms: u32, cancel: C) -> WaitKey<F, C>
where
    F: Frame,
    C: Fn(i32) -> bool + Send + Sync,
{
    WaitKey {
        display,
        delay_ms,
        cancel,
    }
}
