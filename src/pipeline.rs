use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::frame::{Frame, FrameStore};
use crate::guard::Guard;

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
    /// Whether debug mode is enabled
    pub enabled: bool,
}

/// Context available to all pipeline stages
#[derive(Clone, Debug)]
pub struct PipelineContext {
    pub verbose: bool,
    /// Policy used when a pipeline loads its own inputs (batch runs)
    pub verify: Guard,
    pub debug: Option<DebugConfig>,
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self {
            verbose: false,
            verify: Guard::Enforce,
            debug: None,
        }
    }
}

/// A unit transform over a frame
pub trait PipelineStage<F>: Send + Sync {
    /// Consume a frame and return the transformed one
    fn process(&self, frame: F, context: &PipelineContext) -> Result<F>;

    /// Human-readable name for this stage (used in logs and debug output)
    fn name(&self) -> &str;
}

impl<F, S> PipelineStage<F> for Arc<S>
where
    S: PipelineStage<F> + ?Sized,
{
    fn process(&self, frame: F, context: &PipelineContext) -> Result<F> {
        (**self).process(frame, context)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// A stage backed by a closure, typically carrying bound parameters
pub struct FnStage<G> {
    name: String,
    func: G,
}

impl<F, G> PipelineStage<F> for FnStage<G>
where
    G: Fn(F) -> Result<F> + Send + Sync,
{
    fn process(&self, frame: F, _context: &PipelineContext) -> Result<F> {
        (self.func)(frame)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Wrap a closure as a named stage
pub fn stage<F, G>(name: impl Into<String>, func: G) -> FnStage<G>
where
    G: Fn(F) -> Result<F> + Send + Sync,
{
    FnStage {
        name: name.into(),
        func,
    }
}

/// Passes the frame through untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl<F> PipelineStage<F> for Identity {
    fn process(&self, frame: F, _context: &PipelineContext) -> Result<F> {
        Ok(frame)
    }

    fn name(&self) -> &str {
        "Identity"
    }
}

/// Runs an action and returns the frame unchanged
pub struct SideEffect<A> {
    name: String,
    action: A,
}

impl<F, A> PipelineStage<F> for SideEffect<A>
where
    A: Fn() + Send + Sync,
{
    fn process(&self, frame: F, _context: &PipelineContext) -> Result<F> {
        (self.action)();
        Ok(frame)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub fn side_effect<A>(name: impl Into<String>, action: A) -> SideEffect<A>
where
    A: Fn() + Send + Sync,
{
    SideEffect {
        name: name.into(),
        action,
    }
}

/// Observes the frame and returns it unchanged
pub struct Inspect<A> {
    name: String,
    observer: A,
}

impl<F, A> PipelineStage<F> for Inspect<A>
where
    A: Fn(&F) + Send + Sync,
{
    fn process(&self, frame: F, _context: &PipelineContext) -> Result<F> {
        (self.observer)(&frame);
        Ok(frame)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub fn inspect<F, A>(name: impl Into<String>, observer: A) -> Inspect<A>
where
    A: Fn(&F) + Send + Sync,
{
    Inspect {
        name: name.into(),
        observer,
    }
}

/// Reusable, ordered sequence of stages.
///
/// Building consumes and returns the pipeline, so a built pipeline is a plain
/// value: clone it to branch, invoke it as many times as needed.
pub struct Pipeline<F> {
    stages: Vec<Arc<dyn PipelineStage<F>>>,
    context: PipelineContext,
    debug_store: Option<Arc<dyn FrameStore<F>>>,
}

impl<F> Clone for Pipeline<F> {
    fn clone(&self) -> Self {
        Self {
            stages: self.stages.clone(),
            context: self.context.clone(),
            debug_store: self.debug_store.clone(),
        }
    }
}

impl<F: Frame> Pipeline<F> {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            context: PipelineContext::default(),
            debug_store: None,
        }
    }

    /// Start a pipeline from a single stage
    pub fn from_stage(stage: impl PipelineStage<F> + 'static) -> Self {
        Self::new().then(stage)
    }

    /// Enable verbose output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.context.verbose = verbose;
        self
    }

    /// Policy applied to frames this pipeline loads itself
    pub fn with_verify(mut self, verify: Guard) -> Self {
        self.context.verify = verify;
        self
    }

    /// Replace the whole context
    pub fn with_context(mut self, context: PipelineContext) -> Self {
        self.context = context;
        self
    }

    /// Enable debug mode with output directory.
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf, store: Arc<dyn FrameStore<F>>) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(PipelineError::Config(format!(
                    "debug directory is not empty: {}",
                    output_dir.display()
                )));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig {
            output_dir,
            enabled: true,
        });
        self.debug_store = Some(store);

        Ok(self)
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Append a stage. Combining a stage with a built pipeline always appends,
    /// whichever side the stage came from
    pub fn then(self, stage: impl PipelineStage<F> + 'static) -> Self {
        self.add_stage(Arc::new(stage))
    }

    /// Append a shared stage
    pub fn add_stage(mut self, stage: Arc<dyn PipelineStage<F>>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Helper method to add a stage from a Box
    pub fn add_stage_boxed(mut self, stage: Box<dyn PipelineStage<F>>) -> Self {
        self.stages.push(Arc::from(stage));
        self
    }

    /// Put a stage in front of the existing ones
    pub fn prepend(mut self, stage: impl PipelineStage<F> + 'static) -> Self {
        self.stages.insert(0, Arc::new(stage));
        self
    }

    /// Append every stage of another pipeline, keeping this pipeline's context
    pub fn extend(mut self, other: &Pipeline<F>) -> Self {
        self.stages.extend(other.stages.iter().cloned());
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order on the input frame
    pub fn run(&self, input: F) -> Result<F> {
        self.run_partial(input, self.stages.len())
    }

    /// Run the pipeline but stop after `num_stages` stages (useful for debugging)
    pub fn run_partial(&self, input: F, num_stages: usize) -> Result<F> {
        self.save_debug_frame(&input, "00_input")?;

        let mut frame = input;
        for (idx, stage) in self.stages.iter().take(num_stages).enumerate() {
            if self.context.verbose {
                info!(stage = stage.name(), index = idx + 1, "running stage");
            } else {
                debug!(stage = stage.name(), index = idx + 1, "running stage");
            }

            frame = match stage.process(frame, &self.context) {
                Ok(out) => out,
                Err(err) => {
                    if !err.is_end_of_stream() {
                        warn!(stage = stage.name(), error = %err, "stage failed, aborting invocation");
                    }
                    return Err(err);
                }
            };

            let step_dir_name = format!(
                "{:02}_{}",
                idx + 1,
                stage.name().to_lowercase().replace(' ', "_")
            );
            self.save_debug_frame(&frame, &step_dir_name)?;
        }

        Ok(frame)
    }

    fn save_debug_frame(&self, frame: &F, step_dir_name: &str) -> Result<()> {
        let (Some(debug_config), Some(store)) = (&self.context.debug, &self.debug_store) else {
            return Ok(());
        };
        if !debug_config.enabled || frame.is_empty() {
            return Ok(());
        }

        let step_dir = debug_config.output_dir.join(step_dir_name);
        std::fs::create_dir_all(&step_dir)?;
        let index = std::fs::read_dir(&step_dir)?.count() + 1;
        let output_path = step_dir.join(format!("{:02}.png", index));
        store.save(frame, &output_path)?;

        debug!(path = %display_relative(&output_path, &debug_config.output_dir), "saved debug frame");
        Ok(())
    }
}

impl<F: Frame> Default for Pipeline<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// A nested pipeline runs with the caller's context and never dumps debug frames
impl<F: Frame> PipelineStage<F> for Pipeline<F> {
    fn process(&self, frame: F, context: &PipelineContext) -> Result<F> {
        self.stages
            .iter()
            .try_fold(frame, |frame, stage| stage.process(frame, context))
    }

    fn name(&self) -> &str {
        "Pipeline"
    }
}

fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}
