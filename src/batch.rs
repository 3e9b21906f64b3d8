use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::frame::{Frame, FrameStore};
use crate::pipeline::{Pipeline, PipelineContext, PipelineStage};

/// File extensions treated as images when listing a directory
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "webp"];

/// Files in `dir` with one of `extensions` (case-insensitive), sorted by path
pub fn list_directory(dir: impl AsRef<Path>, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if matches {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// A collection of sources that can be pushed through a pipeline, producing
/// a collection of the same shape
pub trait Batch<F: Frame> {
    type Output;

    /// Load each source under the pipeline's verify policy and run it, in order
    fn run_batch<S>(self, store: &S, pipeline: &Pipeline<F>) -> Result<Self::Output>
    where
        S: FrameStore<F> + ?Sized;
}

fn run_one<F, S>(store: &S, pipeline: &Pipeline<F>, path: &Path) -> Result<F>
where
    F: Frame,
    S: FrameStore<F> + ?Sized,
{
    debug!(path = %path.display(), "batch element");
    let frame = pipeline.context().verify.load(store, path)?;
    pipeline.run(frame)
}

/// Runs every path; a stage raising end of stream stops the batch early and
/// keeps what was already produced
fn run_all<F, S, P>(paths: &[P], store: &S, pipeline: &Pipeline<F>) -> Result<Vec<F>>
where
    F: Frame,
    S: FrameStore<F> + ?Sized,
    P: AsRef<Path>,
{
    let mut processed = Vec::with_capacity(paths.len());
    for path in paths {
        match run_one(store, pipeline, path.as_ref()) {
            Ok(frame) => processed.push(frame),
            Err(err) if err.is_end_of_stream() => {
                info!(done = processed.len(), total = paths.len(), "batch stopped by end of stream");
                break;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(processed)
}

impl<F: Frame, P: AsRef<Path>> Batch<F> for Vec<P> {
    type Output = Vec<F>;

    fn run_batch<S>(self, store: &S, pipeline: &Pipeline<F>) -> Result<Vec<F>>
    where
        S: FrameStore<F> + ?Sized,
    {
        run_all(&self, store, pipeline)
    }
}

impl<F: Frame, P: AsRef<Path>> Batch<F> for &[P] {
    type Output = Vec<F>;

    fn run_batch<S>(self, store: &S, pipeline: &Pipeline<F>) -> Result<Vec<F>>
    where
        S: FrameStore<F> + ?Sized,
    {
        run_all(self, store, pipeline)
    }
}

/// Fixed-size batches cannot shrink, so end of stream is an error here
impl<F: Frame, P: AsRef<Path>, const N: usize> Batch<F> for [P; N] {
    type Output = [F; N];

    fn run_batch<S>(self, store: &S, pipeline: &Pipeline<F>) -> Result<[F; N]>
    where
        S: FrameStore<F> + ?Sized,
    {
        let processed = self
            .iter()
            .map(|path| run_one(store, pipeline, path.as_ref()))
            .collect::<Result<Vec<F>>>()?;
        processed.try_into().map_err(|rest: Vec<F>| {
            PipelineError::Other(anyhow::anyhow!(
                "batch produced {} frames for {} sources",
                rest.len(),
                N
            ))
        })
    }
}

enum Values<V> {
    Fixed(Arc<Vec<V>>),
    Shared(Arc<Mutex<Vec<V>>>),
}

/// Folds `(accumulator, index, value)` over a value collection
pub struct ForEach<V, G> {
    values: Values<V>,
    func: G,
}

impl<F, V, G> PipelineStage<F> for ForEach<V, G>
where
    V: Clone + Send + Sync,
    G: Fn(F, usize, &V) -> Result<F> + Send + Sync,
{
    fn process(&self, frame: F, _context: &PipelineContext) -> Result<F> {
        let snapshot;
        let values: &[V] = match &self.values {
            Values::Fixed(values) => values,
            Values::Shared(shared) => {
                snapshot = shared
                    .lock()
                    .map_err(|_| anyhow::anyhow!("foreach values lock poisoned"))?
                    .clone();
                &snapshot
            }
        };

        values
            .iter()
            .enumerate()
            .try_fold(frame, |acc, (index, value)| (self.func)(acc, index, value))
    }

    fn name(&self) -> &str {
        "For Each"
    }
}

/// Fold over a fixed set of values
pub fn foreach<F, V, G>(values: Vec<V>, func: G) -> ForEach<V, G>
where
    V: Clone + Send + Sync,
    G: Fn(F, usize, &V) -> Result<F> + Send + Sync,
{
    ForEach {
        values: Values::Fixed(Arc::new(values)),
        func,
    }
}

/// Fold over a list read at invocation time, so earlier stages may fill it
pub fn foreach_shared<F, V, G>(values: Arc<Mutex<Vec<V>>>, func: G) -> ForEach<V, G>
where
    V: Clone + Send + Sync,
    G: Fn(F, usize, &V) -> Result<F> + Send + Sync,
{
    ForEach {
        values: Values::Shared(values),
        func,
    }
}
