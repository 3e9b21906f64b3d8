use framepipe::{stage, Capture, Frame, FrameStore, PipelineError, PipelineStage, Result};
use image::{DynamicImage, Rgb, RgbImage};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Minimal frame for combinator tests: stages append numbers, so the
/// resulting tape records the order they ran in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tape(pub Vec<i32>);

impl Tape {
    pub fn of(values: &[i32]) -> Self {
        Tape(values.to_vec())
    }
}

impl Frame for Tape {
    fn empty() -> Self {
        Tape(Vec::new())
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Appends `value` to the tape
pub fn push(value: i32) -> impl PipelineStage<Tape> {
    stage(format!("Push {}", value), move |mut tape: Tape| {
        tape.0.push(value);
        Ok(tape)
    })
}

/// Multiplies every entry by `factor`
pub fn scale(factor: i32) -> impl PipelineStage<Tape> {
    stage(format!("Scale {}", factor), move |tape: Tape| {
        Ok(Tape(tape.0.into_iter().map(|v| v * factor).collect()))
    })
}

/// Always fails
pub fn boom() -> impl PipelineStage<Tape> {
    stage("Boom", |_tape: Tape| -> Result<Tape> {
        Err(PipelineError::Other(anyhow::anyhow!("boom")))
    })
}

/// In-memory frame store; paths under `/readonly` refuse writes
#[derive(Default)]
pub struct MemoryStore {
    frames: Mutex<HashMap<PathBuf, Tape>>,
}

impl MemoryStore {
    pub fn with(entries: &[(&str, Tape)]) -> Self {
        let frames = entries
            .iter()
            .map(|(path, tape)| (PathBuf::from(path), tape.clone()))
            .collect();
        Self {
            frames: Mutex::new(frames),
        }
    }

    pub fn get(&self, path: &str) -> Option<Tape> {
        self.frames.lock().unwrap().get(Path::new(path)).cloned()
    }
}

impl FrameStore<Tape> for MemoryStore {
    fn load(&self, path: &Path) -> Tape {
        self.frames
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_else(Tape::empty)
    }

    fn save(&self, frame: &Tape, path: &Path) -> Result<()> {
        if path.starts_with("/readonly") {
            return Err(PipelineError::Other(anyhow::anyhow!("read-only location")));
        }
        self.frames
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), frame.clone());
        Ok(())
    }
}

/// Capture that replays a fixed list of frames
pub struct VecCapture<F> {
    frames: VecDeque<F>,
}

impl<F> VecCapture<F> {
    pub fn new(frames: Vec<F>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

impl<F: Frame> Capture<F> for VecCapture<F> {
    fn grab(&mut self) -> Result<Option<F>> {
        Ok(self.frames.pop_front())
    }
}

/// Single-colour image
pub fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
}

/// Black and white checkerboard
pub fn checkerboard(size: u32, cell: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(size, size, |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    }))
}

/// White disc centred on a black square image
pub fn disc(size: u32, radius: u32) -> DynamicImage {
    let c = (size / 2) as i64;
    let r2 = (radius * radius) as i64;
    DynamicImage::ImageRgb8(RgbImage::from_fn(size, size, |x, y| {
        let dx = x as i64 - c;
        let dy = y as i64 - c;
        if dx * dx + dy * dy <= r2 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    }))
}

/// Four separated 12x12 white squares on a black 64x64 image
pub fn four_squares() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, y| {
        let inside = |v: u32| (10..22).contains(&v) || (40..52).contains(&v);
        if inside(x) && inside(y) {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    }))
}

/// Write an image as PNG into `dir`
pub fn write_image(dir: &Path, name: &str, img: &DynamicImage) -> PathBuf {
    let path = dir.join(name);
    img.save(&path).expect("Failed to save test image");
    path
}
