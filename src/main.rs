use clap::Parser;
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use framepipe::display::is_quit_key;
use framepipe::vision::extractors::descriptor_image;
use framepipe::{
    builtin_registry, list_directory, show, wait_key, Batch, Frame, FrameDisplay, FrameStore, Guard,
    HeadlessDisplay, ImageStore, Pipe, RunConfig, StreamSource, IMAGE_EXTENSIONS,
};

#[derive(Parser)]
#[command(name = "framepipe")]
#[command(about = "Run image files or image sequences through a frame pipeline")]
struct Cli {
    /// Input image files, or a single directory of images
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for processed images
    #[arg(short, long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Convert to grey levels
    #[arg(long)]
    gray: bool,

    /// Flip horizontally
    #[arg(long)]
    mirror: bool,

    /// Gaussian blur sigma
    #[arg(long, value_name = "SIGMA")]
    blur: Option<f32>,

    /// Let unreadable inputs through as empty frames instead of failing
    #[arg(long)]
    ignore_failures: bool,

    /// Feature detector to run on each result (FAST, CONTOURS, COMPONENTS)
    #[arg(long, value_name = "NAME")]
    detector: Option<String>,

    /// Descriptor extractor to run after the detector (PATCH, MOMENTS)
    #[arg(long, value_name = "NAME")]
    extractor: Option<String>,

    /// Treat the input directory as a stream and play it headlessly
    #[arg(long)]
    play: bool,

    /// TOML run configuration; command-line flags take precedence
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Save every stage's output to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn run_config(&self) -> anyhow::Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)?,
            None => RunConfig::default(),
        };

        config.verbose |= self.verbose;
        config.gray |= self.gray;
        config.mirror |= self.mirror;
        if self.ignore_failures {
            config.verify = Guard::Ignore;
        }
        if self.blur.is_some() {
            config.blur_sigma = self.blur;
        }
        if self.detector.is_some() {
            config.detector = self.detector.clone();
        }
        if self.extractor.is_some() {
            config.extractor = self.extractor.clone();
        }
        if self.out_dir.is_some() {
            config.output_dir = self.out_dir.clone();
        }
        if self.debug_out.is_some() {
            config.debug_dir = self.debug_out.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let config = args.run_config()?;

    let default_level = if config.verbose { "framepipe=debug" } else { "framepipe=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let store = Arc::new(ImageStore);
    let mut pipeline = config.build_pipeline();
    if let Some(debug_dir) = &config.debug_dir {
        pipeline = pipeline.with_debug(debug_dir.clone(), store.clone())?;
    }

    if args.play {
        let dir = args
            .inputs
            .first()
            .ok_or_else(|| anyhow::anyhow!("--play needs a directory"))?;
        let display: Arc<dyn FrameDisplay<DynamicImage>> = Arc::new(HeadlessDisplay::new());
        let player = pipeline
            .then(show(display.clone(), "player"))
            .then(wait_key(display, 40, is_quit_key));

        let mut source: StreamSource<DynamicImage> = StreamSource::open_sequence(store, dir);
        source.guard(Guard::Enforce)?;
        let report = source.drive(&player)?;
        println!(
            "Played {} frames from {}{}",
            report.invocations,
            dir.display(),
            if report.cancelled { " (cancelled)" } else { "" }
        );
        return Ok(());
    }

    let paths = collect_inputs(&args.inputs)?;
    println!("Processing {} images", paths.len());

    let results = paths.clone().run_batch(store.as_ref(), &pipeline)?;
    let registry = builtin_registry();

    for (path, frame) in paths.iter().zip(results) {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "frame".to_string());

        if frame.is_empty() {
            println!("  {}: unreadable, skipped", path.display());
            continue;
        }

        if let Some(out_dir) = &config.output_dir {
            std::fs::create_dir_all(out_dir)?;
            let out_path = out_dir.join(format!("{}.png", stem));
            store.save(&frame, &out_path)?;
            println!("  {} -> {}", path.display(), out_path.display());
        }

        if let Some(detector) = &config.detector {
            let detected = frame.detect(&registry, detector)?;
            println!("  {}: {} features ({})", path.display(), detected.features().len(), detector);

            if let Some(extractor) = &config.extractor {
                let descriptors = detected.extract(&registry, extractor)?;
                println!(
                    "  {}: {}x{} descriptors ({})",
                    path.display(),
                    descriptors.rows(),
                    descriptors.cols(),
                    extractor
                );
                if let Some(out_dir) = &config.output_dir {
                    let out_path = out_dir.join(format!("{}-descriptors.png", stem));
                    if descriptors.rows() > 0 {
                        store.save(&descriptor_image(&descriptors), &out_path)?;
                    }
                }
            }
        }
    }

    Ok(())
}

/// A single directory expands to its images; anything else is taken as a file list
fn collect_inputs(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    if let [single] = inputs {
        if single.is_dir() {
            return Ok(list_directory(single, IMAGE_EXTENSIONS)?);
        }
    }
    Ok(inputs.to_vec())
}
