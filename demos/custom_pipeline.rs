use framepipe::vision::stages::{canny, gaussian_blur, gray, mirror, threshold};
use framepipe::vision::has_channels;
use framepipe::{builtin_registry, when_frame, Guard, ImageStore, Pipe, Pipeline};
use image::DynamicImage;
use std::env;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <image_path>", args[0]);
        std::process::exit(1);
    }

    let img: DynamicImage = Guard::Enforce.load(&ImageStore, &args[1])?;
    println!("Loaded image: {}x{}", img.width(), img.height());

    // Example 1: eager chaining, one stage at a time
    println!("\n=== Eager Chain ===");
    let eager = img.clone().pipe(&gray())?.pipe(&mirror())?.guard(Guard::Enforce)?;
    println!("Grey mirrored image: {}x{}", eager.width(), eager.height());

    // Example 2: persistent pipeline, built once and reused
    println!("\n=== Persistent Pipeline ===");
    let edges = Pipeline::new()
        .with_verbose(true)
        .then(when_frame(has_channels(3), gray()))
        .then(gaussian_blur(1.5))
        .then(canny(50.0, 100.0));
    println!("Stages: {}", edges.stage_names().join(" -> "));

    let first = img.clone().run(&edges)?;
    let second = eager.run(&edges)?;
    println!("Edge images: {}x{} and {}x{}", first.width(), first.height(), second.width(), second.height());

    // Example 3: detect once, extract twice
    println!("\n=== Detect / Extract ===");
    let registry = builtin_registry();
    let detected = img.clone().pipe(&gray())?.detect(&registry, "FAST")?;
    println!("FAST found {} keypoints", detected.features().len());

    for extractor in ["PATCH", "MOMENTS"] {
        let descriptors = detected.extract(&registry, extractor)?;
        println!("  {}: {} rows x {} cols", extractor, descriptors.rows(), descriptors.cols());
    }

    let regions = img.pipe(&threshold(128))?.detect(&registry, "CONTOURS")?.into_features();
    println!("CONTOURS found {} regions", regions.len());

    Ok(())
}
