//! Eager composition, guards and the load/save collaborators.

mod common;

use framepipe::vision::stages::{gray, mirror};
use framepipe::{
    inspect, save, side_effect, Frame, FrameStore, Guard, ImageStore, Pipe, Pipeline,
    PipelineError,
};
use image::DynamicImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::*;

#[test]
fn test_eager_chain_is_left_associative() -> anyhow::Result<()> {
    let out = Tape::of(&[1]).pipe(&push(2))?.pipe(&scale(10))?.pipe(&push(3))?;
    assert_eq!(out, Tape::of(&[10, 20, 3]));
    Ok(())
}

#[test]
fn test_eager_chain_matches_pipeline() -> anyhow::Result<()> {
    let input = Tape::of(&[4, 5]);

    let eager = input.clone().pipe(&push(1))?.pipe(&scale(3))?;
    let pipeline = Pipeline::new().then(push(1)).then(scale(3));
    let persistent = input.run(&pipeline)?;

    assert_eq!(eager, persistent);
    Ok(())
}

#[test]
fn test_guard_enforce_rejects_empty_frame() {
    let result = Tape::empty().guard(Guard::Enforce);
    assert!(matches!(result, Err(PipelineError::InvalidFrame)));
}

#[test]
fn test_guard_ignore_passes_frames_unchanged() -> anyhow::Result<()> {
    assert_eq!(Tape::empty().guard(Guard::Ignore)?, Tape::empty());
    assert_eq!(Tape::of(&[7]).guard(Guard::Ignore)?, Tape::of(&[7]));
    assert_eq!(Tape::of(&[7]).guard(Guard::Enforce)?, Tape::of(&[7]));
    Ok(())
}

#[test]
fn test_guard_inside_chain() -> anyhow::Result<()> {
    let pipeline = Pipeline::new()
        .then(stage_clear())
        .then(Guard::Enforce)
        .then(push(1));
    assert!(matches!(
        pipeline.run(Tape::of(&[1])),
        Err(PipelineError::InvalidFrame)
    ));

    let lenient = Pipeline::new().then(stage_clear()).then(Guard::Ignore).then(push(1));
    assert_eq!(lenient.run(Tape::of(&[1]))?, Tape::of(&[1]));
    Ok(())
}

fn stage_clear() -> impl framepipe::PipelineStage<Tape> {
    framepipe::stage("Clear", |_t: Tape| Ok(Tape::empty()))
}

#[test]
fn test_load_with_guard() -> anyhow::Result<()> {
    let store = MemoryStore::with(&[("a.tape", Tape::of(&[1, 2]))]);

    let loaded: Tape = Guard::Enforce.load(&store, "a.tape")?;
    assert_eq!(loaded, Tape::of(&[1, 2]));

    let missing: framepipe::Result<Tape> = Guard::Enforce.load(&store, "missing.tape");
    match missing {
        Err(PipelineError::ResourceNotFound { path }) => {
            assert_eq!(path, std::path::PathBuf::from("missing.tape"))
        }
        other => panic!("expected ResourceNotFound, got {:?}", other),
    }

    let ignored: Tape = Guard::Ignore.load(&store, "missing.tape")?;
    assert!(ignored.is_empty());
    Ok(())
}

#[test]
fn test_save_stage_returns_input_or_empty() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::default());
    let shared: Arc<dyn FrameStore<Tape>> = store.clone();

    let saved = Tape::of(&[3]).pipe(&save(shared.clone(), "/tmp/out.tape"))?;
    assert_eq!(saved, Tape::of(&[3]));
    assert_eq!(store.get("/tmp/out.tape"), Some(Tape::of(&[3])));

    let failed = Tape::of(&[3]).pipe(&save(shared, "/readonly/out.tape"))?;
    assert!(failed.is_empty());
    assert!(matches!(
        failed.guard(Guard::Enforce),
        Err(PipelineError::InvalidFrame)
    ));
    Ok(())
}

#[test]
fn test_side_effect_stages_pass_frame_through() -> anyhow::Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    let observer = seen.clone();
    let out = Tape::of(&[1, 2, 3])
        .pipe(&side_effect("tick", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }))?
        .pipe(&inspect("len", move |t: &Tape| {
            observer.store(t.0.len(), Ordering::SeqCst);
        }))?;

    assert_eq!(out, Tape::of(&[1, 2, 3]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(seen.load(Ordering::SeqCst), 3);
    Ok(())
}

#[test]
fn test_image_load_chain_and_save() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = write_image(dir.path(), "input.png", &checkerboard(16, 4));

    let loaded: DynamicImage = Guard::Enforce.load(&ImageStore, &path)?;
    let out = loaded.pipe(&gray())?.pipe(&mirror())?.guard(Guard::Enforce)?;
    assert_eq!((out.width(), out.height()), (16, 16));

    // Grey but still three channels; the mirrored board starts dark on the left
    let rgb = out.to_rgb8();
    let px = rgb.get_pixel(0, 0);
    assert_eq!(px[0], px[1]);
    assert_eq!(px[1], px[2]);
    assert_eq!(px[0], 0);

    let out_path = dir.path().join("result.png");
    let store: Arc<dyn FrameStore<DynamicImage>> = Arc::new(ImageStore);
    let saved = out.clone().pipe(&save(store, &out_path))?;
    assert_eq!(saved, out);
    assert!(!ImageStore.load(&out_path).is_empty());
    Ok(())
}

#[test]
fn test_image_store_missing_file_is_empty_frame() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let missing = dir.path().join("nope.png");

    assert!(ImageStore.load(&missing).is_empty());

    let result: framepipe::Result<DynamicImage> = Guard::Enforce.load(&ImageStore, &missing);
    assert!(matches!(result, Err(PipelineError::ResourceNotFound { .. })));
    Ok(())
}
