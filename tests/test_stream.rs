//! Stream sources and the driver loop.

mod common;

use framepipe::display::{is_quit_key, KEY_ESCAPE};
use framepipe::{
    show, stage, wait_key, Capture, DeviceOpener, FrameDisplay, FrameStore, Guard,
    HeadlessDisplay, ImageStore, Pipeline, PipelineError, StreamSource, StreamState,
};
use image::DynamicImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::*;

fn tapes(n: i32) -> Vec<Tape> {
    (1..=n).map(|i| Tape::of(&[i])).collect()
}

fn counting_pipeline(counter: Arc<AtomicUsize>) -> Pipeline<Tape> {
    Pipeline::new().then(stage("Count", move |tape: Tape| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(tape)
    }))
}

struct NoCamera;

impl DeviceOpener<Tape> for NoCamera {
    fn open(&self, device: u32) -> Result<Box<dyn Capture<Tape>>, String> {
        Err(format!("no camera at index {}", device))
    }
}

struct FakeCamera;

impl DeviceOpener<Tape> for FakeCamera {
    fn open(&self, _device: u32) -> Result<Box<dyn Capture<Tape>>, String> {
        Ok(Box::new(VecCapture::new(tapes(2))))
    }
}

#[test]
fn test_drive_invokes_once_per_frame() -> anyhow::Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = counting_pipeline(calls.clone());

    let mut source = StreamSource::from_capture("memory", VecCapture::new(tapes(5)));
    assert!(source.is_open());

    let report = source.drive(&pipeline)?;
    assert_eq!(report.invocations, 5);
    assert!(!report.cancelled);
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(source.frames_pulled(), 5);
    assert_eq!(source.state(), StreamState::Exhausted);
    Ok(())
}

#[test]
fn test_play_returns_true_at_end_of_stream() -> anyhow::Result<()> {
    let mut source = StreamSource::from_capture("memory", VecCapture::new(tapes(3)));
    assert!(source.play(&Pipeline::new().then(push(0)))?);

    // Nothing left to play
    assert!(source.play(&Pipeline::new().then(push(0)))?);
    assert_eq!(source.frames_pulled(), 3);
    Ok(())
}

#[test]
fn test_empty_frame_ends_stream() -> anyhow::Result<()> {
    let frames = vec![Tape::of(&[1]), Tape::of(&[]), Tape::of(&[3])];
    let mut source = StreamSource::from_capture("gappy", VecCapture::new(frames));

    assert_eq!(source.pull()?, Tape::of(&[1]));
    assert!(matches!(source.pull(), Err(PipelineError::StreamExhausted)));
    assert!(matches!(source.pull(), Err(PipelineError::StreamExhausted)));
    assert!(!source.is_open());
    Ok(())
}

#[test]
fn test_stage_error_propagates_from_drive() {
    let mut source = StreamSource::from_capture("memory", VecCapture::new(tapes(3)));
    let pipeline = Pipeline::new().then(boom());
    assert!(matches!(source.drive(&pipeline), Err(PipelineError::Other(_))));
    assert_eq!(source.frames_pulled(), 1);
}

#[test]
fn test_cancel_key_stops_playback() -> anyhow::Result<()> {
    let display = Arc::new(HeadlessDisplay::with_keys([None, Some('x' as i32), Some('q' as i32)]));
    let window: Arc<dyn FrameDisplay<Tape>> = display.clone();
    let pipeline = Pipeline::new()
        .then(show(window.clone(), "preview"))
        .then(wait_key(window, 30, is_quit_key));

    let mut source = StreamSource::from_capture("memory", VecCapture::new(tapes(10)));
    let report = source.drive(&pipeline)?;

    assert_eq!(report.invocations, 3);
    assert!(report.cancelled);
    assert_eq!(display.shown(), 3);
    Ok(())
}

#[test]
fn test_no_key_plays_to_the_end() -> anyhow::Result<()> {
    let display = Arc::new(HeadlessDisplay::new());
    let window: Arc<dyn FrameDisplay<Tape>> = display.clone();
    let pipeline = Pipeline::new()
        .then(show(window.clone(), "preview"))
        .then(wait_key(window, 0, |key| key == KEY_ESCAPE));

    let mut source = StreamSource::from_capture("memory", VecCapture::new(tapes(4)));
    assert!(source.play(&pipeline)?);
    assert_eq!(display.shown(), 4);
    Ok(())
}

#[test]
fn test_quit_keys() {
    assert!(is_quit_key(KEY_ESCAPE));
    assert!(is_quit_key('q' as i32));
    assert!(is_quit_key('Q' as i32));
    assert!(!is_quit_key(' ' as i32));
}

#[test]
fn test_failed_source_reports_reason() {
    let mut source: StreamSource<Tape> = StreamSource::open_device(&NoCamera, 3);

    assert_eq!(source.state(), StreamState::Failed);
    assert_eq!(source.last_error(), Some("no camera at index 3"));
    assert_eq!(source.name(), "device 3");

    match source.guard(Guard::Enforce) {
        Err(PipelineError::SourceUnavailable { reason }) => {
            assert_eq!(reason, "no camera at index 3")
        }
        _ => panic!("expected SourceUnavailable"),
    }
    assert!(source.guard(Guard::Ignore).is_ok());
    assert!(matches!(
        source.pull(),
        Err(PipelineError::SourceUnavailable { .. })
    ));
    assert!(matches!(
        source.drive(&Pipeline::new().then(push(1))),
        Err(PipelineError::SourceUnavailable { .. })
    ));
}

#[test]
fn test_open_device_success() -> anyhow::Result<()> {
    let mut source: StreamSource<Tape> = StreamSource::open_device(&FakeCamera, 0);
    source.guard(Guard::Enforce)?;

    let report = source.drive(&Pipeline::new().then(push(9)))?;
    assert_eq!(report.invocations, 2);
    Ok(())
}

#[test]
fn test_open_sequence_plays_directory_in_order() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    write_image(dir.path(), "frame_02.png", &solid(2, 2, [0, 0, 0]));
    write_image(dir.path(), "frame_01.png", &solid(1, 1, [0, 0, 0]));
    write_image(dir.path(), "frame_03.png", &solid(3, 3, [0, 0, 0]));
    std::fs::write(dir.path().join("frame_04.png"), "corrupt")?;

    let widths = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen = widths.clone();
    let pipeline = Pipeline::new().then(stage("Record", move |img: DynamicImage| {
        if let Ok(mut w) = seen.lock() {
            w.push(img.width());
        }
        Ok(img)
    }));

    let store: Arc<dyn FrameStore<DynamicImage>> = Arc::new(ImageStore);
    let mut source = StreamSource::open_sequence(store, dir.path());
    source.guard(Guard::Enforce)?;
    let report = source.drive(&pipeline)?;

    assert_eq!(report.invocations, 3);
    assert_eq!(*widths.lock().unwrap(), vec![1, 2, 3]);
    Ok(())
}

#[test]
fn test_open_sequence_missing_directory() {
    let store: Arc<dyn FrameStore<DynamicImage>> = Arc::new(ImageStore);
    let mut source = StreamSource::open_sequence(store, "/no/such/frames");
    assert_eq!(source.state(), StreamState::Failed);
    assert!(source.last_error().is_some());
    assert!(source.guard(Guard::Enforce).is_err());
}
