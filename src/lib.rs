pub mod batch;
pub mod compose;
pub mod conditional;
pub mod config;
pub mod display;
pub mod error;
pub mod features;
pub mod frame;
pub mod guard;
pub mod pipeline;
pub mod stream;
pub mod vision;

pub use batch::{foreach, foreach_shared, list_directory, Batch, IMAGE_EXTENSIONS};
pub use compose::Pipe;
pub use conditional::{when, when_frame};
pub use config::RunConfig;
pub use display::{show, wait_key, FrameDisplay, HeadlessDisplay};
pub use error::{PipelineError, Result};
pub use features::{
    Descriptors, DescriptorExtractor, Detected, FeatureDetector, Features, KeyPoint, Point, Region,
    StrategyRegistry,
};
pub use frame::{save, Frame, FrameStore};
pub use guard::Guard;
pub use pipeline::{
    inspect, side_effect, stage, DebugConfig, Identity, Pipeline, PipelineContext, PipelineStage,
};
pub use stream::{Capture, DeviceOpener, PlayReport, StreamSource, StreamState};
pub use vision::{builtin_registry, ImageStore};
