use std::sync::Arc;

use crate::error::Result;
use crate::pipeline::{Identity, PipelineContext, PipelineStage};

/// Select a stage once, at build time: the stage itself when `flag` holds,
/// identity otherwise
pub fn when<F, S>(flag: bool, stage: S) -> Arc<dyn PipelineStage<F>>
where
    F: 'static,
    S: PipelineStage<F> + 'static,
{
    if flag {
        Arc::new(stage)
    } else {
        Arc::new(Identity)
    }
}

/// Applies the wrapped stage only when the predicate holds for the current frame
pub struct Conditional<P, S> {
    name: String,
    predicate: P,
    stage: S,
}

impl<F, P, S> PipelineStage<F> for Conditional<P, S>
where
    P: Fn(&F) -> bool + Send + Sync,
    S: PipelineStage<F>,
{
    fn process(&self, frame: F, context: &PipelineContext) -> Result<F> {
        if (self.predicate)(&frame) {
            self.stage.process(frame, context)
        } else {
            Ok(frame)
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Wrap a stage behind a frame-dependent predicate, evaluated per invocation
pub fn when_frame<F, P, S>(predicate: P, stage: S) -> Conditional<P, S>
where
    P: Fn(&F) -> bool + Send + Sync,
    S: PipelineStage<F>,
{
    let name = format!("If {}", stage.name());
    Conditional {
        name,
        predicate,
        stage,
    }
}
