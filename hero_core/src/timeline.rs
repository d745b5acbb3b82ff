// Scheduler-driven timeline engine: cues the renderer, then reports each stage
// finished after its scripted duration.

use std::rc::Rc;

use crate::host::{Handle, Scheduler, TimelineEngine};
use crate::types::{Stage, StageCue};

/// Plays stages on fixed timers. The renderer only draws; it never decides timing.
pub struct ScriptedTimeline<R> {
    scheduler: Rc<dyn Scheduler>,
    renderer: R,
}

impl<R: Fn(StageCue)> ScriptedTimeline<R> {
    pub fn new(scheduler: Rc<dyn Scheduler>, renderer: R) -> Self {
        ScriptedTimeline {
            scheduler,
            renderer,
        }
    }
}

impl<R: Fn(StageCue)> TimelineEngine for ScriptedTimeline<R> {
    fn run_stage(&self, _index: usize, stage: &Stage, on_finished: Box<dyn FnOnce()>) -> Handle {
        (self.renderer)(StageCue::Stage(stage.kind));
        self.scheduler.set_timeout(stage.duration, on_finished)
    }

    fn hold(&self) {
        (self.renderer)(StageCue::Checkpoint);
    }
}
