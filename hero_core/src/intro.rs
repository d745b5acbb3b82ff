// Intro sequencer: fixed stage order, one completion, optional checkpoint.
// On constrained devices the timeline parks before its last stage until the user enters;
// no timer may move it past that point.

use serde::Serialize;

use crate::types::{DeviceProfile, IntroScript, Stage};

/// Where the intro timeline is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IntroState {
    /// Playing scripted stage `stage`. No external input affects ordering.
    Scripted { stage: usize },
    /// Parked before the final stage, waiting for an explicit resume.
    CheckpointHeld,
    /// Playing the final transition stage.
    Finishing,
    /// Terminal for the session.
    Done,
}

impl IntroState {
    /// Short label for page attributes.
    pub fn label(&self) -> &'static str {
        match self {
            IntroState::Scripted { .. } => "intro",
            IntroState::CheckpointHeld => "checkpoint",
            IntroState::Finishing => "finishing",
            IntroState::Done => "entered",
        }
    }
}

/// What the caller must do after a sequencer transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Start animating the stage at this index.
    Run(usize),
    /// Show the checkpoint; nothing else runs until resume.
    Hold,
    /// Timeline just reached `Done`. Produced once per session.
    Complete,
    /// Nothing changed.
    Idle,
}

/// Scripted intro timeline with an optional human-in-the-loop checkpoint.
#[derive(Debug, Clone)]
pub struct IntroSequencer {
    script: IntroScript,
    profile: DeviceProfile,
    state: IntroState,
    started: bool,
    skip: bool,
}

impl IntroSequencer {
    pub fn new(script: IntroScript, profile: DeviceProfile) -> Self {
        IntroSequencer {
            script,
            profile,
            state: IntroState::Scripted { stage: 0 },
            started: false,
            skip: false,
        }
    }

    /// A session that does not show the intro. `start` completes at once.
    pub fn skipped(script: IntroScript, profile: DeviceProfile) -> Self {
        IntroSequencer {
            skip: true,
            ..IntroSequencer::new(script, profile)
        }
    }

    pub fn start(&mut self) -> Advance {
        if self.started {
            return Advance::Idle;
        }
        self.started = true;
        if self.skip {
            self.state = IntroState::Done;
            return Advance::Complete;
        }
        self.enter(0)
    }

    /// The engine finished playing stage `index`. Stale reports are ignored.
    pub fn stage_finished(&mut self, index: usize) -> Advance {
        if !self.started {
            return Advance::Idle;
        }
        match self.state {
            IntroState::Scripted { stage } if stage == index => self.enter(index + 1),
            IntroState::Finishing if Some(index) == self.script.last_index() => {
                self.state = IntroState::Done;
                Advance::Complete
            }
            _ => Advance::Idle,
        }
    }

    /// Explicit user action. The only way out of the checkpoint.
    pub fn resume(&mut self) -> Advance {
        match (self.state, self.script.last_index()) {
            (IntroState::CheckpointHeld, Some(last)) => {
                self.state = IntroState::Finishing;
                Advance::Run(last)
            }
            _ => Advance::Idle,
        }
    }

    /// Failsafe: produce the transition a stalled engine failed to report.
    /// Constrained timelines are parked at the checkpoint, never past it.
    pub fn force(&mut self) -> Advance {
        if !self.started {
            return Advance::Idle;
        }
        match self.state {
            IntroState::Done | IntroState::CheckpointHeld => Advance::Idle,
            IntroState::Scripted { .. } if self.profile.is_constrained() => {
                self.state = IntroState::CheckpointHeld;
                Advance::Hold
            }
            IntroState::Scripted { .. } | IntroState::Finishing => {
                self.state = IntroState::Done;
                Advance::Complete
            }
        }
    }

    fn enter(&mut self, index: usize) -> Advance {
        let Some(last) = self.script.last_index() else {
            self.state = IntroState::Done;
            return Advance::Complete;
        };
        if index < last {
            self.state = IntroState::Scripted { stage: index };
            Advance::Run(index)
        } else if self.profile.is_constrained() {
            self.state = IntroState::CheckpointHeld;
            Advance::Hold
        } else {
            self.state = IntroState::Finishing;
            Advance::Run(last)
        }
    }

    pub fn state(&self) -> IntroState {
        self.state
    }

    #[cfg(test)]
    pub fn is_done(&self) -> bool {
        self.state == IntroState::Done
    }

    pub fn is_held(&self) -> bool {
        self.state == IntroState::CheckpointHeld
    }

    /// Index of the stage currently playing, if any.
    #[cfg(test)]
    pub fn stage_index(&self) -> Option<usize> {
        match self.state {
            IntroState::Scripted { stage } if self.started => Some(stage),
            IntroState::Finishing => self.script.last_index(),
            _ => None,
        }
    }

    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.script.stage(index)
    }

    pub fn profile(&self) -> DeviceProfile {
        self.profile
    }
}
