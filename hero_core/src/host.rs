// Capability traits at the browser seam. The `web` module implements them over
// web-sys and gloo; tests implement them with fakes. Everything is single-threaded.

use std::fmt;
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::error::MediaError;
use crate::types::{GestureKind, Millis, Stage};

/// Detaches whatever it guards when dropped: a listener, a pending timer, a running stage.
#[must_use = "dropping a Handle detaches it immediately"]
pub struct Handle {
    detach: Option<Box<dyn FnOnce()>>,
}

impl Handle {
    pub fn new(detach: impl FnOnce() + 'static) -> Self {
        Handle {
            detach: Some(Box::new(detach)),
        }
    }

    /// Handle with nothing to detach.
    pub fn noop() -> Self {
        Handle { detach: None }
    }

    /// Keeps `value` alive until the handle is dropped.
    pub fn holding<T: 'static>(value: T) -> Self {
        Handle::new(move || drop(value))
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

/// Notifications from the media element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    DataReady,
    LoadFailed(String),
}

/// One media element. Only `MediaGate` drives it.
pub trait MediaElement {
    /// Issues a playback request. The request is made before this returns,
    /// so it counts as part of the caller's gesture; the future carries the verdict.
    fn request_play(&self) -> LocalBoxFuture<'static, Result<(), MediaError>>;

    fn pause(&self);

    /// Seek to position zero.
    fn rewind(&self);

    fn is_paused(&self) -> bool;

    /// Whether decodable data is already present.
    fn has_data(&self) -> bool;

    fn subscribe(&self, listener: Rc<dyn Fn(MediaEvent)>) -> Handle;
}

/// Page-level scroll suspension.
pub trait ScrollLock {
    fn suspend(&self);
    fn resume(&self);
}

/// Ambient input events, consumed read-only.
pub trait GestureSource {
    fn listen(&self, kind: GestureKind, callback: Rc<dyn Fn(GestureKind)>) -> Handle;
}

/// One-shot timers. Dropping the handle cancels the timer.
pub trait Scheduler {
    fn set_timeout(&self, delay: Millis, callback: Box<dyn FnOnce()>) -> Handle;
}

/// The animation engine that plays intro stages.
pub trait TimelineEngine {
    /// Start animating `stage`. `on_finished` runs once the stage has played,
    /// never synchronously. Dropping the handle abandons the stage.
    fn run_stage(&self, index: usize, stage: &Stage, on_finished: Box<dyn FnOnce()>) -> Handle;

    /// Timeline parked at the checkpoint: present the enter control.
    fn hold(&self);
}
