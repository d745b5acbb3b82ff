// Media gate: the only code that touches the hero video element.
// Hides autoplay policy from callers. Failures are ordinary outcomes, reported as `false`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture, Shared};
use serde::Serialize;
use tracing::debug;

use crate::error::ErrorKind;
use crate::host::MediaElement;

#[derive(Default)]
struct GateState {
    data_loaded: Cell<bool>,
    unlocked: Cell<bool>,
    /// A `play()` was issued and nothing has stopped it since.
    playback_wanted: Cell<bool>,
    closed: Cell<bool>,
    last_error: Cell<Option<ErrorKind>>,
}

impl GateState {
    fn record(&self, kind: ErrorKind) {
        // A load failure is terminal and stays the reported error.
        if self.last_error.get() != Some(ErrorKind::LoadFailed) {
            self.last_error.set(Some(kind));
        }
    }
}

/// Snapshot of the gate for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MediaStatus {
    pub ready: bool,
    pub unlocked: bool,
    pub last_error: Option<ErrorKind>,
}

/// Load/unlock/play/pause lifecycle of one media element.
pub struct MediaGate {
    element: Rc<dyn MediaElement>,
    state: Rc<GateState>,
    pending_unlock: RefCell<Option<Shared<LocalBoxFuture<'static, bool>>>>,
}

impl MediaGate {
    pub fn new(element: Rc<dyn MediaElement>) -> Self {
        MediaGate {
            element,
            state: Rc::new(GateState::default()),
            pending_unlock: RefCell::new(None),
        }
    }

    /// Element reported decodable data. Returns true only the first time.
    pub fn on_data_ready(&self) -> bool {
        !self.state.data_loaded.replace(true)
    }

    /// Element reported a load error. Ignored once data is loaded.
    /// Returns true when the failure was recorded for the first time.
    pub fn on_load_failed(&self) -> bool {
        if self.state.data_loaded.get() || self.state.last_error.get() == Some(ErrorKind::LoadFailed)
        {
            return false;
        }
        self.state.last_error.set(Some(ErrorKind::LoadFailed));
        true
    }

    /// Start-and-stop at position zero so later playback is allowed.
    /// Must be called synchronously from a gesture handler: the start request
    /// is issued before this returns.
    pub fn unlock(&self) -> LocalBoxFuture<'static, bool> {
        let state = &self.state;
        if state.unlocked.get() {
            return future::ready(true).boxed_local();
        }
        if state.closed.get() {
            return future::ready(false).boxed_local();
        }
        if !self.element.is_paused() {
            // The autoplay attribute already got it running.
            state.unlocked.set(true);
            return future::ready(true).boxed_local();
        }
        if let Some(pending) = self.pending_unlock.borrow().as_ref() {
            if pending.peek().is_none() {
                return pending.clone().boxed_local();
            }
        }

        self.element.rewind();
        let request = self.element.request_play();

        let element = Rc::clone(&self.element);
        let state = Rc::clone(&self.state);
        let settled = async move {
            let outcome = request.await;
            if state.closed.get() {
                return false;
            }
            match outcome {
                Ok(()) => {
                    state.unlocked.set(true);
                    if !state.playback_wanted.get() {
                        element.pause();
                        element.rewind();
                    }
                    true
                }
                Err(err) => {
                    debug!(error = %err, "media unlock rejected");
                    state.record(err.kind());
                    false
                }
            }
        }
        .boxed_local()
        .shared();

        *self.pending_unlock.borrow_mut() = Some(settled.clone());
        settled.boxed_local()
    }

    /// Rewind and request playback. The request is issued before this returns.
    pub fn play(&self) -> LocalBoxFuture<'static, bool> {
        let state = &self.state;
        if state.closed.get() {
            return future::ready(false).boxed_local();
        }
        if !state.data_loaded.get() {
            debug!("media play requested before data was loaded");
            state.record(ErrorKind::NotReady);
            return future::ready(false).boxed_local();
        }

        state.playback_wanted.set(true);
        self.element.rewind();
        let request = self.element.request_play();

        let state = Rc::clone(&self.state);
        async move {
            let outcome = request.await;
            if state.closed.get() {
                return false;
            }
            match outcome {
                Ok(()) => {
                    state.unlocked.set(true);
                    state.last_error.set(None);
                    true
                }
                Err(err) => {
                    debug!(error = %err, "media playback rejected");
                    state.playback_wanted.set(false);
                    state.record(err.kind());
                    false
                }
            }
        }
        .boxed_local()
    }

    pub fn pause(&self) {
        self.state.playback_wanted.set(false);
        if !self.element.is_paused() {
            self.element.pause();
        }
    }

    /// Stop and rewind. Load and unlock state are kept.
    pub fn reset(&self) {
        self.pause();
        self.element.rewind();
    }

    /// Something to play. Does not imply playback is allowed.
    pub fn is_ready(&self) -> bool {
        self.state.data_loaded.get()
    }

    pub fn is_unlocked(&self) -> bool {
        self.state.unlocked.get()
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.state.last_error.get()
    }

    /// Requests that settle after this no longer touch state or the element.
    pub fn close(&self) {
        self.state.closed.set(true);
        self.state.playback_wanted.set(false);
        self.pending_unlock.borrow_mut().take();
    }

    pub fn status(&self) -> MediaStatus {
        MediaStatus {
            ready: self.state.data_loaded.get(),
            unlocked: self.state.unlocked.get(),
            last_error: self.state.last_error.get(),
        }
    }
}
