// Page controller: composition root for one page session.
// Wires intro completion to playback, unlocks media on the first gesture, arms a
// single-slot retry when playback is refused, and owns the scroll lock while the intro runs.
//
// Every deferred callback holds a `Weak<Session>` and checks liveness first;
// after unmount nothing observable happens.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::{Rc, Weak};

use futures::task::{LocalSpawn, LocalSpawnExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, IntroError, MediaError};
use crate::gesture::{GestureSubscription, RetrySlot};
use crate::host::{
    GestureSource, Handle, MediaElement, MediaEvent, Scheduler, ScrollLock, TimelineEngine,
};
use crate::intro::{Advance, IntroSequencer, IntroState};
use crate::media::{MediaGate, MediaStatus};
use crate::types::{DeviceProfile, GestureKind, HeroConfig, IntroScript, Millis};

/// Per-session settings, fixed at mount.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub profile: DeviceProfile,
    /// Whether this session plays the intro. False after the first page load.
    pub show_intro: bool,
    pub failsafe: Millis,
    pub script: IntroScript,
}

impl SessionOptions {
    pub fn from_config(config: &HeroConfig, viewport_width_px: f64) -> Self {
        SessionOptions {
            profile: DeviceProfile::from_viewport_width(
                viewport_width_px,
                config.viewport_threshold_px,
            ),
            show_intro: config.show_intro,
            failsafe: config.failsafe_ms,
            script: config.script.clone(),
        }
    }
}

/// Everything the controller talks to.
pub struct Collaborators {
    pub media: Rc<dyn MediaElement>,
    pub scroll_lock: Rc<dyn ScrollLock>,
    pub gestures: Rc<dyn GestureSource>,
    pub scheduler: Rc<dyn Scheduler>,
    pub timeline: Rc<dyn TimelineEngine>,
    pub spawner: Rc<dyn LocalSpawn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollState {
    /// Never suspended this session.
    Free,
    Suspended,
    /// Suspended, then released. Terminal.
    Released,
}

/// Snapshot for the page and for debugging.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    /// `"entered"` once the intro is done.
    pub phase: &'static str,
    pub intro: IntroState,
    pub profile: DeviceProfile,
    pub media: MediaStatus,
    pub scroll: ScrollState,
    pub retry_armed: bool,
    pub alive: bool,
}

struct Session {
    alive: Cell<bool>,
    options: SessionOptions,
    collaborators: Collaborators,
    gate: MediaGate,
    sequencer: RefCell<IntroSequencer>,
    scroll: Cell<ScrollState>,
    unlock_gesture: RefCell<Option<GestureSubscription>>,
    retry: RetrySlot,
    failsafe: RefCell<Option<Handle>>,
    stage: RefCell<Option<Handle>>,
    media_events: RefCell<Option<Handle>>,
}

fn upgrade_live(weak: &Weak<Session>) -> Option<Rc<Session>> {
    weak.upgrade().filter(|session| session.alive.get())
}

impl Session {
    fn spawn_then<T: 'static>(
        self: &Rc<Self>,
        task: impl Future<Output = T> + 'static,
        then: impl FnOnce(&Rc<Session>, T) + 'static,
    ) {
        let weak = Rc::downgrade(self);
        let spawned = self.collaborators.spawner.spawn_local(async move {
            let output = task.await;
            if let Some(session) = upgrade_live(&weak) {
                then(&session, output);
            }
        });
        if let Err(err) = spawned {
            warn!(error = %err, "executor unavailable; media task dropped");
        }
    }

    fn attach_media_events(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        let handle = self
            .collaborators
            .media
            .subscribe(Rc::new(move |event: MediaEvent| {
                if let Some(session) = upgrade_live(&weak) {
                    session.on_media_event(event);
                }
            }));
        *self.media_events.borrow_mut() = Some(handle);

        if self.collaborators.media.has_data() {
            self.on_media_event(MediaEvent::DataReady);
        }
    }

    fn on_media_event(&self, event: MediaEvent) {
        match event {
            MediaEvent::DataReady => {
                if self.gate.on_data_ready() {
                    info!("hero media ready");
                }
            }
            MediaEvent::LoadFailed(reason) => {
                if self.gate.on_load_failed() {
                    let err = MediaError::LoadFailed(reason);
                    warn!(error = %err, "hero media unavailable; keeping static background");
                    // Nothing left to unlock or retry on this element.
                    drop(self.unlock_gesture.take());
                    self.retry.disarm();
                }
            }
        }
    }

    fn attach_unlock_gesture(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        let subscription = GestureSubscription::arm(
            &*self.collaborators.gestures,
            &GestureKind::ALL,
            move |kind| {
                let Some(session) = upgrade_live(&weak) else {
                    return;
                };
                if session.gate.is_unlocked() {
                    return;
                }
                debug!(gesture = kind.event_name(), "first gesture; unlocking media");
                session.unlock_in_gesture();
            },
        );
        *self.unlock_gesture.borrow_mut() = Some(subscription);
    }

    /// Issue the unlock request now; only its verdict is awaited.
    fn unlock_in_gesture(self: &Rc<Self>) {
        let unlock = self.gate.unlock();
        self.spawn_then(unlock, |_, unlocked| {
            debug!(unlocked, "media unlock settled");
        });
    }

    fn suspend_scroll(&self) {
        if self.scroll.get() == ScrollState::Free {
            self.scroll.set(ScrollState::Suspended);
            self.collaborators.scroll_lock.suspend();
        }
    }

    fn release_scroll(&self) {
        if self.scroll.get() == ScrollState::Suspended {
            self.scroll.set(ScrollState::Released);
            self.collaborators.scroll_lock.resume();
        }
    }

    fn arm_failsafe(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        let waited = self.options.failsafe;
        let handle = self.collaborators.scheduler.set_timeout(
            waited,
            Box::new(move || {
                if let Some(session) = upgrade_live(&weak) {
                    session.on_failsafe(waited);
                }
            }),
        );
        *self.failsafe.borrow_mut() = Some(handle);
    }

    fn on_failsafe(self: &Rc<Self>, waited: Millis) {
        let advance = self.sequencer.borrow_mut().force();
        if advance == Advance::Idle {
            return;
        }
        let stalled = IntroError::TimelineStalled {
            waited_ms: waited.as_u32(),
        };
        warn!(error = %stalled, "forcing intro forward");
        drop(self.stage.take());
        self.apply(advance);
    }

    fn apply(self: &Rc<Self>, advance: Advance) {
        match advance {
            Advance::Run(index) => self.run_stage(index),
            Advance::Hold => {
                drop(self.stage.take());
                info!("intro held at checkpoint; waiting for enter");
                self.collaborators.timeline.hold();
            }
            Advance::Complete => self.complete(),
            Advance::Idle => {}
        }
    }

    fn run_stage(self: &Rc<Self>, index: usize) {
        let Some(stage) = self.sequencer.borrow().stage(index).copied() else {
            return;
        };
        debug!(stage = stage.kind.as_str(), index, "intro stage");
        let weak = Rc::downgrade(self);
        let handle = self.collaborators.timeline.run_stage(
            index,
            &stage,
            Box::new(move || {
                let Some(session) = upgrade_live(&weak) else {
                    return;
                };
                let advance = session.sequencer.borrow_mut().stage_finished(index);
                session.apply(advance);
            }),
        );
        *self.stage.borrow_mut() = Some(handle);
    }

    fn complete(self: &Rc<Self>) {
        drop(self.failsafe.take());
        drop(self.stage.take());
        self.release_scroll();
        info!("intro complete");
        self.request_play();
    }

    /// Fire-and-forget: a refusal only arms the retry.
    fn request_play(self: &Rc<Self>) {
        let play = self.gate.play();
        self.spawn_then(play, |session, played| {
            if played {
                info!("hero media playing");
            } else if session.gate.last_error() == Some(ErrorKind::LoadFailed) {
                debug!("hero media failed to load; no playback retry");
            } else {
                debug!("hero playback not allowed yet; waiting for a gesture");
                session.arm_retry();
            }
        });
    }

    fn arm_retry(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        self.retry.arm(
            &*self.collaborators.gestures,
            &GestureKind::ALL,
            move |kind| {
                let Some(session) = upgrade_live(&weak) else {
                    return;
                };
                debug!(gesture = kind.event_name(), "retrying hero playback");
                // Unlock before play, both inside this gesture's synchronous extent.
                if !session.gate.is_unlocked() {
                    session.unlock_in_gesture();
                }
                session.request_play();
            },
        );
    }
}

/// One mounted page session.
pub struct PageController {
    session: Rc<Session>,
}

impl PageController {
    /// Mount the session: lock scroll, attach listeners, start the intro.
    pub fn mount(options: SessionOptions, collaborators: Collaborators) -> Self {
        let sequencer = if options.show_intro {
            IntroSequencer::new(options.script.clone(), options.profile)
        } else {
            IntroSequencer::skipped(options.script.clone(), options.profile)
        };

        let session = Rc::new(Session {
            alive: Cell::new(true),
            gate: MediaGate::new(Rc::clone(&collaborators.media)),
            sequencer: RefCell::new(sequencer),
            scroll: Cell::new(ScrollState::Free),
            unlock_gesture: RefCell::new(None),
            retry: RetrySlot::new(),
            failsafe: RefCell::new(None),
            stage: RefCell::new(None),
            media_events: RefCell::new(None),
            options,
            collaborators,
        });

        info!(
            profile = ?session.options.profile,
            show_intro = session.options.show_intro,
            "hero session mounted"
        );

        if session.options.show_intro {
            session.suspend_scroll();
            session.arm_failsafe();
        }
        session.attach_media_events();
        session.attach_unlock_gesture();

        let advance = session.sequencer.borrow_mut().start();
        session.apply(advance);

        PageController { session }
    }

    /// The user pressed enter at the checkpoint. Call from inside the tap handler:
    /// the unlock request is issued before the timeline resumes.
    pub fn enter(&self) {
        let session = &self.session;
        if !session.alive.get() {
            return;
        }
        if !session.sequencer.borrow().is_held() {
            debug!("enter ignored outside the checkpoint");
            return;
        }

        if !session.gate.is_unlocked() {
            session.unlock_in_gesture();
        }
        let advance = session.sequencer.borrow_mut().resume();
        info!("intro resumed by user");
        // Guards the finishing stage the same way the mount guard covered the script.
        session.arm_failsafe();
        session.apply(advance);
    }

    /// Tear down: no callback has any effect afterwards. Idempotent.
    pub fn unmount(&self) {
        let session = &self.session;
        if !session.alive.replace(false) {
            return;
        }
        drop(session.failsafe.take());
        drop(session.stage.take());
        session.retry.disarm();
        drop(session.unlock_gesture.take());
        drop(session.media_events.take());
        session.gate.close();
        session.release_scroll();
        debug!("hero session unmounted");
    }

    pub fn intro_state(&self) -> IntroState {
        self.session.sequencer.borrow().state()
    }

    pub fn media_status(&self) -> MediaStatus {
        self.session.gate.status()
    }

    pub fn is_media_ready(&self) -> bool {
        self.session.gate.is_ready()
    }

    pub fn retry_armed(&self) -> bool {
        self.session.retry.is_armed()
    }

    pub fn scroll_state(&self) -> ScrollState {
        self.session.scroll.get()
    }

    pub fn is_alive(&self) -> bool {
        self.session.alive.get()
    }

    pub fn profile(&self) -> DeviceProfile {
        self.session.options.profile
    }

    pub fn status(&self) -> SessionStatus {
        let intro = self.intro_state();
        SessionStatus {
            phase: intro.label(),
            intro,
            profile: self.profile(),
            media: self.media_status(),
            scroll: self.scroll_state(),
            retry_armed: self.retry_armed(),
            alive: self.is_alive(),
        }
    }
}

impl Drop for PageController {
    fn drop(&mut self) {
        self.unmount();
    }
}
