// Fakes for the host traits: virtual-time scheduler, a media element that models
// autoplay policy, a gesture dispatcher, and a manually driven timeline.

use std::cell::{Cell, RefCell};
use std::io;
use std::rc::{Rc, Weak};
use std::sync::{Arc, Mutex};

use futures::executor::LocalPool;
use futures::future::{self, FutureExt, LocalBoxFuture};
use futures::task::LocalSpawn;

use crate::controller::Collaborators;
use crate::error::MediaError;
use crate::host::{
    GestureSource, Handle, MediaElement, MediaEvent, Scheduler, ScrollLock, TimelineEngine,
};
use crate::types::{GestureKind, Millis, Stage, StageKind};

// =============================================================================
// Scheduler
// =============================================================================

struct Timer {
    id: u64,
    due: u32,
    callback: Box<dyn FnOnce()>,
}

/// Timers fire only when the test advances virtual time.
pub struct ManualScheduler {
    me: Weak<ManualScheduler>,
    now: Cell<u32>,
    next_id: Cell<u64>,
    timers: RefCell<Vec<Timer>>,
}

impl ManualScheduler {
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|me| ManualScheduler {
            me: me.clone(),
            now: Cell::new(0),
            next_id: Cell::new(0),
            timers: RefCell::new(Vec::new()),
        })
    }

    pub fn now(&self) -> u32 {
        self.now.get()
    }

    pub fn pending(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Advance virtual time, firing due timers in deadline order.
    pub fn advance(&self, by_ms: u32) {
        let target = self.now.get() + by_ms;
        loop {
            let next = {
                let mut timers = self.timers.borrow_mut();
                let position = timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| (t.due, t.id))
                    .map(|(i, _)| i);
                position.map(|i| timers.remove(i))
            };
            match next {
                Some(timer) => {
                    self.now.set(timer.due);
                    (timer.callback)();
                }
                None => break,
            }
        }
        self.now.set(target);
    }
}

impl Scheduler for ManualScheduler {
    fn set_timeout(&self, delay: Millis, callback: Box<dyn FnOnce()>) -> Handle {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.timers.borrow_mut().push(Timer {
            id,
            due: self.now.get() + delay.as_u32(),
            callback,
        });
        let me = self.me.clone();
        Handle::new(move || {
            if let Some(scheduler) = me.upgrade() {
                scheduler.timers.borrow_mut().retain(|t| t.id != id);
            }
        })
    }
}

// =============================================================================
// Media element
// =============================================================================

/// How the fake browser treats play requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Desktop: autoplay of muted inline media is always allowed.
    Allow,
    /// Mobile: only requests issued inside a gesture turn, or on an element
    /// that already played once, succeed.
    RequireGesture,
    /// Everything is refused.
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCall {
    /// Play request, with the gesture turn it was issued in.
    Play { turn: Option<u32>, at: u32 },
    Pause,
    Rewind,
}

pub struct FakeMedia {
    me: Weak<FakeMedia>,
    policy: Cell<Policy>,
    activated: Cell<bool>,
    paused: Cell<bool>,
    has_data: Cell<bool>,
    turn: Rc<Cell<Option<u32>>>,
    clock: Rc<ManualScheduler>,
    calls: RefCell<Vec<MediaCall>>,
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(u64, Rc<dyn Fn(MediaEvent)>)>>,
}

impl FakeMedia {
    fn new(policy: Policy, turn: Rc<Cell<Option<u32>>>, clock: Rc<ManualScheduler>) -> Rc<Self> {
        Rc::new_cyclic(|me| FakeMedia {
            me: me.clone(),
            policy: Cell::new(policy),
            activated: Cell::new(false),
            paused: Cell::new(true),
            has_data: Cell::new(false),
            turn,
            clock,
            calls: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            listeners: RefCell::new(Vec::new()),
        })
    }

    pub fn set_policy(&self, policy: Policy) {
        self.policy.set(policy);
    }

    /// Element reports readiness and notifies subscribers.
    pub fn load(&self) {
        self.has_data.set(true);
        self.emit(MediaEvent::DataReady);
    }

    /// Data present before anyone subscribed.
    pub fn preload(&self) {
        self.has_data.set(true);
    }

    /// Autoplay attribute was honoured before mount.
    pub fn start_autoplaying(&self) {
        self.has_data.set(true);
        self.activated.set(true);
        self.paused.set(false);
    }

    pub fn emit(&self, event: MediaEvent) {
        let listeners: Vec<_> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            listener(event.clone());
        }
    }

    pub fn calls(&self) -> Vec<MediaCall> {
        self.calls.borrow().clone()
    }

    pub fn play_calls(&self) -> Vec<MediaCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, MediaCall::Play { .. }))
            .collect()
    }

    pub fn is_playing(&self) -> bool {
        !self.paused.get()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl MediaElement for FakeMedia {
    fn request_play(&self) -> LocalBoxFuture<'static, Result<(), MediaError>> {
        let turn = self.turn.get();
        self.calls.borrow_mut().push(MediaCall::Play {
            turn,
            at: self.clock.now(),
        });
        let allowed = match self.policy.get() {
            Policy::Allow => true,
            Policy::Deny => false,
            Policy::RequireGesture => self.activated.get() || turn.is_some(),
        };
        if allowed {
            self.activated.set(true);
            self.paused.set(false);
            future::ready(Ok(())).boxed_local()
        } else {
            future::ready(Err(MediaError::PlaybackRejected(
                "NotAllowedError".to_string(),
            )))
            .boxed_local()
        }
    }

    fn pause(&self) {
        self.calls.borrow_mut().push(MediaCall::Pause);
        self.paused.set(true);
    }

    fn rewind(&self) {
        self.calls.borrow_mut().push(MediaCall::Rewind);
    }

    fn is_paused(&self) -> bool {
        self.paused.get()
    }

    fn has_data(&self) -> bool {
        self.has_data.get()
    }

    fn subscribe(&self, listener: Rc<dyn Fn(MediaEvent)>) -> Handle {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push((id, listener));
        let me = self.me.clone();
        Handle::new(move || {
            if let Some(media) = me.upgrade() {
                media.listeners.borrow_mut().retain(|(i, _)| *i != id);
            }
        })
    }
}

// =============================================================================
// Gestures
// =============================================================================

pub struct FakeGestures {
    me: Weak<FakeGestures>,
    turn: Rc<Cell<Option<u32>>>,
    turns: Cell<u32>,
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(u64, GestureKind, Rc<dyn Fn(GestureKind)>)>>,
}

impl FakeGestures {
    fn new(turn: Rc<Cell<Option<u32>>>) -> Rc<Self> {
        Rc::new_cyclic(|me| FakeGestures {
            me: me.clone(),
            turn,
            turns: Cell::new(0),
            next_id: Cell::new(0),
            listeners: RefCell::new(Vec::new()),
        })
    }

    /// Dispatch one user gesture as its own turn. Returns the turn id.
    pub fn dispatch(&self, kind: GestureKind) -> u32 {
        let turn = self.turns.get() + 1;
        self.turns.set(turn);
        self.turn.set(Some(turn));

        let matching: Vec<_> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(id, _, cb)| (*id, Rc::clone(cb)))
            .collect();
        for (id, callback) in matching {
            // Listeners removed earlier in this dispatch are skipped, like the DOM does.
            let still_attached = self.listeners.borrow().iter().any(|(i, _, _)| *i == id);
            if still_attached {
                callback(kind);
            }
        }

        self.turn.set(None);
        turn
    }

    /// Run `f` as if inside a gesture handler on some other target,
    /// such as the enter button. Document listeners do not see it.
    pub fn within_turn<T>(&self, f: impl FnOnce() -> T) -> T {
        let turn = self.turns.get() + 1;
        self.turns.set(turn);
        self.turn.set(Some(turn));
        let output = f();
        self.turn.set(None);
        output
    }

    pub fn live(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn live_for(&self, kind: GestureKind) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .count()
    }
}

impl GestureSource for FakeGestures {
    fn listen(&self, kind: GestureKind, callback: Rc<dyn Fn(GestureKind)>) -> Handle {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push((id, kind, callback));
        let me = self.me.clone();
        Handle::new(move || {
            if let Some(gestures) = me.upgrade() {
                gestures.listeners.borrow_mut().retain(|(i, _, _)| *i != id);
            }
        })
    }
}

// =============================================================================
// Scroll lock
// =============================================================================

#[derive(Default)]
pub struct FakeScrollLock {
    pub suspends: Cell<u32>,
    pub resumes: Cell<u32>,
    resumed_at: Cell<Option<u32>>,
    clock: RefCell<Option<Rc<ManualScheduler>>>,
}

impl FakeScrollLock {
    pub fn is_locked(&self) -> bool {
        self.suspends.get() > self.resumes.get()
    }

    pub fn resumed_at(&self) -> Option<u32> {
        self.resumed_at.get()
    }
}

impl ScrollLock for FakeScrollLock {
    fn suspend(&self) {
        self.suspends.set(self.suspends.get() + 1);
    }

    fn resume(&self) {
        self.resumes.set(self.resumes.get() + 1);
        let now = self.clock.borrow().as_ref().map(|c| c.now());
        self.resumed_at.set(now);
    }
}

// =============================================================================
// Timeline
// =============================================================================

struct RunningStage {
    id: u64,
    index: usize,
    on_finished: Box<dyn FnOnce()>,
}

/// Stages finish only when the test says so; a test that never calls
/// `finish_stage` models a stalled animation engine.
pub struct ManualTimeline {
    me: Weak<ManualTimeline>,
    next_id: Cell<u64>,
    running: RefCell<Vec<RunningStage>>,
    started: RefCell<Vec<(usize, StageKind)>>,
    holds: Cell<u32>,
}

impl ManualTimeline {
    fn new() -> Rc<Self> {
        Rc::new_cyclic(|me| ManualTimeline {
            me: me.clone(),
            next_id: Cell::new(0),
            running: RefCell::new(Vec::new()),
            started: RefCell::new(Vec::new()),
            holds: Cell::new(0),
        })
    }

    /// Report the running stage `index` as finished. Returns false if no such stage runs.
    pub fn finish_stage(&self, index: usize) -> bool {
        let stage = {
            let mut running = self.running.borrow_mut();
            running
                .iter()
                .position(|s| s.index == index)
                .map(|i| running.remove(i))
        };
        match stage {
            Some(stage) => {
                (stage.on_finished)();
                true
            }
            None => false,
        }
    }

    /// Finish whatever stage is running, one at a time, until none is.
    pub fn finish_all(&self) {
        loop {
            let index = self.running.borrow().first().map(|s| s.index);
            match index {
                Some(index) => {
                    self.finish_stage(index);
                }
                None => break,
            }
        }
    }

    pub fn started(&self) -> Vec<(usize, StageKind)> {
        self.started.borrow().clone()
    }

    pub fn running(&self) -> Vec<usize> {
        self.running.borrow().iter().map(|s| s.index).collect()
    }

    pub fn holds(&self) -> u32 {
        self.holds.get()
    }
}

impl TimelineEngine for ManualTimeline {
    fn run_stage(&self, index: usize, stage: &Stage, on_finished: Box<dyn FnOnce()>) -> Handle {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.started.borrow_mut().push((index, stage.kind));
        self.running.borrow_mut().push(RunningStage {
            id,
            index,
            on_finished,
        });
        let me = self.me.clone();
        Handle::new(move || {
            if let Some(timeline) = me.upgrade() {
                timeline.running.borrow_mut().retain(|s| s.id != id);
            }
        })
    }

    fn hold(&self) {
        self.holds.set(self.holds.get() + 1);
    }
}

// =============================================================================
// Harness
// =============================================================================

/// All fakes wired to one executor and one virtual clock.
pub struct Harness {
    pub pool: LocalPool,
    pub scheduler: Rc<ManualScheduler>,
    pub media: Rc<FakeMedia>,
    pub gestures: Rc<FakeGestures>,
    pub scroll: Rc<FakeScrollLock>,
    pub timeline: Rc<ManualTimeline>,
}

impl Harness {
    pub fn new(policy: Policy) -> Self {
        let turn = Rc::new(Cell::new(None));
        let scheduler = ManualScheduler::new();
        let scroll = Rc::new(FakeScrollLock::default());
        *scroll.clock.borrow_mut() = Some(Rc::clone(&scheduler));
        Harness {
            pool: LocalPool::new(),
            media: FakeMedia::new(policy, Rc::clone(&turn), Rc::clone(&scheduler)),
            gestures: FakeGestures::new(turn),
            scroll,
            timeline: ManualTimeline::new(),
            scheduler,
        }
    }

    pub fn spawner(&self) -> Rc<dyn LocalSpawn> {
        Rc::new(self.pool.spawner())
    }

    /// Collaborators with the manually driven timeline.
    pub fn collaborators(&self) -> Collaborators {
        self.collaborators_with(self.timeline.clone())
    }

    pub fn collaborators_with(&self, timeline: Rc<dyn TimelineEngine>) -> Collaborators {
        Collaborators {
            media: self.media.clone(),
            scroll_lock: self.scroll.clone(),
            gestures: self.gestures.clone(),
            scheduler: self.scheduler.clone(),
            timeline,
            spawner: self.spawner(),
        }
    }

    /// Run every spawned task until none can make progress.
    pub fn settle(&mut self) {
        self.pool.run_until_stalled();
    }

    /// Advance virtual time and let resulting tasks run.
    pub fn advance(&mut self, by_ms: u32) {
        self.scheduler.advance(by_ms);
        self.settle();
    }

    pub fn gesture(&mut self, kind: GestureKind) -> u32 {
        let turn = self.gestures.dispatch(kind);
        self.settle();
        turn
    }
}

// =============================================================================
// Log capture
// =============================================================================

/// Collects formatted `tracing` output for assertions.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Install as the thread's default subscriber for the guard's lifetime.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn clear(&self) {
        if let Ok(mut bytes) = self.0.lock() {
            bytes.clear();
        }
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut bytes) = self.0.lock() {
            bytes.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
