// One-shot gesture subscriptions.
// A subscription listens on several gesture kinds but fires once for the whole set:
// the first event detaches every sibling listener, then runs the callback.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::host::{GestureSource, Handle};
use crate::types::GestureKind;

struct Shared {
    fired: Cell<bool>,
    handles: RefCell<Vec<Handle>>,
    on_fire: RefCell<Option<Box<dyn FnOnce(GestureKind)>>>,
}

impl Shared {
    fn fire(&self, kind: GestureKind) {
        if self.fired.get() || self.on_fire.borrow().is_none() {
            return;
        }
        self.fired.set(true);
        let handles = std::mem::take(&mut *self.handles.borrow_mut());
        let on_fire = self.on_fire.borrow_mut().take();
        drop(handles);
        if let Some(on_fire) = on_fire {
            on_fire(kind);
        }
    }

    fn cancel(&self) {
        let handles = std::mem::take(&mut *self.handles.borrow_mut());
        let on_fire = self.on_fire.borrow_mut().take();
        drop(handles);
        drop(on_fire);
    }
}

/// A set of gesture listeners sharing one fired flag.
/// Dropping the subscription detaches whatever is still attached.
pub struct GestureSubscription {
    shared: Rc<Shared>,
}

impl GestureSubscription {
    pub fn arm(
        source: &dyn GestureSource,
        kinds: &[GestureKind],
        on_fire: impl FnOnce(GestureKind) + 'static,
    ) -> Self {
        let shared = Rc::new(Shared {
            fired: Cell::new(false),
            handles: RefCell::new(Vec::with_capacity(kinds.len())),
            on_fire: RefCell::new(Some(Box::new(on_fire))),
        });

        let handles: Vec<Handle> = kinds
            .iter()
            .map(|&kind| {
                let weak = Rc::downgrade(&shared);
                source.listen(
                    kind,
                    Rc::new(move |fired_kind: GestureKind| {
                        if let Some(shared) = weak.upgrade() {
                            shared.fire(fired_kind);
                        }
                    }),
                )
            })
            .collect();
        *shared.handles.borrow_mut() = handles;

        GestureSubscription { shared }
    }

    /// Still waiting for its gesture.
    pub fn is_armed(&self) -> bool {
        self.shared.on_fire.borrow().is_some()
    }

    #[cfg(test)]
    pub fn has_fired(&self) -> bool {
        self.shared.fired.get()
    }

    pub fn cancel(&self) {
        self.shared.cancel();
    }
}

impl Drop for GestureSubscription {
    fn drop(&mut self) {
        self.shared.cancel();
    }
}

/// Holds at most one outstanding retry subscription. Arming replaces the
/// previous subscription instead of stacking a second one.
#[derive(Default)]
pub struct RetrySlot {
    current: RefCell<Option<GestureSubscription>>,
}

impl RetrySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(
        &self,
        source: &dyn GestureSource,
        kinds: &[GestureKind],
        on_fire: impl FnOnce(GestureKind) + 'static,
    ) {
        // Detach the old set before the new one attaches.
        let previous = self.current.borrow_mut().take();
        drop(previous);

        let subscription = GestureSubscription::arm(source, kinds, on_fire);
        *self.current.borrow_mut() = Some(subscription);
    }

    pub fn is_armed(&self) -> bool {
        self.current
            .borrow()
            .as_ref()
            .is_some_and(|subscription| subscription.is_armed())
    }

    pub fn disarm(&self) {
        let previous = self.current.borrow_mut().take();
        drop(previous);
    }
}
