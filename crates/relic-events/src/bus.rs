use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::{Event, LogLevel};

struct Handler {
    id: u64,
    callback: Rc<dyn Fn(&Event)>,
}

#[derive(Default)]
struct BusInner {
    next_id: Cell<u64>,
    handlers: RefCell<Vec<Handler>>,
}

/// Synchronous fan-out of [`Event`]s to the current set of subscribers.
///
/// Cloning yields another handle to the same bus. The bus is intentionally
/// `!Send`: the whole bridge runs on one logical thread, and module
/// callbacks dispatch events from within host-to-module calls.
///
/// Dispatch iterates over a snapshot of the handler set taken at fire time,
/// so handlers may subscribe or unsubscribe (including dropping their own
/// [`Subscription`]) while an event is being delivered. A handler added
/// mid-dispatch does not observe the in-flight event.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for every subsequent event.
    ///
    /// The handler stays registered for the lifetime of the returned
    /// [`Subscription`]; dropping it unsubscribes.
    #[must_use = "dropping the subscription immediately unsubscribes the handler"]
    pub fn subscribe(&self, callback: impl Fn(&Event) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.handlers.borrow_mut().push(Handler {
            id,
            callback: Rc::new(callback),
        });
        Subscription {
            bus: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Number of currently registered handlers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.handlers.borrow().len()
    }

    /// Dispatch `event` synchronously to every registered handler.
    ///
    /// With zero subscribers this is a no-op; the event is dropped.
    pub fn fire(&self, event: &Event) {
        // Snapshot the handler list so re-entrant subscribe/unsubscribe
        // cannot invalidate the iteration.
        let snapshot: Vec<Rc<dyn Fn(&Event)>> = self
            .inner
            .handlers
            .borrow()
            .iter()
            .map(|h| Rc::clone(&h.callback))
            .collect();
        for callback in snapshot {
            callback(event);
        }
    }

    pub fn fire_message(&self, level: LogLevel, text: &str) {
        self.fire(&Event::Message {
            level,
            text: text.to_owned(),
        });
    }

    pub fn fire_frame_size(&self, width: u32, height: u32) {
        self.fire(&Event::FrameSize { width, height });
    }

    pub fn fire_frame(&self, width: u32, height: u32, rgba: Vec<u8>) {
        self.fire(&Event::Frame {
            width,
            height,
            rgba,
        });
    }

    pub fn fire_sound_push(&self, samples: Vec<f32>) {
        self.fire(&Event::SoundPush { samples });
    }

    pub fn fire_exit(&self) {
        self.fire(&Event::Exit);
    }
}

/// RAII handle for a registered event handler.
pub struct Subscription {
    bus: Weak<BusInner>,
    id: u64,
}

impl Subscription {
    /// Explicitly unregister the handler. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.handlers.borrow_mut().retain(|h| h.id != self.id);
        }
    }
}
