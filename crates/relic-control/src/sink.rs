//! Two-phase diagnostic sink for the boot window.
//!
//! The module reports fatal configuration problems (missing files, bad
//! machine config) on the same print channel as ordinary diagnostics, with
//! no boolean "boot failed" return. The handshake therefore buffers
//! error-level output while booting and inspects the buffer afterwards.
//! The sink stays installed for the module's whole lifetime; only its mode
//! changes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use relic_events::{EventBus, LogLevel};
use relic_module::LogSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkMode {
    /// Boot window: forward everything, additionally append error-level
    /// fragments to the startup error log.
    Capturing,
    /// Steady state: forward only.
    Forwarding,
}

pub(crate) struct DiagnosticSink {
    bus: EventBus,
    mode: Cell<SinkMode>,
    captured: RefCell<Vec<String>>,
}

impl DiagnosticSink {
    pub(crate) fn new(bus: EventBus) -> Rc<Self> {
        Rc::new(Self {
            bus,
            mode: Cell::new(SinkMode::Capturing),
            captured: RefCell::new(Vec::new()),
        })
    }

    /// Route one diagnostic line from the module.
    pub(crate) fn emit(&self, level: LogLevel, text: &str) {
        self.bus.fire_message(level, text);
        if self.mode.get() == SinkMode::Capturing && level == LogLevel::Error {
            self.captured.borrow_mut().push(text.to_owned());
        }
    }

    /// Drain the startup error log, in emission order.
    pub(crate) fn take_captured(&self) -> Vec<String> {
        std::mem::take(&mut *self.captured.borrow_mut())
    }

    /// Leave the boot window: error-level output is no longer captured.
    pub(crate) fn set_forwarding(&self) {
        self.mode.set(SinkMode::Forwarding);
    }

    /// Wrap this sink as the [`LogSink`] handed to the module factory.
    pub(crate) fn as_log_sink(self: &Rc<Self>) -> LogSink {
        let sink = Rc::clone(self);
        LogSink::new(move |level, text| sink.emit(level, text))
    }
}
