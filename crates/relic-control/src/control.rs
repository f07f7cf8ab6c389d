//! The control interface facade over a running machine module.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures_util::future::ready;
use futures_util::FutureExt;
use relic_events::EventBus;
use relic_module::{FsBundle, MachineModule, ModuleCallbacks, ModuleError, ModuleMemory};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::clock::{Clock, WallClock};
use crate::input::InputTracker;
use crate::lifecycle::{CompletionSlot, ExitFuture, LifecycleError, PersistFuture, PersistResult};

/// Failures of [`MachineControl::config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("module configuration request failed: {0}")]
    Module(#[from] ModuleError),

    #[error("module configuration is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// An immutable copy of one rendered frame.
///
/// Alpha is forced to `0xFF` on every pixel: the module's renderer leaves
/// the alpha byte unpopulated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSnapshot {
    width: u32,
    height: u32,
    rgba: Box<[u8]>,
}

impl FrameSnapshot {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Tightly packed RGBA bytes, `width * height * 4` long.
    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }
}

/// One running emulator instance.
///
/// Produced exclusively by the startup handshake (see [`crate::start`]).
/// Intentionally `!Send`: the module runs cooperatively on the host's
/// thread and re-enters the wired callbacks from within calls made here.
///
/// Once [`MachineControl::exit`] has resolved the instance is conceptually
/// dead; the behavior of further calls is unspecified.
pub struct MachineControl<M: MachineModule, C: Clock = WallClock> {
    module: Rc<RefCell<M>>,
    memory: Rc<dyn ModuleMemory>,
    bus: EventBus,
    input: RefCell<InputTracker<C>>,
    sample_rate: Rc<Cell<u32>>,
    persist_slot: CompletionSlot<PersistResult>,
    exit_slot: CompletionSlot<i32>,
    persist_future: RefCell<Option<PersistFuture>>,
    exit_future: RefCell<Option<ExitFuture>>,
}

impl<M: MachineModule, C: Clock> MachineControl<M, C> {
    /// Wire a freshly instantiated module into a control interface.
    ///
    /// Runs entirely synchronously: installs the callback slots, mounts the
    /// input bundles, invokes the module's entry point and its run trigger.
    /// Any failure rejects the whole startup; no partially wired interface
    /// escapes.
    pub(crate) fn wire(
        module: M,
        bus: EventBus,
        clock: C,
        bundles: &[FsBundle],
        main_args: &[String],
    ) -> Result<Self, ModuleError> {
        let module = Rc::new(RefCell::new(module));
        let memory = module.borrow().memory();
        let input = RefCell::new(InputTracker::new(clock));
        let sample_rate = Rc::new(Cell::new(0u32));
        let persist_slot = CompletionSlot::new();
        let exit_slot = CompletionSlot::new();

        let callbacks = ModuleCallbacks {
            on_frame_size: {
                let bus = bus.clone();
                Box::new(move |width, height| bus.fire_frame_size(width, height))
            },
            on_frame: {
                let bus = bus.clone();
                let memory = Rc::clone(&memory);
                Box::new(move |width, height, rgba_ptr| {
                    let len = width as usize * height as usize * 4;
                    match memory.read_bytes(rgba_ptr, len) {
                        Ok(rgba) => bus.fire_frame(width, height, rgba),
                        Err(err) => warn!("dropping frame event with unreadable payload: {err}"),
                    }
                })
            },
            on_sound_init: {
                let sample_rate = Rc::clone(&sample_rate);
                Box::new(move |rate_hz| sample_rate.set(rate_hz))
            },
            on_sound_push: {
                let bus = bus.clone();
                let memory = Rc::clone(&memory);
                Box::new(move |samples_ptr, count| match memory.read_f32(samples_ptr, count) {
                    Ok(samples) => bus.fire_sound_push(samples),
                    Err(err) => warn!("dropping audio event with unreadable payload: {err}"),
                })
            },
            on_persist: {
                let slot = persist_slot.clone();
                let memory = Rc::clone(&memory);
                Box::new(move |archive_ptr, len| {
                    let outcome = memory
                        .read_bytes(archive_ptr, len)
                        .map(Rc::from)
                        .map_err(|source| LifecycleError::Archive { source });
                    slot.complete(outcome);
                })
            },
            on_exit: {
                let bus = bus.clone();
                let slot = exit_slot.clone();
                Box::new(move |status| {
                    // Subscribers must observe exit strictly after the
                    // module confirmed termination and before the exit
                    // future resolves.
                    bus.fire_exit();
                    slot.complete(status);
                })
            },
        };

        {
            let mut module = module.borrow_mut();
            module.install_callbacks(callbacks);
            for bundle in bundles {
                debug!(name = bundle.name(), "mounting bundle");
                module.mount_bundle(bundle)?;
            }
            module.call_main(main_args)?;
            module.run()?;
        }

        Ok(Self {
            module,
            memory,
            bus,
            input,
            sample_rate,
            persist_slot,
            exit_slot,
            persist_future: RefCell::new(None),
            exit_future: RefCell::new(None),
        })
    }

    /// Subscription point for module output.
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Current output width in pixels (live module query).
    pub fn width(&self) -> u32 {
        self.module.borrow().frame_width()
    }

    /// Current output height in pixels (live module query).
    pub fn height(&self) -> u32 {
        self.module.borrow().frame_height()
    }

    /// Audio sample rate in Hz; `0` until the module initialized sound.
    pub fn sound_frequency(&self) -> u32 {
        self.sample_rate.get()
    }

    /// Copy the module's current frame, with alpha forced opaque.
    pub fn screenshot(&self) -> Result<FrameSnapshot, ModuleError> {
        let (width, height, rgba_ptr) = {
            let module = self.module.borrow();
            (
                module.frame_width(),
                module.frame_height(),
                module.frame_rgba_ptr(),
            )
        };
        let mut rgba = self
            .memory
            .read_bytes(rgba_ptr, width as usize * height as usize * 4)?;
        for pixel in rgba.chunks_exact_mut(4) {
            pixel[3] = 0xFF;
        }
        Ok(FrameSnapshot {
            width,
            height,
            rgba: rgba.into_boxed_slice(),
        })
    }

    /// Fetch and parse the module's current configuration.
    pub fn config(&self) -> Result<serde_json::Value, ConfigError> {
        let ptr = self.module.borrow_mut().config_text_ptr()?;
        let text = self.memory.read_cstr(ptr);
        // The staging buffer is released even when decoding fails.
        self.module.borrow_mut().free(ptr);
        Ok(serde_json::from_str(&text?)?)
    }

    /// Forward a key transition, de-duplicated against the key matrix.
    pub fn send_key_event(&self, key_code: u32, pressed: bool) {
        match self.input.borrow_mut().key_event(key_code, pressed) {
            Some(stroke) => self.module.borrow_mut().add_key(
                stroke.key_code,
                stroke.pressed,
                stroke.timestamp_ms,
            ),
            None => trace!(key_code, pressed, "absorbed redundant key transition"),
        }
    }

    /// Tap one or more keys near-simultaneously: a full press pass, then a
    /// release pass stamped 16 ms later.
    pub fn simulate_key_press(&self, key_codes: &[u32]) {
        let strokes = self.input.borrow_mut().tap(key_codes);
        let mut module = self.module.borrow_mut();
        for stroke in strokes {
            module.add_key(stroke.key_code, stroke.pressed, stroke.timestamp_ms);
        }
    }

    /// Forward absolute mouse motion. Never de-duplicated.
    pub fn send_mouse_motion(&self, x: f32, y: f32) {
        let now = self.input.borrow().elapsed_ms();
        self.module.borrow_mut().mouse_move(x, y, false, now);
    }

    /// Forward relative mouse motion. Never de-duplicated.
    pub fn send_mouse_relative_motion(&self, dx: f32, dy: f32) {
        let now = self.input.borrow().elapsed_ms();
        self.module.borrow_mut().mouse_move(dx, dy, true, now);
    }

    /// Forward a mouse button transition. Never de-duplicated.
    pub fn send_mouse_button(&self, button: u8, pressed: bool) {
        let now = self.input.borrow().elapsed_ms();
        self.module.borrow_mut().mouse_button(button, pressed, now);
    }

    /// Suspend the module's internal clock.
    pub fn pause(&self) {
        self.module.borrow_mut().request_pause();
    }

    /// Resume the module's internal clock.
    pub fn resume(&self) {
        self.module.borrow_mut().request_resume();
    }

    /// Silence the module's audio production.
    pub fn mute(&self) {
        self.module.borrow_mut().set_muted(true);
    }

    /// Undo [`MachineControl::mute`].
    pub fn unmute(&self) {
        self.module.borrow_mut().set_muted(false);
    }

    /// Serialize the module's mutable state into an archive.
    ///
    /// Memoized: the module sees at most one persist request per instance;
    /// every call returns the same multiply-awaitable future. A synchronous
    /// request failure memoizes a rejected future and the one-shot persist
    /// callback is abandoned.
    pub fn persist(&self) -> PersistFuture {
        if let Some(future) = self.persist_future.borrow().as_ref() {
            return future.clone();
        }

        debug!("requesting state archive");
        let rx = self.persist_slot.arm();
        let future: PersistFuture = match self.module.borrow_mut().request_persist() {
            Ok(()) => rx
                .map(|received| match received {
                    Ok(outcome) => outcome,
                    Err(_canceled) => Err(LifecycleError::Abandoned { op: "persist" }),
                })
                .boxed_local()
                .shared(),
            Err(source) => {
                self.persist_slot.disarm();
                ready(Err(LifecycleError::Request {
                    op: "persist",
                    source,
                }))
                .boxed_local()
                .shared()
            }
        };
        *self.persist_future.borrow_mut() = Some(future.clone());
        future
    }

    /// Ask the module to terminate and await confirmation.
    ///
    /// Memoized and idempotent: the module sees at most one exit request
    /// per instance. The future resolves to the module's exit status, and
    /// only after the module confirmed termination; an [`Exit`] event is
    /// fired on the bus first.
    ///
    /// [`Exit`]: relic_events::Event::Exit
    pub fn exit(&self) -> ExitFuture {
        if let Some(future) = self.exit_future.borrow().as_ref() {
            return future.clone();
        }

        debug!("requesting module shutdown");
        let rx = self.exit_slot.arm();
        let future: ExitFuture = match self.module.borrow_mut().request_exit() {
            Ok(()) => rx
                .map(|received: Result<i32, _>| {
                    received.map_err(|_canceled| LifecycleError::Abandoned { op: "exit" })
                })
                .boxed_local()
                .shared(),
            Err(source) => {
                self.exit_slot.disarm();
                ready(Err(LifecycleError::Request { op: "exit", source }))
                    .boxed_local()
                    .shared()
            }
        };
        *self.exit_future.borrow_mut() = Some(future.clone());
        future
    }
}
