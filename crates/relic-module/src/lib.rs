//! Capability-typed boundary to the embedded machine module.
//!
//! The emulator proper is an opaque, precompiled computation module; the
//! bridge drives it exclusively through the entry points and callback slots
//! declared here. Payloads the module produces (frames, audio, archives,
//! configuration text) are addressed as pointer + length into the module's
//! linear memory and must be copied out through [`ModuleMemory`] before the
//! triggering callback returns: that memory may be overwritten on the
//! module's very next internal step.
//!
//! Everything here assumes the bridge's single-threaded cooperative model:
//! the module re-enters the registered callbacks synchronously from within
//! host-to-module calls (`call_main`, `run`, the request entry points).
#![forbid(unsafe_code)]

use std::rc::Rc;

use relic_events::LogLevel;

mod callbacks;
mod error;
mod memory;

pub use callbacks::ModuleCallbacks;
pub use error::ModuleError;
pub use memory::ModuleMemory;

/// Shared print sink handed to the module at instantiation time.
///
/// The module routes every diagnostic line it would print through this sink,
/// tagged with a severity. The sink must be installed before instantiation:
/// fatal configuration problems are commonly reported on the same print
/// channel as ordinary diagnostics, during the boot window.
#[derive(Clone)]
pub struct LogSink {
    inner: Rc<dyn Fn(LogLevel, &str)>,
}

impl LogSink {
    pub fn new(sink: impl Fn(LogLevel, &str) + 'static) -> Self {
        Self {
            inner: Rc::new(sink),
        }
    }

    /// Route one diagnostic line.
    pub fn emit(&self, level: LogLevel, text: &str) {
        (self.inner.as_ref())(level, text);
    }
}

/// An input filesystem bundle mounted into the module before its entry
/// point runs (machine configuration, disk images, ROMs).
#[derive(Debug, Clone)]
pub struct FsBundle {
    name: String,
    bytes: Vec<u8>,
}

impl FsBundle {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Entry points of the embedded machine module.
///
/// One method per exposed entry point; implementations translate these into
/// whatever ABI the actual module uses. The trait is deliberately dumb: all
/// sequencing rules (install callbacks before `call_main`, `run` exactly
/// once, at most one persist/exit request) live in the control layer.
pub trait MachineModule {
    /// Install the callback slots the module invokes as it produces output.
    ///
    /// Called exactly once, after instantiation and before `call_main`.
    fn install_callbacks(&mut self, callbacks: ModuleCallbacks);

    /// Mount an input filesystem bundle into the module's filesystem.
    fn mount_bundle(&mut self, bundle: &FsBundle) -> Result<(), ModuleError>;

    /// Invoke the module's `main` entry point with `args`.
    fn call_main(&mut self, args: &[String]) -> Result<(), ModuleError>;

    /// Start the module's internal loop. The module re-enters the installed
    /// callbacks from within this call and from subsequent entry points.
    fn run(&mut self) -> Result<(), ModuleError>;

    /// Ask the module to terminate. Completion is reported through
    /// [`ModuleCallbacks::on_exit`].
    fn request_exit(&mut self) -> Result<(), ModuleError>;

    /// Ask the module to serialize its mutable state into an archive.
    /// Completion is reported through [`ModuleCallbacks::on_persist`].
    fn request_persist(&mut self) -> Result<(), ModuleError>;

    /// Suspend the module's internal clock.
    fn request_pause(&mut self);

    /// Resume the module's internal clock.
    fn request_resume(&mut self);

    /// Silence (or unsilence) the module's audio production.
    fn set_muted(&mut self, muted: bool);

    /// Current output width in pixels.
    fn frame_width(&self) -> u32;

    /// Current output height in pixels.
    fn frame_height(&self) -> u32;

    /// Pointer to the module's current RGBA frame buffer
    /// (`frame_width * frame_height * 4` bytes).
    fn frame_rgba_ptr(&self) -> u32;

    /// Stage the module's configuration as NUL-terminated UTF-8 text and
    /// return a pointer to it. The caller releases the staging buffer with
    /// [`MachineModule::free`].
    fn config_text_ptr(&mut self) -> Result<u32, ModuleError>;

    /// Release a module-allocated staging buffer.
    fn free(&mut self, ptr: u32);

    /// Forward a key transition. `timestamp_ms` is milliseconds relative to
    /// bridge start, non-decreasing.
    fn add_key(&mut self, key_code: u32, pressed: bool, timestamp_ms: u64);

    /// Forward mouse motion. `relative` selects delta coordinates over
    /// absolute ones.
    fn mouse_move(&mut self, x: f32, y: f32, relative: bool, timestamp_ms: u64);

    /// Forward a mouse button transition.
    fn mouse_button(&mut self, button: u8, pressed: bool, timestamp_ms: u64);

    /// Shared handle onto the module's linear memory.
    ///
    /// The handle stays valid for the module's lifetime and is usable from
    /// inside callbacks (it does not borrow the module).
    fn memory(&self) -> Rc<dyn ModuleMemory>;
}
