//! Scripted stand-in for the embedded machine module.
//!
//! Records every entry-point invocation, stages payloads (frames, audio,
//! archives, configuration text) in a fake linear heap, and replays a boot
//! script through the installed callback slots synchronously, the way the
//! real module re-enters the host.
#![allow(dead_code)]

use std::cell::RefCell;
use std::future::{ready, Ready};
use std::rc::Rc;

use relic_events::LogLevel;
use relic_module::{
    FsBundle, LogSink, MachineModule, ModuleCallbacks, ModuleError, ModuleMemory,
};

/// One recorded entry-point invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    MountBundle(String),
    CallMain(Vec<String>),
    Run,
    AddKey {
        key_code: u32,
        pressed: bool,
        timestamp_ms: u64,
    },
    MouseMove {
        x: f32,
        y: f32,
        relative: bool,
        timestamp_ms: u64,
    },
    MouseButton {
        button: u8,
        pressed: bool,
        timestamp_ms: u64,
    },
    RequestPersist,
    RequestExit,
    Pause,
    Resume,
    SetMuted(bool),
    Free(u32),
}

/// Bounds-checked copy-out views over the fake heap.
pub struct FakeHeap {
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl ModuleMemory for FakeHeap {
    fn read_bytes(&self, ptr: u32, len: usize) -> Result<Vec<u8>, ModuleError> {
        let bytes = self.bytes.borrow();
        let start = ptr as usize;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= bytes.len())
            .ok_or(ModuleError::OutOfBounds { ptr, len })?;
        Ok(bytes[start..end].to_vec())
    }

    fn read_cstr(&self, ptr: u32) -> Result<String, ModuleError> {
        let bytes = self.bytes.borrow();
        let start = ptr as usize;
        if start >= bytes.len() {
            return Err(ModuleError::OutOfBounds { ptr, len: 1 });
        }
        let nul = bytes[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(ModuleError::OutOfBounds {
                ptr,
                len: bytes.len() - start,
            })?;
        String::from_utf8(bytes[start..start + nul].to_vec())
            .map_err(|_| ModuleError::InvalidUtf8 { ptr })
    }
}

/// What the module does when asked to persist.
#[derive(Debug, Clone)]
pub enum PersistBehavior {
    /// Re-enter `on_persist(ptr, len)` synchronously from the request.
    Immediate { ptr: u32, len: usize },
    /// Accept the request; completion is triggered later via
    /// [`FakeHandle::finish_persist`].
    Deferred,
    /// Fail the request entry point synchronously.
    Fail(&'static str),
}

/// What the module does when asked to exit.
#[derive(Debug, Clone)]
pub enum ExitBehavior {
    /// Re-enter `on_exit(status)` synchronously from the request.
    Immediate(i32),
    /// Accept the request; completion is triggered later via
    /// [`FakeHandle::finish_exit`].
    Deferred,
}

/// Scripted callback emissions performed inside the `run` trigger.
#[derive(Debug, Clone)]
pub enum RunAction {
    FrameSize(u32, u32),
    Frame { width: u32, height: u32, ptr: u32 },
    SoundInit(u32),
    SoundPush { ptr: u32, count: usize },
    Log(LogLevel, &'static str),
}

struct Shared {
    heap: Rc<RefCell<Vec<u8>>>,
    callbacks: RefCell<Option<ModuleCallbacks>>,
    calls: RefCell<Vec<Call>>,
    log: RefCell<Option<LogSink>>,
}

impl Shared {
    fn with_callbacks(&self, f: impl FnOnce(&mut ModuleCallbacks)) {
        let mut slot = self.callbacks.borrow_mut();
        let callbacks = slot
            .as_mut()
            .expect("callbacks must be installed before the module emits output");
        f(callbacks);
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

/// Test-side handle onto the fake module, usable after the module itself
/// moved into the control interface.
#[derive(Clone)]
pub struct FakeHandle {
    shared: Rc<Shared>,
}

impl FakeHandle {
    pub fn calls(&self) -> Vec<Call> {
        self.shared.calls.borrow().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.shared.calls.borrow().iter().filter(|c| *c == call).count()
    }

    /// Overwrite heap contents starting at `ptr`, growing the heap if
    /// needed.
    pub fn write_heap(&self, ptr: u32, bytes: &[u8]) {
        let mut heap = self.shared.heap.borrow_mut();
        let end = ptr as usize + bytes.len();
        if heap.len() < end {
            heap.resize(end, 0);
        }
        heap[ptr as usize..end].copy_from_slice(bytes);
    }

    /// Emit a diagnostic line through the module's print sink.
    pub fn log(&self, level: LogLevel, text: &str) {
        let sink = self.shared.log.borrow();
        let sink = sink.as_ref().expect("module not instantiated");
        sink.emit(level, text);
    }

    pub fn emit_frame_size(&self, width: u32, height: u32) {
        self.shared
            .with_callbacks(|cb| (cb.on_frame_size)(width, height));
    }

    pub fn emit_frame(&self, width: u32, height: u32, ptr: u32) {
        self.shared
            .with_callbacks(|cb| (cb.on_frame)(width, height, ptr));
    }

    pub fn emit_sound_push(&self, ptr: u32, count: usize) {
        self.shared
            .with_callbacks(|cb| (cb.on_sound_push)(ptr, count));
    }

    /// Complete a deferred persist request.
    pub fn finish_persist(&self, ptr: u32, len: usize) {
        self.shared.with_callbacks(|cb| (cb.on_persist)(ptr, len));
    }

    /// Complete a deferred exit request.
    pub fn finish_exit(&self, status: i32) {
        self.shared.with_callbacks(|cb| (cb.on_exit)(status));
    }
}

pub struct FakeModule {
    shared: Rc<Shared>,
    memory: Rc<FakeHeap>,
    width: u32,
    height: u32,
    frame_ptr: u32,
    boot_logs: Vec<(LogLevel, String)>,
    run_actions: Vec<RunAction>,
    persist: PersistBehavior,
    exit: ExitBehavior,
    config_ptr: Result<u32, &'static str>,
    mount_error: Option<&'static str>,
}

impl MachineModule for FakeModule {
    fn install_callbacks(&mut self, callbacks: ModuleCallbacks) {
        *self.shared.callbacks.borrow_mut() = Some(callbacks);
    }

    fn mount_bundle(&mut self, bundle: &FsBundle) -> Result<(), ModuleError> {
        if let Some(message) = self.mount_error {
            return Err(ModuleError::Bundle {
                name: bundle.name().to_owned(),
                message: message.to_owned(),
            });
        }
        self.shared.record(Call::MountBundle(bundle.name().to_owned()));
        Ok(())
    }

    fn call_main(&mut self, args: &[String]) -> Result<(), ModuleError> {
        self.shared.record(Call::CallMain(args.to_vec()));
        let sink = self.shared.log.borrow().clone();
        let sink = sink.expect("log sink installed at instantiation");
        for (level, text) in &self.boot_logs {
            sink.emit(*level, text);
        }
        Ok(())
    }

    fn run(&mut self) -> Result<(), ModuleError> {
        self.shared.record(Call::Run);
        let actions = std::mem::take(&mut self.run_actions);
        for action in actions {
            match action {
                RunAction::FrameSize(w, h) => self.shared.with_callbacks(|cb| (cb.on_frame_size)(w, h)),
                RunAction::Frame { width, height, ptr } => self
                    .shared
                    .with_callbacks(|cb| (cb.on_frame)(width, height, ptr)),
                RunAction::SoundInit(rate) => {
                    self.shared.with_callbacks(|cb| (cb.on_sound_init)(rate))
                }
                RunAction::SoundPush { ptr, count } => {
                    self.shared.with_callbacks(|cb| (cb.on_sound_push)(ptr, count))
                }
                RunAction::Log(level, text) => {
                    let sink = self.shared.log.borrow().clone();
                    let sink = sink.expect("log sink installed at instantiation");
                    sink.emit(level, text);
                }
            }
        }
        Ok(())
    }

    fn request_exit(&mut self) -> Result<(), ModuleError> {
        self.shared.record(Call::RequestExit);
        match self.exit {
            ExitBehavior::Immediate(status) => {
                self.shared.with_callbacks(|cb| (cb.on_exit)(status));
            }
            ExitBehavior::Deferred => {}
        }
        Ok(())
    }

    fn request_persist(&mut self) -> Result<(), ModuleError> {
        self.shared.record(Call::RequestPersist);
        match self.persist {
            PersistBehavior::Immediate { ptr, len } => {
                self.shared.with_callbacks(|cb| (cb.on_persist)(ptr, len));
                Ok(())
            }
            PersistBehavior::Deferred => Ok(()),
            PersistBehavior::Fail(message) => Err(ModuleError::entry("request_persist", message)),
        }
    }

    fn request_pause(&mut self) {
        self.shared.record(Call::Pause);
    }

    fn request_resume(&mut self) {
        self.shared.record(Call::Resume);
    }

    fn set_muted(&mut self, muted: bool) {
        self.shared.record(Call::SetMuted(muted));
    }

    fn frame_width(&self) -> u32 {
        self.width
    }

    fn frame_height(&self) -> u32 {
        self.height
    }

    fn frame_rgba_ptr(&self) -> u32 {
        self.frame_ptr
    }

    fn config_text_ptr(&mut self) -> Result<u32, ModuleError> {
        self.config_ptr
            .map_err(|message| ModuleError::entry("config_text_ptr", message))
    }

    fn free(&mut self, ptr: u32) {
        self.shared.record(Call::Free(ptr));
    }

    fn add_key(&mut self, key_code: u32, pressed: bool, timestamp_ms: u64) {
        self.shared.record(Call::AddKey {
            key_code,
            pressed,
            timestamp_ms,
        });
    }

    fn mouse_move(&mut self, x: f32, y: f32, relative: bool, timestamp_ms: u64) {
        self.shared.record(Call::MouseMove {
            x,
            y,
            relative,
            timestamp_ms,
        });
    }

    fn mouse_button(&mut self, button: u8, pressed: bool, timestamp_ms: u64) {
        self.shared.record(Call::MouseButton {
            button,
            pressed,
            timestamp_ms,
        });
    }

    fn memory(&self) -> Rc<dyn ModuleMemory> {
        Rc::clone(&self.memory) as Rc<dyn ModuleMemory>
    }
}

/// Builder for a scripted [`FakeModule`].
pub struct FakeModuleBuilder {
    heap: Vec<u8>,
    width: u32,
    height: u32,
    frame_ptr: u32,
    boot_logs: Vec<(LogLevel, String)>,
    run_actions: Vec<RunAction>,
    persist: PersistBehavior,
    exit: ExitBehavior,
    config_ptr: Result<u32, &'static str>,
    mount_error: Option<&'static str>,
}

impl Default for FakeModuleBuilder {
    fn default() -> Self {
        Self {
            heap: Vec::new(),
            width: 320,
            height: 200,
            frame_ptr: 0,
            boot_logs: Vec::new(),
            run_actions: Vec::new(),
            persist: PersistBehavior::Deferred,
            exit: ExitBehavior::Immediate(0),
            config_ptr: Err("no configuration staged"),
            mount_error: None,
        }
    }
}

impl FakeModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn heap(mut self, bytes: Vec<u8>) -> Self {
        self.heap = bytes;
        self
    }

    pub fn frame(mut self, width: u32, height: u32, ptr: u32) -> Self {
        self.width = width;
        self.height = height;
        self.frame_ptr = ptr;
        self
    }

    pub fn boot_log(mut self, level: LogLevel, text: &str) -> Self {
        self.boot_logs.push((level, text.to_owned()));
        self
    }

    pub fn run_action(mut self, action: RunAction) -> Self {
        self.run_actions.push(action);
        self
    }

    pub fn persist(mut self, behavior: PersistBehavior) -> Self {
        self.persist = behavior;
        self
    }

    pub fn exit(mut self, behavior: ExitBehavior) -> Self {
        self.exit = behavior;
        self
    }

    pub fn config_at(mut self, ptr: u32) -> Self {
        self.config_ptr = Ok(ptr);
        self
    }

    pub fn reject_bundles(mut self, message: &'static str) -> Self {
        self.mount_error = Some(message);
        self
    }

    /// Split into a test-side handle and a factory for
    /// [`relic_control::start`].
    pub fn build(
        self,
    ) -> (
        FakeHandle,
        impl FnOnce(LogSink) -> Ready<Result<FakeModule, ModuleError>>,
    ) {
        let shared = Rc::new(Shared {
            heap: Rc::new(RefCell::new(self.heap)),
            callbacks: RefCell::new(None),
            calls: RefCell::new(Vec::new()),
            log: RefCell::new(None),
        });
        let handle = FakeHandle {
            shared: Rc::clone(&shared),
        };
        let module = FakeModule {
            memory: Rc::new(FakeHeap {
                bytes: Rc::clone(&shared.heap),
            }),
            shared,
            width: self.width,
            height: self.height,
            frame_ptr: self.frame_ptr,
            boot_logs: self.boot_logs,
            run_actions: self.run_actions,
            persist: self.persist,
            exit: self.exit,
            config_ptr: self.config_ptr,
            mount_error: self.mount_error,
        };
        let factory = move |sink: LogSink| {
            *module.shared.log.borrow_mut() = Some(sink);
            ready(Ok(module))
        };
        (handle, factory)
    }
}
