/// Callback slots the module invokes as it produces output.
///
/// Installed once, immediately after instantiation. Pointer arguments are
/// valid only for the duration of the callback; handlers copy what they
/// keep through the module's [`crate::ModuleMemory`] handle.
pub struct ModuleCallbacks {
    /// Output resolution changed.
    pub on_frame_size: Box<dyn FnMut(u32, u32)>,
    /// A frame is ready: `(width, height, rgba_ptr)`, with
    /// `width * height * 4` RGBA bytes at `rgba_ptr`.
    pub on_frame: Box<dyn FnMut(u32, u32, u32)>,
    /// Audio output initialized at the given sample rate (Hz). Fired once.
    pub on_sound_init: Box<dyn FnMut(u32)>,
    /// An audio chunk is ready: `(samples_ptr, sample_count)` f32 samples.
    pub on_sound_push: Box<dyn FnMut(u32, usize)>,
    /// A state archive was produced: `(archive_ptr, byte_len)`.
    pub on_persist: Box<dyn FnMut(u32, usize)>,
    /// The module finished terminating, with its exit status.
    pub on_exit: Box<dyn FnMut(i32)>,
}

impl ModuleCallbacks {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for ModuleCallbacks {
    fn default() -> Self {
        Self {
            on_frame_size: Box::new(|_, _| {}),
            on_frame: Box::new(|_, _, _| {}),
            on_sound_init: Box::new(|_| {}),
            on_sound_push: Box::new(|_, _| {}),
            on_persist: Box::new(|_, _| {}),
            on_exit: Box::new(|_| {}),
        }
    }
}
