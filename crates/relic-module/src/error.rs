use thiserror::Error;

/// Failures surfaced by the module boundary.
///
/// `Clone` is deliberate: lifecycle futures are memoized and multiply
/// awaited, so their error payloads must be cloneable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    #[error("module entry point `{entry}` failed: {message}")]
    Entry {
        entry: &'static str,
        message: String,
    },

    #[error("module memory range out of bounds (ptr=0x{ptr:08x}, len={len})")]
    OutOfBounds { ptr: u32, len: usize },

    #[error("module memory at 0x{ptr:08x} is not valid UTF-8")]
    InvalidUtf8 { ptr: u32 },

    #[error("module filesystem rejected bundle `{name}`: {message}")]
    Bundle { name: String, message: String },
}

impl ModuleError {
    /// Convenience constructor for entry-point failures.
    pub fn entry(entry: &'static str, message: impl Into<String>) -> Self {
        Self::Entry {
            entry,
            message: message.into(),
        }
    }
}
