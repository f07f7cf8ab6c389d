//! Event vocabulary and fan-out for the machine control bridge.
//!
//! The embedded machine module produces output (frames, audio chunks, log
//! lines, lifecycle signals) by re-entering host-registered callbacks from
//! within calls the host makes into it. This crate turns those re-entries
//! into typed [`Event`] values dispatched synchronously on an [`EventBus`]
//! to however many subscribers are currently registered.
//!
//! There is intentionally no buffering: frame/audio cadence is driven by the
//! module's own clock, and an event fired while nobody is subscribed is
//! dropped.
#![forbid(unsafe_code)]

mod bus;

pub use bus::{EventBus, Subscription};

/// Severity of a diagnostic line printed by the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A single output produced by the machine module.
///
/// Buffer payloads (`Frame::rgba`, `SoundPush::samples`) are copies made
/// before dispatch; they never alias module-internal memory.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A diagnostic line from one of the module's print sinks.
    Message { level: LogLevel, text: String },
    /// The module changed its output resolution.
    FrameSize { width: u32, height: u32 },
    /// A rendered frame, tightly packed RGBA (`width * height * 4` bytes).
    Frame {
        width: u32,
        height: u32,
        rgba: Vec<u8>,
    },
    /// A chunk of interleaved f32 audio samples.
    SoundPush { samples: Vec<f32> },
    /// The module finished terminating. Fired strictly after the module
    /// confirmed shutdown, never before.
    Exit,
}
