//! Host-side control bridge for an embedded legacy-machine emulator.
//!
//! This crate is the control plane over an opaque, callback-driven machine
//! module (see `relic-module`): it boots the module and decides readiness
//! vs. fatal failure, de-duplicates input before forwarding it, bridges the
//! module's one-shot persist/exit callbacks to memoized multiply-awaitable
//! futures, and fans module output out as typed events (`relic-events`).
//!
//! The whole bridge runs on one logical thread. The module executes
//! cooperatively on the host's execution context and re-enters the wired
//! callbacks synchronously from within host-to-module calls; the only
//! suspension points are module instantiation and the two lifecycle
//! futures. Types here are intentionally `!Send`.
#![forbid(unsafe_code)]

mod clock;
mod control;
mod handshake;
mod input;
mod lifecycle;
mod sink;

pub use clock::{Clock, ManualClock, WallClock};
pub use control::{ConfigError, FrameSnapshot, MachineControl};
pub use handshake::{start, start_with_clock, StartOptions, StartupError};
pub use input::{InputTracker, KeyStroke};
pub use lifecycle::{ExitFuture, ExitResult, LifecycleError, PersistFuture, PersistResult};
