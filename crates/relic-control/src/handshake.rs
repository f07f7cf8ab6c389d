//! Startup handshake: boot the embedded module and decide readiness.
//!
//! The module has no "boot succeeded" return value. Fatal configuration
//! problems surface as error-level print output during the boot window, on
//! the same channel as ordinary diagnostics. The handshake installs a
//! capturing [`DiagnosticSink`](crate::sink) before instantiation, wires
//! the control interface synchronously once the module exists, and then
//! inspects the captured log: non-empty means the boot failed.

use std::future::Future;

use relic_events::EventBus;
use relic_module::{FsBundle, LogSink, MachineModule, ModuleError};
use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::{Clock, WallClock};
use crate::control::MachineControl;
use crate::sink::DiagnosticSink;

/// Fatal startup failures. No control interface escapes any of these.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Module instantiation (binary load/link) failed.
    #[error("module instantiation failed: {0}")]
    Instantiate(#[source] ModuleError),

    /// Wiring the control interface (callback install, bundle mounts,
    /// entry point, run trigger) failed.
    #[error("wiring the control interface failed: {0}")]
    Wiring(#[source] ModuleError),

    /// The module produced error-level diagnostics before confirming
    /// readiness. Carries every captured fragment, newline-joined in
    /// emission order.
    #[error("module reported fatal boot diagnostics:\n{diagnostics}")]
    Boot { diagnostics: String },
}

/// Knobs for [`start`].
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Arguments passed to the module's `main` entry point.
    pub main_args: Vec<String>,
}

/// Boot a machine module and return a ready control interface.
///
/// `factory` receives the print sink that must be installed on the module
/// before instantiation, and resolves to the instantiated module. The
/// continuation after instantiation runs synchronously; the only suspension
/// points of the whole bridge are this instantiation await and the two
/// lifecycle futures.
pub async fn start<M, F, Fut>(
    factory: F,
    bundles: Vec<FsBundle>,
    options: StartOptions,
) -> Result<MachineControl<M>, StartupError>
where
    M: MachineModule,
    F: FnOnce(LogSink) -> Fut,
    Fut: Future<Output = Result<M, ModuleError>>,
{
    start_with_clock(factory, bundles, options, WallClock::new()).await
}

/// [`start`] with an explicit time source (deterministic tests).
pub async fn start_with_clock<M, C, F, Fut>(
    factory: F,
    bundles: Vec<FsBundle>,
    options: StartOptions,
    clock: C,
) -> Result<MachineControl<M, C>, StartupError>
where
    M: MachineModule,
    C: Clock,
    F: FnOnce(LogSink) -> Fut,
    Fut: Future<Output = Result<M, ModuleError>>,
{
    let bus = EventBus::new();
    let sink = DiagnosticSink::new(bus.clone());

    let module = factory(sink.as_log_sink())
        .await
        .map_err(StartupError::Instantiate)?;
    debug!("module instantiated");

    let control = MachineControl::wire(module, bus, clock, &bundles, &options.main_args)
        .map_err(StartupError::Wiring)?;

    let fragments = sink.take_captured();
    if !fragments.is_empty() {
        warn!(
            fragments = fragments.len(),
            "boot window produced fatal diagnostics"
        );
        // Best-effort release of the half-started module's resources.
        let _ = control.exit();
        return Err(StartupError::Boot {
            diagnostics: fragments.join("\n"),
        });
    }

    sink.set_forwarding();
    debug!("module ready");
    Ok(control)
}
