//! Backend selection and one-time initialization.
//!
//! The first call pays for probing: the native library is tried first
//! (resolve, bind symbols, gate the version), then the guest engine
//! (compile the wasm artifacts). The outcome — whichever backend won, or
//! both captured failure reasons — is stored in a process-wide `OnceLock`
//! and never recomputed; later calls only read it. A panic raised while
//! probing is converted into the unavailable status, not propagated.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;

use tracing::{info, warn};

use avif_bridge_common::{Error, PixelCodec};
use avif_bridge_native::NativeCodec;
use avif_bridge_wasm::WasmCodec;

/// Which codec execution path is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Direct calls into the platform libavif.
    Native,
    /// The codec compiled to WebAssembly, run inside Wasmtime.
    Wasm,
}

pub(crate) struct Backend {
    pub kind: BackendKind,
    pub codec: Box<dyn PixelCodec>,
}

struct ProbeOutcome {
    backend: Option<Backend>,
    native_error: Option<String>,
    wasm_error: Option<String>,
}

static STATUS: OnceLock<ProbeOutcome> = OnceLock::new();

/// Resolve the active backend, probing on the first call.
///
/// Exactly one thread performs the probe; everyone else blocks on the
/// `OnceLock` and then observes the cached outcome. The failure reason is
/// re-reported identically on every later call.
pub(crate) fn ensure_ready() -> Result<&'static Backend, Error> {
    let outcome = STATUS.get_or_init(probe);

    outcome.backend.as_ref().ok_or_else(|| {
        Error::backend_unavailable(format!(
            "native: {}; wasm: {}",
            outcome.native_error.as_deref().unwrap_or("not attempted"),
            outcome.wasm_error.as_deref().unwrap_or("not attempted"),
        ))
    })
}

/// Eagerly initialize the backend instead of paying on the first decode.
///
/// Idempotent; returns the active backend kind or the captured failure.
pub fn initialize() -> Result<BackendKind, Error> {
    ensure_ready().map(|backend| backend.kind)
}

/// The active backend kind, if initialization has succeeded.
///
/// Triggers initialization when it has not happened yet.
pub fn backend_kind() -> Option<BackendKind> {
    ensure_ready().ok().map(|backend| backend.kind)
}

/// Whether the native library path is active.
///
/// Returns the captured discovery failure (library not found, missing
/// symbol, version too old) when the process fell back to the guest
/// engine or has no backend at all.
pub fn native_status() -> Result<(), Error> {
    let outcome = STATUS.get_or_init(probe);

    match &outcome.native_error {
        None if outcome.backend.is_some() => Ok(()),
        Some(reason) => Err(Error::backend_unavailable(reason.clone())),
        None => Err(Error::backend_unavailable("native probe not attempted")),
    }
}

fn probe() -> ProbeOutcome {
    match guarded(NativeCodec::probe) {
        Ok(codec) => {
            let (major, minor) = codec.version();
            info!(major, minor, "native backend selected");

            ProbeOutcome {
                backend: Some(Backend {
                    kind: BackendKind::Native,
                    codec: Box::new(codec),
                }),
                native_error: None,
                wasm_error: None,
            }
        }
        Err(native_error) => {
            warn!(reason = %native_error, "native backend unavailable, trying wasm");

            match guarded(WasmCodec::probe) {
                Ok(codec) => {
                    info!("wasm backend selected");

                    ProbeOutcome {
                        backend: Some(Backend {
                            kind: BackendKind::Wasm,
                            codec: Box::new(codec),
                        }),
                        native_error: Some(native_error),
                        wasm_error: None,
                    }
                }
                Err(wasm_error) => {
                    warn!(reason = %wasm_error, "wasm backend unavailable");

                    ProbeOutcome {
                        backend: None,
                        native_error: Some(native_error),
                        wasm_error: Some(wasm_error),
                    }
                }
            }
        }
    }
}

/// Run a probe with panic containment: a fault while compiling or loading
/// a backend becomes a captured reason, never an unwind into the caller.
fn guarded<C>(probe: impl FnOnce() -> Result<C, Error>) -> Result<C, String> {
    match catch_unwind(AssertUnwindSafe(probe)) {
        Ok(Ok(codec)) => Ok(codec),
        Ok(Err(err)) => Err(err.to_string()),
        Err(panic) => Err(panic_message(&panic)),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("probe panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("probe panicked: {message}")
    } else {
        "probe panicked".to_string()
    }
}
