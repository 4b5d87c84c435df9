//! Wasmtime engine configuration and creation.

use tracing::info;
use wasmtime::{Config, Engine, OptLevel};

use avif_bridge_common::Error;

/// Thread-safe WebAssembly engine wrapper.
///
/// The engine is created once during backend probing and shared by every
/// decode/encode call; it holds compilation settings only and carries no
/// per-call state. Calls are synchronous and run to completion, so the
/// engine is configured without async support or interruption.
#[derive(Clone)]
pub struct GuestEngine {
    engine: Engine,
}

impl GuestEngine {
    /// Create a new engine with codec-appropriate settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if the Wasmtime configuration
    /// is rejected; the caller folds this into the sticky probe status.
    pub fn new() -> Result<Self, Error> {
        let mut config = Config::new();

        // Pixel conversion loops dominate runtime; always optimize for speed
        config.cranelift_opt_level(OptLevel::Speed);

        let engine = Engine::new(&config).map_err(|e| {
            Error::backend_unavailable(format!("failed to create wasm engine: {e}"))
        })?;

        info!("wasm engine initialized");

        Ok(Self { engine })
    }

    /// Get a reference to the inner Wasmtime engine.
    pub fn inner(&self) -> &Engine {
        &self.engine
    }
}

impl std::fmt::Debug for GuestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestEngine").finish_non_exhaustive()
    }
}
