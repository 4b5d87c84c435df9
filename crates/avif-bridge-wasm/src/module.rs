//! Codec module compilation and artifact discovery.
//!
//! The codec ships as two WebAssembly artifacts, one exporting `decode`
//! and one exporting `encode` (libavif and its shims compiled against
//! WASI). With the `embed-wasm` feature the bytes are compiled into this
//! library; otherwise they are read from the paths named by the
//! `AVIF_BRIDGE_DECODER_WASM` / `AVIF_BRIDGE_ENCODER_WASM` environment
//! variables at probe time. A missing artifact is a captured probe
//! failure, not a build failure.

use std::time::Instant;

use tracing::info;
use wasmtime::{Engine, Module};

use avif_bridge_common::Error;

/// Which codec artifact a module was compiled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleRole {
    /// The artifact exporting `decode`.
    Decoder,
    /// The artifact exporting `encode`.
    Encoder,
}

impl ModuleRole {
    /// Environment variable naming this artifact's path.
    pub fn env_var(self) -> &'static str {
        match self {
            Self::Decoder => "AVIF_BRIDGE_DECODER_WASM",
            Self::Encoder => "AVIF_BRIDGE_ENCODER_WASM",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Decoder => "decoder",
            Self::Encoder => "encoder",
        }
    }
}

/// A compiled codec module.
///
/// Thread-safe; compiled once at probe time and shared by every call.
#[derive(Clone)]
pub struct GuestModule {
    inner: Module,
    role: ModuleRole,
}

impl GuestModule {
    /// Compile a module from WebAssembly bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if the bytes are not a
    /// WebAssembly module or compilation fails.
    pub fn from_bytes(engine: &Engine, role: ModuleRole, bytes: &[u8]) -> Result<Self, Error> {
        let start = Instant::now();

        validate_wasm_header(bytes)?;

        let module = Module::new(engine, bytes).map_err(|e| {
            Error::backend_unavailable(format!("{} module compilation failed: {e}", role.label()))
        })?;

        info!(
            role = role.label(),
            bytes_len = bytes.len(),
            duration_ms = start.elapsed().as_millis(),
            "codec module compiled"
        );

        Ok(Self {
            inner: module,
            role,
        })
    }

    /// Compile a module from WAT (WebAssembly Text Format).
    ///
    /// This is primarily for testing purposes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if compilation fails.
    pub fn from_wat(engine: &Engine, role: ModuleRole, wat: &str) -> Result<Self, Error> {
        let module = Module::new(engine, wat).map_err(|e| {
            Error::backend_unavailable(format!("{} WAT compilation failed: {e}", role.label()))
        })?;

        Ok(Self {
            inner: module,
            role,
        })
    }

    /// Locate and compile the artifact for `role`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if the artifact cannot be
    /// found or compiled.
    pub fn locate(engine: &Engine, role: ModuleRole) -> Result<Self, Error> {
        let bytes = artifact_bytes(role)?;
        Self::from_bytes(engine, role, &bytes)
    }

    /// Get the inner Wasmtime module.
    pub fn inner(&self) -> &Module {
        &self.inner
    }

    /// Which artifact this module was compiled from.
    pub fn role(&self) -> ModuleRole {
        self.role
    }
}

impl std::fmt::Debug for GuestModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestModule")
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "embed-wasm")]
fn artifact_bytes(role: ModuleRole) -> Result<Vec<u8>, Error> {
    static DECODER_WASM: &[u8] = include_bytes!("../wasm/avif_decode.wasm");
    static ENCODER_WASM: &[u8] = include_bytes!("../wasm/avif_encode.wasm");

    Ok(match role {
        ModuleRole::Decoder => DECODER_WASM.to_vec(),
        ModuleRole::Encoder => ENCODER_WASM.to_vec(),
    })
}

#[cfg(not(feature = "embed-wasm"))]
fn artifact_bytes(role: ModuleRole) -> Result<Vec<u8>, Error> {
    let var = role.env_var();
    let path = std::env::var_os(var).ok_or_else(|| {
        Error::backend_unavailable(format!("wasm artifact not configured ({var} unset)"))
    })?;

    tracing::debug!(role = role.label(), path = %path.to_string_lossy(), "reading wasm artifact");

    std::fs::read(&path).map_err(|e| {
        Error::backend_unavailable(format!(
            "cannot read wasm artifact {}: {e}",
            path.to_string_lossy()
        ))
    })
}

/// Validate the WebAssembly header (magic number).
fn validate_wasm_header(bytes: &[u8]) -> Result<(), Error> {
    if bytes.len() < 8 {
        return Err(Error::backend_unavailable(
            "invalid wasm artifact: file too small",
        ));
    }

    if &bytes[0..4] != b"\0asm" {
        return Err(Error::backend_unavailable(
            "invalid wasm artifact: bad magic number",
        ));
    }

    Ok(())
}
