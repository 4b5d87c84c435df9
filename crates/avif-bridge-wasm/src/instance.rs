//! Per-call VM instance and linear-memory marshalling.
//!
//! Every decode/encode call instantiates the compiled module into a fresh
//! [`wasmtime::Store`], giving it a private linear memory that disappears
//! when the call ends. Guest allocations made through the module's
//! `allocate` export are tracked so that [`GuestInstance::free_all`] can
//! release them on every exit path, success or failure; the outstanding
//! count is observable for leak checks.

use tracing::{debug, warn};
use wasmtime::{Linker, Memory, Store, TypedFunc};
use wasmtime_wasi::preview1::{self, WasiP1Ctx};
use wasmtime_wasi::WasiCtxBuilder;

use avif_bridge_common::Error;

use crate::module::GuestModule;

/// Parameter tuple of the codec's `decode` export:
/// `(in_ptr, in_len, config_only, decode_all, width_ptr, height_ptr,
///   depth_ptr, count_ptr, delay_ptr, out_ptr)`.
pub type DecodeArgs = (u32, u32, u32, u32, u32, u32, u32, u32, u32, u32);

/// Parameter tuple of the codec's `encode` export:
/// `(in_ptr, width, height, size_ptr, quality, quality_alpha, speed,
///   chroma)`.
pub type EncodeArgs = (u32, u32, u32, u32, u32, u32, u32, u32);

/// Which operation this instance serves; selects the error variant used
/// for guest traps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestOp {
    /// A decode call; traps surface as [`Error::Decode`].
    Decode,
    /// An encode call; traps surface as [`Error::Encode`].
    Encode,
}

/// A per-call codec VM instance.
///
/// Not shared across calls: each instance owns its store, memory and
/// allocation ledger, and is dropped at the end of the call that created
/// it.
pub struct GuestInstance {
    store: Store<WasiP1Ctx>,
    memory: Memory,
    allocate: TypedFunc<u32, u32>,
    deallocate: TypedFunc<u32, ()>,
    decode: Option<TypedFunc<DecodeArgs, u32>>,
    encode: Option<TypedFunc<EncodeArgs, u32>>,
    op: GuestOp,
    live: Vec<u32>,
}

impl GuestInstance {
    /// Instantiate `module` into a fresh store with WASI preview1 linked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if linking or instantiation
    /// fails, or the module is missing the `memory`, `allocate` or
    /// `deallocate` exports.
    pub fn new(module: &GuestModule, op: GuestOp) -> Result<Self, Error> {
        let engine = module.inner().engine();

        let mut linker: Linker<WasiP1Ctx> = Linker::new(engine);
        preview1::add_to_linker_sync(&mut linker, |cx| cx).map_err(|e| {
            Error::backend_unavailable(format!("failed to link wasi preview1: {e}"))
        })?;

        let wasi = WasiCtxBuilder::new()
            .inherit_stdout()
            .inherit_stderr()
            .build_p1();
        let mut store = Store::new(engine, wasi);

        let instance = linker.instantiate(&mut store, module.inner()).map_err(|e| {
            Error::backend_unavailable(format!("module instantiation failed: {e}"))
        })?;

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| Error::backend_unavailable("module does not export memory"))?;

        let allocate = instance
            .get_typed_func::<u32, u32>(&mut store, "allocate")
            .map_err(|_| Error::backend_unavailable("module does not export allocate"))?;
        let deallocate = instance
            .get_typed_func::<u32, ()>(&mut store, "deallocate")
            .map_err(|_| Error::backend_unavailable("module does not export deallocate"))?;

        let decode = instance
            .get_typed_func::<DecodeArgs, u32>(&mut store, "decode")
            .ok();
        let encode = instance
            .get_typed_func::<EncodeArgs, u32>(&mut store, "encode")
            .ok();

        Ok(Self {
            store,
            memory,
            allocate,
            deallocate,
            decode,
            encode,
            op,
            live: Vec::new(),
        })
    }

    /// Allocate `size` bytes of guest memory and track the pointer.
    pub fn alloc(&mut self, size: u32) -> Result<u32, Error> {
        let ptr = self
            .allocate
            .call(&mut self.store, size)
            .map_err(|e| self.fault("alloc", &e))?;
        self.live.push(ptr);
        Ok(ptr)
    }

    /// Track a guest pointer allocated by the module itself (e.g. the
    /// encode result buffer) so `free_all` releases it.
    pub fn track(&mut self, ptr: u32) {
        self.live.push(ptr);
    }

    /// Release a single tracked allocation.
    pub fn free(&mut self, ptr: u32) {
        if let Some(pos) = self.live.iter().position(|&p| p == ptr) {
            self.live.swap_remove(pos);
        }
        if let Err(e) = self.deallocate.call(&mut self.store, ptr) {
            warn!(ptr, error = %e, "guest free trapped");
        }
    }

    /// Release every tracked allocation.
    ///
    /// Called on all exit paths before the instance is dropped; the VM
    /// memory itself dies with the store, but the codec's allocator is
    /// still balanced so leak instrumentation inside the module stays
    /// accurate.
    pub fn free_all(&mut self) {
        for ptr in std::mem::take(&mut self.live) {
            if let Err(e) = self.deallocate.call(&mut self.store, ptr) {
                warn!(ptr, error = %e, "guest free trapped");
            }
        }
    }

    /// Number of tracked allocations not yet released.
    pub fn outstanding(&self) -> usize {
        self.live.len()
    }

    /// Copy `bytes` into guest memory at `ptr`.
    pub fn write_bytes(&mut self, ptr: u32, bytes: &[u8]) -> Result<(), Error> {
        self.memory
            .write(&mut self.store, ptr as usize, bytes)
            .map_err(|_| Error::MemWrite)
    }

    /// Copy `len` bytes out of guest memory at `ptr`.
    pub fn read_bytes(&mut self, ptr: u32, len: usize) -> Result<Vec<u8>, Error> {
        // Bounds check before reserving a host buffer, so corrupt guest
        // metadata cannot drive an oversized allocation
        let end = (ptr as usize).checked_add(len).ok_or(Error::MemRead)?;
        if end > self.memory.data_size(&self.store) {
            return Err(Error::MemRead);
        }

        let mut buf = vec![0u8; len];
        self.memory
            .read(&self.store, ptr as usize, &mut buf)
            .map_err(|_| Error::MemRead)?;
        Ok(buf)
    }

    /// Read a little-endian `u32` scalar from guest memory.
    pub fn read_u32(&mut self, ptr: u32) -> Result<u32, Error> {
        let bytes = self.read_bytes(ptr, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a little-endian `u64` scalar from guest memory.
    pub fn read_u64(&mut self, ptr: u32) -> Result<u64, Error> {
        let bytes = self.read_bytes(ptr, 8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes);
        Ok(u64::from_le_bytes(raw))
    }

    /// Read a little-endian `f64` scalar from guest memory.
    pub fn read_f64(&mut self, ptr: u32) -> Result<f64, Error> {
        Ok(f64::from_bits(self.read_u64(ptr)?))
    }

    /// Invoke the module's `decode` export.
    pub fn call_decode(&mut self, args: DecodeArgs) -> Result<u32, Error> {
        let func = self
            .decode
            .as_ref()
            .ok_or_else(|| Error::backend_unavailable("module does not export decode"))?
            .clone();
        debug!(in_len = args.1, config_only = args.2, decode_all = args.3, "guest decode");
        func.call(&mut self.store, args)
            .map_err(|e| self.fault("decode", &e))
    }

    /// Invoke the module's `encode` export.
    pub fn call_encode(&mut self, args: EncodeArgs) -> Result<u32, Error> {
        let func = self
            .encode
            .as_ref()
            .ok_or_else(|| Error::backend_unavailable("module does not export encode"))?
            .clone();
        debug!(width = args.1, height = args.2, "guest encode");
        func.call(&mut self.store, args)
            .map_err(|e| self.fault("encode", &e))
    }

    /// Returns `true` if the module exports `decode`.
    pub fn has_decode(&self) -> bool {
        self.decode.is_some()
    }

    /// Returns `true` if the module exports `encode`.
    pub fn has_encode(&self) -> bool {
        self.encode.is_some()
    }

    fn fault(&self, step: &str, trap: &wasmtime::Error) -> Error {
        match self.op {
            GuestOp::Decode => Error::decode(format!("{step} trapped: {trap}")),
            GuestOp::Encode => Error::encode(format!("{step} trapped: {trap}")),
        }
    }
}

impl std::fmt::Debug for GuestInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestInstance")
            .field("op", &self.op)
            .field("outstanding", &self.live.len())
            .finish_non_exhaustive()
    }
}
