//! The guest codec protocol.
//!
//! Decode is two-phase: a `config_only` pass populates metadata scratch
//! cells without touching pixels, then (when pixels are wanted) a second
//! pass fills a frame buffer and a parallel delay buffer. Every guest
//! allocation is released before the call returns, on success and on
//! every failure path, after which the per-call VM is dropped.

use tracing::debug;

use avif_bridge_common::{DecodeMode, DecodePayload, EncodeParams, Error, PixelCodec, PixelWordOrder};

use crate::engine::GuestEngine;
use crate::instance::{GuestInstance, GuestOp};
use crate::module::{GuestModule, ModuleRole};

/// Size of the metadata scratch block: width, height, depth, frame count.
const SCRATCH_BYTES: u32 = 4 * 4;

/// The Wasmtime-backed codec.
///
/// Holds the engine and the two compiled modules; both are read-only
/// after probing and shared by concurrent calls, each of which gets its
/// own VM instance.
pub struct WasmCodec {
    engine: GuestEngine,
    decoder: GuestModule,
    encoder: GuestModule,
}

impl WasmCodec {
    /// Locate, compile and validate both codec artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] when an artifact is missing,
    /// fails to compile, or lacks the expected exports. The caller folds
    /// this into the sticky probe status.
    pub fn probe() -> Result<Self, Error> {
        let engine = GuestEngine::new()?;
        let decoder = GuestModule::locate(engine.inner(), ModuleRole::Decoder)?;
        let encoder = GuestModule::locate(engine.inner(), ModuleRole::Encoder)?;
        Self::from_modules(engine, decoder, encoder)
    }

    /// Build a codec from already-compiled modules.
    ///
    /// Validates the expected exports by instantiating each module once.
    /// Exposed so tests can supply WAT-defined modules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if either module lacks its
    /// entry point.
    pub fn from_modules(
        engine: GuestEngine,
        decoder: GuestModule,
        encoder: GuestModule,
    ) -> Result<Self, Error> {
        let probe = GuestInstance::new(&decoder, GuestOp::Decode)?;
        if !probe.has_decode() {
            return Err(Error::backend_unavailable(
                "decoder module does not export decode",
            ));
        }

        let probe = GuestInstance::new(&encoder, GuestOp::Encode)?;
        if !probe.has_encode() {
            return Err(Error::backend_unavailable(
                "encoder module does not export encode",
            ));
        }

        Ok(Self {
            engine,
            decoder,
            encoder,
        })
    }

    /// The shared engine.
    pub fn engine(&self) -> &GuestEngine {
        &self.engine
    }

    fn run_decode(inst: &mut GuestInstance, data: &[u8], mode: DecodeMode) -> Result<DecodePayload, Error> {
        let in_len: u32 = data
            .len()
            .try_into()
            .map_err(|_| Error::decode("input exceeds guest address space"))?;

        let in_ptr = inst.alloc(in_len)?;
        inst.write_bytes(in_ptr, data)?;

        let scratch = inst.alloc(SCRATCH_BYTES)?;
        let width_ptr = scratch;
        let height_ptr = scratch + 4;
        let depth_ptr = scratch + 8;
        let count_ptr = scratch + 12;

        // Metadata pass: no pixel or delay buffers yet
        let status = inst.call_decode((
            in_ptr, in_len, 1, 0, width_ptr, height_ptr, depth_ptr, count_ptr, 0, 0,
        ))?;
        if status == 0 {
            return Err(Error::decode("codec rejected the stream"));
        }

        let width = inst.read_u32(width_ptr)?;
        let height = inst.read_u32(height_ptr)?;
        let depth = inst.read_u32(depth_ptr)?;
        let count = inst.read_u32(count_ptr)?;

        debug!(width, height, depth, count, "guest metadata pass complete");

        let mut payload = DecodePayload {
            width,
            height,
            depth,
            frames: Vec::new(),
            delays: Vec::new(),
            word_order: PixelWordOrder::LittleEndian,
        };

        if mode.config_only() {
            return Ok(payload);
        }

        if count == 0 {
            return Err(Error::decode("codec reported zero frames"));
        }

        let frame_size = payload.frame_size();
        let wanted = if mode.all_frames() { count as usize } else { 1 };

        let out_size: u32 = (frame_size * wanted)
            .try_into()
            .map_err(|_| Error::decode("decoded image exceeds guest address space"))?;
        let out_ptr = inst.alloc(out_size)?;

        let delay_size: u32 = (8 * wanted)
            .try_into()
            .map_err(|_| Error::decode("delay buffer exceeds guest address space"))?;
        let delay_ptr = inst.alloc(delay_size)?;

        let all = u32::from(mode.all_frames());
        let status = inst.call_decode((
            in_ptr, in_len, 0, all, width_ptr, height_ptr, depth_ptr, count_ptr, delay_ptr,
            out_ptr,
        ))?;
        if status == 0 {
            return Err(Error::decode("codec rejected the stream"));
        }

        for i in 0..wanted {
            let offset: u32 = (i * frame_size)
                .try_into()
                .map_err(|_| Error::MemRead)?;
            let frame_addr = out_ptr.checked_add(offset).ok_or(Error::MemRead)?;
            let frame = inst.read_bytes(frame_addr, frame_size)?;
            let delay = inst.read_f64(delay_ptr + (i as u32) * 8)?;

            payload.frames.push(frame);
            payload.delays.push(delay);
        }

        Ok(payload)
    }

    fn run_encode(
        inst: &mut GuestInstance,
        rgba: &[u8],
        width: u32,
        height: u32,
        params: &EncodeParams,
    ) -> Result<Vec<u8>, Error> {
        let in_len: u32 = rgba
            .len()
            .try_into()
            .map_err(|_| Error::encode("input exceeds guest address space"))?;

        let in_ptr = inst.alloc(in_len)?;
        inst.write_bytes(in_ptr, rgba)?;

        let size_ptr = inst.alloc(8)?;

        let out_ptr = inst.call_encode((
            in_ptr,
            width,
            height,
            size_ptr,
            params.quality as u32,
            params.quality_alpha as u32,
            params.speed as u32,
            params.yuv_format,
        ))?;

        let size = inst.read_u64(size_ptr)?;
        if size == 0 {
            return Err(Error::encode("codec returned an empty stream"));
        }

        // The result buffer was allocated inside the guest; balance it
        inst.track(out_ptr);

        let len: usize = size
            .try_into()
            .map_err(|_| Error::MemRead)?;
        inst.read_bytes(out_ptr, len)
    }
}

impl PixelCodec for WasmCodec {
    fn decode(&self, data: &[u8], mode: DecodeMode) -> Result<DecodePayload, Error> {
        let mut inst = GuestInstance::new(&self.decoder, GuestOp::Decode)?;
        let result = Self::run_decode(&mut inst, data, mode);
        inst.free_all();
        result
    }

    fn encode(
        &self,
        rgba: &[u8],
        width: u32,
        height: u32,
        params: &EncodeParams,
    ) -> Result<Vec<u8>, Error> {
        let mut inst = GuestInstance::new(&self.encoder, GuestOp::Encode)?;
        let result = Self::run_encode(&mut inst, rgba, width, height, params);
        inst.free_all();
        result
    }
}

impl std::fmt::Debug for WasmCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmCodec").finish_non_exhaustive()
    }
}
