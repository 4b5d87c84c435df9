//! Integration tests for the guest execution backend.
//!
//! These tests drive the full guest protocol against WAT-defined stand-in
//! modules that honor the codec ABI: a counting bump allocator, a `decode`
//! that echoes metadata from the input header, and an `encode` that
//! produces a fixed-size stream. The live-allocation counter lives at
//! guest address 0 so the host can verify the leak invariant through
//! linear memory.

use avif_bridge_common::{DecodeMode, EncodeParams, Error, PixelCodec};
use avif_bridge_wasm::{GuestEngine, GuestInstance, GuestModule, GuestOp, ModuleRole, WasmCodec};

/// Fake decoder honoring the codec ABI. The input "stream" is a 6-byte
/// header: width u16le, height u16le, depth u8, frame count u8. Shorter
/// input is rejected, mimicking a malformed container.
const DECODER_WAT: &str = r#"
    (module
        (memory (export "memory") 64)
        (global $next (mut i32) (i32.const 1024))

        (func $allocate (export "allocate") (param $size i32) (result i32)
            (local $ptr i32)
            (local.set $ptr (global.get $next))
            (global.set $next
                (i32.and
                    (i32.add (i32.add (global.get $next) (local.get $size)) (i32.const 7))
                    (i32.const -8)))
            (i32.store (i32.const 0) (i32.add (i32.load (i32.const 0)) (i32.const 1)))
            (local.get $ptr))

        (func (export "deallocate") (param $ptr i32)
            (i32.store (i32.const 0) (i32.sub (i32.load (i32.const 0)) (i32.const 1))))

        (func (export "decode")
            (param $in i32) (param $len i32) (param $cfg i32) (param $all i32)
            (param $wp i32) (param $hp i32) (param $dp i32) (param $cp i32)
            (param $delayp i32) (param $outp i32)
            (result i32)
            (local $w i32) (local $h i32) (local $d i32) (local $n i32)
            (local $fsize i32) (local $i i32)

            (if (i32.lt_u (local.get $len) (i32.const 6))
                (then (return (i32.const 0))))

            (local.set $w (i32.load16_u (local.get $in)))
            (local.set $h (i32.load16_u offset=2 (local.get $in)))
            (local.set $d (i32.load8_u offset=4 (local.get $in)))
            (local.set $n (i32.load8_u offset=5 (local.get $in)))

            (i32.store (local.get $wp) (local.get $w))
            (i32.store (local.get $hp) (local.get $h))
            (i32.store (local.get $dp) (local.get $d))
            (i32.store (local.get $cp) (local.get $n))

            (if (i32.eqz (local.get $cfg))
                (then
                    (local.set $fsize
                        (i32.mul
                            (i32.mul (local.get $w) (local.get $h))
                            (select (i32.const 8) (i32.const 4)
                                (i32.gt_u (local.get $d) (i32.const 8)))))
                    (if (i32.eqz (local.get $all))
                        (then (local.set $n (i32.const 1))))
                    (local.set $i (i32.const 0))
                    (block $done
                        (loop $frames
                            (br_if $done (i32.ge_u (local.get $i) (local.get $n)))
                            (f64.store
                                (i32.add (local.get $delayp)
                                    (i32.mul (local.get $i) (i32.const 8)))
                                (f64.const 0.04))
                            (i32.store8
                                (i32.add (local.get $outp)
                                    (i32.mul (local.get $i) (local.get $fsize)))
                                (i32.const 0xAB))
                            (local.set $i (i32.add (local.get $i) (i32.const 1)))
                            (br $frames)))))

            (i32.const 1)))
"#;

/// Fake encoder: writes an 8-byte stream whose first byte echoes the
/// requested quality. A zero-width image is rejected with a zero size.
const ENCODER_WAT: &str = r#"
    (module
        (memory (export "memory") 16)
        (global $next (mut i32) (i32.const 1024))

        (func $allocate (export "allocate") (param $size i32) (result i32)
            (local $ptr i32)
            (local.set $ptr (global.get $next))
            (global.set $next
                (i32.and
                    (i32.add (i32.add (global.get $next) (local.get $size)) (i32.const 7))
                    (i32.const -8)))
            (i32.store (i32.const 0) (i32.add (i32.load (i32.const 0)) (i32.const 1)))
            (local.get $ptr))

        (func (export "deallocate") (param $ptr i32)
            (i32.store (i32.const 0) (i32.sub (i32.load (i32.const 0)) (i32.const 1))))

        (func (export "encode")
            (param $in i32) (param $w i32) (param $h i32) (param $sizep i32)
            (param $q i32) (param $qa i32) (param $s i32) (param $chroma i32)
            (result i32)
            (local $out i32)

            (if (i32.eqz (local.get $w))
                (then
                    (i64.store (local.get $sizep) (i64.const 0))
                    (return (i32.const 0))))

            (local.set $out (call $allocate (i32.const 8)))
            (i64.store (local.get $out) (i64.const 0x746665747661))
            (i32.store8 (local.get $out) (local.get $q))
            (i64.store (local.get $sizep) (i64.const 8))
            (local.get $out)))
"#;

fn fake_codec() -> WasmCodec {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let engine = GuestEngine::new().unwrap();
    let decoder = GuestModule::from_wat(engine.inner(), ModuleRole::Decoder, DECODER_WAT).unwrap();
    let encoder = GuestModule::from_wat(engine.inner(), ModuleRole::Encoder, ENCODER_WAT).unwrap();
    WasmCodec::from_modules(engine, decoder, encoder).unwrap()
}

fn decoder_module() -> GuestModule {
    let engine = GuestEngine::new().unwrap();
    GuestModule::from_wat(engine.inner(), ModuleRole::Decoder, DECODER_WAT).unwrap()
}

fn header(width: u16, height: u16, depth: u8, count: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(6);
    data.extend_from_slice(&width.to_le_bytes());
    data.extend_from_slice(&height.to_le_bytes());
    data.push(depth);
    data.push(count);
    data
}

fn encode_params() -> EncodeParams {
    EncodeParams {
        quality: 60,
        quality_alpha: 60,
        speed: 10,
        yuv_format: avif_bridge_common::codec::PIXEL_FORMAT_YUV420,
    }
}

// ============================================================================
// Test: Metadata (config-only) pass
// ============================================================================

#[test]
fn test_decode_config_metadata() {
    let codec = fake_codec();

    let payload = codec
        .decode(&header(512, 512, 8, 1), DecodeMode::ConfigOnly)
        .unwrap();

    assert_eq!(payload.width, 512);
    assert_eq!(payload.height, 512);
    assert_eq!(payload.depth, 8);
    assert!(payload.frames.is_empty());
    assert!(payload.delays.is_empty());
}

#[test]
fn test_config_matches_full_decode_metadata() {
    let codec = fake_codec();
    let data = header(64, 32, 8, 3);

    let config = codec.decode(&data, DecodeMode::ConfigOnly).unwrap();
    let full = codec.decode(&data, DecodeMode::AllFrames).unwrap();

    assert_eq!(config.width, full.width);
    assert_eq!(config.height, full.height);
    assert_eq!(config.depth, full.depth);
}

// ============================================================================
// Test: Single-frame decode
// ============================================================================

#[test]
fn test_decode_single_frame() {
    let codec = fake_codec();

    let payload = codec
        .decode(&header(16, 16, 8, 1), DecodeMode::FirstFrame)
        .unwrap();

    assert_eq!(payload.frames.len(), 1);
    assert_eq!(payload.delays.len(), 1);
    assert_eq!(payload.frames[0].len(), 16 * 16 * 4);
    assert_eq!(payload.frames[0][0], 0xAB);
    assert!(payload.delays[0] >= 0.0);
}

#[test]
fn test_decode_first_frame_of_animation() {
    let codec = fake_codec();

    // Multi-frame input, but only the first frame is requested
    let payload = codec
        .decode(&header(16, 16, 8, 5), DecodeMode::FirstFrame)
        .unwrap();

    assert_eq!(payload.frames.len(), 1);
    assert_eq!(payload.delays.len(), 1);
}

// ============================================================================
// Test: Multi-frame decode
// ============================================================================

#[test]
fn test_decode_all_seventeen_frames() {
    let codec = fake_codec();

    let payload = codec
        .decode(&header(64, 32, 8, 17), DecodeMode::AllFrames)
        .unwrap();

    assert_eq!(payload.frames.len(), 17);
    assert_eq!(payload.delays.len(), 17);
    for (frame, delay) in payload.frames.iter().zip(&payload.delays) {
        assert_eq!(frame.len(), 64 * 32 * 4);
        assert_eq!(frame[0], 0xAB);
        assert!(*delay >= 0.0);
    }
}

#[test]
fn test_decode_high_depth_frame_size() {
    let codec = fake_codec();

    let payload = codec
        .decode(&header(8, 8, 10, 1), DecodeMode::AllFrames)
        .unwrap();

    // Two bytes per channel above 8-bit depth
    assert_eq!(payload.frames[0].len(), 8 * 8 * 8);
}

// ============================================================================
// Test: Decode failure paths
// ============================================================================

#[test]
fn test_decode_failure_is_all_or_nothing() {
    let codec = fake_codec();

    let result = codec.decode(&[1, 2, 3], DecodeMode::AllFrames);
    assert!(matches!(result, Err(Error::Decode { .. })));
}

#[test]
fn test_decode_zero_frame_count() {
    let codec = fake_codec();

    let result = codec.decode(&header(8, 8, 8, 0), DecodeMode::FirstFrame);
    assert!(matches!(result, Err(Error::Decode { .. })));
}

#[test]
fn test_decode_config_of_empty_input() {
    let codec = fake_codec();

    let result = codec.decode(&[], DecodeMode::ConfigOnly);
    assert!(result.is_err());
}

// ============================================================================
// Test: Encode
// ============================================================================

#[test]
fn test_encode_produces_stream() {
    let codec = fake_codec();
    let rgba = vec![0u8; 16 * 16 * 4];

    let out = codec.encode(&rgba, 16, 16, &encode_params()).unwrap();

    assert_eq!(out.len(), 8);
    assert_eq!(out[0], 60, "fake encoder echoes quality into the stream");
}

#[test]
fn test_encode_failure() {
    let codec = fake_codec();

    let result = codec.encode(&[], 0, 0, &encode_params());
    assert!(matches!(result, Err(Error::Encode { .. })));
}

// ============================================================================
// Test: Allocation discipline
// ============================================================================

#[test]
fn test_instance_releases_every_allocation() {
    let module = decoder_module();
    let mut inst = GuestInstance::new(&module, GuestOp::Decode).unwrap();

    let data = header(16, 16, 8, 2);
    let in_ptr = inst.alloc(data.len() as u32).unwrap();
    inst.write_bytes(in_ptr, &data).unwrap();
    let scratch = inst.alloc(16).unwrap();
    let out_ptr = inst.alloc(16 * 16 * 4 * 2).unwrap();
    let delay_ptr = inst.alloc(16).unwrap();

    let status = inst
        .call_decode((
            in_ptr,
            data.len() as u32,
            0,
            1,
            scratch,
            scratch + 4,
            scratch + 8,
            scratch + 12,
            delay_ptr,
            out_ptr,
        ))
        .unwrap();
    assert_eq!(status, 1);
    assert_eq!(inst.outstanding(), 4);

    inst.free_all();

    assert_eq!(inst.outstanding(), 0);
    // The module's allocator counter at address 0 must balance out
    assert_eq!(inst.read_u32(0).unwrap(), 0);
}

#[test]
fn test_instance_releases_allocations_on_failure() {
    let module = decoder_module();
    let mut inst = GuestInstance::new(&module, GuestOp::Decode).unwrap();

    let in_ptr = inst.alloc(3).unwrap();
    inst.write_bytes(in_ptr, &[1, 2, 3]).unwrap();
    let scratch = inst.alloc(16).unwrap();

    // Malformed input: the guest rejects it with status 0
    let status = inst
        .call_decode((
            in_ptr,
            3,
            1,
            0,
            scratch,
            scratch + 4,
            scratch + 8,
            scratch + 12,
            0,
            0,
        ))
        .unwrap();
    assert_eq!(status, 0);

    inst.free_all();

    assert_eq!(inst.outstanding(), 0);
    assert_eq!(inst.read_u32(0).unwrap(), 0);
}

#[test]
fn test_codec_leaves_guest_allocator_balanced() {
    // Indirect check of the codec-level paths: a fresh instance per call
    // means a nonzero counter could only come from the call itself, which
    // always ends in free_all.
    let codec = fake_codec();

    for _ in 0..3 {
        codec
            .decode(&header(8, 8, 8, 2), DecodeMode::AllFrames)
            .unwrap();
        codec.decode(&[0], DecodeMode::ConfigOnly).unwrap_err();
    }
}

// ============================================================================
// Test: Memory access failures
// ============================================================================

#[test]
fn test_out_of_bounds_read() {
    let module = decoder_module();
    let mut inst = GuestInstance::new(&module, GuestOp::Decode).unwrap();

    let result = inst.read_bytes(u32::MAX - 16, 64);
    assert!(matches!(result, Err(Error::MemRead)));
}

#[test]
fn test_out_of_bounds_write() {
    let module = decoder_module();
    let mut inst = GuestInstance::new(&module, GuestOp::Decode).unwrap();

    let result = inst.write_bytes(u32::MAX - 16, &[0u8; 64]);
    assert!(matches!(result, Err(Error::MemWrite)));
}

// ============================================================================
// Test: Export validation
// ============================================================================

#[test]
fn test_probe_rejects_module_without_decode() {
    let engine = GuestEngine::new().unwrap();
    // Encoder-shaped module offered as the decoder artifact
    let decoder = GuestModule::from_wat(engine.inner(), ModuleRole::Decoder, ENCODER_WAT).unwrap();
    let encoder = GuestModule::from_wat(engine.inner(), ModuleRole::Encoder, ENCODER_WAT).unwrap();

    let result = WasmCodec::from_modules(engine, decoder, encoder);
    assert!(result.is_err());
    assert!(result.unwrap_err().is_backend_unavailable());
}

#[test]
fn test_instance_rejects_module_without_allocator() {
    let engine = GuestEngine::new().unwrap();
    let module = GuestModule::from_wat(engine.inner(), ModuleRole::Decoder, "(module)").unwrap();

    let result = GuestInstance::new(&module, GuestOp::Decode);
    assert!(result.is_err());
    assert!(result.unwrap_err().is_backend_unavailable());
}
