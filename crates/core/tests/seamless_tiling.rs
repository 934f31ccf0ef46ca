//! End-to-end tests for seamless tiling patches.
//!
//! A network whose convolutions all pad circularly (stride 1) commutes with
//! cyclic shifts of its input: shifting the input and running the network
//! gives the same result as running it and shifting the output. That is the
//! property that makes the output tile without a seam, and it is what these
//! tests check on tiny CPU networks.

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Conv2dConfig, VarBuilder, VarMap};
use seamless_core::testing::{TinyDecoder, TinyDenoiser};
use seamless_core::{
    apply_stepped, conv_layers, tileable_conv2d, CircularDecode, LatentDecoder, LayerMut,
    LayerTree, SeamlessTilingPatch, StepRange, TileableConv2d, TilingMode,
};

// ─── Helpers ─────────────────────────────────────────────────────────────────

const W: usize = 3;
const H: usize = 2;

fn roll(x: &Tensor, shift: usize, dim: usize) -> Tensor {
    let n = x.dim(dim).unwrap();
    let shift = shift % n;
    if shift == 0 {
        return x.clone();
    }
    let tail = x.narrow(dim, n - shift, shift).unwrap();
    let head = x.narrow(dim, 0, n - shift).unwrap();
    Tensor::cat(&[&tail, &head], dim).unwrap()
}

fn max_abs_diff(a: &Tensor, b: &Tensor) -> f32 {
    assert_eq!(a.dims(), b.dims());
    (a - b)
        .unwrap()
        .abs()
        .unwrap()
        .max_all()
        .unwrap()
        .to_scalar::<f32>()
        .unwrap()
}

fn input(device: &Device) -> Tensor {
    Tensor::randn(0.0f32, 1.0, (1, 2, 8, 10), device).unwrap()
}

/// Does `f` commute with a cyclic shift along `dim`?
fn commutes_with_shift(f: impl Fn(&Tensor) -> Tensor, x: &Tensor, shift: usize, dim: usize) -> bool {
    let shifted_then_f = f(&roll(x, shift, dim));
    let f_then_shifted = roll(&f(x), shift, dim);
    max_abs_diff(&shifted_then_f, &f_then_shifted) < 1e-4
}

// ─── Denoiser ────────────────────────────────────────────────────────────────

#[test]
fn unpatched_network_has_seams() {
    let device = Device::Cpu;
    let net = TinyDenoiser::new(2, &device).unwrap();
    let x = input(&device);
    let f = |t: &Tensor| net.forward(t).unwrap();
    assert!(!commutes_with_shift(f, &x, 3, W));
    assert!(!commutes_with_shift(f, &x, 3, H));
}

#[test]
fn fully_circular_network_commutes_with_shifts() {
    let device = Device::Cpu;
    let net = SeamlessTilingPatch {
        start_step: -1,
        stop_step: -1,
        tiling_x: true,
        tiling_y: true,
    }
    .apply(TinyDenoiser::new(2, &device).unwrap());
    let x = input(&device);
    let f = |t: &Tensor| net.forward(t).unwrap();
    assert!(commutes_with_shift(f, &x, 3, W));
    assert!(commutes_with_shift(f, &x, 5, H));
}

#[test]
fn horizontal_only_tiling_leaves_vertical_seam() {
    let device = Device::Cpu;
    let net = SeamlessTilingPatch {
        start_step: -1,
        stop_step: -1,
        tiling_x: true,
        tiling_y: false,
    }
    .apply(TinyDenoiser::new(2, &device).unwrap());
    let x = input(&device);
    let f = |t: &Tensor| net.forward(t).unwrap();
    assert!(commutes_with_shift(f, &x, 4, W));
    assert!(!commutes_with_shift(f, &x, 4, H));
}

#[test]
fn step_range_gates_circular_padding() {
    let device = Device::Cpu;
    let mut patched = TinyDenoiser::new(2, &device).unwrap();
    let mut circular = patched.clone();
    let native = patched.clone();
    apply_stepped(&mut patched, StepRange::bounded(1, 2), true, true);
    apply_stepped(&mut circular, StepRange::UNBOUNDED, true, true);

    let x = input(&device);
    let expected_native = native.forward(&x).unwrap();
    for step in 0..4 {
        let out = patched.forward(&x).unwrap();
        let reference = circular.forward(&x).unwrap();
        if (1..=2).contains(&step) {
            assert!(max_abs_diff(&out, &reference) < 1e-5, "step {step} should be circular");
        } else {
            assert!(max_abs_diff(&out, &expected_native) < 1e-5, "step {step} should zero-pad");
        }
    }
    for conv in conv_layers(&mut patched) {
        assert_eq!(conv.patch().unwrap().gate().unwrap().counter(), 4);
    }
}

#[test]
fn delayed_start_activates_late() {
    let device = Device::Cpu;
    let net = SeamlessTilingPatch {
        start_step: 5,
        stop_step: -1,
        tiling_x: true,
        tiling_y: true,
    }
    .apply(TinyDenoiser::new(1, &device).unwrap());
    let x = Tensor::randn(0.0f32, 1.0, (1, 1, 6, 6), &device).unwrap();
    let native = TinyDenoiser::new(1, &device).unwrap();
    let expected = native.forward(&x).unwrap();
    for _ in 0..5 {
        assert!(max_abs_diff(&net.forward(&x).unwrap(), &expected) < 1e-5);
    }
    assert!(max_abs_diff(&net.forward(&x).unwrap(), &expected) > 1e-4);
}

// ─── Decoder ─────────────────────────────────────────────────────────────────

#[test]
fn circular_decode_output_tiles() {
    let device = Device::Cpu;
    let latents = Tensor::randn(0.0f32, 1.0, (1, 2, 6, 5), &device).unwrap();
    let mut decoder = TinyDecoder::new(2, &device).unwrap();
    let image = CircularDecode::new(TilingMode::Enable)
        .decode(&latents, &mut decoder)
        .unwrap();
    assert_eq!(image.dims(), &[1, 2, 12, 10]);

    // Nearest 2x upsampling: a latent shift of k is an image shift of 2k.
    let shifted = decoder.decode(&roll(&latents, 2, W)).unwrap();
    assert!(max_abs_diff(&shifted, &roll(&image, 4, W)) < 1e-4);
    let shifted = decoder.decode(&roll(&latents, 1, H)).unwrap();
    assert!(max_abs_diff(&shifted, &roll(&image, 2, H)) < 1e-4);
}

#[test]
fn circular_decode_patch_persists() {
    let device = Device::Cpu;
    let latents = Tensor::randn(0.0f32, 1.0, (1, 2, 4, 4), &device).unwrap();
    let mut decoder = TinyDecoder::new(2, &device).unwrap();
    let first = CircularDecode::new(TilingMode::YOnly)
        .decode(&latents, &mut decoder)
        .unwrap();
    let again = decoder.decode(&latents).unwrap();
    assert!(max_abs_diff(&first, &again) < 1e-6);
    assert!(conv_layers(&mut decoder).all(|c| c.is_patched()));
}

// ─── Layers built from candle_nn ─────────────────────────────────────────────

#[test]
fn layers_from_var_builder_keep_output_size() {
    let device = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let cfg = Conv2dConfig {
        padding: 1,
        ..Default::default()
    };
    let mut convs = vec![
        Single(tileable_conv2d(3, 4, 3, cfg, vb.pp("a")).unwrap()),
        Single(tileable_conv2d(4, 4, 3, cfg, vb.pp("b")).unwrap()),
    ];
    let x = Tensor::randn(0.0f32, 1.0, (2, 3, 7, 9), &device).unwrap();
    let before = convs[1].0.forward(&convs[0].0.forward(&x).unwrap()).unwrap();

    assert_eq!(apply_stepped(&mut convs, StepRange::UNBOUNDED, true, true), 2);
    let after = convs[1].0.forward(&convs[0].0.forward(&x).unwrap()).unwrap();
    assert_eq!(before.dims(), after.dims());
    assert_eq!(after.dims(), &[2, 4, 7, 9]);
}

struct Single(TileableConv2d);

impl LayerTree for Single {
    fn layers_mut(&mut self) -> Vec<LayerMut<'_>> {
        vec![LayerMut::Conv(&mut self.0)]
    }
}
