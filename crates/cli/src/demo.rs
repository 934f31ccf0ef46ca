//! Randomly initialised stand-in networks for demonstrating the patches.
//!
//! The weights mean nothing; the point is to drive real convolution stacks
//! through [`SeamlessTilingPatch`] and [`CircularDecode`] and report how the
//! output seams change.

use candle_core::{DType, Device, Module, Result, Tensor};
use candle_nn::{Conv2dConfig, VarBuilder, VarMap};
use seamless_core::{
    conv_layers, seam_report, tileable_conv2d, AxisModes, CircularDecode, LatentDecoder,
    LayerMut, LayerTree, SeamReport, SeamlessTilingPatch, StepGate, TileableConv2d, TilingMode,
};

const HIDDEN: usize = 16;
const IMAGE_CHANNELS: usize = 3;

fn same_conv(cin: usize, cout: usize, dilation: usize, vb: VarBuilder) -> Result<TileableConv2d> {
    let cfg = Conv2dConfig {
        padding: dilation,
        dilation,
        ..Default::default()
    };
    tileable_conv2d(cin, cout, 3, cfg, vb)
}

struct Block {
    conv1: TileableConv2d,
    conv2: TileableConv2d,
}

impl Block {
    fn new(channels: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            conv1: same_conv(channels, channels, 1, vb.pp("conv1"))?,
            conv2: same_conv(channels, channels, 2, vb.pp("conv2"))?,
        })
    }
}

impl Module for Block {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let h = self.conv1.forward(x)?.silu()?;
        let h = self.conv2.forward(&h)?;
        x + h
    }
}

impl LayerTree for Block {
    fn layers_mut(&mut self) -> Vec<LayerMut<'_>> {
        vec![LayerMut::Conv(&mut self.conv1), LayerMut::Conv(&mut self.conv2)]
    }
}

/// Predicts a residual of the same shape as its latent input.
pub struct DemoDenoiser {
    conv_in: TileableConv2d,
    blocks: Vec<Block>,
    conv_out: TileableConv2d,
}

impl DemoDenoiser {
    pub fn new(channels: usize, vb: VarBuilder) -> Result<Self> {
        let blocks = (0..2)
            .map(|i| Block::new(HIDDEN, vb.pp(format!("blocks.{i}"))))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            conv_in: same_conv(channels, HIDDEN, 1, vb.pp("conv_in"))?,
            blocks,
            conv_out: same_conv(HIDDEN, channels, 1, vb.pp("conv_out"))?,
        })
    }
}

impl Module for DemoDenoiser {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let mut h = self.conv_in.forward(x)?;
        for block in &self.blocks {
            h = block.forward(&h)?;
        }
        self.conv_out.forward(&h)
    }
}

impl LayerTree for DemoDenoiser {
    fn layers_mut(&mut self) -> Vec<LayerMut<'_>> {
        vec![
            LayerMut::Conv(&mut self.conv_in),
            LayerMut::Branch(&mut self.blocks),
            LayerMut::Conv(&mut self.conv_out),
        ]
    }
}

/// Turns latents into a 3-channel image at twice the resolution.
pub struct DemoDecoder {
    conv_in: TileableConv2d,
    mid: Block,
    conv_out: TileableConv2d,
}

impl DemoDecoder {
    pub fn new(channels: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            conv_in: same_conv(channels, HIDDEN, 1, vb.pp("conv_in"))?,
            mid: Block::new(HIDDEN, vb.pp("mid"))?,
            conv_out: same_conv(HIDDEN, IMAGE_CHANNELS, 1, vb.pp("conv_out"))?,
        })
    }
}

impl LayerTree for DemoDecoder {
    fn layers_mut(&mut self) -> Vec<LayerMut<'_>> {
        vec![
            LayerMut::Conv(&mut self.conv_in),
            LayerMut::Branch(&mut self.mid),
            LayerMut::Conv(&mut self.conv_out),
        ]
    }
}

impl LatentDecoder for DemoDecoder {
    fn decode(&self, samples: &Tensor) -> Result<Tensor> {
        let h = self.conv_in.forward(samples)?;
        let (_, _, height, width) = h.dims4()?;
        let h = h.upsample_nearest2d(height * 2, width * 2)?;
        let h = self.mid.forward(&h)?;
        self.conv_out.forward(&h)?.tanh()
    }
}

/// One denoising iteration as seen from outside the network.
#[derive(Debug, Clone, Copy)]
pub struct StepRecord {
    pub step: usize,
    /// Whether the patched layers padded circularly on this iteration.
    pub circular: bool,
}

#[derive(Debug, Clone)]
pub struct PatchRun {
    pub layers: usize,
    pub steps: Vec<StepRecord>,
    pub seams: SeamReport,
}

/// Whether the next forward pass through `model` pads circularly on any axis.
///
/// Every layer is patched with the same modes and a counter that advances once
/// per pass, so the first layer speaks for the whole network.
fn next_pass_is_circular<T: LayerTree + ?Sized>(model: &mut T) -> bool {
    conv_layers(model)
        .next()
        .and_then(|conv| conv.patch())
        .map_or(false, |patch| {
            patch.modes() != AxisModes::CONSTANT && patch.gate().map_or(true, StepGate::is_active)
        })
}

fn denoise(
    model: &mut DemoDenoiser,
    mut latents: Tensor,
    steps: usize,
) -> Result<(Tensor, Vec<StepRecord>)> {
    let mut records = Vec::with_capacity(steps);
    for step in 0..steps {
        let circular = next_pass_is_circular(&mut *model);
        let residual = model.forward(&latents)?;
        latents = (latents - residual.affine(0.1, 0.0)?)?;
        tracing::info!(step, circular, "denoising step");
        records.push(StepRecord { step, circular });
    }
    Ok((latents, records))
}

/// Patch a demo denoiser and run `steps` iterations on random latents.
pub fn run_patch(
    node: &SeamlessTilingPatch,
    channels: usize,
    (height, width): (usize, usize),
    steps: usize,
    device: &Device,
) -> Result<PatchRun> {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
    let mut model = node.apply(DemoDenoiser::new(channels, vb)?);
    let layers = conv_layers(&mut model).count();

    let latents = Tensor::randn(0.0f32, 1.0, (1, channels, height, width), device)?;
    let (latents, records) = denoise(&mut model, latents, steps)?;

    Ok(PatchRun {
        layers,
        steps: records,
        seams: seam_report(&latents)?,
    })
}

/// Decode random latents with a demo decoder patched for `mode`.
pub fn run_decode(
    mode: TilingMode,
    channels: usize,
    (height, width): (usize, usize),
    device: &Device,
) -> seamless_core::Result<(Tensor, SeamReport)> {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
    let mut decoder = DemoDecoder::new(channels, vb)?;

    let latents = Tensor::randn(0.0f32, 1.0, (1, channels, height, width), device)?;
    let image = CircularDecode::new(mode).decode(&latents, &mut decoder)?;
    let seams = seam_report(&image)?;
    Ok((image, seams))
}
