use candle_core::{DType, Device, Module, Result, Tensor};

use crate::conv::{ConvGeometry, TileableConv2d};
use crate::nodes::LatentDecoder;
use crate::padding::NativePadding;
use crate::scan::{LayerMut, LayerTree};

fn averaging_conv(
    channels: usize,
    kernel: usize,
    dilation: usize,
    device: &Device,
) -> Result<TileableConv2d> {
    let scale = 1.0 / (channels * kernel * kernel) as f64;
    let weight = Tensor::ones((channels, channels, kernel, kernel), DType::F32, device)?
        .affine(scale, 0.0)?;
    let pad = dilation * (kernel - 1) / 2;
    Ok(TileableConv2d::new(
        weight,
        None,
        ConvGeometry {
            padding: NativePadding::symmetric(pad),
            dilation,
            ..Default::default()
        },
    ))
}

/// Same-size averaging convolution on CPU.
pub fn box_conv(channels: usize, kernel: usize) -> TileableConv2d {
    averaging_conv(channels, kernel, 1, &Device::Cpu).expect("cpu tensor allocation")
}

/// Residual pair: a plain 3x3 followed by a dilated 3x3.
#[derive(Debug, Clone)]
pub struct ResBlock {
    pub conv1: TileableConv2d,
    pub conv2: TileableConv2d,
}

impl ResBlock {
    pub fn new(channels: usize, device: &Device) -> Result<Self> {
        Ok(Self {
            conv1: averaging_conv(channels, 3, 1, device)?,
            conv2: averaging_conv(channels, 3, 2, device)?,
        })
    }
}

impl Module for ResBlock {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let h = self.conv1.forward(x)?.relu()?;
        let h = self.conv2.forward(&h)?;
        x + h
    }
}

impl LayerTree for ResBlock {
    fn layers_mut(&mut self) -> Vec<LayerMut<'_>> {
        vec![LayerMut::Conv(&mut self.conv1), LayerMut::Conv(&mut self.conv2)]
    }
}

/// Size-preserving stand-in for a denoising network.
#[derive(Debug, Clone)]
pub struct TinyDenoiser {
    pub conv_in: TileableConv2d,
    pub blocks: Vec<ResBlock>,
    pub conv_out: TileableConv2d,
}

impl TinyDenoiser {
    pub fn new(channels: usize, device: &Device) -> Result<Self> {
        Ok(Self {
            conv_in: averaging_conv(channels, 3, 1, device)?,
            blocks: vec![ResBlock::new(channels, device)?, ResBlock::new(channels, device)?],
            conv_out: averaging_conv(channels, 1, 1, device)?,
        })
    }
}

impl Module for TinyDenoiser {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let mut h = self.conv_in.forward(x)?;
        for block in &self.blocks {
            h = block.forward(&h)?;
        }
        self.conv_out.forward(&h)
    }
}

impl LayerTree for TinyDenoiser {
    fn layers_mut(&mut self) -> Vec<LayerMut<'_>> {
        vec![
            LayerMut::Conv(&mut self.conv_in),
            LayerMut::Branch(&mut self.blocks),
            LayerMut::Conv(&mut self.conv_out),
        ]
    }
}

/// Latent decoder that upsamples 2x.
#[derive(Debug, Clone)]
pub struct TinyDecoder {
    pub conv_in: TileableConv2d,
    pub mid: ResBlock,
    pub conv_out: TileableConv2d,
}

impl TinyDecoder {
    pub fn new(channels: usize, device: &Device) -> Result<Self> {
        Ok(Self {
            conv_in: averaging_conv(channels, 3, 1, device)?,
            mid: ResBlock::new(channels, device)?,
            conv_out: averaging_conv(channels, 3, 1, device)?,
        })
    }
}

impl LayerTree for TinyDecoder {
    fn layers_mut(&mut self) -> Vec<LayerMut<'_>> {
        vec![
            LayerMut::Conv(&mut self.conv_in),
            LayerMut::Branch(&mut self.mid),
            LayerMut::Conv(&mut self.conv_out),
        ]
    }
}

impl LatentDecoder for TinyDecoder {
    fn decode(&self, samples: &Tensor) -> Result<Tensor> {
        let h = self.conv_in.forward(samples)?;
        let (_, _, height, width) = h.dims4()?;
        let h = h.upsample_nearest2d(height * 2, width * 2)?;
        let h = self.mid.forward(&h)?;
        self.conv_out.forward(&h)
    }
}
